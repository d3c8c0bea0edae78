// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Bounds-checked view over an ELF64 image

use core::ops::Range;
use core::slice::ChunksExact;

use object::pod::{self, Pod};
use object::{LittleEndian as LE, elf};
use sxboot_util_log::trace;

use crate::{Error, Result};

/// Size of the ELF64 file header.
pub const FILE_HEADER_SIZE: usize = 64;
/// Size of one ELF64 program header table entry.
pub const PROGRAM_HEADER_SIZE: u16 = 56;
/// Size of one ELF64 section header table entry.
pub const SECTION_HEADER_SIZE: u16 = 64;
/// Size of one ELF64 dynamic table entry.
pub const DYNAMIC_ENTRY_SIZE: u64 = 16;

/// Marks the end of the dynamic table.
pub const DT_NULL: i64 = 0;
/// Library search path, as an offset into the dynamic string table.
pub const DT_RPATH: i64 = 15;
/// Library search path consulted after `LD_LIBRARY_PATH`.
pub const DT_RUNPATH: i64 = 29;

/// Checks the four ELF magic bytes.
pub fn is_valid_elf(bytes: &[u8]) -> bool {
    bytes.get(..elf::ELFMAG.len()) == Some(&elf::ELFMAG[..])
}

/// The fields of the file header this crate needs, with extended numbering resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub phoff: u64,
    pub phentsize: u16,
    pub phnum: u16,
    pub shoff: u64,
    pub shentsize: u16,
    pub shnum: u64,
    pub shstrndx: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramHeader {
    pub index: u16,
    pub p_type: u32,
    pub p_flags: u32,
    pub p_offset: u64,
    pub p_vaddr: u64,
    pub p_filesz: u64,
    pub p_memsz: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeader {
    pub index: u64,
    pub sh_name: u32,
    pub sh_type: u32,
    pub sh_flags: u64,
    pub sh_addr: u64,
    pub sh_offset: u64,
    pub sh_size: u64,
    pub sh_link: u32,
    pub sh_entsize: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicEntry {
    pub index: usize,
    pub tag: i64,
    pub value: u64,
}

/// How [`ElfImage::find_section`] picks a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionLookup<'a> {
    /// Exact match against the name in the section-name string table.
    Name(&'a str),
    /// First section whose `sh_type` matches.
    Type(u32),
}

/// An ELF64 image backed by a byte buffer.
///
/// `B` is typically a `Vec<u8>` or a [`memmap2`] mapping. Lookups only need `B: AsRef<[u8]>`;
/// the patch operations additionally need `B: AsMut<[u8]>`.
#[derive(Debug)]
pub struct ElfImage<B> {
    buf: B,
}

impl<B: AsRef<[u8]>> ElfImage<B> {
    /// Validates the identification bytes and wraps `buf`.
    ///
    /// # Errors
    ///
    /// [`Error::BadMagic`] if the magic bytes are wrong, and an error if the image is not a
    /// complete little-endian ELF64 file header.
    pub fn new(buf: B) -> Result<Self> {
        let bytes = buf.as_ref();
        if !is_valid_elf(bytes) {
            return Err(Error::BadMagic);
        }
        let image = Self { buf };
        let ident = image.file_header()?.e_ident;
        if ident.class != elf::ELFCLASS64 {
            return Err(Error::UnsupportedClass(ident.class));
        }
        if ident.data != elf::ELFDATA2LSB {
            return Err(Error::UnsupportedEncoding(ident.data));
        }
        Ok(image)
    }

    pub fn bytes(&self) -> &[u8] {
        self.buf.as_ref()
    }

    pub fn get_ref(&self) -> &B {
        &self.buf
    }

    pub fn into_inner(self) -> B {
        self.buf
    }

    /// Validates `offset..offset + len` against the image and returns it as an index range.
    pub(crate) fn range(&self, what: &'static str, offset: u64, len: u64) -> Result<Range<usize>> {
        let image_len = self.bytes().len();
        let out_of_bounds = || Error::OutOfBounds {
            what,
            offset,
            len,
            image_len,
        };
        let end = offset.checked_add(len).ok_or_else(out_of_bounds)?;
        if end > image_len as u64 {
            return Err(out_of_bounds());
        }
        let start = usize::try_from(offset).map_err(|_| out_of_bounds())?;
        let end = usize::try_from(end).map_err(|_| out_of_bounds())?;
        Ok(start..end)
    }

    pub(crate) fn slice(&self, what: &'static str, offset: u64, len: u64) -> Result<&[u8]> {
        let range = self.range(what, offset, len)?;
        Ok(&self.bytes()[range])
    }

    /// Reinterprets the validated range at `offset` as `T`.
    fn read_pod<T: Pod>(&self, what: &'static str, offset: u64) -> Result<&T> {
        let len = size_of::<T>() as u64;
        let raw = self.slice(what, offset, len)?;
        pod::from_bytes(raw)
            .map(|(value, _)| value)
            .map_err(|()| Error::OutOfBounds {
                what,
                offset,
                len,
                image_len: self.bytes().len(),
            })
    }

    fn file_header(&self) -> Result<&elf::FileHeader64<LE>> {
        self.read_pod("file header", 0)
    }

    /// Decodes the file header.
    ///
    /// Extended section numbering is resolved: when `e_shnum` is zero the count lives in
    /// section 0's `sh_size`, and when `e_shstrndx` is `SHN_XINDEX` the index lives in its
    /// `sh_link`.
    pub fn header(&self) -> Result<FileHeader> {
        let raw = self.file_header()?;
        let shnum = raw.e_shnum.get(LE);
        let shstrndx = raw.e_shstrndx.get(LE);
        let mut header = FileHeader {
            phoff: raw.e_phoff.get(LE),
            phentsize: raw.e_phentsize.get(LE),
            phnum: raw.e_phnum.get(LE),
            shoff: raw.e_shoff.get(LE),
            shentsize: raw.e_shentsize.get(LE),
            shnum: u64::from(shnum),
            shstrndx: u32::from(shstrndx),
        };
        if header.shoff != 0 && (shnum == 0 || shstrndx == elf::SHN_XINDEX) {
            let first = self.section_header_unchecked(&header, 0)?;
            if shnum == 0 {
                header.shnum = first.sh_size;
            }
            if shstrndx == elf::SHN_XINDEX {
                header.shstrndx = first.sh_link;
            }
        }
        Ok(header)
    }

    fn check_program_header_size(header: &FileHeader) -> Result<()> {
        if header.phentsize != PROGRAM_HEADER_SIZE {
            return Err(Error::EntrySizeMismatch {
                table: "program header",
                found: header.phentsize.into(),
                expected: PROGRAM_HEADER_SIZE.into(),
            });
        }
        Ok(())
    }

    fn check_section_header_size(header: &FileHeader) -> Result<()> {
        if header.shentsize != SECTION_HEADER_SIZE {
            return Err(Error::EntrySizeMismatch {
                table: "section header",
                found: header.shentsize.into(),
                expected: SECTION_HEADER_SIZE.into(),
            });
        }
        Ok(())
    }

    fn program_header_at(&self, header: &FileHeader, index: u16) -> Result<ProgramHeader> {
        let base = u64::from(index)
            .checked_mul(u64::from(PROGRAM_HEADER_SIZE))
            .and_then(|rel| header.phoff.checked_add(rel))
            .ok_or(Error::OutOfBounds {
                what: "program header",
                offset: header.phoff,
                len: u64::from(PROGRAM_HEADER_SIZE),
                image_len: self.bytes().len(),
            })?;
        let raw: &elf::ProgramHeader64<LE> = self.read_pod("program header", base)?;
        Ok(ProgramHeader {
            index,
            p_type: raw.p_type.get(LE),
            p_flags: raw.p_flags.get(LE),
            p_offset: raw.p_offset.get(LE),
            p_vaddr: raw.p_vaddr.get(LE),
            p_filesz: raw.p_filesz.get(LE),
            p_memsz: raw.p_memsz.get(LE),
        })
    }

    /// All entries of the program header table, in order.
    pub fn program_headers(&self) -> Result<Vec<ProgramHeader>> {
        let header = self.header()?;
        Self::check_program_header_size(&header)?;
        (0..header.phnum)
            .map(|index| self.program_header_at(&header, index))
            .collect()
    }

    /// Returns the first program header of type `p_type`, if any.
    pub fn find_program_header(&self, p_type: u32) -> Result<Option<ProgramHeader>> {
        let header = self.header()?;
        Self::check_program_header_size(&header)?;
        for index in 0..header.phnum {
            let ph = self.program_header_at(&header, index)?;
            if ph.p_type == p_type {
                return Ok(Some(ph));
            }
        }
        Ok(None)
    }

    fn section_header_unchecked(&self, header: &FileHeader, index: u64) -> Result<SectionHeader> {
        Self::check_section_header_size(header)?;
        let base = index
            .checked_mul(u64::from(SECTION_HEADER_SIZE))
            .and_then(|rel| header.shoff.checked_add(rel))
            .ok_or(Error::OutOfBounds {
                what: "section header",
                offset: header.shoff,
                len: u64::from(SECTION_HEADER_SIZE),
                image_len: self.bytes().len(),
            })?;
        let raw: &elf::SectionHeader64<LE> = self.read_pod("section header", base)?;
        Ok(SectionHeader {
            index,
            sh_name: raw.sh_name.get(LE),
            sh_type: raw.sh_type.get(LE),
            sh_flags: raw.sh_flags.get(LE),
            sh_addr: raw.sh_addr.get(LE),
            sh_offset: raw.sh_offset.get(LE),
            sh_size: raw.sh_size.get(LE),
            sh_link: raw.sh_link.get(LE),
            sh_entsize: raw.sh_entsize.get(LE),
        })
    }

    /// Section header `index`, checked against the section count.
    pub fn section_header(&self, header: &FileHeader, index: u64) -> Result<SectionHeader> {
        if index >= header.shnum {
            return Err(Error::SectionIndexOutOfRange {
                index,
                count: header.shnum,
            });
        }
        self.section_header_unchecked(header, index)
    }

    /// All entries of the section header table, in order.
    pub fn sections(&self) -> Result<Vec<SectionHeader>> {
        let header = self.header()?;
        Self::check_section_header_size(&header)?;
        (0..header.shnum)
            .map(|index| self.section_header(&header, index))
            .collect()
    }

    /// The section-name string table, or `None` if the image has none.
    fn section_names(&self, header: &FileHeader) -> Result<Option<SectionHeader>> {
        if header.shstrndx == u32::from(elf::SHN_UNDEF) {
            return Ok(None);
        }
        self.section_header(header, u64::from(header.shstrndx))
            .map(Some)
    }

    /// Name of `section`, looked up in the section-name string table.
    pub fn section_name(&self, section: &SectionHeader) -> Result<Option<&[u8]>> {
        let header = self.header()?;
        match self.section_names(&header)? {
            Some(names) => self.str_at(&names, u64::from(section.sh_name)).map(Some),
            None => Ok(None),
        }
    }

    /// Linear scan of the section header table.
    pub fn find_section(&self, lookup: SectionLookup<'_>) -> Result<Option<SectionHeader>> {
        let header = self.header()?;
        Self::check_section_header_size(&header)?;
        let names = match lookup {
            SectionLookup::Name(_) => self.section_names(&header)?,
            SectionLookup::Type(_) => None,
        };
        for index in 0..header.shnum {
            let section = self.section_header(&header, index)?;
            let hit = match (lookup, names.as_ref()) {
                (SectionLookup::Name(wanted), Some(names)) => {
                    let name = self.str_at(names, u64::from(section.sh_name))?;
                    trace!(
                        index:? = index,
                        name:% = String::from_utf8_lossy(name),
                        sh_type:? = section.sh_type,
                        offset:? = section.sh_offset;
                        "section"
                    );
                    name == wanted.as_bytes()
                }
                (SectionLookup::Name(_), None) => false,
                (SectionLookup::Type(wanted), _) => section.sh_type == wanted,
            };
            if hit {
                return Ok(Some(section));
            }
        }
        Ok(None)
    }

    /// Like [`find_section`](Self::find_section) by name, but a missing section is an error.
    pub fn require_section(&self, name: &str) -> Result<SectionHeader> {
        self.find_section(SectionLookup::Name(name))?
            .ok_or_else(|| Error::MissingSection(name.to_owned()))
    }

    /// The file bytes of `section`. `SHT_NOBITS` sections occupy no file space.
    pub fn section_data(&self, section: &SectionHeader) -> Result<&[u8]> {
        if section.sh_type == elf::SHT_NOBITS {
            return Ok(&[]);
        }
        self.slice("section data", section.sh_offset, section.sh_size)
    }

    /// The NUL-terminated string at `offset` inside string table `table`, without the NUL.
    pub fn str_at(&self, table: &SectionHeader, offset: u64) -> Result<&[u8]> {
        let data = self.section_data(table)?;
        let size = data.len() as u64;
        if offset >= size {
            return Err(Error::StringOutOfBounds { offset, size });
        }
        let start = usize::try_from(offset).map_err(|_| Error::StringOutOfBounds { offset, size })?;
        let tail = &data[start..];
        let len = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or(Error::UnterminatedString { offset })?;
        Ok(&tail[..len])
    }

    /// The entries of the dynamic table held in `dynamic`, up to (excluding) `DT_NULL`.
    ///
    /// The entry count is bounded by the section size divided by the entry size.
    pub fn dynamic_entries(&self, dynamic: &SectionHeader) -> Result<DynamicEntries<'_>> {
        if dynamic.sh_entsize != 0 && dynamic.sh_entsize != DYNAMIC_ENTRY_SIZE {
            return Err(Error::EntrySizeMismatch {
                table: "dynamic",
                found: dynamic.sh_entsize,
                expected: DYNAMIC_ENTRY_SIZE,
            });
        }
        let data = self.section_data(dynamic)?;
        Ok(DynamicEntries {
            chunks: data.chunks_exact(size_of::<elf::Dyn64<LE>>()),
            index: 0,
            done: false,
        })
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> ElfImage<B> {
    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        self.buf.as_mut()
    }
}

/// Iterator over a dynamic table; see [`ElfImage::dynamic_entries`].
#[derive(Debug, Clone)]
pub struct DynamicEntries<'a> {
    chunks: ChunksExact<'a, u8>,
    index: usize,
    done: bool,
}

impl Iterator for DynamicEntries<'_> {
    type Item = DynamicEntry;

    fn next(&mut self) -> Option<DynamicEntry> {
        if self.done {
            return None;
        }
        let (raw, _) = pod::from_bytes::<elf::Dyn64<LE>>(self.chunks.next()?).ok()?;
        let tag = raw.d_tag.get(LE) as i64;
        let value = raw.d_val.get(LE);
        if tag == DT_NULL {
            self.done = true;
            return None;
        }
        let entry = DynamicEntry {
            index: self.index,
            tag,
            value,
        };
        self.index += 1;
        trace!(tag:? = entry.tag, value:? = entry.value; "dynamic entry");
        Some(entry)
    }
}
