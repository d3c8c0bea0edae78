// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Builds small ELF64 images for unit tests.
//!
//! The layout is fixed: file header, program headers, interpreter bytes, `.dynstr`,
//! `.dynamic`, an optional extra section, `.shstrtab`, and the section header table last.

use object::elf;

use crate::image::{DT_NULL, FILE_HEADER_SIZE, PROGRAM_HEADER_SIZE, SECTION_HEADER_SIZE};

const DT_NEEDED: i64 = 1;

/// Indices into `e_ident`.
pub(crate) const EI_CLASS: usize = 4;
pub(crate) const EI_DATA: usize = 5;
pub(crate) const EI_VERSION: usize = 6;
/// Offset of the search path inside `.dynstr`, right after `"\0libc.so.6\0"`.
const RPATH_STR_OFFSET: u64 = 11;

pub(crate) struct SynthElf {
    /// Full contents of the `PT_INTERP` segment. Empty omits the segment and `.interp`.
    pub interp: Vec<u8>,
    /// Tag and text (without NUL) of the search path entry.
    pub rpath: Option<(i64, Vec<u8>)>,
    /// Whether to emit `PT_DYNAMIC` and `.dynamic`.
    pub dynamic: bool,
    pub phentsize: u16,
    pub shentsize: u16,
    pub extra_section: Option<(String, Vec<u8>)>,
}

struct Shdr {
    name: u32,
    sh_type: u32,
    offset: u64,
    size: u64,
    link: u32,
    entsize: u64,
}

fn align8(buf: &mut Vec<u8>) {
    while buf.len() % 8 != 0 {
        buf.push(0);
    }
}

impl SynthElf {
    /// An image whose interpreter field is `interp_size` bytes (a path plus NUL) and whose
    /// `DT_RPATH` string is `rpath_len` bytes before its NUL.
    pub fn with_placeholders(interp_size: usize, rpath_len: usize) -> Self {
        let mut interp = vec![b'x'; interp_size];
        if let Some(first) = interp.first_mut() {
            *first = b'/';
        }
        if let Some(last) = interp.last_mut() {
            *last = 0;
        }
        Self {
            interp,
            rpath: Some((crate::DT_RPATH, vec![b'y'; rpath_len])),
            dynamic: true,
            phentsize: PROGRAM_HEADER_SIZE,
            shentsize: SECTION_HEADER_SIZE,
            extra_section: None,
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let has_interp = !self.interp.is_empty();
        let phnum = u16::from(has_interp) + u16::from(self.dynamic);
        let phoff = FILE_HEADER_SIZE as u64;
        let mut out = vec![0u8; FILE_HEADER_SIZE + usize::from(phnum) * 56];

        let mut shstrtab = vec![0u8];
        let mut add_name = |name: &str| -> u32 {
            let at = shstrtab.len() as u32;
            shstrtab.extend_from_slice(name.as_bytes());
            shstrtab.push(0);
            at
        };
        let mut shdrs = vec![Shdr {
            name: 0,
            sh_type: elf::SHT_NULL,
            offset: 0,
            size: 0,
            link: 0,
            entsize: 0,
        }];
        let mut phdrs = Vec::new();

        if has_interp {
            let offset = out.len() as u64;
            out.extend_from_slice(&self.interp);
            phdrs.push((elf::PT_INTERP, offset, self.interp.len() as u64));
            shdrs.push(Shdr {
                name: add_name(".interp"),
                sh_type: elf::SHT_PROGBITS,
                offset,
                size: self.interp.len() as u64,
                link: 0,
                entsize: 0,
            });
        }

        let mut dynstr = b"\0libc.so.6\0".to_vec();
        if let Some((_, text)) = &self.rpath {
            dynstr.extend_from_slice(text);
            dynstr.push(0);
        }
        let dynstr_index = shdrs.len() as u32;
        let offset = out.len() as u64;
        out.extend_from_slice(&dynstr);
        shdrs.push(Shdr {
            name: add_name(".dynstr"),
            sh_type: elf::SHT_STRTAB,
            offset,
            size: dynstr.len() as u64,
            link: 0,
            entsize: 0,
        });

        if self.dynamic {
            align8(&mut out);
            let mut entries = vec![(DT_NEEDED, 1u64)];
            if let Some((tag, _)) = &self.rpath {
                entries.push((*tag, RPATH_STR_OFFSET));
            }
            entries.push((DT_NULL, 0));
            entries.push((DT_NULL, 0));
            let offset = out.len() as u64;
            for (tag, value) in &entries {
                out.extend_from_slice(&tag.to_le_bytes());
                out.extend_from_slice(&value.to_le_bytes());
            }
            let size = entries.len() as u64 * 16;
            phdrs.push((elf::PT_DYNAMIC, offset, size));
            shdrs.push(Shdr {
                name: add_name(".dynamic"),
                sh_type: elf::SHT_DYNAMIC,
                offset,
                size,
                link: dynstr_index,
                entsize: 16,
            });
        }

        if let Some((name, data)) = &self.extra_section {
            let offset = out.len() as u64;
            out.extend_from_slice(data);
            shdrs.push(Shdr {
                name: add_name(name),
                sh_type: elf::SHT_PROGBITS,
                offset,
                size: data.len() as u64,
                link: 0,
                entsize: 0,
            });
        }

        let shstrtab_name = add_name(".shstrtab");
        let shstrndx = shdrs.len() as u16;
        let offset = out.len() as u64;
        out.extend_from_slice(&shstrtab);
        shdrs.push(Shdr {
            name: shstrtab_name,
            sh_type: elf::SHT_STRTAB,
            offset,
            size: shstrtab.len() as u64,
            link: 0,
            entsize: 0,
        });

        align8(&mut out);
        let shoff = out.len() as u64;
        for shdr in &shdrs {
            let mut raw = [0u8; 64];
            raw[0..4].copy_from_slice(&shdr.name.to_le_bytes());
            raw[4..8].copy_from_slice(&shdr.sh_type.to_le_bytes());
            raw[24..32].copy_from_slice(&shdr.offset.to_le_bytes());
            raw[32..40].copy_from_slice(&shdr.size.to_le_bytes());
            raw[40..44].copy_from_slice(&shdr.link.to_le_bytes());
            raw[56..64].copy_from_slice(&shdr.entsize.to_le_bytes());
            out.extend_from_slice(&raw);
        }

        for (i, (p_type, offset, size)) in phdrs.iter().enumerate() {
            let base = FILE_HEADER_SIZE + i * 56;
            let raw = &mut out[base..base + 56];
            raw[0..4].copy_from_slice(&p_type.to_le_bytes());
            raw[4..8].copy_from_slice(&elf::PF_R.to_le_bytes());
            raw[8..16].copy_from_slice(&offset.to_le_bytes());
            raw[16..24].copy_from_slice(&offset.to_le_bytes());
            raw[32..40].copy_from_slice(&size.to_le_bytes());
            raw[40..48].copy_from_slice(&size.to_le_bytes());
        }

        let ehdr = &mut out[..FILE_HEADER_SIZE];
        ehdr[..4].copy_from_slice(&elf::ELFMAG);
        ehdr[EI_CLASS] = elf::ELFCLASS64;
        ehdr[EI_DATA] = elf::ELFDATA2LSB;
        ehdr[EI_VERSION] = elf::EV_CURRENT;
        ehdr[16..18].copy_from_slice(&elf::ET_EXEC.to_le_bytes());
        ehdr[18..20].copy_from_slice(&elf::EM_X86_64.to_le_bytes());
        ehdr[20..24].copy_from_slice(&u32::from(elf::EV_CURRENT).to_le_bytes());
        ehdr[32..40].copy_from_slice(&phoff.to_le_bytes());
        ehdr[40..48].copy_from_slice(&shoff.to_le_bytes());
        ehdr[52..54].copy_from_slice(&(FILE_HEADER_SIZE as u16).to_le_bytes());
        ehdr[54..56].copy_from_slice(&self.phentsize.to_le_bytes());
        ehdr[56..58].copy_from_slice(&phnum.to_le_bytes());
        ehdr[58..60].copy_from_slice(&self.shentsize.to_le_bytes());
        ehdr[60..62].copy_from_slice(&(shdrs.len() as u16).to_le_bytes());
        ehdr[62..64].copy_from_slice(&shstrndx.to_le_bytes());
        out
    }
}
