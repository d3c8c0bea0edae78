// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! In-place rewriting of the interpreter and library search path.
//!
//! Patching is split into a planning step, which performs every check against the current
//! image and records where the new bytes go, and an apply step, which only copies bytes.
//! [`ElfImage::patch_paths`] plans both fields before touching either of them.

use object::elf;
use sxboot_util_log::debug;

use crate::image::{DT_RPATH, DT_RUNPATH, DynamicEntry, SectionLookup};
use crate::{ElfImage, Error, Result};

/// The field a [`Patch`] rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// The path stored in the `PT_INTERP` segment.
    Interpreter,
    /// The `DT_RPATH` (or `DT_RUNPATH`) string in `.dynstr`.
    Rpath,
}

/// A validated, not yet applied, rewrite of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a planned patch does nothing until applied"]
pub struct Patch<'v> {
    field: Field,
    offset: u64,
    capacity: u64,
    value: &'v [u8],
}

impl Patch<'_> {
    pub fn field(&self) -> Field {
        self.field
    }

    /// File offset of the first byte of the field.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Bytes available for the value and its terminating NUL.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn value(&self) -> &[u8] {
        self.value
    }
}

fn check_value(value: &[u8]) -> Result<()> {
    if value.contains(&0) {
        return Err(Error::InteriorNul);
    }
    Ok(())
}

/// Where the current library search path lives.
struct RpathSlot {
    offset: u64,
    current_len: u64,
}

impl<B: AsRef<[u8]>> ElfImage<B> {
    /// The `PT_INTERP` field, which must end in NUL at `p_filesz`.
    fn interp_field(&self) -> Result<(u64, &[u8])> {
        let interp = self
            .find_program_header(elf::PT_INTERP)?
            .ok_or(Error::MissingProgramHeader("PT_INTERP"))?;
        let field = self.slice("PT_INTERP", interp.p_offset, interp.p_filesz)?;
        if field.last() != Some(&0) {
            return Err(Error::InterpNotTerminated);
        }
        Ok((interp.p_offset, field))
    }

    /// The current interpreter path, without its terminating NUL.
    pub fn interpreter(&self) -> Result<&[u8]> {
        let (_, field) = self.interp_field()?;
        let len = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        Ok(&field[..len])
    }

    /// The dynamic entry naming the search path: the last `DT_RPATH`, or failing that the last
    /// `DT_RUNPATH`.
    fn rpath_entry(&self) -> Result<(DynamicEntry, crate::SectionHeader)> {
        let dynamic = self
            .find_section(SectionLookup::Name(".dynamic"))?
            .ok_or_else(|| Error::MissingSection(".dynamic".to_owned()))?;
        let mut rpath = None;
        let mut runpath = None;
        for entry in self.dynamic_entries(&dynamic)? {
            match entry.tag {
                DT_RPATH => rpath = Some(entry),
                DT_RUNPATH => runpath = Some(entry),
                _ => {}
            }
        }
        let entry = rpath
            .or(runpath)
            .ok_or(Error::MissingDynamicEntry("DT_RPATH"))?;
        let dynstr = self
            .find_section(SectionLookup::Name(".dynstr"))?
            .ok_or_else(|| Error::MissingSection(".dynstr".to_owned()))?;
        Ok((entry, dynstr))
    }

    fn rpath_slot(&self) -> Result<RpathSlot> {
        let (entry, dynstr) = self.rpath_entry()?;
        let size = dynstr.sh_size;
        if entry.value >= size {
            return Err(Error::RpathOutsideStrtab {
                offset: entry.value,
                size,
            });
        }
        let current = match self.str_at(&dynstr, entry.value) {
            Ok(current) => current,
            Err(Error::UnterminatedString { .. }) => return Err(Error::RpathNotTerminated),
            Err(e) => return Err(e),
        };
        let offset = dynstr
            .sh_offset
            .checked_add(entry.value)
            .ok_or(Error::RpathOutsideStrtab {
                offset: entry.value,
                size,
            })?;
        Ok(RpathSlot {
            offset,
            current_len: current.len() as u64,
        })
    }

    /// The current library search path, without its terminating NUL.
    pub fn rpath(&self) -> Result<&[u8]> {
        let slot = self.rpath_slot()?;
        self.slice("DT_RPATH", slot.offset, slot.current_len)
    }

    /// Validates that `value` plus a NUL fits the interpreter field.
    pub fn plan_interpreter<'v>(&self, value: &'v [u8]) -> Result<Patch<'v>> {
        check_value(value)?;
        let (offset, field) = self.interp_field()?;
        let current_len = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        let capacity = field.len() as u64;
        let required = value.len() as u64 + 1;
        debug!(
            current:% = String::from_utf8_lossy(&field[..current_len]),
            new:% = String::from_utf8_lossy(value),
            capacity:? = capacity;
            "planning interpreter patch"
        );
        if required > capacity {
            return Err(Error::InterpTooSmall { required, capacity });
        }
        Ok(Patch {
            field: Field::Interpreter,
            offset,
            capacity,
            value,
        })
    }

    /// Validates that `value` plus a NUL fits where the current search path and its NUL are.
    pub fn plan_rpath<'v>(&self, value: &'v [u8]) -> Result<Patch<'v>> {
        check_value(value)?;
        let slot = self.rpath_slot()?;
        let capacity = slot.current_len + 1;
        let required = value.len() as u64 + 1;
        debug!(
            current_len:? = slot.current_len,
            new:% = String::from_utf8_lossy(value),
            offset:? = slot.offset;
            "planning rpath patch"
        );
        if required > capacity {
            return Err(Error::RpathTooSmall { required, capacity });
        }
        Ok(Patch {
            field: Field::Rpath,
            offset: slot.offset,
            capacity,
            value,
        })
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> ElfImage<B> {
    /// Copies the planned value and its NUL into the image.
    ///
    /// Bytes of the old value beyond the new terminator are left as they were.
    pub fn apply(&mut self, patch: &Patch<'_>) -> Result<()> {
        let len = patch.value.len() as u64 + 1;
        if len > patch.capacity {
            return Err(match patch.field {
                Field::Interpreter => Error::InterpTooSmall {
                    required: len,
                    capacity: patch.capacity,
                },
                Field::Rpath => Error::RpathTooSmall {
                    required: len,
                    capacity: patch.capacity,
                },
            });
        }
        let range = self.range("patch", patch.offset, len)?;
        let dest = &mut self.bytes_mut()[range];
        let (text, nul) = dest.split_at_mut(patch.value.len());
        text.copy_from_slice(patch.value);
        nul[0] = 0;
        debug!(field:? = patch.field, offset:? = patch.offset; "applied patch");
        Ok(())
    }

    /// Replaces the interpreter path. The image is untouched on error.
    pub fn set_interpreter(&mut self, value: &[u8]) -> Result<()> {
        let patch = self.plan_interpreter(value)?;
        self.apply(&patch)
    }

    /// Replaces the library search path. The image is untouched on error.
    pub fn set_rpath(&mut self, value: &[u8]) -> Result<()> {
        let patch = self.plan_rpath(value)?;
        self.apply(&patch)
    }

    /// Replaces both fields, or neither: both are planned before either is written.
    pub fn patch_paths(&mut self, interpreter: &[u8], rpath: &[u8]) -> Result<()> {
        let interp = self.plan_interpreter(interpreter)?;
        let rpath = self.plan_rpath(rpath)?;
        self.apply(&interp)?;
        self.apply(&rpath)
    }
}
