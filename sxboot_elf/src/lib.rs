// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Inspect and patch ELF64 images in place
//!
//! [`ElfImage`] is a bounds-checked view over a byte buffer holding an ELF64 file. Every
//! header, table entry and string is decoded through fixed-width little-endian accessors at
//! offsets that are validated against the buffer length first, so malformed input is reported
//! as an [`Error`] instead of being read out of bounds.
//!
//! On top of the view, the patcher rewrites two fields of a dynamically linked executable:
//! its requested interpreter (`PT_INTERP`) and its library search path (`DT_RPATH`). Both are
//! overwritten in place and can only shrink; the image is never resized. This only works
//! because whoever produced the image reserved placeholder strings at least as long as the
//! values substituted later.
//!
//! This crate only supports little-endian 64-bit ELF images.

use std::path::PathBuf;

use thiserror::Error;

mod image;
mod mapped;
mod patch;
#[cfg(test)]
mod synth;

pub use image::{
    DT_NULL, DT_RPATH, DT_RUNPATH, DYNAMIC_ENTRY_SIZE, DynamicEntries, DynamicEntry, ElfImage,
    FILE_HEADER_SIZE, FileHeader, PROGRAM_HEADER_SIZE, ProgramHeader, SECTION_HEADER_SIZE,
    SectionHeader, SectionLookup, is_valid_elf,
};
pub use patch::{Field, Patch};

/// Errors while inspecting or patching an ELF image
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("failed to open {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to map {}", path.display())]
    Map {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to flush mapped image")]
    Flush(#[source] std::io::Error),
    #[error("invalid ELF header")]
    BadMagic,
    #[error("unsupported ELF class {0}, only 64-bit images are supported")]
    UnsupportedClass(u8),
    #[error("unsupported ELF data encoding {0}, only little-endian images are supported")]
    UnsupportedEncoding(u8),
    #[error("{what} at offset {offset:#x} (length {len:#x}) lies outside the {image_len:#x}-byte image")]
    OutOfBounds {
        what: &'static str,
        offset: u64,
        len: u64,
        image_len: usize,
    },
    #[error("ELF file disagrees with {table} entry size: {found} != {expected}")]
    EntrySizeMismatch {
        table: &'static str,
        found: u64,
        expected: u64,
    },
    #[error("section index {index} is outside the {count}-entry section header table")]
    SectionIndexOutOfRange { index: u64, count: u64 },
    #[error("string offset {offset:#x} is outside the {size:#x}-byte string table")]
    StringOutOfBounds { offset: u64, size: u64 },
    #[error("string at offset {offset:#x} is not NUL terminated")]
    UnterminatedString { offset: u64 },
    #[error("failed to find {0} program header")]
    MissingProgramHeader(&'static str),
    #[error("failed to find {0} section")]
    MissingSection(String),
    #[error("couldn't find {0} dynamic tag")]
    MissingDynamicEntry(&'static str),
    #[error("current INTERP not NUL terminated")]
    InterpNotTerminated,
    #[error("current INTERP too small: need {required} bytes, have {capacity}")]
    InterpTooSmall { required: u64, capacity: u64 },
    #[error("RPATH offset {offset:#x} outside of the {size:#x}-byte dynamic string table")]
    RpathOutsideStrtab { offset: u64, size: u64 },
    #[error("current RPATH not NUL terminated")]
    RpathNotTerminated,
    #[error("current RPATH too small: need {required} bytes, have {capacity}")]
    RpathTooSmall { required: u64, capacity: u64 },
    #[error("replacement value contains an interior NUL byte")]
    InteriorNul,
}

pub type Result<T> = std::result::Result<T, Error>;
