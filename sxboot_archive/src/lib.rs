// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Self-extraction of the archive embedded in the launcher image
//!
//! The archive is an xz-compressed tar stream stored in the `.staticx.archive` section. It is
//! decoded through [`XzSource`], a pull-based [`std::io::Read`] adapter, so the tar reader
//! drives decompression and no intermediate buffer holds the whole archive.

use std::path::PathBuf;

use thiserror::Error;

mod extract;
mod xz;

pub use extract::{
    ARCHIVE_SECTION, INTERP_FILENAME, PROG_FILENAME, extract_embedded_archive,
    extract_from_image, extract_tar_xz, verify_layout,
};
pub use xz::{DECODER_MEMLIMIT, XzSource};

/// Errors while decoding or unpacking the embedded archive
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("failed to initialize xz decoder: {0}")]
    DecoderInit(#[source] xz2::stream::Error),
    #[error("xz decode error: {0}")]
    Decode(#[source] xz2::stream::Error),
    #[error("xz decoder made no progress after consuming {consumed} of {total} input bytes")]
    Stalled { consumed: u64, total: u64 },
    #[error(transparent)]
    Elf(#[from] sxboot_elf::Error),
    #[error("failed to unpack archive into {}", dest.display())]
    Unpack {
        dest: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("archive is missing {}", path.display())]
    MissingEntry { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, Error>;
