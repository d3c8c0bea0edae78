// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! File-backed images

use std::fs::{File, OpenOptions};
use std::path::Path;

use memmap2::{Mmap, MmapMut, MmapOptions};
use sxboot_util_log::debug;

use crate::{ElfImage, Error, Result};

impl ElfImage<Mmap> {
    /// Maps `path` read-only and validates its identification bytes.
    pub fn open_readonly(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| Error::Open {
            path: path.to_owned(),
            source,
        })?;
        // SAFETY: the mapping is private to this process and only read. A concurrent writer
        // truncating the file could still fault the reader; the launcher only maps files it
        // owns (its own image and files it extracted).
        let map = unsafe { MmapOptions::new().map(&file) }.map_err(|source| Error::Map {
            path: path.to_owned(),
            source,
        })?;
        debug!(path:? = path, len:? = map.len(); "mapped image read-only");
        ElfImage::new(map)
    }
}

impl ElfImage<MmapMut> {
    /// Maps `path` shared and writable so patches land in the file itself.
    pub fn open_writable(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| Error::Open {
                path: path.to_owned(),
                source,
            })?;
        // SAFETY: the file was just extracted into a directory private to this process, and
        // nothing else holds it open while the mapping is alive.
        let map = unsafe { MmapOptions::new().map_mut(&file) }.map_err(|source| Error::Map {
            path: path.to_owned(),
            source,
        })?;
        debug!(path:? = path, len:? = map.len(); "mapped image writable");
        ElfImage::new(map)
    }

    /// Writes modified pages back to the file.
    pub fn flush(&self) -> Result<()> {
        self.get_ref().flush().map_err(Error::Flush)
    }
}
