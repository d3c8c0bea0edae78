// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use std::os::unix::ffi::OsStrExt as _;
use std::path::Path;

use memmap2::MmapMut;
use sxboot_elf::ElfImage;
use sxboot_util_log::debug;

/// Points the extracted program at the bundled loader and library directory.
///
/// Both fields are validated before either is written; the mapping is flushed and released
/// before returning.
pub fn patch_target(prog: &Path, interp: &Path, rpath: &Path) -> sxboot_elf::Result<()> {
    let mut image: ElfImage<MmapMut> = ElfImage::open_writable(prog)?;
    debug!(
        current_interp:% = String::from_utf8_lossy(image.interpreter()?),
        new_interp:? = interp;
        "patching interpreter"
    );
    image.patch_paths(interp.as_os_str().as_bytes(), rpath.as_os_str().as_bytes())?;
    image.flush()
}
