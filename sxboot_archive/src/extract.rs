// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use std::path::Path;

use sxboot_elf::ElfImage;
use sxboot_util_log::{debug, debug_span};

use crate::xz::XzSource;
use crate::{Error, Result};

/// Section of the launcher image holding the compressed archive.
pub const ARCHIVE_SECTION: &str = ".staticx.archive";
/// Archive member holding the bundled dynamic loader.
pub const INTERP_FILENAME: &str = ".staticx.interp";
/// Archive member holding the target program.
pub const PROG_FILENAME: &str = ".staticx.prog";

/// Unpacks the archive embedded in the image at `self_image` into `dest`, then checks that
/// the loader and the program are present.
pub fn extract_embedded_archive(self_image: &Path, dest: &Path) -> Result<()> {
    let _span = debug_span!("extract", image:? = self_image, dest:? = dest);
    let image = ElfImage::open_readonly(self_image)?;
    extract_from_image(&image, dest)?;
    drop(image);
    verify_layout(dest)
}

/// Locates [`ARCHIVE_SECTION`] in `image` and unpacks it into `dest`.
pub fn extract_from_image<B: AsRef<[u8]>>(image: &ElfImage<B>, dest: &Path) -> Result<()> {
    let section = image.require_section(ARCHIVE_SECTION)?;
    debug!(offset:? = section.sh_offset, size:? = section.sh_size; "found archive section");
    extract_tar_xz(image.section_data(&section)?, dest)
}

/// Decompresses an xz-compressed tar stream and unpacks every entry under `dest`.
///
/// Entry names, types and permission bits are preserved. Existing files are overwritten.
pub fn extract_tar_xz(compressed: &[u8], dest: &Path) -> Result<()> {
    let source = XzSource::new(compressed)?;
    let mut archive = tar::Archive::new(source);
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);
    archive.unpack(dest).map_err(|source| Error::Unpack {
        dest: dest.to_owned(),
        source,
    })?;
    let source = archive.into_inner();
    debug!(
        compressed:? = source.total_in(),
        decompressed:? = source.total_out();
        "archive unpacked"
    );
    Ok(())
}

/// Checks that the loader and the program were extracted as regular files.
pub fn verify_layout(dest: &Path) -> Result<()> {
    for name in [INTERP_FILENAME, PROG_FILENAME] {
        let path = dest.join(name);
        match std::fs::symlink_metadata(&path) {
            Ok(meta) if meta.is_file() => {}
            _ => return Err(Error::MissingEntry { path }),
        }
    }
    Ok(())
}
