// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! This crate only makes sense in testing mode
#![cfg(test)]

use anyhow::{Result, anyhow};
use std::path::PathBuf;

mod boilerplate;
mod ratchet;

/// Prefix shared by every crate directory whose sources the checks cover.
const CRATE_DIR_PREFIX: &str = "sxboot_";

/// The workspace root, which is the parent of this crate's manifest directory.
pub(crate) fn project_root() -> Result<PathBuf> {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let root = manifest_dir
        .parent()
        .ok_or_else(|| anyhow!("Could not find project root"))?
        .to_owned();
    Ok(root)
}

/// All files under the `sxboot_*` crates that are not ignored by `.gitignore`, relative to
/// the project root.
pub(crate) fn all_source_files() -> Result<Vec<PathBuf>> {
    let root = project_root()?;
    let mut files = Vec::new();
    for entry in fs_err::read_dir(&root)? {
        let entry = entry?;
        let is_crate_dir = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(CRATE_DIR_PREFIX));
        if !is_crate_dir || !entry.file_type()?.is_dir() {
            continue;
        }
        for ent in ignore::WalkBuilder::new(entry.path()).build() {
            let ent = ent?;
            if ent.file_type().is_some_and(|t| t.is_file()) {
                files.push(ent.path().strip_prefix(&root)?.to_owned());
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Absolute paths of all `.rs` source files in the `sxboot_*` crates.
///
/// Skips `target/` directories since we might have build artifacts there.
pub(crate) fn all_rs_files() -> Result<impl Iterator<Item = PathBuf>> {
    let root = project_root()?;
    Ok(all_source_files()?
        .into_iter()
        .filter(|p| p.extension().is_some_and(|ext| ext == "rs"))
        .filter(|p| !p.components().any(|c| c.as_os_str() == "target"))
        .map(move |p| root.join(p)))
}

#[test]
fn finds_every_crate() -> Result<()> {
    let files = all_source_files()?;
    for krate in [
        "sxboot_util_log",
        "sxboot_elf",
        "sxboot_archive",
        "sxboot_launcher",
    ] {
        assert!(
            files.iter().any(|p| p.starts_with(krate)),
            "no sources found for {krate}"
        );
    }
    Ok(())
}
