// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! A self-extracting bootstrap launcher.
//!
//! The `sxboot` binary carries an xz-compressed tar archive in its `.staticx.archive` section.
//! The archive holds a dynamic loader (`.staticx.interp`), a dynamically linked program
//! (`.staticx.prog`) and the libraries it needs. [`run`] unpacks the archive into a private
//! directory, points the program's interpreter and library search path into that directory,
//! runs it to completion and removes the directory again.

use std::ffi::OsString;

use anyhow::Context as _;
use sxboot_archive::{INTERP_FILENAME, PROG_FILENAME};
use sxboot_util_log::{debug, info_span};

pub mod config;
mod outcome;
mod patch;
pub mod supervisor;

pub use config::LaunchConfig;
pub use outcome::ChildOutcome;
pub use patch::patch_target;
pub use supervisor::{EphemeralDir, RunningChild, Supervisor};

/// Exit status of the launcher when it fails before the target runs.
pub const INTERNAL_FAILURE_STATUS: i32 = 2;
/// Exit status of the child when the target cannot be executed.
pub const EXEC_FAILURE_STATUS: i32 = 3;

/// Extracts, patches and runs the bundled program, forwarding `args` after the first.
///
/// The ephemeral directory is removed before returning, whether the program succeeded,
/// failed or was killed, and also when any step here fails.
pub fn run(config: &LaunchConfig, args: &[OsString]) -> anyhow::Result<ChildOutcome> {
    let _span = info_span!("run");
    let dir = EphemeralDir::create(&config.temp_root, &config.dir_prefix)?;

    sxboot_archive::extract_embedded_archive(&config.self_image, dir.path()).with_context(
        || {
            format!(
                "failed to extract archive from {}",
                config.self_image.display()
            )
        },
    )?;

    let prog = dir.path().join(PROG_FILENAME);
    let interp = dir.path().join(INTERP_FILENAME);
    patch_target(&prog, &interp, dir.path())
        .with_context(|| format!("failed to patch {}", prog.display()))?;

    let child = Supervisor::new(&prog, args)?.spawn()?;
    let outcome = child.wait()?;
    debug!(outcome:? = outcome; "target finished");

    dir.remove();
    Ok(outcome)
}
