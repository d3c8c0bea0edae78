// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Launcher configuration.
//!
//! Every command-line argument belongs to the target program, so the launcher itself is only
//! configured through the environment.

use std::path::PathBuf;

/// Environment variable selecting the log level.
pub const LOG_ENV: &str = "SXBOOT_LOG";
/// Environment variable overriding where the ephemeral directory is created.
pub const TMPDIR_ENV: &str = "SXBOOT_TMPDIR";

const DEFAULT_TEMP_ROOT: &str = "/tmp";
const SELF_IMAGE: &str = "/proc/self/exe";
const DIR_PREFIX: &str = "staticx-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Image carrying the embedded archive.
    pub self_image: PathBuf,
    /// Directory under which the ephemeral directory is created.
    pub temp_root: PathBuf,
    pub dir_prefix: String,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            self_image: PathBuf::from(SELF_IMAGE),
            temp_root: PathBuf::from(DEFAULT_TEMP_ROOT),
            dir_prefix: DIR_PREFIX.to_owned(),
        }
    }
}

impl LaunchConfig {
    /// Defaults, with [`TMPDIR_ENV`] applied when set to a non-empty value.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<std::ffi::OsString>) -> Self {
        let mut config = Self::default();
        if let Some(root) = lookup(TMPDIR_ENV)
            && !root.is_empty()
        {
            config.temp_root = PathBuf::from(root);
        }
        config
    }
}
