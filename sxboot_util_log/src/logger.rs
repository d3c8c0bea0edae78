// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Environment-configured stderr logging on top of `env_logger`.

use env_logger::{Builder, Env};
use log::SetLoggerError;

/// Filter used when the environment variable is unset.
pub const DEFAULT_FILTER: &str = "warn";

/// A logger builder whose filter is read from the environment variable `var`.
///
/// The variable takes `env_logger` directives (`debug`, `sxboot_elf=trace`, ...). Records
/// are written as `[LEVEL target] message key=value ...` without a timestamp.
pub fn builder(var: &str) -> Builder {
    let mut builder = Builder::from_env(Env::new().filter_or(var, DEFAULT_FILTER));
    builder.format_timestamp(None).format_target(true);
    builder
}

/// Installs the logger from [`builder`] as the global logger.
///
/// # Errors
///
/// Fails if a global logger has already been installed.
pub fn init_from_env(var: &str) -> Result<(), SetLoggerError> {
    builder(var).try_init()
}
