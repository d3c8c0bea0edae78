// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use std::ffi::OsString;

use sxboot_launcher::config::LOG_ENV;
use sxboot_launcher::{INTERNAL_FAILURE_STATUS, LaunchConfig};

fn main() {
    if let Err(e) = sxboot_util_log::init_from_env(LOG_ENV) {
        eprintln!("sxboot: failed to initialize logging: {e}");
    }

    let config = LaunchConfig::from_env();
    let args: Vec<OsString> = std::env::args_os().collect();
    match sxboot_launcher::run(&config, &args) {
        Ok(outcome) => outcome.exit_like(),
        Err(e) => {
            eprintln!("sxboot: {e:#}");
            std::process::exit(INTERNAL_FAILURE_STATUS);
        }
    }
}
