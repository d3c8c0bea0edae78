// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use anyhow::{Result, bail};
use fs_err as fs;

const LICENSE_HEADER: &str =
    "// Copyright (c) Microsoft Corporation.\n// Licensed under the MIT license.\n";

#[test]
fn rust_files_carry_license_header() -> Result<()> {
    let missing: Vec<_> = crate::all_rs_files()?
        .filter_map(|p| match fs::read_to_string(&p) {
            Ok(text) if text.starts_with(LICENSE_HEADER) => None,
            Ok(_) => Some(Ok(p)),
            Err(e) => Some(Err(e)),
        })
        .collect::<Result<_, _>>()?;
    if !missing.is_empty() {
        bail!(
            "Missing license header in:\n\t{}",
            missing
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join("\n\t")
        );
    }
    Ok(())
}

#[test]
fn no_stray_debug_output() -> Result<()> {
    let mut offenders = Vec::new();
    for p in crate::all_rs_files()? {
        for (i, line) in fs::read_to_string(&p)?.lines().enumerate() {
            if line.contains("dbg!(") {
                offenders.push(format!("{}:{}", p.display(), i + 1));
            }
        }
    }
    if !offenders.is_empty() {
        bail!("Found `dbg!` in:\n\t{}", offenders.join("\n\t"));
    }
    Ok(())
}
