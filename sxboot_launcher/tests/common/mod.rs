// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Builds launcher images for the end-to-end tests.
//!
//! A small C program is compiled with oversized placeholder interpreter and rpath values,
//! packed together with the system's dynamic loader into an xz-compressed tar archive, and
//! attached to a copy of the `sxboot` binary with `objcopy --add-section`.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::OnceLock;

use sxboot_elf::ElfImage;

pub const TARGET_C: &str = r#"
#include <signal.h>
#include <stdio.h>
#include <stdlib.h>
#include <string.h>
#include <unistd.h>

static void on_signal(int sig) {
    _exit(100 + sig);
}

int main(int argc, char **argv) {
    printf("argv0=%s\n", argv[0]);
    fflush(stdout);
    if (argc < 2) {
        return 0;
    }
    if (strcmp(argv[1], "exit") == 0 && argc > 2) {
        return atoi(argv[2]);
    }
    if (strcmp(argv[1], "raise") == 0 && argc > 2) {
        raise(atoi(argv[2]));
        return 99;
    }
    if (strcmp(argv[1], "wait") == 0) {
        signal(SIGTERM, on_signal);
        signal(SIGINT, on_signal);
        printf("ready\n");
        fflush(stdout);
        for (;;) {
            pause();
        }
    }
    if (strcmp(argv[1], "args") == 0) {
        for (int i = 2; i < argc; i++) {
            printf("arg=%s\n", argv[i]);
        }
        return 0;
    }
    return 64;
}
"#;

/// Reserved bytes for the interpreter and rpath; far longer than any real ephemeral path.
pub const PLACEHOLDER_LEN: usize = 200;

pub struct Launchers {
    /// The compiled target, before packing.
    pub target: PathBuf,
    /// Working program with a bundled loader.
    pub ok: PathBuf,
    /// Bundle whose program lacks execute permission.
    pub not_executable: PathBuf,
}

fn tool_available(tool: &str) -> bool {
    Command::new(tool)
        .arg("--version")
        .output()
        .is_ok_and(|o| o.status.success())
}

fn work_dir() -> PathBuf {
    let dir = Path::new(env!("CARGO_TARGET_TMPDIR"))
        .join(format!("sxboot-launch-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// A copy of the freshly built `sxboot` binary with no archive attached.
pub fn bare_launcher() -> PathBuf {
    static BARE: OnceLock<PathBuf> = OnceLock::new();
    BARE.get_or_init(|| {
        let dir = Path::new(env!("CARGO_TARGET_TMPDIR"))
            .join(format!("sxboot-bare-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("sxboot");
        std::fs::copy(env!("CARGO_BIN_EXE_sxboot"), &path).unwrap();
        path
    })
    .clone()
}

/// The interpreter the test binary itself was linked against.
fn system_interpreter() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let image = ElfImage::open_readonly(&exe).ok()?;
    let interp = image.interpreter().ok()?;
    Some(PathBuf::from(std::str::from_utf8(interp).ok()?))
}

fn compile(dir: &Path) -> PathBuf {
    let src = dir.join("target.c");
    std::fs::write(&src, TARGET_C).unwrap();
    let out = dir.join("target");
    let interp = format!("-Wl,--dynamic-linker=/{}", "x".repeat(PLACEHOLDER_LEN));
    let rpath = format!("-Wl,-rpath=/{},--disable-new-dtags", "y".repeat(PLACEHOLDER_LEN));
    let output = Command::new("gcc")
        .arg("-o")
        .arg(&out)
        .arg(&src)
        .args([interp.as_str(), rpath.as_str()])
        .output()
        .expect("Failed to run gcc");
    assert!(
        output.status.success(),
        "failed to compile target.c {:?}",
        String::from_utf8_lossy(&output.stderr)
    );
    out
}

fn append(builder: &mut tar::Builder<Vec<u8>>, src: &Path, name: &str, mode: u32) {
    let data = std::fs::read(src).unwrap();
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(data.len() as u64);
    header.set_mode(mode);
    builder.append_data(&mut header, name, data.as_slice()).unwrap();
}

fn pack(interp: &Path, prog: &Path, prog_mode: u32) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    append(&mut builder, interp, ".staticx.interp", 0o755);
    append(&mut builder, prog, ".staticx.prog", prog_mode);
    let tar = builder.into_inner().unwrap();
    let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
    encoder.write_all(&tar).unwrap();
    encoder.finish().unwrap()
}

fn attach(dir: &Path, name: &str, archive: &[u8]) -> PathBuf {
    let archive_path = dir.join(format!("{name}.tar.xz"));
    std::fs::write(&archive_path, archive).unwrap();
    let launcher = dir.join(name);
    std::fs::copy(env!("CARGO_BIN_EXE_sxboot"), &launcher).unwrap();
    let output = Command::new("objcopy")
        .arg("--add-section")
        .arg(format!(".staticx.archive={}", archive_path.display()))
        .arg(&launcher)
        .output()
        .expect("Failed to run objcopy");
    assert!(
        output.status.success(),
        "objcopy failed {:?}",
        String::from_utf8_lossy(&output.stderr)
    );
    launcher
}

/// Builds the launcher images once per test binary, or `None` when the toolchain needed to
/// build them is missing.
pub fn launchers() -> Option<&'static Launchers> {
    static LAUNCHERS: OnceLock<Option<Launchers>> = OnceLock::new();
    LAUNCHERS
        .get_or_init(|| {
            if !tool_available("gcc") || !tool_available("objcopy") {
                eprintln!("gcc or objcopy not available; skipping end-to-end launches");
                return None;
            }
            let Some(interp) = system_interpreter() else {
                eprintln!("test binary has no PT_INTERP; skipping end-to-end launches");
                return None;
            };
            let dir = work_dir();
            let prog = compile(&dir);
            Some(Launchers {
                target: prog.clone(),
                ok: attach(&dir, "sxboot-ok", &pack(&interp, &prog, 0o755)),
                not_executable: attach(&dir, "sxboot-noexec", &pack(&interp, &prog, 0o644)),
            })
        })
        .as_ref()
}

/// Runs `launcher` with a private temp root, returning its output and the temp root.
pub fn launch(launcher: &Path, args: &[&str]) -> (Output, tempfile::TempDir) {
    let root = tempfile::tempdir().unwrap();
    let output = Command::new(launcher)
        .args(args)
        .env("SXBOOT_TMPDIR", root.path())
        .output()
        .expect("Failed to run launcher");
    (output, root)
}

/// Whether the launcher left nothing behind in its temp root.
pub fn is_empty(root: &Path) -> bool {
    std::fs::read_dir(root).unwrap().next().is_none()
}
