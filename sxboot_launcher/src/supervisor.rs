// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Process supervision: the ephemeral directory, fork/exec, signal forwarding and reaping.
//!
//! The lifecycle is encoded in types. A [`Supervisor`] holds a prepared argv and becomes a
//! [`RunningChild`] once forked; waiting on it consumes it and yields a [`ChildOutcome`].

use std::ffi::{CStr, CString, OsStr, OsString, c_char, c_int};
use std::os::unix::ffi::OsStrExt as _;
use std::os::unix::fs::PermissionsExt as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};

use nix::errno::Errno;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, fork, getpid, getppid};
use sxboot_util_log::{debug, warn};
use thiserror::Error;

use crate::outcome::ChildOutcome;

/// Signals received by the launcher that are passed on to the child.
pub const FORWARDED_SIGNALS: [Signal; 2] = [Signal::SIGINT, Signal::SIGTERM];

/// Number of random characters in the ephemeral directory name.
const DIR_RAND_LEN: usize = 6;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("failed to create ephemeral directory under {}", root.display())]
    CreateDir {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("argument contains an interior NUL byte: {0:?}")]
    ArgContainsNul(OsString),
    #[error("fork failed")]
    Fork(#[source] Errno),
    #[error("failed to install {signal} handler")]
    InstallHandler {
        signal: Signal,
        #[source]
        source: Errno,
    },
    #[error("waitpid failed for child {pid}")]
    Wait {
        pid: Pid,
        #[source]
        source: Errno,
    },
    #[error("unexpected wait status {0:?}")]
    UnexpectedStatus(WaitStatus),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A private directory holding the extracted archive, removed when dropped.
#[derive(Debug)]
pub struct EphemeralDir {
    dir: tempfile::TempDir,
}

impl EphemeralDir {
    /// Exclusively creates `<root>/<prefix>XXXXXX` with mode 0700.
    pub fn create(root: &Path, prefix: &str) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .rand_bytes(DIR_RAND_LEN)
            .permissions(std::fs::Permissions::from_mode(0o700))
            .tempdir_in(root)
            .map_err(|source| Error::CreateDir {
                root: root.to_owned(),
                source,
            })?;
        debug!(home:? = dir.path(); "created ephemeral directory");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Removes the directory tree. Failure is logged, not returned.
    pub fn remove(self) {
        let path = self.dir.path().to_owned();
        match self.dir.close() {
            Ok(()) => debug!(path:? = path; "removed ephemeral directory"),
            Err(e) => warn!(path:? = path, error:% = e; "failed to remove ephemeral directory"),
        }
    }
}

/// Pid the forwarding handler delivers to; zero when no child is running.
static CHILD_PID: AtomicI32 = AtomicI32::new(0);

extern "C" fn forward_signal(signum: c_int) {
    let pid = CHILD_PID.load(Ordering::SeqCst);
    if pid > 0 {
        // SAFETY: kill(2) is async-signal-safe and takes no pointers.
        unsafe { libc::kill(pid, signum) };
    }
}

fn default_action() -> SigAction {
    SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty())
}

/// Installs the forwarding handlers; dropping restores the default dispositions and clears
/// the forwarding target.
#[derive(Debug)]
struct SignalForwarding(());

impl SignalForwarding {
    fn install(child: Pid) -> Result<Self> {
        CHILD_PID.store(child.as_raw(), Ordering::SeqCst);
        let guard = SignalForwarding(());
        let action = SigAction::new(
            SigHandler::Handler(forward_signal),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        for signal in FORWARDED_SIGNALS {
            // SAFETY: the handler only reads an atomic and calls kill(2).
            unsafe { signal::sigaction(signal, &action) }
                .map_err(|source| Error::InstallHandler { signal, source })?;
        }
        debug!(pid:% = child, signals:? = FORWARDED_SIGNALS; "forwarding signals to child");
        Ok(guard)
    }
}

impl Drop for SignalForwarding {
    fn drop(&mut self) {
        for signal in FORWARDED_SIGNALS {
            // SAFETY: installing the default disposition.
            if let Err(e) = unsafe { signal::sigaction(signal, &default_action()) } {
                warn!(signal:% = signal, error:% = e; "failed to restore signal disposition");
            }
        }
        CHILD_PID.store(0, Ordering::SeqCst);
    }
}

/// A prepared, not yet started, child.
#[derive(Debug)]
pub struct Supervisor {
    path: CString,
    argv: Vec<CString>,
    exec_error_prefix: Vec<u8>,
}

fn to_cstring(s: &OsStr) -> Result<CString> {
    CString::new(s.as_bytes()).map_err(|_| Error::ArgContainsNul(s.to_owned()))
}

impl Supervisor {
    /// Prepares to run `target` with `original_args` minus its first element (the launcher's
    /// own name). The child's argv[0] is `target`.
    pub fn new(target: &Path, original_args: &[OsString]) -> Result<Self> {
        let path = to_cstring(target.as_os_str())?;
        let mut argv = vec![path.clone()];
        for arg in original_args.iter().skip(1) {
            argv.push(to_cstring(arg)?);
        }
        let exec_error_prefix = format!("sxboot: failed to exec {}: ", target.display()).into_bytes();
        Ok(Self {
            path,
            argv,
            exec_error_prefix,
        })
    }

    pub fn argv(&self) -> &[CString] {
        &self.argv
    }

    /// Forks and execs the target, then starts forwarding signals to it.
    pub fn spawn(self) -> Result<RunningChild> {
        let argv_ptrs: Vec<*const c_char> = self
            .argv
            .iter()
            .map(|arg| arg.as_ptr())
            .chain(std::iter::once(std::ptr::null()))
            .collect();
        let parent = getpid();
        debug!(argv:? = self.argv; "spawning target");

        // SAFETY: the child only makes async-signal-safe calls before exec or _exit; every
        // allocation it needs was made above.
        match unsafe { fork() }.map_err(Error::Fork)? {
            ForkResult::Child => exec_child(&self.path, &argv_ptrs, parent, &self.exec_error_prefix),
            ForkResult::Parent { child } => {
                match SignalForwarding::install(child) {
                    Ok(forwarding) => Ok(RunningChild {
                        pid: child,
                        forwarding,
                    }),
                    Err(e) => {
                        let _ = signal::kill(child, Signal::SIGKILL);
                        let _ = waitpid(child, None);
                        Err(e)
                    }
                }
            }
        }
    }
}

fn write_stderr(bytes: &[u8]) {
    // SAFETY: `bytes` is a valid buffer of the given length.
    unsafe { libc::write(libc::STDERR_FILENO, bytes.as_ptr().cast(), bytes.len()) };
}

/// Runs in the forked child. Never returns.
fn exec_child(path: &CStr, argv: &[*const c_char], parent: Pid, error_prefix: &[u8]) -> ! {
    // The Rust runtime ignores SIGPIPE, and ignored dispositions survive exec.
    // SAFETY: installing the default disposition.
    let _ = unsafe { signal::sigaction(Signal::SIGPIPE, &default_action()) };

    // Die with the launcher, and bail if it is already gone.
    if nix::sys::prctl::set_pdeathsig(Signal::SIGKILL).is_err() || getppid() != parent {
        // SAFETY: _exit skips destructors owned by the parent's state.
        unsafe { libc::_exit(crate::EXEC_FAILURE_STATUS) };
    }

    // SAFETY: `path` is NUL terminated and `argv` is a NULL-terminated array of pointers to
    // NUL-terminated strings that outlive this call.
    unsafe { libc::execv(path.as_ptr(), argv.as_ptr()) };

    let errno = Errno::last();
    write_stderr(error_prefix);
    write_stderr(errno.desc().as_bytes());
    write_stderr(b"\n");
    // SAFETY: as above.
    unsafe { libc::_exit(crate::EXEC_FAILURE_STATUS) }
}

/// A forked child with signal forwarding active.
#[derive(Debug)]
pub struct RunningChild {
    pid: Pid,
    forwarding: SignalForwarding,
}

impl RunningChild {
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Blocks until the child terminates. Forwarded signals do not end the wait.
    pub fn wait(self) -> Result<ChildOutcome> {
        let pid = self.pid;
        let status = loop {
            match waitpid(pid, None) {
                Ok(status) => break status,
                Err(Errno::EINTR) => continue,
                Err(source) => return Err(Error::Wait { pid, source }),
            }
        };
        drop(self.forwarding);
        debug!(pid:% = pid, status:? = status; "child reaped");
        match status {
            WaitStatus::Exited(_, code) => Ok(ChildOutcome::Exited(code)),
            WaitStatus::Signaled(_, signal, core_dumped) => Ok(ChildOutcome::Signaled {
                signal,
                core_dumped,
            }),
            other => Err(Error::UnexpectedStatus(other)),
        }
    }
}
