// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use nix::sys::signal::{self, SigSet, Signal};

/// How the target terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildOutcome {
    Exited(i32),
    Signaled { signal: Signal, core_dumped: bool },
}

impl ChildOutcome {
    /// Terminates the launcher the same way the target terminated.
    ///
    /// A signal death is reproduced by resetting the signal to its default disposition,
    /// unblocking it and raising it. Should the launcher survive that, it exits with
    /// [`INTERNAL_FAILURE_STATUS`](crate::INTERNAL_FAILURE_STATUS).
    pub fn exit_like(self) -> ! {
        match self {
            ChildOutcome::Exited(code) => std::process::exit(code),
            ChildOutcome::Signaled { signal, .. } => {
                let default = signal::SigAction::new(
                    signal::SigHandler::SigDfl,
                    signal::SaFlags::empty(),
                    SigSet::empty(),
                );
                // SAFETY: installing the default disposition.
                let _ = unsafe { signal::sigaction(signal, &default) };
                let mut set = SigSet::empty();
                set.add(signal);
                let _ = set.thread_unblock();
                let _ = signal::raise(signal);
                eprintln!("sxboot: still alive after raising {signal}");
                std::process::exit(crate::INTERNAL_FAILURE_STATUS)
            }
        }
    }
}
