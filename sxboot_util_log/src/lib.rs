// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! # sxboot logging utilities
//!
//! A small logging facade shared by every sxboot crate.
//!
//! The macros forward to the [`log`](https://docs.rs/log) crate with its `kv` feature, so
//! call sites attach structured values instead of formatting them into the message:
//!
//! ```ignore
//! use sxboot_util_log::{debug, debug_span};
//!
//! let _span = debug_span!("extract", dest:? = dest);
//! debug!(offset:? = 0x1000, size:? = 42; "found archive section");
//! ```
//!
//! The launcher installs an `env_logger` backend via [`init_from_env`]; library crates only
//! emit records and never install a logger themselves.
//!
//! ## Key-value capture modes
//!
//! - `:?` or `:debug` captures the value with `Debug`
//! - `:%` or `:display` captures the value with `Display`

#[macro_use]
mod macros;
mod logger;

pub use logger::{DEFAULT_FILTER, builder, init_from_env};

/// Log level that abstracts over the backend's level type.
///
/// Ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Level {
    /// Converts this level to the corresponding `log::Level`.
    #[doc(hidden)]
    pub const fn to_log_level(self) -> log::Level {
        match self {
            Level::Error => log::Level::Error,
            Level::Warn => log::Level::Warn,
            Level::Info => log::Level::Info,
            Level::Debug => log::Level::Debug,
            Level::Trace => log::Level::Trace,
        }
    }
}

/// Guard returned by the span macros.
///
/// `log` has no native spans, so entering logs `[SPAN ENTER]` and dropping the guard logs
/// `[SPAN EXIT]` at the same level and target.
#[must_use = "the span exits as soon as the guard is dropped"]
pub struct SpanGuard {
    #[doc(hidden)]
    pub name: &'static str,
    #[doc(hidden)]
    pub level: Level,
    #[doc(hidden)]
    pub target: &'static str,
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        log::log!(target: self.target, self.level.to_log_level(), span = self.name; "[SPAN EXIT]");
    }
}

/// Backend re-exports for the exported macros. Not public API.
#[doc(hidden)]
pub mod __private {
    pub use log;
}
