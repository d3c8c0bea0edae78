// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Public logging and span macros.
//!
//! Every macro accepts either a bare literal message, or a comma-separated list of key-value
//! captures followed by `;` and the literal message.

/// Log at a runtime-selected [`Level`](crate::Level).
#[macro_export]
macro_rules! log {
    ($level:expr, $($key:ident $(:$cap:tt)? $(= $value:expr)?),+ ; $msg:literal) => {
        $crate::__private::log::log!(
            $crate::Level::to_log_level($level),
            $($key $(:$cap)? $(= $value)?),+;
            $msg
        )
    };
    ($level:expr, $msg:literal) => {
        $crate::__private::log::log!($crate::Level::to_log_level($level), $msg)
    };
}

/// Log at the `Error` level.
#[macro_export]
macro_rules! error {
    ($($body:tt)+) => { $crate::log!($crate::Level::Error, $($body)+) };
}

/// Log at the `Warn` level.
#[macro_export]
macro_rules! warn {
    ($($body:tt)+) => { $crate::log!($crate::Level::Warn, $($body)+) };
}

/// Log at the `Info` level.
#[macro_export]
macro_rules! info {
    ($($body:tt)+) => { $crate::log!($crate::Level::Info, $($body)+) };
}

/// Log at the `Debug` level.
#[macro_export]
macro_rules! debug {
    ($($body:tt)+) => { $crate::log!($crate::Level::Debug, $($body)+) };
}

/// Log at the `Trace` level.
#[macro_export]
macro_rules! trace {
    ($($body:tt)+) => { $crate::log!($crate::Level::Trace, $($body)+) };
}

/// Enter a span at a runtime-selected level. Returns a [`SpanGuard`](crate::SpanGuard).
#[macro_export]
macro_rules! span {
    ($level:expr, $name:expr, $($key:ident $(:$cap:tt)? $(= $value:expr)?),+) => {{
        let __level: $crate::Level = $level;
        $crate::__private::log::log!(
            $crate::Level::to_log_level(__level),
            span = $name, $($key $(:$cap)? $(= $value)?),+;
            "[SPAN ENTER]"
        );
        $crate::SpanGuard { name: $name, level: __level, target: module_path!() }
    }};
    ($level:expr, $name:expr) => {{
        let __level: $crate::Level = $level;
        $crate::__private::log::log!($crate::Level::to_log_level(__level), span = $name; "[SPAN ENTER]");
        $crate::SpanGuard { name: $name, level: __level, target: module_path!() }
    }};
}

/// Enter an `Info`-level span.
#[macro_export]
macro_rules! info_span {
    ($($body:tt)+) => { $crate::span!($crate::Level::Info, $($body)+) };
}

/// Enter a `Debug`-level span.
#[macro_export]
macro_rules! debug_span {
    ($($body:tt)+) => { $crate::span!($crate::Level::Debug, $($body)+) };
}

/// Enter a `Trace`-level span.
#[macro_export]
macro_rules! trace_span {
    ($($body:tt)+) => { $crate::span!($crate::Level::Trace, $($body)+) };
}
