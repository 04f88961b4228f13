//! Logging macros that a module can switch off on its own.
//!
//! Each macro reads an `ENABLE_LOGS` constant from the module it is expanded
//! in, so a module opts in by declaring the flag:
//!
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//!
//! use crate::{log_info, log_warn};
//!
//! log_info!("Embedded {} new files", count);
//! ```
//!
//! `RUST_LOG` still filters on top of the flag.

#[doc(hidden)]
#[macro_export]
macro_rules! gated_log {
    ($level:ident, $($arg:tt)*) => {
        if ENABLE_LOGS {
            log::$level!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => { $crate::gated_log!(info, $($arg)*) };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => { $crate::gated_log!(warn, $($arg)*) };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => { $crate::gated_log!(debug, $($arg)*) };
}
