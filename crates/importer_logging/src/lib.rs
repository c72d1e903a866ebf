#![deny(missing_docs)]
//! Logging for the importer workspace.
//!
//! The `import_*` macros forward to the `log` facade through this crate, so
//! callers only depend on `importer_logging`. Per-entry actions (imports and
//! skips) go through [`import_verbose!`], whose level follows a process-wide
//! verbose switch.

use std::sync::atomic::{AtomicBool, Ordering};

#[doc(hidden)]
pub use log as __log;

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Turns verbose reporting of per-entry actions on or off.
pub fn set_verbose(verbose: bool) {
    VERBOSE.store(verbose, Ordering::Relaxed);
}

/// Whether per-entry actions are reported at info level.
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

/// Trace-level message.
#[macro_export]
macro_rules! import_trace {
    ($($arg:tt)*) => { $crate::__log::trace!($($arg)*) };
}

/// Debug-level message.
#[macro_export]
macro_rules! import_debug {
    ($($arg:tt)*) => { $crate::__log::debug!($($arg)*) };
}

/// Info-level message.
#[macro_export]
macro_rules! import_info {
    ($($arg:tt)*) => { $crate::__log::info!($($arg)*) };
}

/// Warn-level message.
#[macro_export]
macro_rules! import_warn {
    ($($arg:tt)*) => { $crate::__log::warn!($($arg)*) };
}

/// Error-level message.
#[macro_export]
macro_rules! import_error {
    ($($arg:tt)*) => { $crate::__log::error!($($arg)*) };
}

/// Per-entry action: info level when verbose, debug level otherwise.
#[macro_export]
macro_rules! import_verbose {
    ($($arg:tt)*) => {{
        let level = if $crate::is_verbose() {
            $crate::__log::Level::Info
        } else {
            $crate::__log::Level::Debug
        };
        $crate::__log::log!(level, $($arg)*);
    }};
}

/// Installs a debug-level terminal logger for tests.
///
/// Later calls are no-ops, so every test may call it.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    let _ = CombinedLogger::init(vec![TermLogger::new(
        log::LevelFilter::Debug,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
