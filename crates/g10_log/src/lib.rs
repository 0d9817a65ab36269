//! Logging for the G10 engine.

mod macros;

pub use log::{Level, LevelFilter, debug, error, info, log, log_enabled, trace, warn};
