//! Tiggy observability
//!
//! Logging setup shared by the TUI and the CLI.

pub mod error;
pub mod logging;

pub use error::{ObservabilityError, Result};
pub use logging::{request_span, thread_span, LogManager, LogSink};
