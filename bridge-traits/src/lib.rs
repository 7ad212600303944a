//! # Host Bridge Traits
//!
//! Platform abstraction traits that hosts implement so the core never touches
//! an OS storage API or logging backend directly.
//!
//! ## Traits
//!
//! ### Storage
//! - [`FileHandle`](storage::FileHandle) - An opened audio or playlist file the
//!   metadata scanner can read, regardless of where it lives (local disk,
//!   document picker, cloud download cache)
//! - [`FileSource`](storage::FileSource) - Enumerates the files a core should scan
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Host
//! implementations convert platform errors into it and include the file or
//! capability involved in the message.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! across the scanner's worker tasks.

pub mod error;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use storage::{FileHandle, FileMetadata, FileSource};
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
