//! # Core Runtime
//!
//! Runtime infrastructure shared by every crate of the aggregation core:
//! - [`logging`]: `tracing` subscriber setup and host log forwarding
//! - [`config`]: validated [`CoreConfig`](config::CoreConfig) builder
//! - [`events`]: broadcast event bus for lifecycle, library and scan events

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
