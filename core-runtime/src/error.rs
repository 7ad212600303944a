use thiserror::Error;

/// Errors raised while setting up the runtime (configuration, logging).
#[derive(Error, Debug)]
pub enum Error {
    /// A setting is out of range or logging could not be installed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A feature flag needs a setting or host capability that is absent.
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
