//! Common error types for propscope

use thiserror::Error;

/// Common result type for propscope operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the common library
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
