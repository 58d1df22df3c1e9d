//! Error types for musegen-player
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation. Fatal variants (`Config`, `Device`, `Connect`) only ever
//! surface to observers as a status change; the recoverable per-chunk
//! variants (`Decode`, `SinkWrite`) never leave the controller.

use thiserror::Error;

/// Main error type for musegen-player
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration or credential errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Audio output device errors (sink cannot be opened)
    #[error("Audio device error: {0}")]
    Device(String),

    /// Generation session failed to open
    #[error("Session connect error: {0}")]
    Connect(String),

    /// Generation session control-call or transport errors
    #[error("Session error: {0}")]
    Session(String),

    /// Audio chunk decoding errors (per-chunk, recoverable)
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Audio sink write errors (per-chunk, recoverable)
    #[error("Audio write error: {0}")]
    SinkWrite(String),

    /// File I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using musegen-player Error
pub type Result<T> = std::result::Result<T, Error>;
