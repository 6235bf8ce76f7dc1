//! Error types shared by the frame-loop crates.

use thiserror::Error;

/// Top-level error for configuration and host-side failures.
#[derive(Error, Debug)]
pub enum Error {
    /// Window creation or query failed
    #[error("Window error: {0}")]
    Window(String),

    /// An input the program cannot run without is absent or unreadable
    #[error("Asset error: {0}")]
    Asset(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or inconsistent configuration
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias using the core [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
