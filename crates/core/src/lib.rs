//! Core utilities shared by the frame-loop crates.
//!
//! - Error types and result aliases
//! - Logging initialization
//! - Renderer configuration
//! - Frame timing
//! - The polled window interface consumed by the frame loop

mod config;
mod error;
mod logging;
mod timer;
mod window;

pub use config::{ExtentPolicy, RendererConfig};
pub use error::{Error, Result};
pub use logging::{DEFAULT_FILTER, init_logging};
pub use timer::{FrameReport, FrameTimer};
pub use window::WindowSource;
