//! Frame-loop error types.

use std::path::PathBuf;
use std::time::Duration;

use inflight_rhi::RhiError;
use thiserror::Error;

/// Errors surfaced by the frame scheduler and its collaborators.
///
/// A stale surface is not an error: it shows up as a `None` acquire or a
/// `false` present and is repaired at the top of the next frame. Everything
/// here is fatal to the frame loop.
#[derive(Error, Debug)]
pub enum RenderError {
    /// A frame slot stayed busy past the configured timeout.
    #[error("frame slot {slot} still in use after {timeout:?}")]
    ResourceExhaustion { slot: usize, timeout: Duration },

    /// Rebuilding the presentation surface failed.
    #[error("surface recreation failed: {0}")]
    SurfaceRecreate(String),

    /// A required input could not be loaded.
    #[error("required asset {path} unavailable: {reason}")]
    AssetMissing { path: PathBuf, reason: String },

    /// The surface negotiated another extent and the policy forbids it.
    #[error(
        "surface negotiated {}x{} but {}x{} was requested",
        actual.0, actual.1, requested.0, requested.1
    )]
    ExtentMismatch {
        requested: (u32, u32),
        actual: (u32, u32),
    },

    /// A surface image from an earlier swapchain generation was presented.
    #[error("surface image from generation {image_generation} used with generation {current}")]
    StaleImage { image_generation: u64, current: u64 },

    #[error("parameter block of {len} byte(s) exceeds the {capacity}-byte buffer")]
    ParamsOverflow { len: usize, capacity: usize },

    #[error("begin_frame called while a frame is still being recorded")]
    FrameInProgress,

    #[error("no frame is being recorded")]
    NoActiveFrame,

    #[error(transparent)]
    Config(#[from] inflight_core::Error),

    #[error(transparent)]
    Rhi(#[from] RhiError),
}

pub type RenderResult<T> = std::result::Result<T, RenderError>;

impl From<ash::vk::Result> for RenderError {
    fn from(result: ash::vk::Result) -> Self {
        RenderError::Rhi(RhiError::from(result))
    }
}
