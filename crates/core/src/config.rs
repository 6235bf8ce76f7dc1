//! Renderer configuration.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::error::{Error, Result};

/// Upper bound on frames in flight. Anything larger only adds latency.
pub const MAX_FRAMES_IN_FLIGHT: usize = 8;

/// What to do when the surface negotiates an extent other than the one requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtentPolicy {
    /// Treat any mismatch as a fatal consistency violation.
    Strict,
    /// Adopt the negotiated extent as the new resolution.
    #[default]
    Renegotiate,
}

impl ExtentPolicy {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "strict" => Some(Self::Strict),
            "renegotiate" => Some(Self::Renegotiate),
            _ => None,
        }
    }
}

/// Settings for the window, the surface and the frame scheduler.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub title: String,
    /// Initial window and surface resolution in pixels.
    pub resolution: (u32, u32),
    /// FIFO presentation when true, MAILBOX (falling back to FIFO) otherwise.
    pub vsync: bool,
    /// Number of frame slots (N).
    pub frames_in_flight: usize,
    /// Longest wait for a frame slot before it counts as exhausted.
    pub frame_timeout: Duration,
    /// Bounded wait for a presentable image.
    pub acquire_timeout: Duration,
    pub extent_policy: ExtentPolicy,
    /// Texture blitted next to the skin image every frame.
    pub texture_path: PathBuf,
    /// Enable Vulkan validation layers.
    pub validation: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            title: "inflight".to_string(),
            resolution: (1280, 720),
            vsync: true,
            frames_in_flight: 3,
            frame_timeout: Duration::from_secs(5),
            acquire_timeout: Duration::from_millis(100),
            extent_policy: ExtentPolicy::default(),
            texture_path: PathBuf::from("assets/texture1.bmp"),
            validation: cfg!(debug_assertions),
        }
    }
}

impl RendererConfig {
    /// Defaults overridden by `INFLIGHT_*` environment variables.
    ///
    /// Recognised: `INFLIGHT_FRAMES`, `INFLIGHT_VSYNC`, `INFLIGHT_TEXTURE`,
    /// `INFLIGHT_VALIDATION`, `INFLIGHT_EXTENT_POLICY`.
    pub fn from_env() -> Result<Self> {
        Self::default().apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(frames) = var("INFLIGHT_FRAMES") {
            self.frames_in_flight = frames
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("INFLIGHT_FRAMES: not a number: {frames}")))?;
        }
        if let Some(vsync) = var("INFLIGHT_VSYNC") {
            self.vsync = parse_bool("INFLIGHT_VSYNC", &vsync)?;
        }
        if let Some(path) = var("INFLIGHT_TEXTURE") {
            self.texture_path = PathBuf::from(path);
        }
        if let Some(validation) = var("INFLIGHT_VALIDATION") {
            self.validation = parse_bool("INFLIGHT_VALIDATION", &validation)?;
        }
        if let Some(policy) = var("INFLIGHT_EXTENT_POLICY") {
            self.extent_policy = ExtentPolicy::parse(&policy).ok_or_else(|| {
                Error::Config(format!("INFLIGHT_EXTENT_POLICY: unknown policy: {policy}"))
            })?;
        }
        Ok(self)
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = (width, height);
        self
    }

    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames;
        self
    }

    pub fn with_extent_policy(mut self, policy: ExtentPolicy) -> Self {
        self.extent_policy = policy;
        self
    }

    pub fn with_texture_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.texture_path = path.into();
        self
    }

    /// Check the configuration for values the scheduler cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero or oversized frame count, an
    /// empty resolution or a zero timeout.
    pub fn validate(&self) -> Result<()> {
        if self.frames_in_flight == 0 || self.frames_in_flight > MAX_FRAMES_IN_FLIGHT {
            return Err(Error::Config(format!(
                "frames_in_flight must be in 1..={MAX_FRAMES_IN_FLIGHT}, got {}",
                self.frames_in_flight
            )));
        }
        if self.frames_in_flight == 1 {
            warn!("frames_in_flight = 1: CPU and GPU will strictly alternate");
        }
        if self.resolution.0 == 0 || self.resolution.1 == 0 {
            return Err(Error::Config(format!(
                "resolution must be non-zero, got {}x{}",
                self.resolution.0, self.resolution.1
            )));
        }
        if self.frame_timeout.is_zero() || self.acquire_timeout.is_zero() {
            return Err(Error::Config("timeouts must be non-zero".to_string()));
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(Error::Config(format!("{key}: expected a boolean, got {value}"))),
    }
}
