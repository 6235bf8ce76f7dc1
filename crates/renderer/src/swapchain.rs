//! Presentation surface lifecycle.
//!
//! [`SwapchainManager`] is the only owner of the surface image set. It runs
//! a three-state machine:
//!
//! ```text
//!   Valid --(acquire/present reports out of date)--> Stale
//!   Stale --(recreate with non-zero extent)--------> Recreating --(ok)--> Valid
//!                                                    Recreating --(err)-> Stale
//! ```
//!
//! Nothing moves back to `Valid` without an explicit [`SwapchainManager::recreate`].
//! Every successful rebuild bumps the generation, and a [`SurfaceImage`]
//! remembers the generation it came from so stale handles are caught.

use std::time::Duration;

use ash::vk;
use tracing::{debug, info, warn};

use crate::backend::{AcquireOutcome, PresentOutcome, PresentSurface, SurfaceBuild};
use crate::error::{RenderError, RenderResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    Valid,
    Stale,
    Recreating,
}

/// One acquired surface image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceImage {
    pub index: u32,
    pub image: vk::Image,
    pub view: vk::ImageView,
    /// Signalled once the image may be written.
    pub available: vk::Semaphore,
    /// Signalled by the frame's submission; presentation waits on it.
    pub render_done: vk::Semaphore,
    generation: u64,
}

impl SurfaceImage {
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

struct ImageEntry {
    image: vk::Image,
    view: vk::ImageView,
    render_done: vk::Semaphore,
}

pub struct SwapchainManager<S: PresentSurface> {
    surface: S,
    state: SurfaceState,
    generation: u64,
    extent: vk::Extent2D,
    format: vk::Format,
    images: Vec<ImageEntry>,
    // A signal comes round again only after the slot fence covering its
    // last wait, because the ring is longer than the frame count.
    acquire_signals: Vec<vk::Semaphore>,
    next_signal: usize,
    acquire_timeout: Duration,
    frames_in_flight: usize,
    recreations: u64,
}

impl<S: PresentSurface> SwapchainManager<S> {
    /// Build the initial image set.
    ///
    /// A zero `desired` extent (window created minimized) leaves the
    /// manager `Stale` with no images.
    pub fn new(
        surface: S,
        desired: vk::Extent2D,
        vsync: bool,
        frames_in_flight: usize,
        acquire_timeout: Duration,
    ) -> RenderResult<Self> {
        let mut manager = Self {
            surface,
            state: SurfaceState::Stale,
            generation: 0,
            extent: vk::Extent2D::default(),
            format: vk::Format::UNDEFINED,
            images: Vec::new(),
            acquire_signals: Vec::new(),
            next_signal: 0,
            acquire_timeout,
            frames_in_flight,
            recreations: 0,
        };
        manager.rebuild(desired, vsync)?;
        Ok(manager)
    }

    /// Next writable surface image, or `None` if there is none right now.
    ///
    /// `None` means the surface is stale (check [`SwapchainManager::state`])
    /// or no image freed up within the acquire timeout.
    pub fn acquire_next(&mut self) -> RenderResult<Option<SurfaceImage>> {
        if self.state != SurfaceState::Valid {
            return Ok(None);
        }

        let signal = self.acquire_signals[self.next_signal];
        match self.surface.acquire(signal, self.acquire_timeout)? {
            AcquireOutcome::Acquired { index, suboptimal } => {
                let Some(entry) = self.images.get(index as usize) else {
                    return Err(RenderError::SurfaceRecreate(format!(
                        "surface returned image {index} of {}",
                        self.images.len()
                    )));
                };
                if suboptimal {
                    debug!("Acquired image {} from a suboptimal surface", index);
                }
                self.next_signal = (self.next_signal + 1) % self.acquire_signals.len();
                Ok(Some(SurfaceImage {
                    index,
                    image: entry.image,
                    view: entry.view,
                    available: signal,
                    render_done: entry.render_done,
                    generation: self.generation,
                }))
            }
            AcquireOutcome::NotReady => {
                debug!("No surface image within {:?}", self.acquire_timeout);
                Ok(None)
            }
            AcquireOutcome::OutOfDate => {
                debug!("Surface out of date on acquire");
                self.state = SurfaceState::Stale;
                Ok(None)
            }
        }
    }

    /// Present `image` once `render_done` is signalled.
    ///
    /// Returns `false` if the surface turned out stale; the caller must
    /// recreate before the next acquire succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::StaleImage`] if `image` belongs to an older
    /// generation or its image set has been torn down.
    pub fn present(&mut self, render_done: vk::Semaphore, image: &SurfaceImage) -> RenderResult<bool> {
        Ok(self.present_image(render_done, image)? == PresentOutcome::Presented)
    }

    /// Like [`SwapchainManager::present`] but keeps a suboptimal present,
    /// which was displayed, apart from an out-of-date one, which was not.
    /// Both leave the manager `Stale`.
    pub fn present_image(
        &mut self,
        render_done: vk::Semaphore,
        image: &SurfaceImage,
    ) -> RenderResult<PresentOutcome> {
        if !self.is_current(image) {
            return Err(RenderError::StaleImage {
                image_generation: image.generation,
                current: self.generation,
            });
        }

        let outcome = self.surface.present(image.index, render_done)?;
        if outcome != PresentOutcome::Presented {
            debug!("Present reported {:?}, surface is stale", outcome);
            self.state = SurfaceState::Stale;
        }
        Ok(outcome)
    }

    /// Replace the whole image set.
    ///
    /// Returns the negotiated extent, which can differ from `desired`.
    /// A zero `desired` extent is a no-op that leaves the manager `Stale`
    /// and returns `Ok(None)`.
    ///
    /// The caller must make sure no submitted work still uses the old images.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::SurfaceRecreate`] if the rebuild fails; the
    /// manager stays `Stale`.
    pub fn recreate(&mut self, desired: vk::Extent2D, vsync: bool) -> RenderResult<Option<vk::Extent2D>> {
        if desired.width == 0 || desired.height == 0 {
            debug!("Skipping recreate for zero extent");
            self.state = SurfaceState::Stale;
            return Ok(None);
        }

        let extent = self.rebuild(desired, vsync)?;
        if extent.is_some() {
            self.recreations += 1;
        }
        Ok(extent)
    }

    fn rebuild(&mut self, desired: vk::Extent2D, vsync: bool) -> RenderResult<Option<vk::Extent2D>> {
        if desired.width == 0 || desired.height == 0 {
            return Ok(None);
        }

        self.state = SurfaceState::Recreating;
        self.release_images();

        let build = match self.surface.build(desired, vsync) {
            Ok(Some(build)) => build,
            Ok(None) => {
                debug!("Surface has no drawable area yet");
                self.state = SurfaceState::Stale;
                return Ok(None);
            }
            Err(e) => {
                warn!("Surface rebuild failed: {}", e);
                self.state = SurfaceState::Stale;
                return Err(RenderError::SurfaceRecreate(e.to_string()));
            }
        };

        if let Err(e) = self.adopt(&build) {
            self.release_images();
            self.state = SurfaceState::Stale;
            return Err(RenderError::SurfaceRecreate(e.to_string()));
        }

        self.generation += 1;
        self.extent = build.extent;
        self.format = build.format;
        self.state = SurfaceState::Valid;

        info!(
            "Surface generation {}: {}x{}, {} image(s)",
            self.generation,
            build.extent.width,
            build.extent.height,
            build.images.len()
        );
        Ok(Some(build.extent))
    }

    fn adopt(&mut self, build: &SurfaceBuild) -> RenderResult<()> {
        for &(image, view) in &build.images {
            let render_done = self.surface.create_signal()?;
            self.images.push(ImageEntry {
                image,
                view,
                render_done,
            });
        }

        let ring = self.frames_in_flight.max(build.images.len()) + 1;
        while self.acquire_signals.len() < ring {
            let signal = self.surface.create_signal()?;
            self.acquire_signals.push(signal);
        }
        self.next_signal %= self.acquire_signals.len();
        Ok(())
    }

    fn release_images(&mut self) {
        for entry in std::mem::take(&mut self.images) {
            self.surface.destroy_signal(entry.render_done);
        }
    }

    /// Force a rebuild on the next [`SwapchainManager::recreate`].
    pub fn invalidate(&mut self) {
        if self.state == SurfaceState::Valid {
            self.state = SurfaceState::Stale;
        }
    }

    /// True if `image` belongs to the current generation and that
    /// generation's images still exist. A rebuild that tears the old set
    /// down and then fails leaves no current image at all.
    #[inline]
    pub fn is_current(&self, image: &SurfaceImage) -> bool {
        image.generation == self.generation && (image.index as usize) < self.images.len()
    }

    #[inline]
    pub fn state(&self) -> SurfaceState {
        self.state
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Every image of the current generation.
    pub fn images(&self) -> impl Iterator<Item = vk::Image> + '_ {
        self.images.iter().map(|entry| entry.image)
    }

    /// Successful rebuilds after the initial one.
    #[inline]
    pub fn recreations(&self) -> u64 {
        self.recreations
    }

    #[inline]
    pub fn surface(&self) -> &S {
        &self.surface
    }
}

impl<S: PresentSurface> Drop for SwapchainManager<S> {
    fn drop(&mut self) {
        self.release_images();
        for signal in std::mem::take(&mut self.acquire_signals) {
            self.surface.destroy_signal(signal);
        }
    }
}
