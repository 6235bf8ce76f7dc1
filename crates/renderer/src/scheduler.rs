//! The per-frame loop.
//!
//! [`FrameScheduler`] bounds how far the CPU runs ahead of the GPU and
//! sequences every frame the same way:
//!
//! 1. Repair a stale surface (only when the window has a drawable area).
//! 2. Wait until the current slot's previous submission has completed.
//! 3. Acquire a surface image and start recording into the slot.
//! 4. Let each pass declare states, flush the barriers, record the pass.
//! 5. Move the surface image to the present state, submit and present.
//! 6. Advance the slot.
//!
//! With `N` frames in flight the wait in step 2 covers frame `k - N`, so at
//! most `N` submissions are outstanding at any time.
//!
//! # Example
//!
//! ```ignore
//! let mut scheduler = FrameScheduler::new(accelerator, surface, &config)?;
//!
//! while !window.is_closing() {
//!     if scheduler.begin_frame(&window)?.is_none() {
//!         continue;
//!     }
//!     scheduler.write_params(&params)?;
//!     scheduler.record_passes(&mut [&mut skin, &mut composite])?;
//!     scheduler.end_frame()?;
//! }
//! scheduler.shutdown()?;
//! ```

use std::time::Duration;

use ash::vk;
use bytemuck::Pod;
use tracing::{debug, debug_span, info, trace, warn};

use inflight_core::{ExtentPolicy, RendererConfig, WindowSource};

use crate::backend::{Accelerator, FrameResources, PresentOutcome, PresentSurface};
use crate::error::{RenderError, RenderResult};
use crate::pass::{FrameContext, RenderPass};
use crate::pool::PerFrameResourcePool;
use crate::slot::FrameSlot;
use crate::state::ResourceState;
use crate::swapchain::{SurfaceImage, SurfaceState, SwapchainManager};
use crate::tracker::{ResourceStateTracker, TrackedResource};

/// What `begin_frame` handed out for the frame being recorded.
#[derive(Debug, Clone, Copy)]
pub struct FrameInfo {
    pub slot: FrameSlot,
    pub frame_number: u64,
    pub image_index: u32,
    pub extent: vk::Extent2D,
    pub target: SurfaceImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// Displayed, but the surface no longer matches the window exactly. It
    /// is rebuilt at the top of the next frame.
    PresentedSuboptimal,
    /// The work was submitted but the surface went stale before
    /// presentation. It is rebuilt at the top of the next frame.
    PresentSkipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub frames_submitted: u64,
    pub frames_presented: u64,
    pub presents_skipped: u64,
    /// `begin_frame` calls that produced no frame.
    pub frames_skipped: u64,
    pub recreations: u64,
}

struct ActiveFrame {
    target: SurfaceImage,
}

pub struct FrameScheduler<A: Accelerator, S: PresentSurface> {
    // Drops after the queue is drained in `Drop::drop`.
    swapchain: SwapchainManager<S>,
    pool: PerFrameResourcePool<A::Frame>,
    tracker: ResourceStateTracker,
    slot: FrameSlot,
    frame_number: u64,
    active: Option<ActiveFrame>,
    resolution: (u32, u32),
    vsync: bool,
    extent_policy: ExtentPolicy,
    frame_timeout: Duration,
    stats: SchedulerStats,
    accelerator: A,
}

impl<A: Accelerator, S: PresentSurface> FrameScheduler<A, S> {
    /// Allocate every frame slot and build the initial surface.
    ///
    /// # Errors
    ///
    /// Fails if `config` is invalid, if allocation fails, or if the surface
    /// negotiated another resolution under [`ExtentPolicy::Strict`].
    pub fn new(mut accelerator: A, surface: S, config: &RendererConfig) -> RenderResult<Self> {
        config.validate()?;

        let frames = config.frames_in_flight;
        let pool = PerFrameResourcePool::new(&mut accelerator, frames)?;
        let (width, height) = config.resolution;
        let swapchain = SwapchainManager::new(
            surface,
            vk::Extent2D { width, height },
            config.vsync,
            frames,
            config.acquire_timeout,
        )?;

        let mut scheduler = Self {
            swapchain,
            pool,
            tracker: ResourceStateTracker::new(),
            slot: FrameSlot::first(frames),
            frame_number: 0,
            active: None,
            resolution: config.resolution,
            vsync: config.vsync,
            extent_policy: config.extent_policy,
            frame_timeout: config.frame_timeout,
            stats: SchedulerStats::default(),
            accelerator,
        };

        if scheduler.swapchain.state() == SurfaceState::Valid {
            scheduler.reconcile_extent(config.resolution)?;
        }

        info!(
            "Frame scheduler ready: {} frame(s) in flight, {}x{}, vsync {}",
            frames, scheduler.resolution.0, scheduler.resolution.1, scheduler.vsync
        );
        Ok(scheduler)
    }

    /// Start the next frame.
    ///
    /// Returns `Ok(None)` if there is nothing to draw into this time round:
    /// the window is minimized or closing, the surface could not be
    /// rebuilt yet, or no image became available. The slot does not
    /// advance in that case.
    ///
    /// # Errors
    ///
    /// - [`RenderError::FrameInProgress`] if the previous frame was not ended.
    /// - [`RenderError::ResourceExhaustion`] if the slot stays busy past
    ///   the frame timeout.
    /// - [`RenderError::ExtentMismatch`] under [`ExtentPolicy::Strict`].
    pub fn begin_frame(&mut self, window: &impl WindowSource) -> RenderResult<Option<FrameInfo>> {
        if self.active.is_some() {
            return Err(RenderError::FrameInProgress);
        }

        if window.is_closing() {
            return Ok(None);
        }

        if window.is_minimized() {
            trace!("Window has no drawable area, skipping frame");
            self.stats.frames_skipped += 1;
            return Ok(None);
        }

        if self.swapchain.state() != SurfaceState::Valid {
            self.rebuild_surface(window.extent())?;
            if self.swapchain.state() != SurfaceState::Valid {
                self.stats.frames_skipped += 1;
                return Ok(None);
            }
        }

        let _span = debug_span!("frame", slot = %self.slot, frame = self.frame_number).entered();

        let frame = self.pool.resources_for_mut(self.slot);
        if !self.accelerator.wait_for_frame(frame, self.frame_timeout)? {
            return Err(RenderError::ResourceExhaustion {
                slot: self.slot.index(),
                timeout: self.frame_timeout,
            });
        }
        frame.reset_transient()?;

        let Some(target) = self.swapchain.acquire_next()? else {
            debug!("No surface image for frame {}", self.frame_number);
            self.stats.frames_skipped += 1;
            return Ok(None);
        };

        // Acquired images carry no contents worth keeping.
        self.tracker
            .register(TrackedResource::color_image(target.image), ResourceState::ACQUIRED);

        let frame = self.pool.resources_for(self.slot);
        self.accelerator.begin_recording(frame)?;
        self.active = Some(ActiveFrame { target });

        Ok(Some(FrameInfo {
            slot: self.slot,
            frame_number: self.frame_number,
            image_index: target.index,
            extent: self.swapchain.extent(),
            target,
        }))
    }

    /// Copy `params` into the current slot's parameter buffer.
    pub fn write_params<T: Pod>(&mut self, params: &T) -> RenderResult<()> {
        if self.active.is_none() {
            return Err(RenderError::NoActiveFrame);
        }
        self.pool.write_params(self.slot, bytemuck::bytes_of(params))
    }

    /// Run `passes` in order against the current frame.
    pub fn record_passes(
        &mut self,
        passes: &mut [&mut dyn RenderPass<A::Frame>],
    ) -> RenderResult<()> {
        let Some(active) = self.active.as_ref() else {
            return Err(RenderError::NoActiveFrame);
        };

        let mut ctx = FrameContext {
            slot: self.slot,
            frame: self.pool.resources_for_mut(self.slot),
            target: active.target,
            extent: self.swapchain.extent(),
            frame_number: self.frame_number,
        };

        for pass in passes.iter_mut() {
            let _span = debug_span!("pass", name = pass.name()).entered();

            pass.prepare(&ctx, &mut self.tracker);
            let barriers = self.tracker.flush();
            if !barriers.is_empty() {
                trace!("{} barrier(s) before {}", barriers.len(), pass.name());
                self.accelerator.record_barriers(ctx.frame, &barriers);
            }
            pass.record(&mut ctx)?;
        }
        Ok(())
    }

    /// Finish recording, submit and present.
    ///
    /// The slot advances once the work is submitted, whether or not the
    /// present went through.
    pub fn end_frame(&mut self) -> RenderResult<FrameOutcome> {
        let Some(ActiveFrame { target }) = self.active.take() else {
            return Err(RenderError::NoActiveFrame);
        };

        let frame = self.pool.resources_for(self.slot);
        self.tracker
            .transition(TrackedResource::color_image(target.image), ResourceState::PRESENT);
        let barriers = self.tracker.flush();
        self.accelerator.record_barriers(frame, &barriers);
        self.accelerator.end_recording(frame)?;
        self.accelerator
            .submit(frame, target.available, target.render_done)?;
        self.stats.frames_submitted += 1;

        self.slot = self.slot.next();
        self.frame_number += 1;

        match self.swapchain.present_image(target.render_done, &target)? {
            PresentOutcome::Presented => {
                self.stats.frames_presented += 1;
                Ok(FrameOutcome::Presented)
            }
            PresentOutcome::Suboptimal => {
                debug!("Presented to a suboptimal surface, it will be rebuilt");
                self.stats.frames_presented += 1;
                Ok(FrameOutcome::PresentedSuboptimal)
            }
            PresentOutcome::OutOfDate => {
                debug!("Present skipped, surface will be rebuilt");
                self.stats.presents_skipped += 1;
                Ok(FrameOutcome::PresentSkipped)
            }
        }
    }

    /// Mark the surface stale so the next frame rebuilds it.
    ///
    /// For platforms that never report an out-of-date surface on resize.
    pub fn notify_resized(&mut self) {
        if self.swapchain.state() == SurfaceState::Valid {
            debug!("Resize reported, surface marked stale");
            self.swapchain.invalidate();
        }
    }

    /// Drop any half-recorded frame and wait for every submission.
    pub fn shutdown(&mut self) -> RenderResult<()> {
        if self.active.take().is_some() {
            // The command buffer is re-begun with a reset before its next use.
            warn!("Shutting down with frame {} still recording", self.frame_number);
        }
        self.accelerator.wait_idle()?;
        info!(
            "Frame scheduler drained after {} frame(s), {} presented",
            self.stats.frames_submitted, self.stats.frames_presented
        );
        Ok(())
    }

    fn rebuild_surface(&mut self, window_extent: (u32, u32)) -> RenderResult<()> {
        let _span = debug_span!("rebuild_surface", width = window_extent.0, height = window_extent.1)
            .entered();

        // Every in-flight frame may still reference the old images.
        self.accelerator.wait_idle()?;
        let old: Vec<vk::Image> = self.swapchain.images().collect();
        for image in old {
            self.tracker.forget(TrackedResource::color_image(image));
        }

        let desired = vk::Extent2D {
            width: window_extent.0,
            height: window_extent.1,
        };
        if self.swapchain.recreate(desired, self.vsync)?.is_some() {
            self.stats.recreations += 1;
            self.reconcile_extent(window_extent)?;
        }
        Ok(())
    }

    fn reconcile_extent(&mut self, requested: (u32, u32)) -> RenderResult<()> {
        let extent = self.swapchain.extent();
        let actual = (extent.width, extent.height);
        if actual != requested {
            match self.extent_policy {
                ExtentPolicy::Strict => {
                    return Err(RenderError::ExtentMismatch { requested, actual });
                }
                ExtentPolicy::Renegotiate => {
                    warn!(
                        "Surface negotiated {}x{} instead of {}x{}",
                        actual.0, actual.1, requested.0, requested.1
                    );
                }
            }
        }
        self.resolution = actual;
        Ok(())
    }

    #[inline]
    pub fn slot(&self) -> FrameSlot {
        self.slot
    }

    /// Frames submitted so far.
    #[inline]
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.pool.len()
    }

    /// The resolution frames are currently rendered at.
    #[inline]
    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    #[inline]
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    #[inline]
    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    pub fn tracker(&self) -> &ResourceStateTracker {
        &self.tracker
    }

    pub fn accelerator(&self) -> &A {
        &self.accelerator
    }

    pub fn pool(&self) -> &PerFrameResourcePool<A::Frame> {
        &self.pool
    }

    pub fn swapchain(&self) -> &SwapchainManager<S> {
        &self.swapchain
    }
}

impl<A: Accelerator, S: PresentSurface> Drop for FrameScheduler<A, S> {
    fn drop(&mut self) {
        if let Err(e) = self.accelerator.wait_idle() {
            warn!("Failed to drain GPU work on drop: {}", e);
        }
    }
}
