//! Per-slot resource rotation.

use tracing::{debug, info};

use inflight_core::Error as CoreError;

use crate::backend::{Accelerator, FrameResources};
use crate::error::{RenderError, RenderResult};
use crate::slot::FrameSlot;

/// Owns one [`FrameResources`] per frame slot.
///
/// Everything is allocated up front; the set for slot `k` is reused by
/// frames `k`, `k + N`, `k + 2N`, and so on. Mutual exclusion between uses comes
/// from the scheduler waiting for the slot before touching it, not from
/// locking.
pub struct PerFrameResourcePool<F> {
    frames: Vec<F>,
}

impl<F: FrameResources> PerFrameResourcePool<F> {
    /// Allocate `count` frame sets from `accelerator`.
    ///
    /// # Errors
    ///
    /// Returns a config error for `count == 0`, or whatever the
    /// accelerator reports when allocation fails.
    pub fn new<A>(accelerator: &mut A, count: usize) -> RenderResult<Self>
    where
        A: Accelerator<Frame = F>,
    {
        if count == 0 {
            return Err(CoreError::Config("frame pool needs at least one slot".into()).into());
        }

        let frames = FrameSlot::all(count)
            .map(|slot| {
                let frame = accelerator.allocate_frame(slot)?;
                debug!("Allocated frame resources for slot {}", slot);
                Ok(frame)
            })
            .collect::<RenderResult<Vec<_>>>()?;

        info!("Frame resource pool created with {} slot(s)", count);
        Ok(Self { frames })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The resources bound to `slot`.
    #[inline]
    pub fn resources_for(&self, slot: FrameSlot) -> &F {
        &self.frames[slot.index()]
    }

    #[inline]
    pub fn resources_for_mut(&mut self, slot: FrameSlot) -> &mut F {
        &mut self.frames[slot.index()]
    }

    /// Copy `data` into the parameter buffer of `slot`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::ParamsOverflow`] if `data` does not fit.
    pub fn write_params(&mut self, slot: FrameSlot, data: &[u8]) -> RenderResult<()> {
        let frame = self.resources_for_mut(slot);
        if data.len() > frame.params_size() {
            return Err(RenderError::ParamsOverflow {
                len: data.len(),
                capacity: frame.params_size(),
            });
        }
        frame.write_params(data)
    }

    pub fn iter(&self) -> impl Iterator<Item = &F> {
        self.frames.iter()
    }
}
