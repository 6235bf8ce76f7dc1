//! Mock accelerator, surface and window driven by a logical clock.
//!
//! The clock only moves when the CPU has to wait. The mock GPU runs one
//! submission at a time and needs `delay` ticks for each, so a frame
//! submitted at tick `t` completes at `max(t, previous completion) + delay`.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use ash::vk::{self, Handle};

use inflight_core::{RendererConfig, WindowSource};
use inflight_renderer::{
    AcquireOutcome, Accelerator, Barrier, FrameContext, FrameOutcome, FrameResources, FrameScheduler,
    FrameSlot, PresentOutcome, PresentSurface, RenderPass, RenderResult, ResourceState,
    ResourceStateTracker, SurfaceBuild, TrackedResource,
};

pub const PARAMS_CAPACITY: usize = 16;

// =============================================================================
// Timeline
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct Submission {
    pub slot: usize,
    pub submitted_at: u64,
    pub complete_at: u64,
    pub wait: vk::Semaphore,
    pub signal: vk::Semaphore,
}

#[derive(Debug, Default)]
pub struct Timeline {
    pub tick: u64,
    pub delay: u64,
    /// Submissions never complete.
    pub stalled: bool,
    gpu_free_at: u64,
    last_submission: HashMap<usize, u64>,
    pub submissions: Vec<Submission>,
    /// `wait_for_frame` calls per slot.
    pub waits: Vec<usize>,
    /// Longest single wait, in ticks.
    pub max_block: u64,
    /// Most submissions still running when a slot was handed out.
    pub max_ahead: usize,
    pub idle_waits: usize,
    pub violations: Vec<String>,
}

impl Timeline {
    pub fn new(delay: u64) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            delay,
            ..Self::default()
        }))
    }

    pub fn slot_busy(&self, slot: usize) -> bool {
        self.last_submission
            .get(&slot)
            .is_some_and(|&complete_at| complete_at > self.tick)
    }

    pub fn outstanding(&self) -> usize {
        self.submissions
            .iter()
            .filter(|s| s.complete_at > self.tick)
            .count()
    }

    fn violation(&mut self, message: String) {
        self.violations.push(message);
    }
}

// =============================================================================
// Accelerator
// =============================================================================

pub struct MockFrame {
    slot: FrameSlot,
    timeline: Rc<RefCell<Timeline>>,
    pub params: Vec<u8>,
    pub transient_live: usize,
    pub transient_resets: usize,
}

impl FrameResources for MockFrame {
    fn slot(&self) -> FrameSlot {
        self.slot
    }

    fn command_buffer(&self) -> vk::CommandBuffer {
        vk::CommandBuffer::from_raw(0x100 + self.slot.index() as u64)
    }

    fn params_buffer(&self) -> vk::Buffer {
        vk::Buffer::from_raw(0x200 + self.slot.index() as u64)
    }

    fn params_size(&self) -> usize {
        PARAMS_CAPACITY
    }

    fn write_params(&mut self, bytes: &[u8]) -> RenderResult<()> {
        let mut timeline = self.timeline.borrow_mut();
        if timeline.slot_busy(self.slot.index()) {
            let message = format!("params of slot {} written while in use", self.slot);
            timeline.violation(message);
        }
        self.params.clear();
        self.params.extend_from_slice(bytes);
        Ok(())
    }

    fn reset_transient(&mut self) -> RenderResult<()> {
        if self.timeline.borrow().slot_busy(self.slot.index()) {
            let message = format!("transient sets of slot {} reset while in use", self.slot);
            self.timeline.borrow_mut().violation(message);
        }
        self.transient_live = 0;
        self.transient_resets += 1;
        Ok(())
    }

    fn allocate_transient(
        &mut self,
        _layout: vk::DescriptorSetLayout,
    ) -> RenderResult<vk::DescriptorSet> {
        self.transient_live += 1;
        Ok(vk::DescriptorSet::from_raw(self.transient_live as u64))
    }
}

pub struct MockAccelerator {
    pub timeline: Rc<RefCell<Timeline>>,
    recording: Option<usize>,
    /// Every barrier batch, tagged with the slot it was recorded into.
    pub barrier_batches: Vec<(usize, Vec<Barrier>)>,
}

impl MockAccelerator {
    pub fn new(timeline: Rc<RefCell<Timeline>>) -> Self {
        Self {
            timeline,
            recording: None,
            barrier_batches: Vec::new(),
        }
    }
}

impl Accelerator for MockAccelerator {
    type Frame = MockFrame;

    fn allocate_frame(&mut self, slot: FrameSlot) -> RenderResult<MockFrame> {
        let mut timeline = self.timeline.borrow_mut();
        if timeline.waits.len() <= slot.index() {
            timeline.waits.resize(slot.index() + 1, 0);
        }
        Ok(MockFrame {
            slot,
            timeline: self.timeline.clone(),
            params: Vec::new(),
            transient_live: 0,
            transient_resets: 0,
        })
    }

    fn wait_for_frame(&mut self, frame: &MockFrame, _timeout: Duration) -> RenderResult<bool> {
        let mut timeline = self.timeline.borrow_mut();
        let slot = frame.slot.index();
        timeline.waits[slot] += 1;

        if let Some(&complete_at) = timeline.last_submission.get(&slot)
            && complete_at > timeline.tick
        {
            if timeline.stalled {
                return Ok(false);
            }
            let block = complete_at - timeline.tick;
            timeline.max_block = timeline.max_block.max(block);
            timeline.tick = complete_at;
        }

        let ahead = timeline.outstanding();
        timeline.max_ahead = timeline.max_ahead.max(ahead);
        Ok(true)
    }

    fn begin_recording(&mut self, frame: &MockFrame) -> RenderResult<()> {
        let slot = frame.slot.index();
        let mut timeline = self.timeline.borrow_mut();
        if timeline.slot_busy(slot) {
            timeline.violation(format!("slot {slot} re-recorded while in use"));
        }
        if let Some(other) = self.recording.replace(slot) {
            timeline.violation(format!("slot {slot} began while slot {other} was recording"));
        }
        Ok(())
    }

    fn record_barriers(&mut self, frame: &MockFrame, barriers: &[Barrier]) {
        if self.recording != Some(frame.slot.index()) {
            self.timeline
                .borrow_mut()
                .violation(format!("barriers recorded into idle slot {}", frame.slot));
        }
        self.barrier_batches
            .push((frame.slot.index(), barriers.to_vec()));
    }

    fn end_recording(&mut self, frame: &MockFrame) -> RenderResult<()> {
        if self.recording.take() != Some(frame.slot.index()) {
            self.timeline
                .borrow_mut()
                .violation(format!("slot {} ended without begin", frame.slot));
        }
        Ok(())
    }

    fn submit(
        &mut self,
        frame: &MockFrame,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
    ) -> RenderResult<()> {
        let mut timeline = self.timeline.borrow_mut();
        let slot = frame.slot.index();
        if timeline.slot_busy(slot) {
            timeline.violation(format!("slot {slot} submitted twice"));
        }

        let complete_at = if timeline.stalled {
            u64::MAX
        } else {
            timeline.tick.max(timeline.gpu_free_at) + timeline.delay
        };
        timeline.gpu_free_at = complete_at;
        timeline.last_submission.insert(slot, complete_at);
        let submitted_at = timeline.tick;
        timeline.submissions.push(Submission {
            slot,
            submitted_at,
            complete_at,
            wait,
            signal,
        });
        Ok(())
    }

    fn wait_idle(&mut self) -> RenderResult<()> {
        let mut timeline = self.timeline.borrow_mut();
        timeline.idle_waits += 1;
        if !timeline.stalled {
            timeline.tick = timeline.tick.max(timeline.gpu_free_at);
        }
        Ok(())
    }
}

// =============================================================================
// Surface and window
// =============================================================================

pub type Display = Rc<Cell<(u32, u32)>>;

/// Knobs a test can turn while the scheduler owns the surface.
#[derive(Debug, Default)]
pub struct SurfaceControl {
    pub fail_next_build: Cell<bool>,
    pub not_ready: Cell<bool>,
    /// Report the next present as suboptimal.
    pub suboptimal_present: Cell<bool>,
}

pub struct MockSurface {
    display: Display,
    image_count: u32,
    max_extent: Option<(u32, u32)>,
    built: Option<(u32, u32)>,
    next_image: u32,
    next_handle: u64,
    control: Rc<SurfaceControl>,
    /// Desired extent of every `build` call.
    pub builds: Vec<(u32, u32)>,
    pub acquires: usize,
    /// Built extent at every present.
    pub presents: Vec<(u32, u32)>,
    live_signals: Rc<Cell<i64>>,
}

impl MockSurface {
    pub fn new(display: Display, image_count: u32) -> Self {
        Self {
            display,
            image_count,
            max_extent: None,
            built: None,
            next_image: 0,
            next_handle: 1,
            control: Rc::new(SurfaceControl::default()),
            builds: Vec::new(),
            acquires: 0,
            presents: Vec::new(),
            live_signals: Rc::new(Cell::new(0)),
        }
    }

    /// Clamp every build to `max`, like a surface's `max_image_extent`.
    pub fn with_max_extent(mut self, width: u32, height: u32) -> Self {
        self.max_extent = Some((width, height));
        self
    }

    pub fn control(&self) -> Rc<SurfaceControl> {
        self.control.clone()
    }

    /// Semaphores created and not yet destroyed.
    pub fn live_signals(&self) -> Rc<Cell<i64>> {
        self.live_signals.clone()
    }

    fn current(&self) -> (u32, u32) {
        let (width, height) = self.display.get();
        match self.max_extent {
            Some((max_w, max_h)) => (width.min(max_w), height.min(max_h)),
            None => (width, height),
        }
    }

    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl PresentSurface for MockSurface {
    fn build(&mut self, desired: vk::Extent2D, _vsync: bool) -> RenderResult<Option<SurfaceBuild>> {
        self.builds.push((desired.width, desired.height));
        if self.control.fail_next_build.replace(false) {
            return Err(inflight_rhi::RhiError::SurfaceError("surface lost".into()).into());
        }

        let current = self.current();
        if current.0 == 0 || current.1 == 0 {
            self.built = None;
            return Ok(None);
        }

        let extent = match self.max_extent {
            Some((max_w, max_h)) => (desired.width.min(max_w), desired.height.min(max_h)),
            None => (desired.width, desired.height),
        };
        self.built = Some(extent);
        self.next_image = 0;

        let images = (0..self.image_count)
            .map(|_| {
                let raw = self.handle();
                (vk::Image::from_raw(raw), vk::ImageView::from_raw(raw))
            })
            .collect();

        Ok(Some(SurfaceBuild {
            extent: vk::Extent2D {
                width: extent.0,
                height: extent.1,
            },
            format: vk::Format::B8G8R8A8_SRGB,
            images,
        }))
    }

    fn acquire(&mut self, _signal: vk::Semaphore, _timeout: Duration) -> RenderResult<AcquireOutcome> {
        self.acquires += 1;
        let current = self.current();
        if current.0 == 0 || current.1 == 0 {
            return Ok(AcquireOutcome::OutOfDate);
        }
        if self.control.not_ready.get() {
            return Ok(AcquireOutcome::NotReady);
        }

        let index = self.next_image;
        self.next_image = (index + 1) % self.image_count;
        Ok(AcquireOutcome::Acquired {
            index,
            suboptimal: self.built != Some(current),
        })
    }

    fn present(&mut self, _index: u32, _wait: vk::Semaphore) -> RenderResult<PresentOutcome> {
        let built = self.built.unwrap_or_default();
        self.presents.push(built);
        if Some(self.current()) != self.built {
            return Ok(PresentOutcome::OutOfDate);
        }
        if self.control.suboptimal_present.replace(false) {
            return Ok(PresentOutcome::Suboptimal);
        }
        Ok(PresentOutcome::Presented)
    }

    fn create_signal(&mut self) -> RenderResult<vk::Semaphore> {
        self.live_signals.set(self.live_signals.get() + 1);
        Ok(vk::Semaphore::from_raw(self.handle()))
    }

    fn destroy_signal(&mut self, _signal: vk::Semaphore) {
        self.live_signals.set(self.live_signals.get() - 1);
    }
}

pub struct MockWindow {
    pub display: Display,
    pub closing: Cell<bool>,
}

impl MockWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            display: Rc::new(Cell::new((width, height))),
            closing: Cell::new(false),
        }
    }

    pub fn resize(&self, width: u32, height: u32) {
        self.display.set((width, height));
    }
}

impl WindowSource for MockWindow {
    fn extent(&self) -> (u32, u32) {
        self.display.get()
    }

    fn is_closing(&self) -> bool {
        self.closing.get()
    }

    fn pointer_position(&self) -> (i32, i32) {
        (12, 34)
    }
}

// =============================================================================
// Passes and harness
// =============================================================================

/// Samples a texture into the surface image and logs what it saw.
#[derive(Default)]
pub struct BlitPass {
    pub texture: u64,
    pub extents: Vec<(u32, u32)>,
    pub frames: Vec<u64>,
}

impl BlitPass {
    pub fn new() -> Self {
        Self {
            texture: 0xbeef,
            ..Self::default()
        }
    }

    pub fn texture(&self) -> TrackedResource {
        TrackedResource::color_image(vk::Image::from_raw(self.texture))
    }
}

impl RenderPass<MockFrame> for BlitPass {
    fn name(&self) -> &str {
        "blit"
    }

    fn prepare(&mut self, ctx: &FrameContext<'_, MockFrame>, tracker: &mut ResourceStateTracker) {
        tracker.transition(self.texture(), ResourceState::TRANSFER_SRC);
        tracker.transition(
            TrackedResource::color_image(ctx.target.image),
            ResourceState::TRANSFER_DST,
        );
    }

    fn record(&mut self, ctx: &mut FrameContext<'_, MockFrame>) -> RenderResult<()> {
        ctx.frame.allocate_transient(vk::DescriptorSetLayout::null())?;
        self.extents.push((ctx.extent.width, ctx.extent.height));
        self.frames.push(ctx.frame_number);
        Ok(())
    }
}

pub type Scheduler = FrameScheduler<MockAccelerator, MockSurface>;

pub struct Harness {
    pub scheduler: Scheduler,
    pub window: MockWindow,
    pub timeline: Rc<RefCell<Timeline>>,
    pub control: Rc<SurfaceControl>,
    pub pass: BlitPass,
}

impl Harness {
    pub fn new(frames: usize, delay: u64, width: u32, height: u32) -> Self {
        let config = RendererConfig::default()
            .with_frames_in_flight(frames)
            .with_resolution(width, height);
        Self::with(config, delay, |surface| surface)
    }

    pub fn with(
        config: RendererConfig,
        delay: u64,
        surface: impl FnOnce(MockSurface) -> MockSurface,
    ) -> Self {
        Self::try_with(config, delay, surface).expect("Failed to create scheduler")
    }

    pub fn try_with(
        config: RendererConfig,
        delay: u64,
        surface: impl FnOnce(MockSurface) -> MockSurface,
    ) -> RenderResult<Self> {
        inflight_core::init_logging();

        let (width, height) = config.resolution;
        let window = MockWindow::new(width, height);
        let timeline = Timeline::new(delay);
        let accelerator = MockAccelerator::new(timeline.clone());
        let surface = surface(MockSurface::new(window.display.clone(), 3));
        let control = surface.control();
        let scheduler = FrameScheduler::new(accelerator, surface, &config)?;

        Ok(Self {
            scheduler,
            window,
            timeline,
            control,
            pass: BlitPass::new(),
        })
    }

    /// One full iteration. `None` if `begin_frame` produced no frame.
    pub fn frame(&mut self) -> RenderResult<Option<FrameOutcome>> {
        if self.scheduler.begin_frame(&self.window)?.is_none() {
            return Ok(None);
        }
        self.scheduler.write_params(&[1u32, 2, 3, 4])?;
        self.scheduler.record_passes(&mut [&mut self.pass])?;
        self.scheduler.end_frame().map(Some)
    }

    pub fn run(&mut self, frames: usize) -> Vec<Option<FrameOutcome>> {
        (0..frames)
            .map(|_| self.frame().expect("Frame failed"))
            .collect()
    }

    pub fn surface(&self) -> &MockSurface {
        self.scheduler.swapchain().surface()
    }

    pub fn violations(&self) -> Vec<String> {
        self.timeline.borrow().violations.clone()
    }
}
