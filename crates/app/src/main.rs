//! inflight - frames-in-flight demo
//!
//! Opens a window, clears an off-screen "skin" to a color that follows the
//! pointer and blits it next to a file texture every frame.

mod assets;
mod passes;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, trace};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use inflight_core::{FrameTimer, RendererConfig, WindowSource};
use inflight_platform::{Surface, Window};
use inflight_renderer::vulkan::{VulkanAccelerator, VulkanFrame, VulkanSurface};
use inflight_renderer::{FrameOutcome, FrameScheduler, RenderPass, RenderResult};
use inflight_rhi::device::Device;
use inflight_rhi::instance::Instance;
use inflight_rhi::physical_device::select_physical_device;

use crate::assets::Params;
use crate::passes::{CompositePass, ParamsPass, SkinPass, UploadPass};

/// Descriptor sets one frame may allocate.
const TRANSIENT_SETS: u32 = 4;

/// Everything that lives on the GPU.
///
/// Field order is drop order: the scheduler drains the queue in its own
/// drop before any pass resource, the device, the surface or the instance
/// goes away.
struct Gpu {
    scheduler: FrameScheduler<VulkanAccelerator, VulkanSurface>,
    upload: UploadPass,
    skin: SkinPass,
    params: ParamsPass,
    composite: CompositePass,
    _device: Arc<Device>,
    _surface: Surface,
    _instance: Instance,
}

impl Gpu {
    fn new(window: &Window, config: &RendererConfig) -> Result<Self> {
        let texture = assets::load_texture(&config.texture_path)?;

        let extensions = window.required_extensions()?;
        let instance = Instance::new(c"inflight", &extensions, config.validation)
            .context("failed to create Vulkan instance")?;
        let surface = window.create_surface(&instance)?;
        let gpu = select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        info!("Using GPU '{}' ({})", gpu.device_name(), gpu.device_type_name());
        let device = Device::new(&instance, &gpu).context("failed to create logical device")?;

        let accelerator = VulkanAccelerator::new(
            device.clone(),
            std::mem::size_of::<Params>() as u64,
            TRANSIENT_SETS,
        )?;
        let present = VulkanSurface::new(&instance, device.clone(), surface.handle());
        let scheduler = FrameScheduler::new(accelerator, present, config)?;

        let upload = UploadPass::new(device.clone(), &texture)?;
        let skin = SkinPass::new(device.clone())?;
        let params = ParamsPass::new(device.clone())?;
        let composite = CompositePass::new(
            device.clone(),
            skin.skin(),
            upload.texture(),
            params.device_params(),
        )?;

        Ok(Self {
            scheduler,
            upload,
            skin,
            params,
            composite,
            _device: device,
            _surface: surface,
            _instance: instance,
        })
    }

    /// Run one frame. Returns `false` if nothing was drawn.
    fn render(&mut self, window: &Window) -> RenderResult<bool> {
        let Some(frame) = self.scheduler.begin_frame(window)? else {
            return Ok(false);
        };

        let params = Params::new(
            (frame.extent.width, frame.extent.height),
            window.pointer_position(),
        );
        self.scheduler.write_params(&params)?;
        self.skin.update(&params);

        let mut passes: [&mut dyn RenderPass<VulkanFrame>; 4] = [
            &mut self.upload,
            &mut self.skin,
            &mut self.params,
            &mut self.composite,
        ];
        self.scheduler.record_passes(&mut passes)?;

        if self.scheduler.end_frame()? == FrameOutcome::PresentSkipped {
            trace!("Frame {} rendered but not presented", frame.frame_number);
        }
        Ok(true)
    }
}

struct App {
    config: RendererConfig,
    // Before the window: the surface must go first.
    gpu: Option<Gpu>,
    window: Option<Window>,
    timer: FrameTimer,
    error: Option<anyhow::Error>,
}

impl App {
    fn new(config: RendererConfig) -> Self {
        Self {
            config,
            gpu: None,
            window: None,
            timer: FrameTimer::default(),
            error: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let (width, height) = self.config.resolution;
        let window = Window::new(event_loop, width, height, &self.config.title)?;
        let gpu = Gpu::new(&window, &self.config)?;

        info!("Initialization complete, entering main loop");
        self.gpu = Some(gpu);
        self.window = Some(window);
        Ok(())
    }

    fn redraw(&mut self) -> Result<()> {
        let (Some(window), Some(gpu)) = (self.window.as_ref(), self.gpu.as_mut()) else {
            return Ok(());
        };

        if gpu.render(window)?
            && let Some(report) = self.timer.frame()
        {
            info!(
                "{} frames, {:.1} fps, {:.2} ms/frame",
                report.frames, report.fps, report.avg_frame_ms
            );
        }
        Ok(())
    }

    /// Drain the GPU and release it.
    fn shutdown(&mut self) {
        if let Some(mut gpu) = self.gpu.take() {
            if let Err(e) = gpu.scheduler.shutdown() {
                error!("Failed to drain GPU work: {}", e);
            }
            let stats = gpu.scheduler.stats();
            info!(
                "Submitted {} frame(s), presented {}, skipped {} present(s), rebuilt the surface {} time(s)",
                stats.frames_submitted,
                stats.frames_presented,
                stats.presents_skipped,
                stats.recreations
            );
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, e: anyhow::Error) {
        error!("{:#}", e);
        self.shutdown();
        self.error = Some(e);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none()
            && let Err(e) = self.init(event_loop)
        {
            self.fail(event_loop, e.context("initialization failed"));
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let Some(window) = self.window.as_mut() {
            window.handle_event(&event);
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                self.shutdown();
                event_loop.exit();
            }
            WindowEvent::Resized(_) => {
                if let Some(gpu) = self.gpu.as_mut() {
                    gpu.scheduler.notify_resized();
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.redraw() {
                    self.fail(event_loop, e.context("frame failed"));
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.shutdown();
    }
}

fn main() -> Result<()> {
    inflight_core::init_logging();

    let config = RendererConfig::from_env().context("invalid configuration")?;
    info!(
        "Starting {}: {}x{}, {} frame(s) in flight",
        config.title, config.resolution.0, config.resolution.1, config.frames_in_flight
    );

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
