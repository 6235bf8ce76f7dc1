//! Window management using winit, and Vulkan surface creation.

use std::ffi::c_char;
use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window as WinitWindow, WindowAttributes};

use inflight_core::{Error, Result, WindowSource};
use inflight_rhi::instance::Instance;

use crate::input::PointerState;

/// Owned `VkSurfaceKHR`. Must be dropped before the instance.
pub struct Surface {
    handle: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
}

impl Surface {
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.surface_loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY: created by ash_window::create_surface from the same instance
        // as the loader, and destroyed only here.
        unsafe {
            self.surface_loader.destroy_surface(self.handle, None);
        }
        tracing::debug!("Vulkan surface destroyed");
    }
}

pub struct Window {
    window: Arc<WinitWindow>,
    size: (u32, u32),
    closing: bool,
    pointer: PointerState,
}

impl Window {
    pub fn new(event_loop: &ActiveEventLoop, width: u32, height: u32, title: &str) -> Result<Self> {
        let attrs = WindowAttributes::default()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width, height))
            .with_resizable(true);

        let window = event_loop
            .create_window(attrs)
            .map_err(|e| Error::Window(e.to_string()))?;

        let size = window.inner_size();
        tracing::info!("Window created: {}x{}", size.width, size.height);

        Ok(Self {
            window: Arc::new(window),
            size: (size.width, size.height),
            closing: false,
            pointer: PointerState::new(),
        })
    }

    /// Fold a window event into the polled state.
    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => self.closing = true,
            WindowEvent::Resized(size) => {
                if self.size != (size.width, size.height) {
                    tracing::debug!("Window resized: {}x{}", size.width, size.height);
                }
                self.size = (size.width, size.height);
            }
            other => {
                self.pointer.handle_event(other);
            }
        }
    }

    pub fn pointer(&self) -> &PointerState {
        &self.pointer
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    /// Instance extensions this window needs for presentation.
    pub fn required_extensions(&self) -> Result<Vec<*const c_char>> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("Failed to get display handle: {e}")))?;
        required_extensions(display_handle.as_raw())
    }

    pub fn create_surface(&self, instance: &Instance) -> Result<Surface> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("Failed to get display handle: {e}")))?;
        let window_handle = self
            .window
            .window_handle()
            .map_err(|e| Error::Window(format!("Failed to get window handle: {e}")))?;

        // SAFETY: the handles come from a live winit window that outlives the
        // surface; the surface is destroyed in Surface::drop.
        let handle = unsafe {
            ash_window::create_surface(
                instance.entry(),
                instance.handle(),
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| Error::Window(format!("Failed to create Vulkan surface: {e}")))?
        };

        let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
        tracing::info!("Vulkan surface created");

        Ok(Surface {
            handle,
            surface_loader,
        })
    }
}

impl WindowSource for Window {
    fn extent(&self) -> (u32, u32) {
        if self.window.is_minimized() == Some(true) {
            return (0, 0);
        }
        self.size
    }

    fn is_closing(&self) -> bool {
        self.closing
    }

    fn pointer_position(&self) -> (i32, i32) {
        self.pointer.position()
    }
}

/// Instance extensions needed to present to windows on `display_handle`.
pub fn required_extensions(
    display_handle: raw_window_handle::RawDisplayHandle,
) -> Result<Vec<*const c_char>> {
    let extensions = ash_window::enumerate_required_extensions(display_handle)
        .map_err(|e| Error::Window(format!("Failed to enumerate surface extensions: {e}")))?;

    tracing::debug!(
        "Surface extensions: {:?}",
        extensions
            .iter()
            // SAFETY: ash_window returns pointers to static, NUL-terminated names.
            .map(|&ext| unsafe { std::ffi::CStr::from_ptr(ext) })
            .collect::<Vec<_>>()
    );

    Ok(extensions.to_vec())
}
