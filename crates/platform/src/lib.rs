//! Platform layer: winit window, Vulkan surface and pointer input.
//!
//! [`Window`] implements [`inflight_core::WindowSource`], which is all the
//! frame scheduler needs from the windowing system.

mod input;
mod window;

pub use input::PointerState;
pub use window::{Surface, Window, required_extensions};

pub use winit::event::WindowEvent;
pub use winit::event_loop::EventLoop;
