//! The window as the frame loop sees it.

/// Polled window state.
///
/// Values are eventually consistent: the frame loop reads them once per
/// iteration and never expects push notifications.
pub trait WindowSource {
    /// Current drawable size in pixels. `(0, 0)` while minimized.
    fn extent(&self) -> (u32, u32);

    /// True once the user asked the window to close.
    fn is_closing(&self) -> bool;

    /// Last known pointer position in window pixels.
    fn pointer_position(&self) -> (i32, i32) {
        (0, 0)
    }

    fn is_minimized(&self) -> bool {
        let (width, height) = self.extent();
        width == 0 || height == 0
    }
}
