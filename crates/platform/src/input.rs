//! Pointer tracking.

#[derive(Debug, Default, Clone)]
pub struct PointerState {
    position: (i32, i32),
    inside: bool,
}

impl PointerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update from a window event. Returns true if the event was a pointer event.
    pub fn handle_event(&mut self, event: &winit::event::WindowEvent) -> bool {
        use winit::event::WindowEvent;

        match event {
            WindowEvent::CursorMoved { position, .. } => {
                self.on_moved(position.x, position.y);
                true
            }
            WindowEvent::CursorEntered { .. } => {
                self.inside = true;
                true
            }
            WindowEvent::CursorLeft { .. } => {
                self.inside = false;
                true
            }
            _ => false,
        }
    }

    pub fn on_moved(&mut self, x: f64, y: f64) {
        self.position = (x.round() as i32, y.round() as i32);
        self.inside = true;
    }

    pub fn position(&self) -> (i32, i32) {
        self.position
    }

    pub fn is_inside(&self) -> bool {
        self.inside
    }
}
