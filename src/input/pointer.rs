//! Pointer (mouse) tracking

use log::debug;

use crate::event::{CanvasEvent, MouseButton};

/// Pointer state for one canvas
///
/// Some native models (GLFW button callbacks, Win32 wheel messages) carry
/// no usable position, so the last one seen is remembered here.
#[derive(Debug, Default)]
pub struct Pointer {
    /// Last known position in client coordinates
    position: (i32, i32),
    /// Held buttons, bit `n - 1` for button `n`
    held: u8,
}

fn bit(button: MouseButton) -> u8 {
    1 << (button.number() - 1)
}

impl Pointer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> (i32, i32) {
        self.position
    }

    /// Whether `button` is held
    pub fn is_held(&self, button: MouseButton) -> bool {
        self.held & bit(button) != 0
    }

    /// Whether any button is held
    pub fn any_held(&self) -> bool {
        self.held != 0
    }

    /// Record what a translated mouse event says about the pointer
    pub fn observe(&mut self, event: &CanvasEvent) {
        if let Some(pos) = event.pointer_pos() {
            self.position = pos;
        }
        match event {
            CanvasEvent::MousePress { button, pos, .. } => {
                if self.held & bit(*button) != 0 {
                    debug!("Button {} pressed twice at {:?}", button.number(), pos);
                }
                self.held |= bit(*button);
            }
            CanvasEvent::MouseRelease { button, .. } => self.held &= !bit(*button),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Modifiers;

    fn press(button: MouseButton, pos: (i32, i32)) -> CanvasEvent {
        CanvasEvent::MousePress {
            pos,
            button,
            modifiers: Modifiers::empty(),
        }
    }

    #[test]
    fn test_pointer_new() {
        let pointer = Pointer::new();
        assert_eq!(pointer.position(), (0, 0));
        assert!(!pointer.any_held());
    }

    #[test]
    fn test_observe() {
        let mut pointer = Pointer::new();
        pointer.observe(&press(MouseButton::Right, (10, 20)));
        pointer.observe(&press(MouseButton::Left, (10, 20)));
        assert_eq!(pointer.position(), (10, 20));
        assert!(pointer.is_held(MouseButton::Right));
        assert!(pointer.is_held(MouseButton::Left));
        assert!(!pointer.is_held(MouseButton::Middle));

        pointer.observe(&CanvasEvent::MouseMove {
            pos: (15, 25),
            modifiers: Modifiers::empty(),
        });
        pointer.observe(&CanvasEvent::MouseRelease {
            pos: (15, 25),
            button: MouseButton::Right,
            modifiers: Modifiers::empty(),
        });
        pointer.observe(&CanvasEvent::MouseRelease {
            pos: (15, 25),
            button: MouseButton::Left,
            modifiers: Modifiers::empty(),
        });
        assert_eq!(pointer.position(), (15, 25));
        assert!(!pointer.any_held());
    }

    #[test]
    fn test_wheel_moves_pointer_only() {
        let mut pointer = Pointer::new();
        pointer.observe(&CanvasEvent::MouseWheel {
            pos: (3, 4),
            delta: (0.0, 1.0),
            modifiers: Modifiers::empty(),
        });
        assert_eq!(pointer.position(), (3, 4));
        assert!(!pointer.any_held());
    }
}
