//! Canonical event vocabulary
//!
//! Every backend translates its native events into `CanvasEvent` values.
//! Consumers never see native key codes, modifier masks or button numbers.

use std::fmt;
use std::rc::{Rc, Weak};

use bitflags::bitflags;

use crate::canvas::CanvasId;

bitflags! {
    /// Keyboard modifiers held during an event
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 1 << 0;
        const CONTROL = 1 << 1;
        const ALT = 1 << 2;
        const META = 1 << 3;
    }
}

/// Backend-independent key identity
///
/// Letters and digits are reported as `Char` with upper-case letters, so
/// `a` and `Shift+a` both arrive as `Char('A')` and differ only in `text`.
/// `Char` is also the fallback for unmapped printable ASCII codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Shift,
    Control,
    Alt,
    Meta,
    Up,
    Down,
    Left,
    Right,
    PageUp,
    PageDown,
    Insert,
    Delete,
    Home,
    End,
    Escape,
    Backspace,
    Space,
    Enter,
    Tab,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
    Char(char),
}

impl Key {
    /// Fallback for codes missing from a backend's key table
    ///
    /// Printable ASCII (32..=127) maps to a literal-character key with
    /// lower-case letters folded to upper case; anything else is `None`.
    pub fn from_ascii(code: u32) -> Option<Key> {
        match code {
            32 => Some(Key::Space),
            127 => Some(Key::Delete),
            33..=126 => {
                let c = char::from_u32(code)?;
                Some(Key::Char(c.to_ascii_uppercase()))
            }
            _ => None,
        }
    }

    /// Human-readable key name
    pub fn name(&self) -> String {
        match self {
            Key::Char(c) => c.to_string(),
            other => format!("{other:?}"),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Mouse buttons in canonical numbering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left = 1,
    Middle = 2,
    Right = 3,
}

impl MouseButton {
    /// Canonical button number (1, 2 or 3)
    pub fn number(self) -> u8 {
        self as u8
    }
}

/// A rectangle of damaged client area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest rectangle covering both regions
    ///
    /// Extents beyond `u32::MAX` saturate.
    pub fn union(&self, other: &Region) -> Region {
        let end = |origin: i32, len: u32| origin as i64 + len as i64;
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = end(self.x, self.width).max(end(other.x, other.width));
        let y1 = end(self.y, self.height).max(end(other.y, other.height));
        let span = |from: i32, to: i64| (to - from as i64).clamp(0, u32::MAX as i64) as u32;
        Region::new(x0, y0, span(x0, x1), span(y0, y1))
    }
}

/// Canonical canvas event
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasEvent {
    /// Native window and render context exist; the context is current
    Initialize,
    /// Client size changed
    Resize { size: (u32, u32) },
    /// The canvas must be redrawn; `None` means the whole canvas
    Paint { region: Option<Region> },
    /// The canvas closed; delivered exactly once
    Close,
    KeyPress {
        key: Option<Key>,
        text: String,
        modifiers: Modifiers,
    },
    KeyRelease {
        key: Option<Key>,
        text: String,
        modifiers: Modifiers,
    },
    MousePress {
        pos: (i32, i32),
        button: MouseButton,
        modifiers: Modifiers,
    },
    MouseRelease {
        pos: (i32, i32),
        button: MouseButton,
        modifiers: Modifiers,
    },
    MouseMove {
        pos: (i32, i32),
        modifiers: Modifiers,
    },
    MouseWheel {
        pos: (i32, i32),
        delta: (f32, f32),
        modifiers: Modifiers,
    },
}

impl CanvasEvent {
    /// Event type name
    pub fn kind(&self) -> &'static str {
        match self {
            CanvasEvent::Initialize => "initialize",
            CanvasEvent::Resize { .. } => "resize",
            CanvasEvent::Paint { .. } => "paint",
            CanvasEvent::Close => "close",
            CanvasEvent::KeyPress { .. } => "key_press",
            CanvasEvent::KeyRelease { .. } => "key_release",
            CanvasEvent::MousePress { .. } => "mouse_press",
            CanvasEvent::MouseRelease { .. } => "mouse_release",
            CanvasEvent::MouseMove { .. } => "mouse_move",
            CanvasEvent::MouseWheel { .. } => "mouse_wheel",
        }
    }

    /// Pointer position for mouse events
    pub fn pointer_pos(&self) -> Option<(i32, i32)> {
        match self {
            CanvasEvent::MousePress { pos, .. }
            | CanvasEvent::MouseRelease { pos, .. }
            | CanvasEvent::MouseMove { pos, .. }
            | CanvasEvent::MouseWheel { pos, .. } => Some(*pos),
            _ => None,
        }
    }
}

/// Receiver of canonical events
///
/// Canvases hold their handler weakly; the consumer owns both the canvas
/// and the handler. Handlers are called on the event-loop thread, never
/// concurrently, and may call back into the canvas.
pub trait EventHandler {
    fn on_event(&self, canvas: CanvasId, event: &CanvasEvent);
}

impl<F> EventHandler for F
where
    F: Fn(CanvasId, &CanvasEvent),
{
    fn on_event(&self, canvas: CanvasId, event: &CanvasEvent) {
        self(canvas, event)
    }
}

/// Weak handler reference suitable for canvas construction
pub fn downgrade<T: EventHandler + 'static>(handler: &Rc<T>) -> Weak<dyn EventHandler> {
    let weak: Weak<T> = Rc::downgrade(handler);
    weak
}

/// Handler that ignores everything
pub fn no_handler() -> Weak<dyn EventHandler> {
    Weak::<fn(CanvasId, &CanvasEvent)>::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_from_ascii() {
        assert_eq!(Key::from_ascii(b'a' as u32), Some(Key::Char('A')));
        assert_eq!(Key::from_ascii(b'Z' as u32), Some(Key::Char('Z')));
        assert_eq!(Key::from_ascii(b'7' as u32), Some(Key::Char('7')));
        assert_eq!(Key::from_ascii(32), Some(Key::Space));
        assert_eq!(Key::from_ascii(127), Some(Key::Delete));
        assert_eq!(Key::from_ascii(31), None);
        assert_eq!(Key::from_ascii(0xe9), None);
    }

    #[test]
    fn test_region_union() {
        let a = Region::new(0, 0, 10, 10);
        let b = Region::new(5, 20, 10, 5);
        assert_eq!(a.union(&b), Region::new(0, 0, 15, 25));
    }

    #[test]
    fn test_region_union_of_huge_regions() {
        let wide = Region::new(10, 0, u32::MAX, 1);
        let left = Region::new(-20, 0, 5, 1);
        assert_eq!(wide.union(&left), Region::new(-20, 0, u32::MAX, 1));

        let a = Region::new(0, 0, i32::MAX as u32 + 10, 4);
        let b = Region::new(5, 2, 1, 1);
        assert_eq!(a.union(&b), Region::new(0, 0, i32::MAX as u32 + 10, 4));
    }

    #[test]
    fn test_button_numbers() {
        assert_eq!(MouseButton::Left.number(), 1);
        assert_eq!(MouseButton::Middle.number(), 2);
        assert_eq!(MouseButton::Right.number(), 3);
    }

    #[test]
    fn test_closure_handler() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let handler = Rc::new(move |_id: CanvasId, ev: &CanvasEvent| {
            sink.borrow_mut().push(ev.kind());
        });
        let weak = downgrade(&handler);
        weak.upgrade()
            .unwrap()
            .on_event(CanvasId(1), &CanvasEvent::Initialize);
        assert_eq!(*seen.borrow(), vec!["initialize"]);
        assert!(no_handler().upgrade().is_none());
    }
}
