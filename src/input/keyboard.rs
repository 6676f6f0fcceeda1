//! Keyboard tracking: repeat suppression and text merging

use log::{debug, trace};

use crate::event::{CanvasEvent, Key, Modifiers};

/// A press waiting for its text
#[derive(Debug)]
struct PendingPress {
    code: u32,
    key: Option<Key>,
    modifiers: Modifiers,
}

/// Keyboard state for one canvas
///
/// Platforms deliver text either inline with the key event or as a
/// separate notification shortly after (or, with input methods, before)
/// it. Within one sweep, a press without text is held until text arrives
/// and text without a press is held until a press arrives; whatever is
/// left at the end of the sweep is emitted on its own.
#[derive(Debug, Default)]
pub struct Keyboard {
    /// Currently pressed keys (native codes) with the text of their press
    pressed_keys: Vec<(u32, String)>,
    pending_press: Option<PendingPress>,
    pending_text: Option<String>,
    /// The next text notification belongs to a filtered repeat
    swallow_text: bool,
}

impl Keyboard {
    /// Create a new keyboard
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a key press
    ///
    /// Returns false when the press was an auto-repeat and got filtered.
    pub fn key_press(
        &mut self,
        code: u32,
        key: Option<Key>,
        text: String,
        modifiers: Modifiers,
        repeat: bool,
        out: &mut Vec<CanvasEvent>,
    ) -> bool {
        if repeat || self.is_pressed(code) {
            trace!("Filtered key repeat: {}", code);
            self.flush_press(out);
            self.swallow_text = text.is_empty();
            return false;
        }
        self.swallow_text = false;
        self.flush_press(out);

        if !text.is_empty() {
            self.flush_text(out);
            self.emit_press(code, key, text, modifiers, out);
        } else if let Some(text) = self.pending_text.take() {
            self.emit_press(code, key, text, modifiers, out);
        } else {
            self.pending_press = Some(PendingPress {
                code,
                key,
                modifiers,
            });
        }
        true
    }

    /// Handle a key release
    ///
    /// The release carries the text of the matching press.
    pub fn key_release(
        &mut self,
        code: u32,
        key: Option<Key>,
        modifiers: Modifiers,
        out: &mut Vec<CanvasEvent>,
    ) -> bool {
        self.swallow_text = false;
        self.flush(out);

        let Some(idx) = self.pressed_keys.iter().position(|(k, _)| *k == code) else {
            debug!("Release of unpressed key {}", code);
            return false;
        };
        let (_, text) = self.pressed_keys.remove(idx);
        if key.is_some() {
            out.push(CanvasEvent::KeyRelease {
                key,
                text,
                modifiers,
            });
        }
        true
    }

    /// Handle text delivered separately from key events
    pub fn text(&mut self, text: String, out: &mut Vec<CanvasEvent>) {
        if text.is_empty() {
            return;
        }
        if std::mem::take(&mut self.swallow_text) {
            trace!("Dropped text of filtered repeat: {:?}", text);
            return;
        }
        if let Some(press) = self.pending_press.take() {
            self.emit_press(press.code, press.key, text, press.modifiers, out);
            return;
        }
        match &mut self.pending_text {
            Some(pending) => pending.push_str(&text),
            None => self.pending_text = Some(text),
        }
    }

    /// Emit everything held back; called before non-keyboard events and
    /// at the end of a sweep
    pub fn flush(&mut self, out: &mut Vec<CanvasEvent>) {
        self.flush_press(out);
        self.flush_text(out);
    }

    /// End of sweep
    pub fn finish(&mut self, out: &mut Vec<CanvasEvent>) {
        self.flush(out);
        self.swallow_text = false;
    }

    /// Forget held keys after focus loss
    ///
    /// Their releases go to whichever window took focus, so a later press
    /// of the same key must not be mistaken for an auto-repeat.
    pub fn reset(&mut self, out: &mut Vec<CanvasEvent>) {
        self.flush(out);
        if !self.pressed_keys.is_empty() {
            debug!("Focus lost with {} keys held", self.pressed_keys.len());
        }
        self.pressed_keys.clear();
        self.swallow_text = false;
    }

    /// Whether a key is held
    pub fn is_pressed(&self, code: u32) -> bool {
        self.pressed_keys.iter().any(|(k, _)| *k == code)
    }

    /// Get currently pressed keys
    pub fn pressed_keys(&self) -> Vec<u32> {
        self.pressed_keys.iter().map(|(k, _)| *k).collect()
    }

    fn emit_press(
        &mut self,
        code: u32,
        key: Option<Key>,
        text: String,
        modifiers: Modifiers,
        out: &mut Vec<CanvasEvent>,
    ) {
        self.pressed_keys.push((code, text.clone()));
        out.push(CanvasEvent::KeyPress {
            key,
            text,
            modifiers,
        });
    }

    fn flush_press(&mut self, out: &mut Vec<CanvasEvent>) {
        let Some(press) = self.pending_press.take() else {
            return;
        };
        if press.key.is_some() {
            self.emit_press(press.code, press.key, String::new(), press.modifiers, out);
        } else {
            trace!("Dropped unmapped key without text: {}", press.code);
        }
    }

    fn flush_text(&mut self, out: &mut Vec<CanvasEvent>) {
        if let Some(text) = self.pending_text.take() {
            out.push(CanvasEvent::KeyPress {
                key: None,
                text,
                modifiers: Modifiers::empty(),
            });
        }
    }
}
