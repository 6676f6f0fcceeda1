//! Native-to-canonical event translation
//!
//! Each native event model implements `EventModel`, which decodes one
//! native event at a time. `Translator` wraps a model with the keyboard and
//! pointer trackers every backend needs.

pub mod keyboard;
pub mod keysym;
pub mod pointer;

pub use keyboard::Keyboard;
pub use pointer::Pointer;

use std::fmt;

use log::trace;

use crate::capability::BackendFamily;
use crate::event::{CanvasEvent, Key, Modifiers};

/// Context available while decoding one native event
pub struct DecodeCx<'a> {
    /// Live keyboard modifier state queried from the platform
    pub live: &'a dyn Fn() -> Modifiers,
    /// Last known pointer position
    pub pointer: (i32, i32),
}

impl DecodeCx<'_> {
    pub fn live_modifiers(&self) -> Modifiers {
        (self.live)()
    }
}

/// Result of decoding one native event
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// An event needing no keyboard bookkeeping
    Event(CanvasEvent),
    /// Key went down; `code` is the native code used for repeat tracking
    KeyDown {
        code: u32,
        key: Option<Key>,
        text: String,
        modifiers: Modifiers,
        repeat: bool,
    },
    KeyUp {
        code: u32,
        key: Option<Key>,
        modifiers: Modifiers,
    },
    /// Text delivered separately from key events
    Text(String),
    /// Keyboard focus left the window
    FocusLost,
}

/// A native event representation
pub trait EventModel: Default + 'static {
    type Event: fmt::Debug;

    /// Model identifier
    const NAME: &'static str;

    /// Backend family using this model
    const FAMILY: BackendFamily;

    /// Decode one native event; `None` drops it
    fn decode(&mut self, event: Self::Event, cx: &DecodeCx<'_>) -> Option<Decoded>;
}

/// Per-canvas translator
#[derive(Default)]
pub struct Translator<M: EventModel> {
    model: M,
    keyboard: Keyboard,
    pointer: Pointer,
}

impl<M: EventModel> Translator<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate one native event, appending canonical events to `out`
    pub fn translate(&mut self, event: M::Event, live: &dyn Fn() -> Modifiers, out: &mut Vec<CanvasEvent>) {
        trace!("{} event: {:?}", M::NAME, event);
        let cx = DecodeCx {
            live,
            pointer: self.pointer.position(),
        };
        match self.model.decode(event, &cx) {
            None => {}
            Some(Decoded::Event(event)) => {
                self.keyboard.flush(out);
                self.pointer.observe(&event);
                out.push(event);
            }
            Some(Decoded::KeyDown {
                code,
                key,
                text,
                modifiers,
                repeat,
            }) => {
                self.keyboard
                    .key_press(code, key, text, modifiers, repeat, out);
            }
            Some(Decoded::KeyUp {
                code,
                key,
                modifiers,
            }) => {
                self.keyboard.key_release(code, key, modifiers, out);
            }
            Some(Decoded::Text(text)) => self.keyboard.text(text, out),
            Some(Decoded::FocusLost) => self.keyboard.reset(out),
        }
    }

    /// Flush held keyboard state at the end of a sweep
    pub fn finish(&mut self, out: &mut Vec<CanvasEvent>) {
        self.keyboard.finish(out);
    }

    pub fn keyboard(&self) -> &Keyboard {
        &self.keyboard
    }

    pub fn pointer(&self) -> &Pointer {
        &self.pointer
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}
