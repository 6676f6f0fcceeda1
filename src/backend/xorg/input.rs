//! X11 event model
//!
//! Key events carry a keysym, the hardware keycode and the server's
//! modifier state mask; buttons 4-7 are wheel steps.

use crate::capability::BackendFamily;
use crate::event::{CanvasEvent, MouseButton, Modifiers, Region};
use crate::input::{keysym, DecodeCx, Decoded, EventModel};

pub const SHIFT_MASK: u32 = 1 << 0;
pub const LOCK_MASK: u32 = 1 << 1;
pub const CONTROL_MASK: u32 = 1 << 2;
pub const MOD1_MASK: u32 = 1 << 3;
pub const MOD4_MASK: u32 = 1 << 6;

/// X11 events after Xlib decoding
#[derive(Debug, Clone, PartialEq)]
pub enum XorgEvent {
    Key {
        pressed: bool,
        keycode: u32,
        keysym: u32,
        state: u32,
        /// `XLookupString` output
        text: String,
    },
    Button {
        pressed: bool,
        button: u32,
        x: i32,
        y: i32,
        state: u32,
    },
    Motion {
        x: i32,
        y: i32,
        state: u32,
    },
    Configure {
        width: u32,
        height: u32,
    },
    Expose {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    /// `WM_DELETE_WINDOW` client message
    DeleteWindow,
    FocusOut,
}

/// Translate an X11 state mask
pub fn modifiers(state: u32) -> Modifiers {
    let mut mods = Modifiers::empty();
    if state & SHIFT_MASK != 0 {
        mods |= Modifiers::SHIFT;
    }
    if state & CONTROL_MASK != 0 {
        mods |= Modifiers::CONTROL;
    }
    if state & MOD1_MASK != 0 {
        mods |= Modifiers::ALT;
    }
    if state & MOD4_MASK != 0 {
        mods |= Modifiers::META;
    }
    mods
}

fn button(code: u32) -> Option<MouseButton> {
    match code {
        1 => Some(MouseButton::Left),
        2 => Some(MouseButton::Middle),
        3 => Some(MouseButton::Right),
        _ => None,
    }
}

fn wheel(code: u32) -> Option<(f32, f32)> {
    match code {
        4 => Some((0.0, 1.0)),
        5 => Some((0.0, -1.0)),
        6 => Some((-1.0, 0.0)),
        7 => Some((1.0, 0.0)),
        _ => None,
    }
}

/// X11 translation state
#[derive(Debug, Default)]
pub struct XorgModel;

impl EventModel for XorgModel {
    type Event = XorgEvent;

    const NAME: &'static str = "xorg";
    const FAMILY: BackendFamily = BackendFamily::Native;

    fn decode(&mut self, event: XorgEvent, _cx: &DecodeCx<'_>) -> Option<Decoded> {
        let decoded = match event {
            XorgEvent::Key {
                pressed: true,
                keycode,
                keysym,
                state,
                text,
            } => Decoded::KeyDown {
                code: keycode,
                key: keysym::to_key(keysym),
                text: text.chars().filter(|c| !c.is_control()).collect(),
                modifiers: modifiers(state),
                repeat: false,
            },
            XorgEvent::Key {
                pressed: false,
                keycode,
                keysym,
                state,
                ..
            } => Decoded::KeyUp {
                code: keycode,
                key: keysym::to_key(keysym),
                modifiers: modifiers(state),
            },
            XorgEvent::Button {
                pressed,
                button: code,
                x,
                y,
                state,
            } => {
                let modifiers = modifiers(state);
                if let Some(delta) = wheel(code) {
                    if !pressed {
                        return None;
                    }
                    Decoded::Event(CanvasEvent::MouseWheel {
                        pos: (x, y),
                        delta,
                        modifiers,
                    })
                } else {
                    let button = button(code)?;
                    let pos = (x, y);
                    Decoded::Event(if pressed {
                        CanvasEvent::MousePress {
                            pos,
                            button,
                            modifiers,
                        }
                    } else {
                        CanvasEvent::MouseRelease {
                            pos,
                            button,
                            modifiers,
                        }
                    })
                }
            }
            XorgEvent::Motion { x, y, state } => Decoded::Event(CanvasEvent::MouseMove {
                pos: (x, y),
                modifiers: modifiers(state),
            }),
            XorgEvent::Configure { width, height } => Decoded::Event(CanvasEvent::Resize {
                size: (width, height),
            }),
            XorgEvent::Expose {
                x,
                y,
                width,
                height,
            } => Decoded::Event(CanvasEvent::Paint {
                region: Some(Region::new(x, y, width, height)),
            }),
            XorgEvent::DeleteWindow => Decoded::Event(CanvasEvent::Close),
            XorgEvent::FocusOut => Decoded::FocusLost,
        };
        Some(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Key;
    use crate::input::Translator;

    fn run(events: Vec<XorgEvent>) -> Vec<CanvasEvent> {
        let mut translator = Translator::<XorgModel>::new();
        let mut out = Vec::new();
        let live = || Modifiers::empty();
        for event in events {
            translator.translate(event, &live, &mut out);
        }
        translator.finish(&mut out);
        out
    }

    fn key(pressed: bool, keycode: u32, keysym: u32, state: u32, text: &str) -> XorgEvent {
        XorgEvent::Key {
            pressed,
            keycode,
            keysym,
            state,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_key_with_inline_text() {
        let out = run(vec![
            key(true, 38, 0x41, SHIFT_MASK, "A"),
            key(false, 38, 0x41, SHIFT_MASK, ""),
        ]);
        assert_eq!(
            out,
            vec![
                CanvasEvent::KeyPress {
                    key: Some(Key::Char('A')),
                    text: "A".into(),
                    modifiers: Modifiers::SHIFT,
                },
                CanvasEvent::KeyRelease {
                    key: Some(Key::Char('A')),
                    text: "A".into(),
                    modifiers: Modifiers::SHIFT,
                },
            ]
        );
    }

    #[test]
    fn test_escape_has_no_text() {
        let out = run(vec![key(true, 9, 0xff1b, 0, "\u{1b}")]);
        assert_eq!(
            out,
            vec![CanvasEvent::KeyPress {
                key: Some(Key::Escape),
                text: String::new(),
                modifiers: Modifiers::empty(),
            }]
        );
    }

    #[test]
    fn test_detectable_autorepeat_is_filtered() {
        let out = run(vec![
            key(true, 38, 0x61, 0, "a"),
            key(true, 38, 0x61, 0, "a"),
            key(true, 38, 0x61, 0, "a"),
            key(false, 38, 0x61, 0, ""),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].kind(), "key_release");
    }

    #[test]
    fn test_focus_out_forgets_held_keys() {
        let out = run(vec![
            key(true, 38, 0x61, 0, "a"),
            XorgEvent::FocusOut,
            key(true, 38, 0x61, 0, "a"),
            key(false, 38, 0x61, 0, ""),
        ]);
        let kinds: Vec<_> = out.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec!["key_press", "key_press", "key_release"]);
    }

    #[test]
    fn test_wheel_buttons() {
        let out = run(vec![
            XorgEvent::Button {
                pressed: true,
                button: 4,
                x: 3,
                y: 4,
                state: CONTROL_MASK,
            },
            XorgEvent::Button {
                pressed: false,
                button: 4,
                x: 3,
                y: 4,
                state: CONTROL_MASK,
            },
            XorgEvent::Button {
                pressed: true,
                button: 5,
                x: 3,
                y: 4,
                state: 0,
            },
            XorgEvent::Button {
                pressed: true,
                button: 7,
                x: 3,
                y: 4,
                state: 0,
            },
        ]);
        let deltas: Vec<_> = out
            .iter()
            .map(|e| match e {
                CanvasEvent::MouseWheel { delta, .. } => *delta,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(deltas, vec![(0.0, 1.0), (0.0, -1.0), (1.0, 0.0)]);
        assert_eq!(
            out[0],
            CanvasEvent::MouseWheel {
                pos: (3, 4),
                delta: (0.0, 1.0),
                modifiers: Modifiers::CONTROL,
            }
        );
    }

    #[test]
    fn test_buttons_and_unknown_buttons() {
        let out = run(vec![
            XorgEvent::Button {
                pressed: true,
                button: 3,
                x: 10,
                y: 20,
                state: MOD1_MASK | MOD4_MASK,
            },
            XorgEvent::Button {
                pressed: true,
                button: 8,
                x: 10,
                y: 20,
                state: 0,
            },
        ]);
        assert_eq!(
            out,
            vec![CanvasEvent::MousePress {
                pos: (10, 20),
                button: MouseButton::Right,
                modifiers: Modifiers::ALT | Modifiers::META,
            }]
        );
    }

    #[test]
    fn test_geometry_and_lifecycle() {
        let out = run(vec![
            XorgEvent::Configure {
                width: 640,
                height: 480,
            },
            XorgEvent::Expose {
                x: 0,
                y: 0,
                width: 64,
                height: 32,
            },
            XorgEvent::DeleteWindow,
        ]);
        assert_eq!(
            out,
            vec![
                CanvasEvent::Resize { size: (640, 480) },
                CanvasEvent::Paint {
                    region: Some(Region::new(0, 0, 64, 32)),
                },
                CanvasEvent::Close,
            ]
        );
    }

    #[test]
    fn test_lock_mask_ignored() {
        assert_eq!(modifiers(LOCK_MASK | SHIFT_MASK), Modifiers::SHIFT);
    }
}
