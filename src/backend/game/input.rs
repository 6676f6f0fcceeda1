//! Game-toolkit (GLFW) event model
//!
//! Key codes below 256 are ASCII; named keys live above. Repeats are
//! flagged by the action, text arrives through the char callback, and
//! button callbacks carry no position.

use crate::capability::BackendFamily;
use crate::event::{CanvasEvent, Key, MouseButton, Modifiers};
use crate::input::{DecodeCx, Decoded, EventModel};

pub const RELEASE: i32 = 0;
pub const PRESS: i32 = 1;
pub const REPEAT: i32 = 2;

pub const MOD_SHIFT: i32 = 0x1;
pub const MOD_CONTROL: i32 = 0x2;
pub const MOD_ALT: i32 = 0x4;
pub const MOD_SUPER: i32 = 0x8;

pub const KEY_UNKNOWN: i32 = -1;

/// Events as delivered by the toolkit callbacks
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Key {
        key: i32,
        scancode: i32,
        action: i32,
        mods: i32,
    },
    Char(char),
    MouseButton {
        button: i32,
        action: i32,
        mods: i32,
    },
    CursorPos {
        x: f64,
        y: f64,
    },
    Scroll {
        dx: f64,
        dy: f64,
    },
    FramebufferSize {
        width: i32,
        height: i32,
    },
    Refresh,
    Focus(bool),
    Close,
}

/// Translate a toolkit modifier bit set
pub fn modifiers(mods: i32) -> Modifiers {
    let mut out = Modifiers::empty();
    if mods & MOD_SHIFT != 0 {
        out |= Modifiers::SHIFT;
    }
    if mods & MOD_CONTROL != 0 {
        out |= Modifiers::CONTROL;
    }
    if mods & MOD_ALT != 0 {
        out |= Modifiers::ALT;
    }
    if mods & MOD_SUPER != 0 {
        out |= Modifiers::META;
    }
    out
}

/// Look up a toolkit key code
pub fn key_code_to_key(code: i32) -> Option<Key> {
    let key = match code {
        256 => Key::Escape,
        257 | 335 => Key::Enter,
        258 => Key::Tab,
        259 => Key::Backspace,
        260 => Key::Insert,
        261 => Key::Delete,
        262 => Key::Right,
        263 => Key::Left,
        264 => Key::Down,
        265 => Key::Up,
        266 => Key::PageUp,
        267 => Key::PageDown,
        268 => Key::Home,
        269 => Key::End,
        290..=301 => {
            const F: [Key; 12] = [
                Key::F1,
                Key::F2,
                Key::F3,
                Key::F4,
                Key::F5,
                Key::F6,
                Key::F7,
                Key::F8,
                Key::F9,
                Key::F10,
                Key::F11,
                Key::F12,
            ];
            F[(code - 290) as usize]
        }
        320..=329 => Key::Char(char::from(b'0' + (code - 320) as u8)),
        340 | 344 => Key::Shift,
        341 | 345 => Key::Control,
        342 | 346 => Key::Alt,
        343 | 347 => Key::Meta,
        0..=255 => return Key::from_ascii(code as u32),
        _ => return None,
    };
    Some(key)
}

/// Game-toolkit translation state
#[derive(Debug, Default)]
pub struct GameModel;

impl EventModel for GameModel {
    type Event = GameEvent;

    const NAME: &'static str = "game";
    const FAMILY: BackendFamily = BackendFamily::Game;

    fn decode(&mut self, event: GameEvent, cx: &DecodeCx<'_>) -> Option<Decoded> {
        let decoded = match event {
            GameEvent::Key {
                key,
                scancode,
                action,
                mods,
            } => {
                let code = (if key == KEY_UNKNOWN { scancode } else { key }) as u32;
                let mapped = key_code_to_key(key);
                let modifiers = modifiers(mods);
                match action {
                    PRESS | REPEAT => Decoded::KeyDown {
                        code,
                        key: mapped,
                        text: String::new(),
                        modifiers,
                        repeat: action == REPEAT,
                    },
                    RELEASE => Decoded::KeyUp {
                        code,
                        key: mapped,
                        modifiers,
                    },
                    _ => return None,
                }
            }
            GameEvent::Char(c) if !c.is_control() => Decoded::Text(c.to_string()),
            GameEvent::Char(_) => return None,
            GameEvent::MouseButton {
                button,
                action,
                mods,
            } => {
                let button = match button {
                    0 => MouseButton::Left,
                    1 => MouseButton::Right,
                    2 => MouseButton::Middle,
                    _ => return None,
                };
                let pos = cx.pointer;
                let modifiers = modifiers(mods);
                Decoded::Event(match action {
                    PRESS => CanvasEvent::MousePress {
                        pos,
                        button,
                        modifiers,
                    },
                    RELEASE => CanvasEvent::MouseRelease {
                        pos,
                        button,
                        modifiers,
                    },
                    _ => return None,
                })
            }
            GameEvent::CursorPos { x, y } => Decoded::Event(CanvasEvent::MouseMove {
                pos: (x.round() as i32, y.round() as i32),
                modifiers: cx.live_modifiers(),
            }),
            GameEvent::Scroll { dx, dy } => Decoded::Event(CanvasEvent::MouseWheel {
                pos: cx.pointer,
                delta: (dx as f32, dy as f32),
                modifiers: cx.live_modifiers(),
            }),
            GameEvent::FramebufferSize { width, height } => Decoded::Event(CanvasEvent::Resize {
                size: (width.max(0) as u32, height.max(0) as u32),
            }),
            GameEvent::Refresh => Decoded::Event(CanvasEvent::Paint { region: None }),
            GameEvent::Close => Decoded::Event(CanvasEvent::Close),
            GameEvent::Focus(false) => Decoded::FocusLost,
            GameEvent::Focus(true) => return None,
        };
        Some(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Translator;

    fn run_with(live: Modifiers, events: Vec<GameEvent>) -> Vec<CanvasEvent> {
        let mut translator = Translator::<GameModel>::new();
        let mut out = Vec::new();
        let live = move || live;
        for event in events {
            translator.translate(event, &live, &mut out);
        }
        translator.finish(&mut out);
        out
    }

    fn key(key: i32, action: i32, mods: i32) -> GameEvent {
        GameEvent::Key {
            key,
            scancode: 9,
            action,
            mods,
        }
    }

    #[test]
    fn test_key_then_char() {
        let out = run_with(
            Modifiers::empty(),
            vec![
                key(65, PRESS, MOD_SHIFT),
                GameEvent::Char('A'),
                key(65, REPEAT, MOD_SHIFT),
                GameEvent::Char('A'),
                key(65, RELEASE, MOD_SHIFT),
            ],
        );
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
    fn test_named_keys() {
        assert_eq!(key_code_to_key(256), Some(Key::Escape));
        assert_eq!(key_code_to_key(301), Some(Key::F12));
        assert_eq!(key_code_to_key(96), Some(Key::Char('`')));
        assert_eq!(key_code_to_key(KEY_UNKNOWN), None);
        assert_eq!(key_code_to_key(348), None);
    }

    #[test]
    fn test_button_uses_cursor_position() {
        let out = run_with(
            Modifiers::empty(),
            vec![
                GameEvent::CursorPos { x: 20.2, y: 30.7 },
                GameEvent::MouseButton {
                    button: 1,
                    action: PRESS,
                    mods: MOD_CONTROL,
                },
            ],
        );
        assert_eq!(
            out[1],
            CanvasEvent::MousePress {
                pos: (20, 31),
                button: MouseButton::Right,
                modifiers: Modifiers::CONTROL,
            }
        );
    }

    #[test]
    fn test_motion_uses_live_modifiers() {
        let out = run_with(Modifiers::META, vec![GameEvent::CursorPos { x: 1.0, y: 1.0 }]);
        assert_eq!(
            out,
            vec![CanvasEvent::MouseMove {
                pos: (1, 1),
                modifiers: Modifiers::META,
            }]
        );
    }
}
