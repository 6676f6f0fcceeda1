//! Win32 message model
//!
//! Keys arrive as virtual-key codes with the repeat flag in lParam bit 30;
//! text follows separately as `WM_CHAR` UTF-16 units. Message payloads do
//! not carry ALT or the Windows keys for mouse events, so those are read
//! from the live keyboard state.

use crate::capability::BackendFamily;
use crate::event::{CanvasEvent, Key, MouseButton, Modifiers};
use crate::input::{DecodeCx, Decoded, EventModel};

pub const WM_SIZE: u32 = 0x0005;
pub const WM_PAINT: u32 = 0x000F;
pub const WM_KILLFOCUS: u32 = 0x0008;
pub const WM_CLOSE: u32 = 0x0010;
pub const WM_KEYDOWN: u32 = 0x0100;
pub const WM_KEYUP: u32 = 0x0101;
pub const WM_CHAR: u32 = 0x0102;
pub const WM_SYSKEYDOWN: u32 = 0x0104;
pub const WM_SYSKEYUP: u32 = 0x0105;
pub const WM_MOUSEMOVE: u32 = 0x0200;
pub const WM_LBUTTONDOWN: u32 = 0x0201;
pub const WM_LBUTTONUP: u32 = 0x0202;
pub const WM_RBUTTONDOWN: u32 = 0x0204;
pub const WM_RBUTTONUP: u32 = 0x0205;
pub const WM_MBUTTONDOWN: u32 = 0x0207;
pub const WM_MBUTTONUP: u32 = 0x0208;
pub const WM_MOUSEWHEEL: u32 = 0x020A;
pub const WM_MOUSEHWHEEL: u32 = 0x020E;

pub const SIZE_MINIMIZED: usize = 1;
pub const MK_SHIFT: usize = 0x0004;
pub const MK_CONTROL: usize = 0x0008;
pub const WHEEL_DELTA: f32 = 120.0;

/// One window message as seen by the window procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Win32Message {
    pub msg: u32,
    pub wparam: usize,
    pub lparam: isize,
}

impl Win32Message {
    pub fn new(msg: u32, wparam: usize, lparam: isize) -> Self {
        Self {
            msg,
            wparam,
            lparam,
        }
    }

    fn loword(&self) -> u32 {
        (self.lparam as usize & 0xffff) as u32
    }

    fn hiword(&self) -> u32 {
        ((self.lparam as usize >> 16) & 0xffff) as u32
    }

    /// Signed client coordinates packed in lParam
    fn point(&self) -> (i32, i32) {
        (self.loword() as u16 as i16 as i32, self.hiword() as u16 as i16 as i32)
    }

    fn is_repeat(&self) -> bool {
        self.lparam & (1 << 30) != 0
    }

    fn alt_down(&self) -> bool {
        self.lparam & (1 << 29) != 0
    }
}

/// Pack a client size or point the way Win32 does
pub fn make_lparam(lo: i32, hi: i32) -> isize {
    (((hi as u32 & 0xffff) << 16) | (lo as u32 & 0xffff)) as i32 as isize
}

/// Look up a virtual-key code
pub fn vk_to_key(vk: u32) -> Option<Key> {
    let key = match vk {
        0x10 | 0xa0 | 0xa1 => Key::Shift,
        0x11 | 0xa2 | 0xa3 => Key::Control,
        0x12 | 0xa4 | 0xa5 => Key::Alt,
        0x5b | 0x5c => Key::Meta,
        0x25 => Key::Left,
        0x26 => Key::Up,
        0x27 => Key::Right,
        0x28 => Key::Down,
        0x21 => Key::PageUp,
        0x22 => Key::PageDown,
        0x23 => Key::End,
        0x24 => Key::Home,
        0x2d => Key::Insert,
        0x2e => Key::Delete,
        0x1b => Key::Escape,
        0x08 => Key::Backspace,
        0x20 => Key::Space,
        0x0d => Key::Enter,
        0x09 => Key::Tab,
        0x70 => Key::F1,
        0x71 => Key::F2,
        0x72 => Key::F3,
        0x73 => Key::F4,
        0x74 => Key::F5,
        0x75 => Key::F6,
        0x76 => Key::F7,
        0x77 => Key::F8,
        0x78 => Key::F9,
        0x79 => Key::F10,
        0x7a => Key::F11,
        0x7b => Key::F12,
        // Numpad digits
        0x60..=0x69 => Key::Char(char::from(b'0' + (vk - 0x60) as u8)),
        // US layout punctuation
        0xba => Key::Char(';'),
        0xbb => Key::Char('='),
        0xbc => Key::Char(','),
        0xbd => Key::Char('-'),
        0xbe => Key::Char('.'),
        0xbf => Key::Char('/'),
        0xc0 => Key::Char('`'),
        0xdb => Key::Char('['),
        0xdc => Key::Char('\\'),
        0xdd => Key::Char(']'),
        0xde => Key::Char('\''),
        // Virtual-key codes of letters and digits are their ASCII codes
        0x30..=0x39 | 0x41..=0x5a => return Key::from_ascii(vk),
        _ => return None,
    };
    Some(key)
}

/// Win32 translation state
#[derive(Debug, Default)]
pub struct Win32Model {
    /// First half of a surrogate pair from `WM_CHAR`
    high_surrogate: Option<u16>,
}

impl Win32Model {
    fn mouse_modifiers(wparam: usize, cx: &DecodeCx<'_>) -> Modifiers {
        let mut mods = cx.live_modifiers() & (Modifiers::ALT | Modifiers::META);
        if wparam & MK_SHIFT != 0 {
            mods |= Modifiers::SHIFT;
        }
        if wparam & MK_CONTROL != 0 {
            mods |= Modifiers::CONTROL;
        }
        mods
    }

    fn char_text(&mut self, unit: u16) -> Option<String> {
        match unit {
            0xd800..=0xdbff => {
                self.high_surrogate = Some(unit);
                None
            }
            0xdc00..=0xdfff => {
                let high = self.high_surrogate.take()?;
                String::from_utf16(&[high, unit]).ok()
            }
            _ => {
                self.high_surrogate = None;
                let c = char::from_u32(unit as u32)?;
                (!c.is_control()).then(|| c.to_string())
            }
        }
    }
}

impl EventModel for Win32Model {
    type Event = Win32Message;

    const NAME: &'static str = "win32";
    const FAMILY: BackendFamily = BackendFamily::Native;

    fn decode(&mut self, m: Win32Message, cx: &DecodeCx<'_>) -> Option<Decoded> {
        let mouse = |button: MouseButton, pressed: bool| {
            let pos = m.point();
            let modifiers = Self::mouse_modifiers(m.wparam, cx);
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
        };

        let decoded = match m.msg {
            WM_KEYDOWN | WM_SYSKEYDOWN => {
                let vk = m.wparam as u32;
                let mut modifiers = cx.live_modifiers();
                if m.msg == WM_SYSKEYDOWN && m.alt_down() {
                    modifiers |= Modifiers::ALT;
                }
                Decoded::KeyDown {
                    code: vk,
                    key: vk_to_key(vk),
                    text: String::new(),
                    modifiers,
                    repeat: m.is_repeat(),
                }
            }
            WM_KEYUP | WM_SYSKEYUP => {
                let vk = m.wparam as u32;
                Decoded::KeyUp {
                    code: vk,
                    key: vk_to_key(vk),
                    modifiers: cx.live_modifiers(),
                }
            }
            WM_CHAR => Decoded::Text(self.char_text(m.wparam as u16)?),
            WM_MOUSEMOVE => Decoded::Event(CanvasEvent::MouseMove {
                pos: m.point(),
                modifiers: Self::mouse_modifiers(m.wparam, cx),
            }),
            WM_LBUTTONDOWN => mouse(MouseButton::Left, true),
            WM_LBUTTONUP => mouse(MouseButton::Left, false),
            WM_RBUTTONDOWN => mouse(MouseButton::Right, true),
            WM_RBUTTONUP => mouse(MouseButton::Right, false),
            WM_MBUTTONDOWN => mouse(MouseButton::Middle, true),
            WM_MBUTTONUP => mouse(MouseButton::Middle, false),
            WM_MOUSEWHEEL | WM_MOUSEHWHEEL => {
                // lParam holds screen coordinates; report the last client position
                let steps = ((m.wparam >> 16) & 0xffff) as u16 as i16 as f32 / WHEEL_DELTA;
                let delta = if m.msg == WM_MOUSEWHEEL {
                    (0.0, steps)
                } else {
                    (steps, 0.0)
                };
                Decoded::Event(CanvasEvent::MouseWheel {
                    pos: cx.pointer,
                    delta,
                    modifiers: Self::mouse_modifiers(m.wparam & 0xffff, cx),
                })
            }
            WM_SIZE => {
                if m.wparam == SIZE_MINIMIZED {
                    return None;
                }
                Decoded::Event(CanvasEvent::Resize {
                    size: (m.loword(), m.hiword()),
                })
            }
            WM_PAINT => Decoded::Event(CanvasEvent::Paint { region: None }),
            WM_CLOSE => Decoded::Event(CanvasEvent::Close),
            WM_KILLFOCUS => Decoded::FocusLost,
            _ => return None,
        };
        Some(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Translator;

    fn run_with(live: Modifiers, messages: Vec<Win32Message>) -> Vec<CanvasEvent> {
        let mut translator = Translator::<Win32Model>::new();
        let mut out = Vec::new();
        let live = move || live;
        for message in messages {
            translator.translate(message, &live, &mut out);
        }
        translator.finish(&mut out);
        out
    }

    fn run(messages: Vec<Win32Message>) -> Vec<CanvasEvent> {
        run_with(Modifiers::empty(), messages)
    }

    const REPEAT: isize = 1 << 30;

    #[test]
    fn test_keydown_merges_with_char() {
        let out = run(vec![
            Win32Message::new(WM_KEYDOWN, 0x41, 1),
            Win32Message::new(WM_CHAR, 'a' as usize, 1),
            Win32Message::new(WM_KEYUP, 0x41, 1),
        ]);
        assert_eq!(
            out,
            vec![
                CanvasEvent::KeyPress {
                    key: Some(Key::Char('A')),
                    text: "a".into(),
                    modifiers: Modifiers::empty(),
                },
                CanvasEvent::KeyRelease {
                    key: Some(Key::Char('A')),
                    text: "a".into(),
                    modifiers: Modifiers::empty(),
                },
            ]
        );
    }

    #[test]
    fn test_repeat_flag_filters() {
        let out = run(vec![
            Win32Message::new(WM_KEYDOWN, 0x41, 1),
            Win32Message::new(WM_CHAR, 'a' as usize, 1),
            Win32Message::new(WM_KEYDOWN, 0x41, 1 | REPEAT),
            Win32Message::new(WM_CHAR, 'a' as usize, 1 | REPEAT),
        ]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_control_chars_are_not_text() {
        let out = run(vec![
            Win32Message::new(WM_KEYDOWN, 0x1b, 1),
            Win32Message::new(WM_CHAR, 0x1b, 1),
        ]);
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
    fn test_surrogate_pair_text() {
        let mut units = [0u16; 2];
        '😀'.encode_utf16(&mut units);
        let out = run(vec![
            Win32Message::new(WM_CHAR, units[0] as usize, 1),
            Win32Message::new(WM_CHAR, units[1] as usize, 1),
        ]);
        assert_eq!(
            out,
            vec![CanvasEvent::KeyPress {
                key: None,
                text: "😀".into(),
                modifiers: Modifiers::empty(),
            }]
        );
    }

    #[test]
    fn test_mouse_modifiers_mix_payload_and_live_state() {
        let out = run_with(
            Modifiers::ALT | Modifiers::SHIFT,
            vec![Win32Message::new(
                WM_LBUTTONDOWN,
                MK_CONTROL,
                make_lparam(12, -3),
            )],
        );
        assert_eq!(
            out,
            vec![CanvasEvent::MousePress {
                pos: (12, -3),
                button: MouseButton::Left,
                modifiers: Modifiers::ALT | Modifiers::CONTROL,
            }]
        );
    }

    #[test]
    fn test_wheel_uses_last_pointer_position() {
        let out = run(vec![
            Win32Message::new(WM_MOUSEMOVE, 0, make_lparam(40, 50)),
            Win32Message::new(WM_MOUSEWHEEL, (-240i32 as u32 as usize & 0xffff) << 16, make_lparam(900, 900)),
        ]);
        assert_eq!(
            out[1],
            CanvasEvent::MouseWheel {
                pos: (40, 50),
                delta: (0.0, -2.0),
                modifiers: Modifiers::empty(),
            }
        );
    }

    #[test]
    fn test_size_and_minimize() {
        let out = run(vec![
            Win32Message::new(WM_SIZE, 0, make_lparam(800, 600)),
            Win32Message::new(WM_SIZE, SIZE_MINIMIZED, 0),
            Win32Message::new(WM_PAINT, 0, 0),
            Win32Message::new(WM_CLOSE, 0, 0),
        ]);
        assert_eq!(
            out,
            vec![
                CanvasEvent::Resize { size: (800, 600) },
                CanvasEvent::Paint { region: None },
                CanvasEvent::Close,
            ]
        );
    }

    #[test]
    fn test_vk_table() {
        assert_eq!(vk_to_key(0x1b), Some(Key::Escape));
        assert_eq!(vk_to_key(0x35), Some(Key::Char('5')));
        assert_eq!(vk_to_key(0x63), Some(Key::Char('3')));
        assert_eq!(vk_to_key(0x2c), None);
    }
}
