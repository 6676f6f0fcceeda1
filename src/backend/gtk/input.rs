//! GTK/GDK event model
//!
//! Keyvals share the X11 keysym table. Text comes from the input-method
//! context's commit signal, which fires while the key press is being
//! filtered and therefore usually precedes the key event in the queue.

use crate::capability::BackendFamily;
use crate::event::{CanvasEvent, MouseButton, Modifiers, Region};
use crate::input::{keysym, DecodeCx, Decoded, EventModel};

pub const SHIFT_MASK: u32 = 1 << 0;
pub const CONTROL_MASK: u32 = 1 << 2;
pub const MOD1_MASK: u32 = 1 << 3;
pub const SUPER_MASK: u32 = 1 << 26;
pub const META_MASK: u32 = 1 << 28;

/// GDK button press variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonKind {
    Press,
    DoublePress,
    TriplePress,
    Release,
}

/// GDK scroll directions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
    Smooth { dx: f64, dy: f64 },
}

/// Events collected from the GTK widget signals
#[derive(Debug, Clone, PartialEq)]
pub enum GtkEvent {
    Key {
        pressed: bool,
        keyval: u32,
        hardware_keycode: u16,
        state: u32,
    },
    /// Input-method commit
    Commit(String),
    Button {
        kind: ButtonKind,
        button: u32,
        x: f64,
        y: f64,
        state: u32,
    },
    Motion {
        x: f64,
        y: f64,
        state: u32,
    },
    Scroll {
        x: f64,
        y: f64,
        direction: ScrollDirection,
        state: u32,
    },
    /// Allocation of the drawing area changed
    Configure { width: u32, height: u32 },
    /// The GL area asked to render
    Draw { region: Option<Region> },
    /// Window delete request
    Delete,
    FocusOut,
}

/// Translate a GDK modifier mask
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
    if state & (SUPER_MASK | META_MASK) != 0 {
        mods |= Modifiers::META;
    }
    mods
}

fn position(x: f64, y: f64) -> (i32, i32) {
    (x.round() as i32, y.round() as i32)
}

/// GTK translation state
#[derive(Debug, Default)]
pub struct GtkModel;

impl EventModel for GtkModel {
    type Event = GtkEvent;

    const NAME: &'static str = "gtk";
    const FAMILY: BackendFamily = BackendFamily::Gtk;

    fn decode(&mut self, event: GtkEvent, _cx: &DecodeCx<'_>) -> Option<Decoded> {
        let decoded = match event {
            GtkEvent::Key {
                pressed: true,
                keyval,
                hardware_keycode,
                state,
            } => Decoded::KeyDown {
                code: hardware_keycode as u32,
                key: keysym::to_key(keyval),
                text: String::new(),
                modifiers: modifiers(state),
                repeat: false,
            },
            GtkEvent::Key {
                pressed: false,
                keyval,
                hardware_keycode,
                state,
            } => Decoded::KeyUp {
                code: hardware_keycode as u32,
                key: keysym::to_key(keyval),
                modifiers: modifiers(state),
            },
            GtkEvent::Commit(text) => {
                let text: String = text.chars().filter(|c| !c.is_control()).collect();
                if text.is_empty() {
                    return None;
                }
                Decoded::Text(text)
            }
            GtkEvent::Button {
                kind,
                button,
                x,
                y,
                state,
            } => {
                let button = match button {
                    1 => MouseButton::Left,
                    2 => MouseButton::Middle,
                    3 => MouseButton::Right,
                    _ => return None,
                };
                let pos = position(x, y);
                let modifiers = modifiers(state);
                Decoded::Event(match kind {
                    ButtonKind::Press => CanvasEvent::MousePress {
                        pos,
                        button,
                        modifiers,
                    },
                    ButtonKind::Release => CanvasEvent::MouseRelease {
                        pos,
                        button,
                        modifiers,
                    },
                    // GDK already sent a plain press for each click
                    ButtonKind::DoublePress | ButtonKind::TriplePress => return None,
                })
            }
            GtkEvent::Motion { x, y, state } => Decoded::Event(CanvasEvent::MouseMove {
                pos: position(x, y),
                modifiers: modifiers(state),
            }),
            GtkEvent::Scroll {
                x,
                y,
                direction,
                state,
            } => {
                let delta = match direction {
                    ScrollDirection::Up => (0.0, 1.0),
                    ScrollDirection::Down => (0.0, -1.0),
                    ScrollDirection::Left => (-1.0, 0.0),
                    ScrollDirection::Right => (1.0, 0.0),
                    ScrollDirection::Smooth { dx, dy } => (dx as f32, -dy as f32),
                };
                Decoded::Event(CanvasEvent::MouseWheel {
                    pos: position(x, y),
                    delta,
                    modifiers: modifiers(state),
                })
            }
            GtkEvent::Configure { width, height } => Decoded::Event(CanvasEvent::Resize {
                size: (width, height),
            }),
            GtkEvent::Draw { region } => Decoded::Event(CanvasEvent::Paint { region }),
            GtkEvent::Delete => Decoded::Event(CanvasEvent::Close),
            GtkEvent::FocusOut => Decoded::FocusLost,
        };
        Some(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Key;
    use crate::input::Translator;

    fn run(events: Vec<GtkEvent>) -> Vec<CanvasEvent> {
        let mut translator = Translator::<GtkModel>::new();
        let mut out = Vec::new();
        let live = || Modifiers::empty();
        for event in events {
            translator.translate(event, &live, &mut out);
        }
        translator.finish(&mut out);
        out
    }

    fn key(pressed: bool, keyval: u32, state: u32) -> GtkEvent {
        GtkEvent::Key {
            pressed,
            keyval,
            hardware_keycode: 38,
            state,
        }
    }

    #[test]
    fn test_commit_before_key_is_merged() {
        let out = run(vec![
            GtkEvent::Commit("q".into()),
            key(true, 0x71, 0),
            key(false, 0x71, 0),
        ]);
        assert_eq!(
            out,
            vec![
                CanvasEvent::KeyPress {
                    key: Some(Key::Char('Q')),
                    text: "q".into(),
                    modifiers: Modifiers::empty(),
                },
                CanvasEvent::KeyRelease {
                    key: Some(Key::Char('Q')),
                    text: "q".into(),
                    modifiers: Modifiers::empty(),
                },
            ]
        );
    }

    #[test]
    fn test_super_is_meta() {
        assert_eq!(modifiers(SUPER_MASK), Modifiers::META);
        assert_eq!(
            modifiers(MOD1_MASK | CONTROL_MASK),
            Modifiers::ALT | Modifiers::CONTROL
        );
    }

    #[test]
    fn test_double_click_is_not_a_second_press() {
        let click = |kind| GtkEvent::Button {
            kind,
            button: 1,
            x: 1.4,
            y: 2.6,
            state: 0,
        };
        let out = run(vec![
            click(ButtonKind::Press),
            click(ButtonKind::Release),
            click(ButtonKind::Press),
            click(ButtonKind::DoublePress),
            click(ButtonKind::Release),
        ]);
        let kinds: Vec<_> = out.iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec!["mouse_press", "mouse_release", "mouse_press", "mouse_release"]
        );
        assert_eq!(out[0].pointer_pos(), Some((1, 3)));
    }

    #[test]
    fn test_scroll_directions() {
        let scroll = |direction| GtkEvent::Scroll {
            x: 0.0,
            y: 0.0,
            direction,
            state: 0,
        };
        let out = run(vec![
            scroll(ScrollDirection::Up),
            scroll(ScrollDirection::Smooth { dx: 0.5, dy: 2.0 }),
        ]);
        let deltas: Vec<_> = out
            .iter()
            .filter_map(|e| match e {
                CanvasEvent::MouseWheel { delta, .. } => Some(*delta),
                _ => None,
            })
            .collect();
        assert_eq!(deltas, vec![(0.0, 1.0), (0.5, -2.0)]);
    }
}
