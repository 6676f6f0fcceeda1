//! X11 keysym table
//!
//! GDK keyvals use the same numbering, so the X11 and GTK models share it.

use crate::event::Key;

/// Look up a keysym, falling back to printable ASCII
pub fn to_key(keysym: u32) -> Option<Key> {
    let key = match keysym {
        0xffe1 | 0xffe2 => Key::Shift,
        0xffe3 | 0xffe4 => Key::Control,
        0xffe9 | 0xffea => Key::Alt,
        0xffe7 | 0xffe8 | 0xffeb | 0xffec => Key::Meta,
        0xff52 | 0xff97 => Key::Up,
        0xff54 | 0xff99 => Key::Down,
        0xff51 | 0xff96 => Key::Left,
        0xff53 | 0xff98 => Key::Right,
        0xff55 | 0xff9a => Key::PageUp,
        0xff56 | 0xff9b => Key::PageDown,
        0xff63 | 0xff9e => Key::Insert,
        0xffff | 0xff9f => Key::Delete,
        0xff50 | 0xff95 => Key::Home,
        0xff57 | 0xff9c => Key::End,
        0xff1b => Key::Escape,
        0xff08 => Key::Backspace,
        0xff0d | 0xff8d => Key::Enter,
        0xff09 | 0xfe20 => Key::Tab,
        0xffbe => Key::F1,
        0xffbf => Key::F2,
        0xffc0 => Key::F3,
        0xffc1 => Key::F4,
        0xffc2 => Key::F5,
        0xffc3 => Key::F6,
        0xffc4 => Key::F7,
        0xffc5 => Key::F8,
        0xffc6 => Key::F9,
        0xffc7 => Key::F10,
        0xffc8 => Key::F11,
        0xffc9 => Key::F12,
        other => return Key::from_ascii(other),
    };
    Some(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_keys() {
        assert_eq!(to_key(0xff1b), Some(Key::Escape));
        assert_eq!(to_key(0xff57), Some(Key::End));
        assert_eq!(to_key(0xff50), Some(Key::Home));
        assert_eq!(to_key(0xff9c), Some(Key::End));
    }

    #[test]
    fn test_letters_fold_to_upper_case() {
        assert_eq!(to_key(0x61), Some(Key::Char('A')));
        assert_eq!(to_key(0x41), Some(Key::Char('A')));
        assert_eq!(to_key(0x20), Some(Key::Space));
    }

    #[test]
    fn test_unmapped_dropped() {
        // eacute, XF86AudioMute
        assert_eq!(to_key(0xe9), None);
        assert_eq!(to_key(0x1008ff12), None);
    }
}
