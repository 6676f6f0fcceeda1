//! Client-area and window-rectangle geometry
//!
//! Canvas setters and getters work in client coordinates (drawable pixels).
//! Native windows are positioned and sized by their outer rectangle, which
//! includes whatever decorations the window manager draws. `FrameExtents`
//! converts between the two and is applied in both directions so that a
//! set followed by a get never drifts.

/// Decoration thickness on each side of the client area
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameExtents {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl FrameExtents {
    /// No decorations (undecorated or fullscreen windows)
    pub const NONE: FrameExtents = FrameExtents {
        left: 0,
        top: 0,
        right: 0,
        bottom: 0,
    };

    /// Create extents from the four borders
    pub const fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Outer window size for a client size
    pub fn client_to_window(&self, width: u32, height: u32) -> (u32, u32) {
        (
            width.saturating_add(self.left + self.right),
            height.saturating_add(self.top + self.bottom),
        )
    }

    /// Client size for an outer window size
    pub fn window_to_client(&self, width: u32, height: u32) -> (u32, u32) {
        (
            width.saturating_sub(self.left + self.right),
            height.saturating_sub(self.top + self.bottom),
        )
    }

    /// Outer window origin for a client origin
    pub fn client_to_window_pos(&self, x: i32, y: i32) -> (i32, i32) {
        (
            x.saturating_sub(self.left as i32),
            y.saturating_sub(self.top as i32),
        )
    }

    /// Client origin for an outer window origin
    pub fn window_to_client_pos(&self, x: i32, y: i32) -> (i32, i32) {
        (
            x.saturating_add(self.left as i32),
            y.saturating_add(self.top as i32),
        )
    }
}

/// A display output in screen coordinates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Monitor {
    /// Output name as reported by the platform
    pub name: String,
    /// Top-left corner
    pub position: (i32, i32),
    /// Size in pixels
    pub size: (u32, u32),
}

impl Monitor {
    pub fn new(name: impl Into<String>, position: (i32, i32), size: (u32, u32)) -> Self {
        Self {
            name: name.into(),
            position,
            size,
        }
    }

    /// Whether a screen point lies on this monitor
    pub fn contains(&self, x: i32, y: i32) -> bool {
        let (mx, my) = self.position;
        x >= mx && y >= my && x < mx + self.size.0 as i32 && y < my + self.size.1 as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DECORATED: FrameExtents = FrameExtents::new(8, 31, 8, 8);

    #[test]
    fn test_client_to_window() {
        assert_eq!(DECORATED.client_to_window(800, 600), (816, 639));
        assert_eq!(DECORATED.client_to_window_pos(100, 100), (92, 69));
        assert_eq!(FrameExtents::NONE.client_to_window(640, 480), (640, 480));
    }

    #[test]
    fn test_size_round_trip() {
        for (w, h) in [(1, 1), (800, 600), (1920, 1080), (u32::MAX / 2, 7)] {
            let (ow, oh) = DECORATED.client_to_window(w, h);
            assert_eq!(DECORATED.window_to_client(ow, oh), (w, h));
        }
    }

    #[test]
    fn test_position_round_trip() {
        for (x, y) in [(0, 0), (-200, 35), (3000, -1), (i32::MIN / 2, i32::MAX / 2)] {
            let (ox, oy) = DECORATED.client_to_window_pos(x, y);
            assert_eq!(DECORATED.window_to_client_pos(ox, oy), (x, y));
        }
    }

    #[test]
    fn test_window_to_client_saturates() {
        assert_eq!(DECORATED.window_to_client(4, 4), (0, 0));
    }

    #[test]
    fn test_monitor_contains() {
        let monitor = Monitor::new("DP-1", (1920, 0), (1280, 1024));
        assert!(monitor.contains(1920, 0));
        assert!(monitor.contains(3199, 1023));
        assert!(!monitor.contains(3200, 10));
        assert!(!monitor.contains(100, 100));
    }
}
