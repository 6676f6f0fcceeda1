//! Initial window placement under a reparenting window manager
//!
//! `XMoveWindow` positions the frame once the window manager has reparented
//! the window, but the frame size is only published in
//! `_NET_FRAME_EXTENTS` after mapping. A client origin requested at creation
//! is therefore kept until the extents are known and then re-applied as an
//! outer position.

use log::debug;

use crate::geometry::FrameExtents;

/// Client origin still waiting for the frame to be known
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pending: Option<(i32, i32)>,
}

impl Placement {
    pub fn request(origin: Option<(i32, i32)>) -> Self {
        Self { pending: origin }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// An explicit move or fullscreen supersedes the request
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Outer position to move to, once `extents` have been published
    ///
    /// Zero extents settle the request without a move, since the frame
    /// origin already is the client origin.
    pub fn resolve(&mut self, extents: Option<FrameExtents>) -> Option<(i32, i32)> {
        let extents = extents?;
        let (x, y) = self.pending.take()?;
        if extents == FrameExtents::NONE {
            return None;
        }
        let outer = extents.client_to_window_pos(x, y);
        debug!("Re-placing frame at {:?} for client origin {:?}", outer, (x, y));
        Some(outer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waits_for_extents() {
        let mut placement = Placement::request(Some((100, 100)));
        assert_eq!(placement.resolve(None), None);
        assert!(placement.is_pending());

        let extents = FrameExtents::new(4, 28, 4, 4);
        let outer = placement.resolve(Some(extents)).unwrap();
        assert_eq!(outer, (96, 72));
        // The frame placed at `outer` puts the client back at the request
        assert_eq!(extents.window_to_client_pos(outer.0, outer.1), (100, 100));
        assert!(!placement.is_pending());
        assert_eq!(placement.resolve(Some(extents)), None);
    }

    #[test]
    fn test_undecorated_settles_without_move() {
        let mut placement = Placement::request(Some((10, 20)));
        assert_eq!(placement.resolve(Some(FrameExtents::NONE)), None);
        assert!(!placement.is_pending());
    }

    #[test]
    fn test_cancel_and_no_request() {
        let mut placement = Placement::request(Some((10, 20)));
        placement.cancel();
        assert_eq!(placement.resolve(Some(FrameExtents::new(1, 1, 1, 1))), None);
        assert!(!Placement::request(None).is_pending());
    }
}
