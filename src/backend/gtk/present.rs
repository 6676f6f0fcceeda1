//! Telling swap-driven renders from real redraw requests
//!
//! A swap composites the GL area by queueing a draw, which comes back as a
//! `render` signal. Only renders the toolkit asked for on its own (expose,
//! resize, theme changes) become paint requests; the one answering a swap
//! is consumed here so that painting on `Paint` cannot feed itself.

use std::cell::Cell;
use std::rc::Rc;

use log::trace;

/// Shared between a window's render handler and its context
#[derive(Debug, Default, Clone)]
pub struct PresentGate {
    presenting: Rc<Cell<bool>>,
}

impl PresentGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// A swap queued a draw
    pub fn present(&self) {
        self.presenting.set(true);
    }

    /// Whether a `render` signal should become a paint request
    pub fn admit_render(&self) -> bool {
        if self.presenting.replace(false) {
            trace!("Render answered a swap");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_render_is_consumed() {
        let gate = PresentGate::new();
        let context_side = gate.clone();
        assert!(gate.admit_render());

        context_side.present();
        assert!(!gate.admit_render());
        // The next toolkit render is a real redraw request again
        assert!(gate.admit_render());
    }

    #[test]
    fn test_swaps_before_one_render_coalesce() {
        let gate = PresentGate::new();
        gate.present();
        gate.present();
        assert!(!gate.admit_render());
        assert!(gate.admit_render());
    }
}
