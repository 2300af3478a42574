//! Explicit surface events.
//!
//! The host never registers native window-procedure callbacks; the
//! application shell translates whatever the windowing system delivers into
//! these events and hands them to the frame orchestrator. Anything not
//! covered here (input, focus, IME, ...) stays in the shell.

/// An event concerning the presentation surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// The surface changed size. Dimensions are in physical pixels and may
    /// be zero while minimized.
    Resized { width: u32, height: u32 },
    /// The surface should be painted.
    Redraw,
    /// The user asked to close the surface.
    CloseRequested,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_compare_by_payload() {
        assert_eq!(
            SurfaceEvent::Resized {
                width: 640,
                height: 480
            },
            SurfaceEvent::Resized {
                width: 640,
                height: 480
            }
        );
        assert_ne!(SurfaceEvent::Redraw, SurfaceEvent::CloseRequested);
    }
}
