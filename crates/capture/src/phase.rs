//! Capture lifecycle phases

use std::fmt;

use crate::error::{CaptureError, Result};

/// Lifecycle phase of a capture run
///
/// `Setup -> Listening -> Draining -> Done`; a run that fails or is
/// interrupted during setup goes straight from `Setup` to `Draining`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapturePhase {
    Setup,
    Listening,
    Draining,
    Done,
}

impl CapturePhase {
    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(self, next: CapturePhase) -> bool {
        use CapturePhase::*;
        matches!(
            (self, next),
            (Setup, Listening) | (Setup, Draining) | (Listening, Draining) | (Draining, Done)
        )
    }

    /// Checked transition
    pub fn transition(self, next: CapturePhase) -> Result<CapturePhase> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CaptureError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for CapturePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CapturePhase::Setup => "SETUP",
            CapturePhase::Listening => "LISTENING",
            CapturePhase::Draining => "DRAINING",
            CapturePhase::Done => "DONE",
        };
        f.write_str(name)
    }
}
