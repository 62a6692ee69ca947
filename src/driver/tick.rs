use crate::errors::BridgeError;
use crate::render::compositor::PresentOutcome;
use std::time::Duration;

/// What a single tick did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum FrameStatus {
    /// The next frame is not due yet.
    #[default]
    Waiting,
    /// A warm-up tick before the effect is initialised.
    WarmingUp,
    Drawn,
    /// The window is hidden; nothing is scheduled.
    Suspended,
    /// The backbuffer could not be allocated; the frame was skipped.
    Skipped,
    /// The effect failed to initialise and will not run.
    Failed(String),
    TornDown,
}

#[derive(Default, Debug, Clone)]
pub struct TickResult {
    pub status: FrameStatus,
    /// The effect's draw ran.
    pub drew: bool,
    /// What the compositor did with the frame, when one was drawn.
    pub outcome: Option<PresentOutcome>,
    /// Set on the frame where presentation was given up for the session.
    pub backend_error: Option<BridgeError>,
    /// Time until the next frame is due.
    pub next_tick_in: Option<Duration>,
}

impl TickResult {
    pub(crate) fn idle(status: FrameStatus) -> Self {
        Self { status, ..Self::default() }
    }

    pub fn presented(&self) -> bool {
        self.outcome.as_ref().is_some_and(PresentOutcome::presented)
    }
}
