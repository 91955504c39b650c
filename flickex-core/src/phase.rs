use std::time::Duration;

/// Per-trial presentation state.
///
/// `NotStarted → Blanking → Flickering → AwaitingResponseTimeout`, then
/// `Advanced` (next trial, back to `Blanking`) or `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrialPhase {
    /// Start screen until the participant presses the start control.
    NotStarted,
    /// Black screen masking the resource swap.
    Blanking,
    /// The correct side alternates original/compressed.
    Flickering,
    /// Flicker window elapsed; the response prompt is shown.
    AwaitingResponseTimeout,
    Advanced,
    Completed,
}

impl TrialPhase {
    pub fn accepts_choice(&self) -> bool {
        matches!(
            self,
            TrialPhase::Blanking | TrialPhase::Flickering | TrialPhase::AwaitingResponseTimeout
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TrialPhase::Completed)
    }
}

/// Durations splitting trial time into half-open windows:
/// `[0, transition)` blank, `[transition, transition + timeout)` flicker,
/// `[transition + timeout, ∞)` prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseWindows {
    pub transition: Duration,
    pub timeout: Duration,
}

impl PhaseWindows {
    pub fn new(transition: Duration, timeout: Duration) -> Self {
        Self {
            transition,
            timeout,
        }
    }

    pub fn prompt_at(&self) -> Duration {
        self.transition.saturating_add(self.timeout)
    }

    pub fn phase_at(&self, started: bool, elapsed: Duration) -> TrialPhase {
        if !started {
            TrialPhase::NotStarted
        } else if elapsed < self.transition {
            TrialPhase::Blanking
        } else if elapsed < self.prompt_at() {
            TrialPhase::Flickering
        } else {
            TrialPhase::AwaitingResponseTimeout
        }
    }
}
