use crate::error::Result;
use crate::run::Run;
use flickex_core::{Choice, Response, Side};
use flickex_timing::Stopwatch;
use serde::{Deserialize, Serialize};

/// Mapping from the physical choice controls to the recorded option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Direct,
    /// Left control records `Right` and vice versa (mirror stereoscope).
    #[default]
    Mirrored,
}

impl Polarity {
    pub fn choice_for(self, control: Side) -> Choice {
        match self {
            Polarity::Direct => Choice::from(control),
            Polarity::Mirrored => Choice::from(control.opposite()),
        }
    }
}

/// Level state of the response controls, sampled once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputState {
    pub start: bool,
    pub left: bool,
    pub right: bool,
}

impl InputState {
    pub fn merge(self, other: InputState) -> InputState {
        InputState {
            start: self.start || other.start,
            left: self.left || other.left,
            right: self.right || other.right,
        }
    }
}

/// Snapshot of a game controller, for backends that poll one.
///
/// The desktop app reads only the keyboard. A controller backend reports
/// its state here and feeds `InputState::from(pad)`, merged with the keys,
/// to [`ResponseController::poll`]; the A and B buttons start, the triggers
/// choose.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GamepadState {
    pub connected: bool,
    pub a: bool,
    pub b: bool,
    /// 0.0 released to 1.0 fully pulled.
    pub left_trigger: f32,
    pub right_trigger: f32,
}

impl GamepadState {
    pub const TRIGGER_THRESHOLD: f32 = 0.5;
}

impl From<GamepadState> for InputState {
    fn from(pad: GamepadState) -> Self {
        if !pad.connected {
            return InputState::default();
        }
        InputState {
            start: pad.a || pad.b,
            left: pad.left_trigger > GamepadState::TRIGGER_THRESHOLD,
            right: pad.right_trigger > GamepadState::TRIGGER_THRESHOLD,
        }
    }
}

/// Edge detector for one control: reports a press only on the
/// released-to-held transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct ButtonTracker {
    held: bool,
}

impl ButtonTracker {
    pub fn press(&mut self, down: bool) -> bool {
        let edge = down && !self.held;
        self.held = down;
        edge
    }

    pub fn is_held(&self) -> bool {
        self.held
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    Ignored,
    /// The start control opened the run (or the next session).
    Started,
    Advanced { answered: usize },
    /// The answered trial closed a session block; the run waits for start.
    SessionComplete { answered: usize, session: usize },
    RunComplete { answered: usize },
}

impl ResponseOutcome {
    /// True when a response moved the run on to another trial.
    pub fn advanced_to_next_trial(&self) -> bool {
        matches!(
            self,
            ResponseOutcome::Advanced { .. } | ResponseOutcome::SessionComplete { .. }
        )
    }

    pub fn answered(&self) -> Option<usize> {
        match *self {
            ResponseOutcome::Advanced { answered }
            | ResponseOutcome::SessionComplete { answered, .. }
            | ResponseOutcome::RunComplete { answered } => Some(answered),
            ResponseOutcome::Ignored | ResponseOutcome::Started => None,
        }
    }
}

/// Turns sampled input into responses on the run.
#[derive(Debug, Clone)]
pub struct ResponseController {
    polarity: Polarity,
    start: ButtonTracker,
    left: ButtonTracker,
    right: ButtonTracker,
    started: bool,
    stopwatch: Stopwatch,
}

impl ResponseController {
    pub fn new(polarity: Polarity) -> Self {
        Self {
            polarity,
            start: ButtonTracker::default(),
            left: ButtonTracker::default(),
            right: ButtonTracker::default(),
            started: false,
            stopwatch: Stopwatch::default(),
        }
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn stopwatch(&self) -> Stopwatch {
        self.stopwatch
    }

    pub fn poll(&mut self, input: InputState, now: u64, run: &mut Run) -> Result<ResponseOutcome> {
        // Every tracker sees every sample so holds are remembered even while
        // the input is being ignored.
        let start = self.start.press(input.start);
        let left = self.left.press(input.left);
        let right = self.right.press(input.right);

        if run.is_complete() {
            return Ok(ResponseOutcome::Ignored);
        }

        if !self.started {
            if !start {
                return Ok(ResponseOutcome::Ignored);
            }
            self.started = true;
            self.stopwatch.restart(now);
            log::info!(
                "session {}/{} started at trial {}",
                run.current_session() + 1,
                run.session_count(),
                run.current_index() + 1
            );
            return Ok(ResponseOutcome::Started);
        }

        let control = if left {
            Side::Left
        } else if right {
            Side::Right
        } else {
            return Ok(ResponseOutcome::Ignored);
        };

        let choice = self.polarity.choice_for(control);
        let duration = self.stopwatch.elapsed(now);
        let answered = run.record(Response { choice, duration })?;
        self.stopwatch.restart(now);
        log::info!(
            "trial {} answered {} after {} ms",
            answered + 1,
            choice,
            duration.as_millis()
        );

        if run.is_complete() {
            self.started = false;
            return Ok(ResponseOutcome::RunComplete { answered });
        }
        if run.is_session_start(run.current_index()) {
            self.started = false;
            return Ok(ResponseOutcome::SessionComplete {
                answered,
                session: run.session_of(answered),
            });
        }
        Ok(ResponseOutcome::Advanced { answered })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::RunSettings;
    use flickex_core::{Participant, Region, Trial, ViewingMode};
    use std::time::Duration;

    const MS: u64 = 1_000_000;

    fn run(n: usize, sessions: usize) -> Run {
        let trials = (0..n)
            .map(|i| {
                Trial::new(
                    format!("img{i}"),
                    "",
                    Region::new(0, 0, 4, 4),
                    ViewingMode::Stereo,
                    Choice::Left,
                )
            })
            .collect();
        Run::new(Participant::default(), RunSettings::default(), trials, sessions).unwrap()
    }

    const START: InputState = InputState {
        start: true,
        left: false,
        right: false,
    };
    const LEFT: InputState = InputState {
        start: false,
        left: true,
        right: false,
    };
    const RIGHT: InputState = InputState {
        start: false,
        left: false,
        right: true,
    };
    const IDLE: InputState = InputState {
        start: false,
        left: false,
        right: false,
    };

    #[test]
    fn left_press_after_1200_ms_is_recorded_on_the_first_trial() {
        let mut run = run(3, 1);
        let mut ctl = ResponseController::new(Polarity::Direct);
        assert_eq!(ctl.poll(START, 0, &mut run).unwrap(), ResponseOutcome::Started);
        ctl.poll(IDLE, MS, &mut run).unwrap();

        let outcome = ctl.poll(LEFT, 1200 * MS, &mut run).unwrap();
        assert!(outcome.advanced_to_next_trial());
        assert_eq!(outcome.answered(), Some(0));
        assert_eq!(run.current_index(), 1);

        let response = run.trials()[0].response().unwrap();
        assert_eq!(response.choice, Choice::Left);
        assert_eq!(response.duration, Duration::from_millis(1200));
    }

    #[test]
    fn mirrored_polarity_swaps_the_recorded_side() {
        let mut run = run(3, 1);
        let mut ctl = ResponseController::new(Polarity::Mirrored);
        ctl.poll(START, 0, &mut run).unwrap();
        ctl.poll(LEFT, 1200 * MS, &mut run).unwrap();
        ctl.poll(RIGHT, 2000 * MS, &mut run).unwrap();
        assert_eq!(run.trials()[0].response().unwrap().choice, Choice::Right);
        assert_eq!(run.trials()[1].response().unwrap().choice, Choice::Left);
        // The stopwatch restarted at the previous answer.
        assert_eq!(run.trials()[1].response().unwrap().duration, Duration::from_millis(800));
    }

    #[test]
    fn held_choice_is_recorded_once() {
        let mut run = run(3, 1);
        let mut ctl = ResponseController::new(Polarity::Direct);
        ctl.poll(START, 0, &mut run).unwrap();

        let outcomes: Vec<_> = (1..=30)
            .map(|frame| ctl.poll(LEFT, 1000 * MS + frame * 16 * MS, &mut run).unwrap())
            .collect();
        assert_eq!(outcomes.iter().filter(|o| o.answered().is_some()).count(), 1);
        assert_eq!(run.current_index(), 1);
        assert!(run.trials()[1].response().is_none());

        ctl.poll(IDLE, 2000 * MS, &mut run).unwrap();
        assert!(ctl.poll(LEFT, 2100 * MS, &mut run).unwrap().advanced_to_next_trial());
    }

    #[test]
    fn input_before_start_is_ignored() {
        let mut run = run(2, 1);
        let mut ctl = ResponseController::new(Polarity::Direct);
        assert_eq!(ctl.poll(LEFT, 0, &mut run).unwrap(), ResponseOutcome::Ignored);
        assert_eq!(ctl.poll(IDLE, MS, &mut run).unwrap(), ResponseOutcome::Ignored);
        assert!(!ctl.is_started());
        assert_eq!(run.current_index(), 0);
    }

    #[test]
    fn start_held_from_before_does_not_count() {
        let mut run = run(2, 1);
        let mut ctl = ResponseController::new(Polarity::Direct);
        assert_eq!(ctl.poll(START, 0, &mut run).unwrap(), ResponseOutcome::Started);
        assert_eq!(ctl.poll(IDLE, MS, &mut run).unwrap(), ResponseOutcome::Ignored);
        // A second start press does not restart the clock.
        assert_eq!(ctl.poll(START, 100 * MS, &mut run).unwrap(), ResponseOutcome::Ignored);
        ctl.poll(LEFT, 500 * MS, &mut run).unwrap();
        assert_eq!(run.trials()[0].response().unwrap().duration, Duration::from_millis(500));
    }

    #[test]
    fn session_boundary_waits_for_start_again() {
        let mut run = run(4, 2);
        let mut ctl = ResponseController::new(Polarity::Direct);
        ctl.poll(START, 0, &mut run).unwrap();
        ctl.poll(LEFT, 100 * MS, &mut run).unwrap();
        ctl.poll(IDLE, 150 * MS, &mut run).unwrap();
        let outcome = ctl.poll(RIGHT, 200 * MS, &mut run).unwrap();
        assert_eq!(outcome, ResponseOutcome::SessionComplete { answered: 1, session: 0 });
        assert!(outcome.advanced_to_next_trial());
        assert!(!ctl.is_started());

        assert_eq!(ctl.poll(LEFT, 300 * MS, &mut run).unwrap(), ResponseOutcome::Ignored);
        ctl.poll(IDLE, 350 * MS, &mut run).unwrap();
        assert_eq!(ctl.poll(START, 400 * MS, &mut run).unwrap(), ResponseOutcome::Started);
    }

    #[test]
    fn final_answer_completes_the_run() {
        let mut run = run(1, 1);
        let mut ctl = ResponseController::new(Polarity::Direct);
        ctl.poll(START, 0, &mut run).unwrap();
        let outcome = ctl.poll(RIGHT, 50 * MS, &mut run).unwrap();
        assert_eq!(outcome, ResponseOutcome::RunComplete { answered: 0 });
        assert!(!outcome.advanced_to_next_trial());
        assert!(run.is_complete());
        ctl.poll(IDLE, 60 * MS, &mut run).unwrap();
        assert_eq!(ctl.poll(START, 70 * MS, &mut run).unwrap(), ResponseOutcome::Ignored);
    }

    #[test]
    fn gamepad_maps_onto_the_same_controls() {
        let pad = GamepadState {
            connected: true,
            b: true,
            left_trigger: 0.8,
            right_trigger: 0.5,
            ..GamepadState::default()
        };
        assert_eq!(
            InputState::from(pad),
            InputState {
                start: true,
                left: true,
                right: false
            }
        );
        let unplugged = GamepadState {
            connected: false,
            ..pad
        };
        assert_eq!(InputState::from(unplugged), InputState::default());
        assert_eq!(IDLE.merge(LEFT).merge(START), InputState { start: true, left: true, right: false });
    }

    #[test]
    fn held_trigger_merged_with_keys_answers_once() {
        let mut run = run(3, 1);
        let mut ctl = ResponseController::new(Polarity::Direct);
        let mut pad = GamepadState {
            connected: true,
            a: true,
            ..GamepadState::default()
        };
        let poll = |ctl: &mut ResponseController, pad: GamepadState, t: u64, run: &mut Run| {
            ctl.poll(InputState::from(pad).merge(IDLE), t * MS, run).unwrap()
        };
        assert_eq!(poll(&mut ctl, pad, 0, &mut run), ResponseOutcome::Started);

        pad.a = false;
        pad.right_trigger = 0.9;
        assert_eq!(
            poll(&mut ctl, pad, 700, &mut run),
            ResponseOutcome::Advanced { answered: 0 }
        );
        for t in 1..20 {
            assert_eq!(poll(&mut ctl, pad, 700 + t * 10, &mut run), ResponseOutcome::Ignored);
        }
        let response = run.trials()[0].response().unwrap();
        assert_eq!(response.choice, Choice::Right);
        assert_eq!(response.duration, Duration::from_millis(700));
    }
}
