use crate::error::{Error, Result};
use flickex_core::{Participant, PhaseWindows, Response, Trial};
use rand::Rng;
use rand::seq::SliceRandom;
use std::fmt;
use std::ops::Range;
use std::time::Duration;

/// Timing and geometry shared by every trial of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub flicker: bool,
    pub flicker_interval: Duration,
    pub frame_interval: Duration,
    /// Blank period at the start of every trial.
    pub transition: Duration,
    /// Flicker period after the blank; the prompt follows.
    pub timeout: Duration,
    /// Gap between the left and right image on one surface, in pixels.
    pub distance: u32,
}

impl RunSettings {
    pub fn windows(&self) -> PhaseWindows {
        PhaseWindows::new(self.transition, self.timeout)
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            flicker: true,
            flicker_interval: Duration::from_millis(100),
            frame_interval: Duration::from_secs_f64(1.0 / 60.0),
            transition: Duration::from_millis(500),
            timeout: Duration::from_secs(8),
            distance: 60,
        }
    }
}

/// Ordered trials for one participant, split into session blocks.
///
/// `current_index() == len()` means the run is complete; while active the
/// index always points at an existing trial.
#[derive(Debug, Clone)]
pub struct Run {
    participant: Participant,
    settings: RunSettings,
    trials: Vec<Trial>,
    sessions: Vec<Range<usize>>,
    first_session: usize,
    current: usize,
}

impl Run {
    pub fn new(
        participant: Participant,
        settings: RunSettings,
        trials: Vec<Trial>,
        sessions: usize,
    ) -> Result<Self> {
        if trials.is_empty() {
            return Err(Error::Config("a run needs at least one trial".into()));
        }
        if sessions == 0 || sessions > trials.len() {
            return Err(Error::Config(format!(
                "cannot split {} trials into {} sessions",
                trials.len(),
                sessions
            )));
        }
        let sessions = session_blocks(trials.len(), sessions);
        Ok(Self {
            participant,
            settings,
            trials,
            sessions,
            first_session: 0,
            current: 0,
        })
    }

    pub fn participant(&self) -> &Participant {
        &self.participant
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> Option<&Trial> {
        self.trials.get(self.current)
    }

    pub fn is_complete(&self) -> bool {
        self.current >= self.trials.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn session_range(&self, session: usize) -> Range<usize> {
        self.sessions.get(session).cloned().unwrap_or(0..0)
    }

    /// Session block containing trial `index`; the final index maps to the
    /// last session.
    pub fn session_of(&self, index: usize) -> usize {
        self.sessions
            .iter()
            .position(|block| block.contains(&index))
            .unwrap_or(self.sessions.len() - 1)
    }

    pub fn current_session(&self) -> usize {
        self.session_of(self.current)
    }

    /// Session this process started at; non-zero after a resume.
    pub fn first_session(&self) -> usize {
        self.first_session
    }

    pub fn is_session_start(&self, index: usize) -> bool {
        self.sessions.iter().any(|block| block.start == index)
    }

    /// Stores `response` on the current trial and moves to the next one.
    /// Returns the index of the answered trial.
    pub fn record(&mut self, response: Response) -> Result<usize> {
        let index = self.current;
        let trial = self.trials.get_mut(index).ok_or(Error::RunFinished)?;
        trial.record(response)?;
        self.current += 1;
        Ok(index)
    }

    /// Jumps to the first trial of `session`, leaving earlier trials unanswered.
    pub fn skip_to_session(&mut self, session: usize) -> Result<()> {
        let block = self.sessions.get(session).ok_or_else(|| {
            Error::Config(format!(
                "session {} does not exist ({} sessions)",
                session + 1,
                self.sessions.len()
            ))
        })?;
        self.current = block.start;
        self.first_session = session;
        Ok(())
    }

    /// Permutes trials inside each session block. Block boundaries stay put.
    pub fn shuffle_within_sessions<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for block in &self.sessions {
            self.trials[block.clone()].shuffle(rng);
        }
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            total: self.trials.len(),
            ..RunSummary::default()
        };
        let mut total_time = Duration::ZERO;
        for trial in &self.trials {
            let Some(response) = trial.response() else {
                continue;
            };
            summary.answered += 1;
            total_time += response.duration;
            summary.min = Some(summary.min.map_or(response.duration, |m| m.min(response.duration)));
            summary.max = Some(summary.max.map_or(response.duration, |m| m.max(response.duration)));
            if let Some(correct) = trial.is_correct() {
                summary.scored += 1;
                summary.correct += usize::from(correct);
            }
        }
        if summary.answered > 0 {
            summary.mean = Some(total_time / summary.answered as u32);
        }
        summary
    }
}

/// Blocks of `len / n` trials; the last block takes the remainder.
pub fn session_blocks(len: usize, n: usize) -> Vec<Range<usize>> {
    let n = n.clamp(1, len.max(1));
    let size = len / n;
    (0..n)
        .map(|i| {
            let end = if i + 1 == n { len } else { (i + 1) * size };
            i * size..end
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub total: usize,
    pub answered: usize,
    /// Answered trials that have a correct option.
    pub scored: usize,
    pub correct: usize,
    pub mean: Option<Duration>,
    pub min: Option<Duration>,
    pub max: Option<Duration>,
}

impl RunSummary {
    pub fn accuracy(&self) -> Option<f64> {
        (self.scored > 0).then(|| self.correct as f64 / self.scored as f64)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "answered {}/{}", self.answered, self.total)?;
        if let Some(acc) = self.accuracy() {
            write!(f, ", accuracy {:.1}% ({}/{})", acc * 100.0, self.correct, self.scored)?;
        }
        if let (Some(mean), Some(min), Some(max)) = (self.mean, self.min, self.max) {
            write!(
                f,
                ", response time mean {} ms (min {} ms, max {} ms)",
                mean.as_millis(),
                min.as_millis(),
                max.as_millis()
            )?;
        }
        Ok(())
    }
}
