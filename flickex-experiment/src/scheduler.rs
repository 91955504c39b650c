use crate::error::{Error, Result};
use flickex_cache::{StaticScreens, Variant, VariantSet};
use flickex_core::{Choice, Eye, Pair, TrialPhase};
use flickex_timing::IntervalClock;
use std::time::Duration;

/// Renditions for the two sides of one surface: only the side holding the
/// correct option alternates, the other stays on its original.
pub fn select_pair(correct: Choice, showing_compressed: bool) -> Pair<Variant> {
    let mut pair = Pair::splat(Variant::Original);
    if let (Some(side), true) = (correct.side(), showing_compressed) {
        pair[side] = Variant::Compressed;
    }
    pair
}

/// What one eye surface shows this frame.
#[derive(Debug)]
pub enum EyeFrame<'a, X> {
    Blank,
    /// Full-surface instruction screen.
    Full(&'a X),
    /// Side-by-side stimulus, indexed by side.
    Stimulus(Pair<&'a X>),
}

impl<X> EyeFrame<'_, X> {
    pub fn is_blank(&self) -> bool {
        matches!(self, EyeFrame::Blank)
    }
}

/// Original/compressed toggle per eye surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlickerState {
    compressed: Pair<bool>,
}

impl FlickerState {
    pub fn flip(&mut self) {
        for state in self.compressed.iter_mut() {
            *state = !*state;
        }
    }

    pub fn reset(&mut self) {
        self.compressed = Pair::splat(false);
    }

    pub fn showing_compressed(&self, eye: Eye) -> bool {
        self.compressed[eye]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedulerTick {
    /// Whole flicker intervals that elapsed since the previous tick.
    pub flicker_steps: u64,
    pub frame_due: bool,
}

/// Frame clock and flicker clock, polled from the event loop.
#[derive(Debug, Clone)]
pub struct PresentationScheduler {
    frame_clock: IntervalClock,
    flicker_clock: IntervalClock,
    flicker: FlickerState,
    flicker_enabled: bool,
    frames: u64,
    missed_frames: u64,
}

impl PresentationScheduler {
    pub fn new(frame_interval: Duration, flicker_interval: Duration, flicker_enabled: bool) -> Self {
        Self {
            frame_clock: IntervalClock::new(frame_interval),
            flicker_clock: IntervalClock::new(flicker_interval),
            flicker: FlickerState::default(),
            flicker_enabled,
            frames: 0,
            missed_frames: 0,
        }
    }

    pub fn start(&mut self, now: u64) {
        self.frame_clock.start(now);
        self.restart_flicker(now);
    }

    /// Back to the original rendition, with the flicker grid anchored at
    /// `onset`. The first flip is due one flicker interval after `onset`,
    /// which may still lie ahead of the clock.
    pub fn restart_flicker(&mut self, onset: u64) {
        self.flicker.reset();
        if self.flicker_enabled {
            self.flicker_clock.start(onset);
        }
    }

    /// Runs the flicker clock, then the frame clock.
    pub fn tick(&mut self, now: u64) -> SchedulerTick {
        let flicker_steps = self.flicker_clock.tick(now);
        // An even number of late steps lands back on the same rendition.
        if flicker_steps % 2 == 1 {
            self.flicker.flip();
        }
        let frame_steps = self.frame_clock.tick(now);
        if frame_steps > 0 {
            self.frames += 1;
            self.missed_frames += frame_steps - 1;
        }
        SchedulerTick {
            flicker_steps,
            frame_due: frame_steps > 0,
        }
    }

    pub fn flicker(&self) -> &FlickerState {
        &self.flicker
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_clock.interval()
    }

    pub fn until_frame(&self, now: u64) -> Option<Duration> {
        self.frame_clock.until_due(now)
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Frame intervals that passed without being polled.
    pub fn missed_frames(&self) -> u64 {
        self.missed_frames
    }

    /// Picks the content of both eye surfaces for `phase`.
    ///
    /// The flicker regime needs the variant set of `trial`; a missing or
    /// stale set is an error rather than an empty frame.
    pub fn compose<'a, X>(
        &self,
        phase: TrialPhase,
        trial: usize,
        correct: Choice,
        set: Option<&'a VariantSet<X>>,
        screens: &'a StaticScreens<X>,
    ) -> Result<Pair<EyeFrame<'a, X>>> {
        let frames = match phase {
            TrialPhase::NotStarted => Pair::new(
                EyeFrame::Full(&screens.start.left),
                EyeFrame::Full(&screens.start.right),
            ),
            TrialPhase::AwaitingResponseTimeout => Pair::new(
                EyeFrame::Full(&screens.prompt.left),
                EyeFrame::Full(&screens.prompt.right),
            ),
            TrialPhase::Blanking | TrialPhase::Advanced | TrialPhase::Completed => {
                Pair::new(EyeFrame::Blank, EyeFrame::Blank)
            }
            TrialPhase::Flickering => {
                let set = set
                    .filter(|s| s.trial_index() == trial)
                    .ok_or(Error::MissingResources(trial))?;
                let eye_frame = move |eye: Eye| {
                    let variants = select_pair(correct, self.flicker.showing_compressed(eye));
                    EyeFrame::Stimulus(Pair::new(
                        set.texture(eye, variants.left),
                        set.texture(eye, variants.right),
                    ))
                };
                Pair::new(eye_frame(Eye::Left), eye_frame(Eye::Right))
            }
        };
        Ok(frames)
    }
}
