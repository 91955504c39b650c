use crate::controller::{InputState, Polarity, ResponseController, ResponseOutcome};
use crate::error::Result;
use crate::export::{ExportReport, ResultsExporter};
use crate::progress::ProgressStore;
use crate::run::Run;
use crate::scheduler::{EyeFrame, PresentationScheduler};
use flickex_cache::{ResourceCache, StaticScreens, TextureFactory};
use flickex_core::{Choice, Pair, PhaseWindows, TrialPhase};
use flickex_image::ImageLoader;
use flickex_timing::{FrameTimingStats, Timer};
use std::time::Duration;

/// Result of one pass through [`Experiment::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// A frame is due: the input was consumed and a present should follow.
    pub frame_due: bool,
    pub outcome: ResponseOutcome,
    pub phase: TrialPhase,
}

/// The whole experiment: run model, clocks, input handling, resources and
/// export, owned by the event loop and driven one tick at a time.
pub struct Experiment<T: Timer, L: ImageLoader, F: TextureFactory> {
    timer: T,
    run: Run,
    windows: PhaseWindows,
    controller: ResponseController,
    scheduler: PresentationScheduler,
    cache: ResourceCache<L, F>,
    screens: StaticScreens<F::Texture>,
    exporter: ResultsExporter,
    progress: Option<ProgressStore>,
    exports: Vec<ExportReport>,
    completed: bool,
}

impl<T: Timer, L: ImageLoader, F: TextureFactory> Experiment<T, L, F> {
    /// Loads the current trial's variants and starts both clocks.
    pub fn new(
        timer: T,
        run: Run,
        polarity: Polarity,
        mut cache: ResourceCache<L, F>,
        screens: StaticScreens<F::Texture>,
        exporter: ResultsExporter,
    ) -> Result<Self> {
        let settings = run.settings().clone();
        if let Some(trial) = run.current() {
            cache.populate(run.current_index(), trial)?;
        }
        let mut scheduler = PresentationScheduler::new(
            settings.frame_interval,
            settings.flicker_interval,
            settings.flicker,
        );
        scheduler.start(timer.now());

        log::info!(
            "run for participant {}: {} trial(s) in {} session(s), flicker {} every {} ms, \
             blank {} ms, timeout {} ms",
            run.participant().id,
            run.len(),
            run.session_count(),
            if settings.flicker { "on" } else { "off" },
            settings.flicker_interval.as_millis(),
            settings.transition.as_millis(),
            settings.timeout.as_millis()
        );

        Ok(Self {
            timer,
            windows: settings.windows(),
            completed: run.is_complete(),
            run,
            controller: ResponseController::new(polarity),
            scheduler,
            cache,
            screens,
            exporter,
            progress: None,
            exports: Vec::new(),
        })
    }

    /// Records finished sessions in `store` as they complete.
    pub fn with_progress(mut self, store: ProgressStore) -> Self {
        self.progress = Some(store);
        self
    }

    pub fn run(&self) -> &Run {
        &self.run
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn scheduler(&self) -> &PresentationScheduler {
        &self.scheduler
    }

    pub fn exports(&self) -> &[ExportReport] {
        &self.exports
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn phase(&self) -> TrialPhase {
        self.phase_at(self.timer.now())
    }

    fn phase_at(&self, now: u64) -> TrialPhase {
        if self.completed {
            return TrialPhase::Completed;
        }
        let elapsed = self.controller.stopwatch().elapsed(now);
        self.windows.phase_at(self.controller.is_started(), elapsed)
    }

    /// Time until the next frame is due.
    pub fn until_next_frame(&self) -> Duration {
        self.scheduler
            .until_frame(self.timer.now())
            .unwrap_or(Duration::ZERO)
    }

    /// Sleeps on the timer until the next frame is due, but only when that is
    /// at most `slack` away; longer waits belong to the event loop. Returns
    /// whether it slept.
    pub fn sleep_until_frame(&self, slack: Duration) -> bool {
        let wait = self.until_next_frame();
        if wait.is_zero() || wait > slack {
            return false;
        }
        self.timer.sleep(wait);
        true
    }

    /// Advances the flicker clock and, when a frame is due, polls `input`.
    ///
    /// Answers are exported when a session or the run ends.
    pub fn tick(&mut self, input: InputState) -> Result<Tick> {
        let now = self.timer.now();
        if self.completed {
            return Ok(Tick {
                frame_due: false,
                outcome: ResponseOutcome::Ignored,
                phase: TrialPhase::Completed,
            });
        }

        if !self.scheduler.tick(now).frame_due {
            return Ok(Tick {
                frame_due: false,
                outcome: ResponseOutcome::Ignored,
                phase: self.phase_at(now),
            });
        }

        let outcome = self.controller.poll(input, now, &mut self.run)?;
        let phase = match outcome {
            ResponseOutcome::Ignored => self.phase_at(now),
            ResponseOutcome::Started => {
                self.scheduler.restart_flicker(self.flicker_onset(now));
                self.phase_at(now)
            }
            ResponseOutcome::Advanced { .. } => {
                self.load_current()?;
                self.scheduler.restart_flicker(self.flicker_onset(now));
                TrialPhase::Advanced
            }
            ResponseOutcome::SessionComplete { session, .. } => {
                self.finish_session(session)?;
                self.load_current()?;
                TrialPhase::Advanced
            }
            ResponseOutcome::RunComplete { answered } => {
                let session = self.run.session_of(answered);
                self.finish_session(session)?;
                self.cache.release();
                self.completed = true;
                log::info!(
                    "run complete: {}; {} texture(s) uploaded",
                    self.run.summary(),
                    self.cache.uploads()
                );
                TrialPhase::Completed
            }
        };

        Ok(Tick {
            frame_due: true,
            outcome,
            phase,
        })
    }

    /// Content of both eye surfaces for `phase`.
    pub fn frame(&self, phase: TrialPhase) -> Result<Pair<EyeFrame<'_, F::Texture>>> {
        let index = self.run.current_index();
        let correct = self.run.current().map_or(Choice::None, |t| t.correct);
        self.scheduler
            .compose(phase, index, correct, self.cache.current(), &self.screens)
    }

    /// Puts the flicker back on the original rendition, e.g. after the
    /// presentation surfaces were recreated.
    pub fn reset_flicker(&mut self) {
        let now = self.timer.now();
        self.scheduler.restart_flicker(self.flicker_onset(now));
    }

    /// End of the current trial's blank, or `now` once it has passed.
    fn flicker_onset(&self, now: u64) -> u64 {
        let elapsed = self.controller.stopwatch().elapsed(now);
        let remaining = self.windows.transition.saturating_sub(elapsed);
        now.saturating_add(remaining.as_nanos().min(u64::MAX as u128) as u64)
    }

    pub fn record_frame(&mut self, duration: Duration) {
        self.timer.record_frame(duration);
    }

    pub fn frame_stats(&self) -> FrameTimingStats {
        self.timer.frame_stats()
    }

    fn load_current(&mut self) -> Result<()> {
        if let Some(trial) = self.run.current() {
            self.cache.populate(self.run.current_index(), trial)?;
        }
        Ok(())
    }

    fn finish_session(&mut self, session: usize) -> Result<()> {
        log::info!(
            "session {}/{} finished",
            session + 1,
            self.run.session_count()
        );
        let report = self.exporter.export(&self.run, session)?;
        if let Some(store) = &mut self.progress {
            store.mark_completed(&self.run.participant().id, session + 1)?;
        }
        self.exports.push(report);
        Ok(())
    }
}
