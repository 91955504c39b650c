use flickex_cache::{ResourceCache, StaticScreens, StimulusLayout, TextureFactory, UploadError};
use flickex_core::{Choice, Pair, Participant, Region, Trial, TrialPhase, ViewingMode};
use flickex_experiment::{
    Error, EyeFrame, Experiment, InputState, OutputConfig, OutputMode, Polarity, ProgressStore,
    ResponseOutcome, ResultsExporter, Run, RunSettings,
};
use flickex_image::{ImageError, ImageLoader, PixelBuffer};
use flickex_timing::ManualTimer;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

type Seen = Rc<RefCell<Vec<PathBuf>>>;

/// Hands out 1x1 buffers tagged with the index of the requested path.
struct TagLoader {
    seen: Seen,
}

impl ImageLoader for TagLoader {
    fn load(&self, path: &Path, _crop: Option<Region>) -> flickex_image::Result<PixelBuffer> {
        if path.to_string_lossy().contains("missing") {
            return Err(ImageError::NotAFile(path.to_path_buf()));
        }
        let mut seen = self.seen.borrow_mut();
        seen.push(path.to_path_buf());
        let tag = (seen.len() - 1) as u16;
        PixelBuffer::from_rgba(1, 1, vec![tag, 0, 0, u16::MAX])
    }
}

/// Textures are the file names they were loaded from.
struct NameFactory {
    seen: Seen,
}

impl TextureFactory for NameFactory {
    type Texture = String;

    fn upload(&mut self, buffer: &PixelBuffer) -> Result<String, UploadError> {
        let tag = buffer.pixel(0, 0)[0] as usize;
        let seen = self.seen.borrow();
        let path = seen
            .get(tag)
            .ok_or_else(|| UploadError(format!("unknown tag {tag}")))?;
        Ok(path.file_name().unwrap_or_default().to_string_lossy().into_owned())
    }
}

const FRAME_MS: u64 = 10;

const IDLE: InputState = InputState {
    start: false,
    left: false,
    right: false,
};
const START: InputState = InputState {
    start: true,
    ..IDLE
};
const LEFT: InputState = InputState { left: true, ..IDLE };
const RIGHT: InputState = InputState {
    right: true,
    ..IDLE
};

type TestExperiment = Experiment<ManualTimer, TagLoader, NameFactory>;

struct Fixture {
    timer: ManualTimer,
    seen: Seen,
    dir: PathBuf,
}

impl Fixture {
    fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("flickex-it-{}-{}", std::process::id(), name));
        std::fs::remove_dir_all(&dir).ok();
        Self {
            timer: ManualTimer::new(),
            seen: Rc::default(),
            dir,
        }
    }

    fn run(&self, images: &[(&str, Choice)], sessions: usize) -> Run {
        let trials = images
            .iter()
            .map(|&(image, correct)| {
                Trial::new(image, "DSC_8bpp", Region::new(0, 0, 1, 1), ViewingMode::Stereo, correct)
            })
            .collect();
        let settings = RunSettings {
            flicker: true,
            flicker_interval: Duration::from_millis(500),
            frame_interval: Duration::from_millis(FRAME_MS),
            transition: Duration::from_millis(500),
            timeout: Duration::from_secs(8),
            distance: 60,
        };
        let participant = Participant {
            id: "12".into(),
            ..Participant::default()
        };
        Run::new(participant, settings, trials, sessions).unwrap()
    }

    fn experiment(&self, run: Run, mode: OutputMode) -> flickex_experiment::Result<TestExperiment> {
        let cache = ResourceCache::new(
            TagLoader {
                seen: Rc::clone(&self.seen),
            },
            NameFactory {
                seen: Rc::clone(&self.seen),
            },
            StimulusLayout::new("stimuli", "ppm"),
            true,
        );
        let screens = StaticScreens {
            start: Pair::new("start_L".to_string(), "start_R".to_string()),
            prompt: Pair::new("prompt_L".to_string(), "prompt_R".to_string()),
        };
        let exporter = ResultsExporter::new(OutputConfig {
            mode,
            directory: self.dir.clone(),
            delimiter: ',',
        });
        Experiment::new(self.timer.clone(), run, Polarity::Direct, cache, screens, exporter)
    }

    /// Advances one frame and feeds `input`.
    fn step(&self, exp: &mut TestExperiment, input: InputState) -> flickex_experiment::Tick {
        self.timer.advance_ms(FRAME_MS);
        let tick = exp.tick(input).unwrap();
        assert!(tick.frame_due);
        tick
    }

    fn idle(&self, exp: &mut TestExperiment, frames: usize) -> flickex_experiment::Tick {
        let mut last = None;
        for _ in 0..frames {
            last = Some(self.step(exp, IDLE));
        }
        last.unwrap()
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.dir).ok();
    }
}

fn stimulus(frame: &EyeFrame<'_, String>) -> (String, String) {
    match frame {
        EyeFrame::Stimulus(pair) => (pair.left.clone(), pair.right.clone()),
        _ => panic!("expected a stimulus frame"),
    }
}

#[test]
fn two_trial_run_end_to_end() {
    let fx = Fixture::new("e2e");
    let run = fx.run(&[("red", Choice::Left), ("blue", Choice::Right)], 1);
    let mut exp = fx.experiment(run, OutputMode::Cumulative).unwrap();
    assert_eq!(exp.phase(), TrialPhase::NotStarted);
    assert_eq!(fx.seen.borrow().len(), 4);

    let frame = exp.frame(exp.phase()).unwrap();
    assert!(matches!(frame.left, EyeFrame::Full(s) if s == "start_L"));

    let tick = fx.step(&mut exp, START);
    assert_eq!(tick.outcome, ResponseOutcome::Started);
    assert_eq!(tick.phase, TrialPhase::Blanking);

    assert_eq!(fx.idle(&mut exp, 20).phase, TrialPhase::Blanking); // 200 ms
    assert_eq!(fx.idle(&mut exp, 280).phase, TrialPhase::Flickering); // 3 s
    assert_eq!(fx.idle(&mut exp, 600).phase, TrialPhase::AwaitingResponseTimeout); // 9 s
    let frame = exp.frame(TrialPhase::AwaitingResponseTimeout).unwrap();
    assert!(matches!(frame.right, EyeFrame::Full(s) if s == "prompt_R"));

    let tick = fx.step(&mut exp, LEFT);
    assert_eq!(tick.outcome, ResponseOutcome::Advanced { answered: 0 });
    assert!(tick.outcome.advanced_to_next_trial());
    assert_eq!(exp.run().current_index(), 1);
    assert_eq!(fx.seen.borrow().len(), 8);
    let response = *exp.run().trials()[0].response().unwrap();
    assert_eq!(response.choice, Choice::Left);
    assert_eq!(response.duration, Duration::from_millis(9010));

    assert_eq!(fx.idle(&mut exp, 1).phase, TrialPhase::Blanking);
    let tick = fx.step(&mut exp, RIGHT);
    assert_eq!(tick.outcome, ResponseOutcome::RunComplete { answered: 1 });
    assert_eq!(tick.phase, TrialPhase::Completed);
    assert!(exp.is_complete());
    assert_eq!(exp.run().trials()[1].is_correct(), Some(true));

    let report = &exp.exports()[0];
    assert_eq!(report.path, fx.dir.join("result12.csv"));
    assert_eq!(report.lines, 2);
    let text = std::fs::read_to_string(&report.path).unwrap();
    assert_eq!(text.lines().count(), 3);
    assert!(text.lines().nth(1).unwrap().contains("DSC_8bpp/red,Left"));

    fx.timer.advance_ms(FRAME_MS);
    let tick = exp.tick(LEFT).unwrap();
    assert!(!tick.frame_due);
    assert_eq!(tick.phase, TrialPhase::Completed);
}

#[test]
fn only_the_correct_side_flickers() {
    let fx = Fixture::new("flicker");
    let run = fx.run(&[("red", Choice::Right)], 1);
    let mut exp = fx.experiment(run, OutputMode::Cumulative).unwrap();
    fx.step(&mut exp, START);
    assert_eq!(fx.idle(&mut exp, 49).phase, TrialPhase::Blanking);

    let mut right_side = Vec::new();
    for _ in 0..251 {
        let tick = fx.step(&mut exp, IDLE);
        assert_eq!(tick.phase, TrialPhase::Flickering);
        let frame = exp.frame(tick.phase).unwrap();
        let (l_eye_left, l_eye_right) = stimulus(&frame.left);
        let (r_eye_left, r_eye_right) = stimulus(&frame.right);
        assert_eq!(l_eye_left, "red_L_orig.ppm");
        assert_eq!(r_eye_left, "red_R_orig.ppm");
        assert_eq!(l_eye_right.replace("_L_", "_R_"), r_eye_right);
        right_side.push(l_eye_right);
    }
    // The flicker starts on the original, one full interval before the
    // first switch.
    assert!(right_side[..50].iter().all(|s| s == "red_L_orig.ppm"));
    assert_eq!(right_side[50], "red_L_dec.ppm");
    // 500 ms flicker at 10 ms frames: runs of 50 identical frames.
    let switches = right_side.windows(2).filter(|w| w[0] != w[1]).count();
    assert_eq!(switches, 5);
}

#[test]
fn flicker_restarts_on_the_original_after_each_blank() {
    let fx = Fixture::new("onset");
    let run = fx.run(&[("a", Choice::Right), ("b", Choice::Right)], 1);
    let mut exp = fx.experiment(run, OutputMode::Cumulative).unwrap();
    fx.step(&mut exp, START);
    fx.idle(&mut exp, 52);
    let tick = fx.step(&mut exp, RIGHT);
    assert_eq!(tick.outcome, ResponseOutcome::Advanced { answered: 0 });

    assert_eq!(fx.idle(&mut exp, 49).phase, TrialPhase::Blanking);
    for frame in 0..50 {
        let tick = fx.step(&mut exp, IDLE);
        assert_eq!(tick.phase, TrialPhase::Flickering);
        let (_, right) = stimulus(&exp.frame(tick.phase).unwrap().left);
        assert_eq!(right, "b_L_orig.ppm", "frame {frame} of the flicker");
    }
    let tick = fx.step(&mut exp, IDLE);
    let (_, right) = stimulus(&exp.frame(tick.phase).unwrap().left);
    assert_eq!(right, "b_L_dec.ppm");
}

#[test]
fn held_key_answers_once() {
    let fx = Fixture::new("debounce");
    let run = fx.run(&[("a", Choice::Left), ("b", Choice::Left), ("c", Choice::Left)], 1);
    let mut exp = fx.experiment(run, OutputMode::Cumulative).unwrap();
    fx.step(&mut exp, START);
    fx.idle(&mut exp, 10);

    let answered = (0..40)
        .filter(|_| fx.step(&mut exp, LEFT).outcome.answered().is_some())
        .count();
    assert_eq!(answered, 1);
    assert_eq!(exp.run().current_index(), 1);
}

#[test]
fn sessions_export_and_wait_for_start() {
    let fx = Fixture::new("sessions");
    let run = fx.run(
        &[("a", Choice::Left), ("b", Choice::Right), ("c", Choice::Left), ("d", Choice::Right)],
        2,
    );
    let store = ProgressStore::in_directory(&fx.dir).unwrap();
    let mut exp = fx
        .experiment(run, OutputMode::PerSession)
        .unwrap()
        .with_progress(store);

    fx.step(&mut exp, START);
    fx.step(&mut exp, LEFT);
    fx.step(&mut exp, IDLE);
    let tick = fx.step(&mut exp, RIGHT);
    assert_eq!(tick.outcome, ResponseOutcome::SessionComplete { answered: 1, session: 0 });
    assert_eq!(exp.exports()[0].path, fx.dir.join("result12_session1.csv"));
    assert_eq!(exp.exports()[0].lines, 2);
    assert_eq!(ProgressStore::in_directory(&fx.dir).unwrap().completed_sessions("12"), 1);

    assert_eq!(fx.step(&mut exp, IDLE).phase, TrialPhase::NotStarted);
    assert_eq!(fx.step(&mut exp, LEFT).outcome, ResponseOutcome::Ignored);
    fx.step(&mut exp, IDLE);
    assert_eq!(fx.step(&mut exp, START).outcome, ResponseOutcome::Started);
    fx.step(&mut exp, LEFT);
    fx.step(&mut exp, IDLE);
    assert_eq!(
        fx.step(&mut exp, LEFT).outcome,
        ResponseOutcome::RunComplete { answered: 3 }
    );
    assert_eq!(exp.exports()[1].path, fx.dir.join("result12_session2.csv"));
    assert_eq!(exp.exports()[1].lines, 2);
    assert_eq!(ProgressStore::in_directory(&fx.dir).unwrap().completed_sessions("12"), 2);
}

#[test]
fn resumed_run_keeps_earlier_sessions_in_the_cumulative_file() {
    let fx = Fixture::new("resume");
    let images = [("a", Choice::Left), ("b", Choice::Right), ("c", Choice::Left), ("d", Choice::Right)];
    let store = ProgressStore::in_directory(&fx.dir).unwrap();
    let mut exp = fx
        .experiment(fx.run(&images, 2), OutputMode::Cumulative)
        .unwrap()
        .with_progress(store);
    fx.step(&mut exp, START);
    fx.step(&mut exp, LEFT);
    fx.step(&mut exp, IDLE);
    let tick = fx.step(&mut exp, RIGHT);
    assert_eq!(tick.outcome, ResponseOutcome::SessionComplete { answered: 1, session: 0 });
    drop(exp);

    let store = ProgressStore::in_directory(&fx.dir).unwrap();
    let mut run = fx.run(&images, 2);
    assert_eq!(store.resume(&mut run).unwrap(), 1);
    let mut exp = fx
        .experiment(run, OutputMode::Cumulative)
        .unwrap()
        .with_progress(store);
    fx.step(&mut exp, START);
    fx.step(&mut exp, LEFT);
    fx.step(&mut exp, IDLE);
    assert_eq!(
        fx.step(&mut exp, RIGHT).outcome,
        ResponseOutcome::RunComplete { answered: 3 }
    );

    let report = &exp.exports()[0];
    assert_eq!(report.path, fx.dir.join("result12.csv"));
    assert_eq!(report.lines, 4);
    let text = std::fs::read_to_string(&report.path).unwrap();
    let images: Vec<&str> = text
        .lines()
        .skip(1)
        .filter_map(|line| line.split(',').nth(4))
        .collect();
    assert_eq!(images, ["DSC_8bpp/a", "DSC_8bpp/b", "DSC_8bpp/c", "DSC_8bpp/d"]);
}

#[test]
fn missing_stimulus_is_fatal() {
    let fx = Fixture::new("missing");
    let run = fx.run(&[("missing", Choice::Left)], 1);
    let err = fx.experiment(run, OutputMode::Cumulative).err().unwrap();
    assert!(matches!(err, Error::Cache(_)));
}

#[test]
fn frames_are_not_due_between_ticks() {
    let fx = Fixture::new("pacing");
    let run = fx.run(&[("a", Choice::Left)], 1);
    let mut exp = fx.experiment(run, OutputMode::Cumulative).unwrap();
    assert_eq!(exp.until_next_frame(), Duration::from_millis(FRAME_MS));

    fx.timer.advance_ms(4);
    let tick = exp.tick(START).unwrap();
    assert!(!tick.frame_due);
    assert_eq!(tick.outcome, ResponseOutcome::Ignored);
    assert_eq!(exp.until_next_frame(), Duration::from_millis(6));

    fx.timer.advance_ms(6);
    assert_eq!(exp.tick(START).unwrap().outcome, ResponseOutcome::Started);
}

#[test]
fn short_waits_sleep_on_the_timer() {
    let fx = Fixture::new("sleep");
    let run = fx.run(&[("a", Choice::Left)], 1);
    let exp = fx.experiment(run, OutputMode::Cumulative).unwrap();
    let slack = Duration::from_millis(2);

    assert!(!exp.sleep_until_frame(slack));
    assert_eq!(exp.until_next_frame(), Duration::from_millis(FRAME_MS));

    fx.timer.advance_ms(FRAME_MS - 2);
    assert!(exp.sleep_until_frame(slack));
    assert_eq!(exp.until_next_frame(), Duration::ZERO);
    assert!(!exp.sleep_until_frame(slack));
}

#[test]
fn sleeping_lands_on_the_frame() {
    let fx = Fixture::new("sleep-tick");
    let run = fx.run(&[("a", Choice::Left)], 1);
    let mut exp = fx.experiment(run, OutputMode::Cumulative).unwrap();
    fx.timer.advance_ms(9);
    assert!(!exp.tick(START).unwrap().frame_due);
    assert!(exp.sleep_until_frame(Duration::from_millis(2)));
    let tick = exp.tick(START).unwrap();
    assert!(tick.frame_due);
    assert_eq!(tick.outcome, ResponseOutcome::Started);
}
