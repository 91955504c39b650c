pub mod config;
pub mod controller;
pub mod error;
pub mod export;
pub mod progress;
pub mod run;
pub mod scheduler;
pub mod session;

pub use config::{Position, RunConfig, Size, TrialConfig};
pub use controller::{
    ButtonTracker, GamepadState, InputState, Polarity, ResponseController, ResponseOutcome,
};
pub use error::{Error, Result};
pub use export::{ExportReport, HEADER, OutputConfig, OutputMode, ResultsExporter};
pub use progress::ProgressStore;
pub use run::{Run, RunSettings, RunSummary};
pub use scheduler::{EyeFrame, FlickerState, PresentationScheduler, SchedulerTick, select_pair};
pub use session::{Experiment, Tick};
