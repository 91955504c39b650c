use crate::controller::Polarity;
use crate::error::{Error, Result};
use crate::export::OutputConfig;
use crate::run::{Run, RunSettings};
use flickex_core::{Choice, Participant, Region, Trial, ViewingMode};
use flickex_image::ChannelMap;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrialConfig {
    pub image: String,
    #[serde(default)]
    pub directory: String,
    #[serde(default)]
    pub answer: Choice,
    #[serde(default)]
    pub mode: ViewingMode,
    #[serde(default)]
    pub position: Position,
    /// Crop size; the run's `dimensions` when absent.
    #[serde(default)]
    pub size: Option<Size>,
}

/// A run as described by its JSON configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub participant: Participant,
    pub folder: PathBuf,
    pub instructions: PathBuf,
    pub extension: String,
    pub flicker: bool,
    /// Seconds per flicker half-period.
    pub flicker_rate: f64,
    /// Hz.
    pub frame_rate: f64,
    /// Seconds of flicker before the prompt.
    pub timeout: f64,
    pub transition_ms: i64,
    pub distance: u32,
    pub dimensions: Size,
    pub sessions: usize,
    pub polarity: Polarity,
    pub mirror_images: bool,
    pub channel_map: [usize; 3],
    pub shuffle: Option<u64>,
    pub resume: bool,
    pub output: OutputConfig,
    pub trials: Vec<TrialConfig>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            participant: Participant::default(),
            folder: PathBuf::from("."),
            instructions: PathBuf::from("instructions"),
            extension: "ppm".to_string(),
            flicker: true,
            flicker_rate: 0.1,
            frame_rate: 60.0,
            timeout: 8.0,
            transition_ms: 500,
            distance: 60,
            dimensions: Size { w: 1200, h: 1000 },
            sessions: 1,
            polarity: Polarity::default(),
            mirror_images: true,
            channel_map: ChannelMap::default().0,
            shuffle: None,
            resume: false,
            output: OutputConfig::default(),
            trials: Vec::new(),
        }
    }
}

impl RunConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::parse(&text, path)
    }

    /// Parses `text`; `origin` only labels errors.
    pub fn parse(text: &str, origin: &Path) -> Result<Self> {
        serde_json::from_str(text).map_err(|source| Error::Json {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(Error::Config(msg));
        if self.trials.is_empty() {
            return fail("no trials".into());
        }
        if self.sessions == 0 || self.sessions > self.trials.len() {
            return fail(format!(
                "sessions must be between 1 and {} (got {})",
                self.trials.len(),
                self.sessions
            ));
        }
        if !(self.flicker_rate.is_finite() && self.flicker_rate > 0.0) {
            return fail(format!("flicker_rate must be positive (got {})", self.flicker_rate));
        }
        if !(self.frame_rate.is_finite() && self.frame_rate > 0.0) {
            return fail(format!("frame_rate must be positive (got {})", self.frame_rate));
        }
        if !self.timeout.is_finite() {
            return fail(format!("timeout must be finite (got {})", self.timeout));
        }
        if !ChannelMap(self.channel_map).is_valid() {
            return fail(format!("channel_map entries must be 0, 1 or 2 (got {:?})", self.channel_map));
        }
        if self.extension.is_empty() {
            return fail("extension must not be empty".into());
        }
        let id = &self.participant.id;
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return fail(format!(
                "participant id {id:?} must be letters, digits, '-' or '_'"
            ));
        }
        let delimiter = self.output.delimiter;
        if matches!(delimiter, '\n' | '\r' | '"') {
            return fail(format!("output delimiter {delimiter:?} is not usable"));
        }
        let unsafe_field = |field: &str| {
            field.contains(|c: char| matches!(c, '\n' | '\r' | '"') || c == delimiter)
        };
        for (i, trial) in self.trials.iter().enumerate() {
            if trial.image.is_empty() {
                return fail(format!("trial {} has no image", i + 1));
            }
            if unsafe_field(&trial.image) || unsafe_field(&trial.directory) {
                return fail(format!(
                    "trial {} ({:?} in {:?}) contains a line break, a quote or the output delimiter {:?}",
                    i + 1,
                    trial.image,
                    trial.directory,
                    delimiter
                ));
            }
            let region = self.region_of(trial);
            if region.is_empty() {
                return fail(format!("trial {} ({}) has an empty region {}", i + 1, trial.image, region));
            }
        }
        Ok(())
    }

    pub fn region_of(&self, trial: &TrialConfig) -> Region {
        let size = trial.size.unwrap_or(self.dimensions);
        Region::new(trial.position.x, trial.position.y, size.w, size.h)
    }

    /// Durations for the run. Negative windows collapse to zero.
    pub fn settings(&self) -> RunSettings {
        if self.timeout < 0.0 {
            log::warn!("negative timeout {} s treated as 0", self.timeout);
        }
        if self.transition_ms < 0 {
            log::warn!("negative transition {} ms treated as 0", self.transition_ms);
        }
        RunSettings {
            flicker: self.flicker,
            flicker_interval: seconds(self.flicker_rate),
            frame_interval: seconds(1.0 / self.frame_rate),
            transition: Duration::from_millis(self.transition_ms.max(0) as u64),
            timeout: seconds(self.timeout),
            distance: self.distance,
        }
    }

    pub fn channel_map(&self) -> ChannelMap {
        ChannelMap(self.channel_map)
    }

    pub fn trials(&self) -> Vec<Trial> {
        self.trials
            .iter()
            .map(|t| Trial::new(&t.image, &t.directory, self.region_of(t), t.mode, t.answer))
            .collect()
    }

    pub fn into_run(self) -> Result<Run> {
        self.validate()?;
        let mut run = Run::new(
            self.participant.clone(),
            self.settings(),
            self.trials(),
            self.sessions,
        )?;
        if let Some(seed) = self.shuffle {
            log::info!("shuffling trials within sessions (seed {})", seed);
            run.shuffle_within_sessions(&mut StdRng::seed_from_u64(seed));
        }
        Ok(run)
    }
}

fn seconds(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}
