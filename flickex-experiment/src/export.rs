use crate::error::{Error, Result};
use crate::run::Run;
use flickex_core::Trial;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const HEADER: [&str; 14] = [
    "codec",
    "bpp",
    "distorted",
    "bypass",
    "image",
    "correct",
    "x",
    "y",
    "width",
    "height",
    "mode",
    "response",
    "duration_ms",
    "participant",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// `result<id>.csv`, rewritten with every answered trial on each export.
    #[default]
    Cumulative,
    /// `results.csv` shared by all runs; each export appends its session.
    Append,
    /// `result<id>_session<n>.csv` per session block.
    PerSession,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub mode: OutputMode,
    pub directory: PathBuf,
    pub delimiter: char,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            mode: OutputMode::Cumulative,
            directory: PathBuf::from("."),
            delimiter: ',',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub path: PathBuf,
    /// Data lines written by this export, header excluded.
    pub lines: usize,
}

/// Writes answered trials as delimited text, one line per trial, in run order.
/// Trials without a response are left out.
#[derive(Debug, Clone)]
pub struct ResultsExporter {
    config: OutputConfig,
    /// Cumulative lines exported before a resume, read on the first export.
    carried: Option<Vec<String>>,
}

impl ResultsExporter {
    pub fn new(config: OutputConfig) -> Self {
        Self {
            config,
            carried: None,
        }
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    pub fn path_for(&self, participant: &str, session: usize) -> PathBuf {
        let name = match self.config.mode {
            OutputMode::Cumulative => format!("result{participant}.csv"),
            OutputMode::Append => "results.csv".to_string(),
            OutputMode::PerSession => format!("result{participant}_session{}.csv", session + 1),
        };
        self.config.directory.join(name)
    }

    /// Exports at the end of `session`.
    ///
    /// A cumulative file also keeps the lines of sessions finished before
    /// the run was resumed.
    pub fn export(&mut self, run: &Run, session: usize) -> Result<ExportReport> {
        let id = &run.participant().id;
        let path = self.path_for(id, session);
        fs::create_dir_all(&self.config.directory)
            .map_err(|e| Error::io(&self.config.directory, e))?;

        let block = &run.trials()[run.session_range(session)];
        let lines = match self.config.mode {
            OutputMode::Cumulative => {
                if self.carried.is_none() {
                    let earlier = if run.first_session() > 0 {
                        self.earlier_lines(&path)
                            .map_err(|e| Error::io(&path, e))?
                    } else {
                        Vec::new()
                    };
                    self.carried = Some(earlier);
                }
                let carried = self.carried.as_deref().unwrap_or_default();
                self.rewrite(&path, carried, run.trials(), id)
            }
            OutputMode::PerSession => {
                let file = File::create(&path).map_err(|e| Error::io(&path, e))?;
                self.write_records(file, block, id, true)
            }
            OutputMode::Append => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .map_err(|e| Error::io(&path, e))?;
                let empty = file.metadata().map_err(|e| Error::io(&path, e))?.len() == 0;
                self.write_records(file, block, id, empty)
            }
        }
        .map_err(|e| Error::io(&path, e))?;

        log::info!("exported {} trial(s) to {}", lines, path.display());
        Ok(ExportReport { path, lines })
    }

    fn rewrite(
        &self,
        path: &Path,
        carried: &[String],
        trials: &[Trial],
        participant: &str,
    ) -> io::Result<usize> {
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "{}", self.header())?;
        for line in carried {
            writeln!(out, "{line}")?;
        }
        let written = self.write_records(&mut out, trials, participant, false)?;
        out.flush()?;
        Ok(carried.len() + written)
    }

    /// Data lines already in `path`; none when the file does not exist.
    fn earlier_lines(&self, path: &Path) -> io::Result<Vec<String>> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let header = self.header();
        let lines: Vec<String> = text
            .lines()
            .filter(|line| !line.trim().is_empty() && *line != header)
            .map(str::to_string)
            .collect();
        log::info!(
            "keeping {} line(s) from earlier sessions in {}",
            lines.len(),
            path.display()
        );
        Ok(lines)
    }

    fn header(&self) -> String {
        HEADER.join(&self.config.delimiter.to_string())
    }

    pub fn write_records<'a, W: Write>(
        &self,
        writer: W,
        trials: impl IntoIterator<Item = &'a Trial>,
        participant: &str,
        header: bool,
    ) -> io::Result<usize> {
        let mut out = BufWriter::new(writer);
        let delim = self.config.delimiter.to_string();
        if header {
            writeln!(out, "{}", self.header())?;
        }
        let mut lines = 0;
        for fields in trials.into_iter().filter_map(|t| record(t, participant)) {
            writeln!(out, "{}", fields.join(&delim))?;
            lines += 1;
        }
        out.flush()?;
        Ok(lines)
    }
}

fn record(trial: &Trial, participant: &str) -> Option<Vec<String>> {
    let response = trial.response()?;
    let (codec, bpp, distorted, bypass) = match &trial.compression {
        Some(info) => (
            info.codec.to_string(),
            info.bits_per_pixel.map(|b| b.to_string()).unwrap_or_default(),
            info.distorted.to_string(),
            info.bypass.to_string(),
        ),
        None => Default::default(),
    };
    let image = if trial.directory.is_empty() {
        trial.image.clone()
    } else {
        format!("{}/{}", trial.directory, trial.image)
    };
    Some(vec![
        codec,
        bpp,
        distorted,
        bypass,
        image,
        trial.correct.to_string(),
        trial.region.x.to_string(),
        trial.region.y.to_string(),
        trial.region.w.to_string(),
        trial.region.h.to_string(),
        trial.mode.to_string(),
        response.choice.to_string(),
        response.duration_ms().to_string(),
        participant.to_string(),
    ])
}
