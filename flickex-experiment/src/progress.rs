use crate::error::{Error, Result};
use crate::run::Run;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Completed session counts per participant id, kept in a small JSON file so
/// an interrupted multi-session run can be resumed.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressStore {
    path: PathBuf,
    completed: BTreeMap<String, usize>,
}

impl ProgressStore {
    pub const FILE_NAME: &'static str = "progress.json";

    /// Opens `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let completed = if path.exists() {
            let text = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
            serde_json::from_str(&text).map_err(|source| Error::Json {
                path: path.clone(),
                source,
            })?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, completed })
    }

    pub fn in_directory(dir: &Path) -> Result<Self> {
        Self::open(dir.join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn completed_sessions(&self, participant: &str) -> usize {
        self.completed.get(participant).copied().unwrap_or(0)
    }

    /// Records that `participant` has finished `sessions` sessions and
    /// writes the store back. Counts never go down.
    pub fn mark_completed(&mut self, participant: &str, sessions: usize) -> Result<()> {
        let entry = self.completed.entry(participant.to_string()).or_insert(0);
        *entry = (*entry).max(sessions);
        self.save()
    }

    /// Moves `run` to the first session its participant has not finished.
    pub fn resume(&self, run: &mut Run) -> Result<usize> {
        let id = run.participant().id.clone();
        let done = self.completed_sessions(&id);
        if done >= run.session_count() {
            return Err(Error::Config(format!(
                "participant {} already completed all {} session(s)",
                id,
                run.session_count()
            )));
        }
        run.skip_to_session(done)?;
        if done > 0 {
            log::info!("resuming participant {} at session {}", id, done + 1);
        }
        Ok(done)
    }

    pub fn save(&self) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        }
        let text = serde_json::to_string_pretty(&self.completed).map_err(|source| Error::Json {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, text).map_err(|e| Error::io(&self.path, e))
    }
}
