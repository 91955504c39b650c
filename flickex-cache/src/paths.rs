use flickex_core::{Eye, Trial};
use std::path::{Path, PathBuf};

/// Which of the two renditions of a stimulus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    Original,
    Compressed,
}

impl Variant {
    pub fn suffix(self) -> &'static str {
        match self {
            Variant::Original => "_orig",
            Variant::Compressed => "_dec",
        }
    }
}

/// On-disk naming of stimulus files:
/// `<folder>/<trial directory>/<image><_L|_R><_orig|_dec>.<extension>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StimulusLayout {
    pub folder: PathBuf,
    pub extension: String,
}

impl StimulusLayout {
    pub fn new(folder: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            extension: extension.into(),
        }
    }

    pub fn variant_path(&self, trial: &Trial, eye: Eye, variant: Variant) -> PathBuf {
        let file = format!(
            "{}{}{}.{}",
            trial.image,
            eye.suffix(),
            variant.suffix(),
            self.extension
        );
        let mut path = self.folder.clone();
        if !trial.directory.is_empty() {
            path.push(&trial.directory);
        }
        path.push(file);
        path
    }

    /// `<dir>/<stem>_L.<ext>` and `<dir>/<stem>_R.<ext>`.
    pub fn screen_paths(&self, dir: &Path, stem: &str) -> (PathBuf, PathBuf) {
        let file = |eye: Eye| dir.join(format!("{}{}.{}", stem, eye.suffix(), self.extension));
        (file(Eye::Left), file(Eye::Right))
    }
}
