use crate::choice::{Choice, ViewingMode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Sub-rectangle of a source image, in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// True when the whole region lies inside a `width`×`height` buffer.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        let right = self.x.checked_add(self.w);
        let bottom = self.y.checked_add(self.h);
        matches!((right, bottom), (Some(r), Some(b)) if r <= width && b <= height)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.w, self.h, self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Codec {
    Control,
    Dsc,
    Vdcm,
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Codec::Control => "Control",
            Codec::Dsc => "DSC",
            Codec::Vdcm => "VDCM",
        })
    }
}

/// Compression parameters encoded in a stimulus directory name,
/// e.g. `DSC_8bpp`, `VDCM_6bpp_distorted` or `control`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressionInfo {
    pub codec: Codec,
    pub bits_per_pixel: Option<f32>,
    pub distorted: bool,
    pub bypass: bool,
}

impl CompressionInfo {
    pub fn from_directory(name: &str) -> Option<Self> {
        let mut tokens = name
            .split(|c: char| c == '_' || c == '-' || c == ' ')
            .filter(|t| !t.is_empty())
            .map(str::to_ascii_lowercase);

        let codec = match tokens.next()?.as_str() {
            "dsc" => Codec::Dsc,
            "vdcm" => Codec::Vdcm,
            "control" | "orig" | "original" | "reference" => Codec::Control,
            _ => return None,
        };

        let mut info = CompressionInfo {
            codec,
            bits_per_pixel: None,
            distorted: false,
            bypass: false,
        };
        for token in tokens {
            match token.as_str() {
                "distorted" | "distortion" | "dist" => info.distorted = true,
                "bypass" => info.bypass = true,
                t => {
                    if let Some(bpp) = t.strip_suffix("bpp").and_then(|v| v.parse().ok()) {
                        info.bits_per_pixel = Some(bpp);
                    }
                }
            }
        }
        Some(info)
    }
}

impl fmt::Display for CompressionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.codec)?;
        if let Some(bpp) = self.bits_per_pixel {
            write!(f, " {}bpp", bpp)?;
        }
        if self.distorted {
            f.write_str(" distorted")?;
        }
        if self.bypass {
            f.write_str(" bypass")?;
        }
        Ok(())
    }
}

/// A participant's answer to one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub choice: Choice,
    /// Time from the trial's stopwatch (re)start to the key press.
    pub duration: Duration,
}

impl Response {
    pub fn duration_ms(&self) -> u128 {
        self.duration.as_millis()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResponseError {
    #[error("trial '{0}' already has a recorded response")]
    AlreadyRecorded(String),
}

/// One stimulus presentation and its (eventual) answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    pub image: String,
    pub directory: String,
    pub region: Region,
    pub mode: ViewingMode,
    pub correct: Choice,
    pub compression: Option<CompressionInfo>,
    response: Option<Response>,
}

impl Trial {
    pub fn new(
        image: impl Into<String>,
        directory: impl Into<String>,
        region: Region,
        mode: ViewingMode,
        correct: Choice,
    ) -> Self {
        let directory = directory.into();
        let compression = CompressionInfo::from_directory(&directory);
        Self {
            image: image.into(),
            directory,
            region,
            mode,
            correct,
            compression,
            response: None,
        }
    }

    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    pub fn is_answered(&self) -> bool {
        self.response.is_some()
    }

    /// Stores the answer. A trial is answered exactly once.
    pub fn record(&mut self, response: Response) -> Result<(), ResponseError> {
        if self.response.is_some() {
            return Err(ResponseError::AlreadyRecorded(self.image.clone()));
        }
        self.response = Some(response);
        Ok(())
    }

    /// `None` until the trial has both a correct option and a response.
    pub fn is_correct(&self) -> Option<bool> {
        match (self.correct, &self.response) {
            (Choice::None, _) | (_, None) => None,
            (correct, Some(r)) => Some(r.choice == correct),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_bounds_are_checked_without_overflow() {
        assert!(Region::new(100, 200, 500, 600).fits_within(1920, 1080));
        assert!(Region::new(1420, 480, 500, 600).fits_within(1920, 1080));
        assert!(!Region::new(1421, 0, 500, 600).fits_within(1920, 1080));
        assert!(!Region::new(u32::MAX, 0, 2, 2).fits_within(1920, 1080));
        assert!(Region::new(0, 0, 0, 10).is_empty());
    }

    #[test]
    fn compression_info_from_directory_names() {
        let dsc = CompressionInfo::from_directory("DSC_8bpp").unwrap();
        assert_eq!(dsc.codec, Codec::Dsc);
        assert_eq!(dsc.bits_per_pixel, Some(8.0));
        assert!(!dsc.distorted && !dsc.bypass);

        let vdcm = CompressionInfo::from_directory("VDCM_6bpp_distorted").unwrap();
        assert_eq!(vdcm.codec, Codec::Vdcm);
        assert!(vdcm.distorted);
        assert_eq!(vdcm.to_string(), "VDCM 6bpp distorted");

        let bypass = CompressionInfo::from_directory("dsc-12bpp-bypass").unwrap();
        assert!(bypass.bypass);

        assert_eq!(
            CompressionInfo::from_directory("control").map(|c| c.codec),
            Some(Codec::Control)
        );
        assert!(CompressionInfo::from_directory("holiday_photos").is_none());
        assert!(CompressionInfo::from_directory("").is_none());
    }

    #[test]
    fn response_is_recorded_once_and_scored() {
        let mut trial = Trial::new("red", "DSC_8bpp", Region::default(), ViewingMode::Stereo, Choice::Left);
        assert_eq!(trial.compression.map(|c| c.codec), Some(Codec::Dsc));
        assert_eq!(trial.is_correct(), None);

        let response = Response {
            choice: Choice::Left,
            duration: Duration::from_millis(1200),
        };
        trial.record(response).unwrap();
        assert_eq!(trial.is_correct(), Some(true));
        assert!(trial.record(response).is_err());
        assert_eq!(trial.response().map(Response::duration_ms), Some(1200));
    }

    #[test]
    fn unscored_trial_has_no_correctness() {
        let mut trial = Trial::new("blue", "", Region::default(), ViewingMode::MonoLeft, Choice::None);
        trial
            .record(Response {
                choice: Choice::Right,
                duration: Duration::ZERO,
            })
            .unwrap();
        assert_eq!(trial.is_correct(), None);
    }
}
