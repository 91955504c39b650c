use flickex_core::Region;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("{} is not a valid path", .0.display())]
    NotAFile(PathBuf),

    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("crop region {region} lies outside the {width}x{height} image")]
    CropOutOfBounds {
        region: Region,
        width: u32,
        height: u32,
    },

    #[error("crop region {0} is empty")]
    EmptyRegion(Region),

    #[error("source has {0} channels, expected 3")]
    ChannelCount(usize),

    #[error("sample buffer holds {actual} values, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, ImageError>;
