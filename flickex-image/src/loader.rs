use crate::buffer::{ChannelMap, PixelBuffer, SourceImage};
use crate::error::{ImageError, Result};
use flickex_core::Region;
use std::path::Path;

/// Decodes a still image into a [`PixelBuffer`], optionally cropped.
pub trait ImageLoader {
    fn load(&self, path: &Path, crop: Option<Region>) -> Result<PixelBuffer>;
}

/// Loader for the lossless stimulus files (PPM, plus PNG/TIFF for
/// instruction screens). 8-bit files are widened to 16 bits per channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct PnmLoader {
    pub channel_map: ChannelMap,
}

impl PnmLoader {
    pub fn new(channel_map: ChannelMap) -> Self {
        Self { channel_map }
    }

    pub fn decode(&self, path: &Path) -> Result<SourceImage> {
        if !path.is_file() {
            return Err(ImageError::NotAFile(path.to_path_buf()));
        }
        let img = image::open(path).map_err(|source| ImageError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        let rgb = img.into_rgb16();
        let (width, height) = rgb.dimensions();
        SourceImage::new(width, height, 3, rgb.into_raw())
    }
}

impl ImageLoader for PnmLoader {
    fn load(&self, path: &Path, crop: Option<Region>) -> Result<PixelBuffer> {
        let source = self.decode(path)?;
        log::debug!(
            "decoded {} ({}x{}), crop {:?}",
            path.display(),
            source.width(),
            source.height(),
            crop
        );
        PixelBuffer::from_source(&source, self.channel_map, crop)
    }
}
