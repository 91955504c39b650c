use flickex_cache::{TextureFactory, UploadError};
use flickex_image::PixelBuffer;
use tiny_skia::{IntSize, Pixmap};

/// Uploads decoded stimuli into CPU-side tiny-skia pixmaps.
///
/// Samples are narrowed to 8 bits; stimuli are opaque so the premultiplied
/// and straight encodings coincide.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkiaTextureFactory;

impl SkiaTextureFactory {
    pub fn new() -> Self {
        Self
    }
}

impl TextureFactory for SkiaTextureFactory {
    type Texture = Pixmap;

    fn upload(&mut self, buffer: &PixelBuffer) -> Result<Pixmap, UploadError> {
        let size = IntSize::from_wh(buffer.width(), buffer.height()).ok_or_else(|| {
            UploadError(format!("invalid size {}x{}", buffer.width(), buffer.height()))
        })?;
        let pixmap = Pixmap::from_vec(buffer.to_rgba8(), size)
            .ok_or_else(|| UploadError("pixel data does not match its size".into()))?;
        Ok(pixmap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_keeps_size_and_high_bytes() {
        let buffer = PixelBuffer::from_rgba(
            2,
            1,
            vec![0xFF00, 0x8000, 0x0100, 0xFFFF, 0, 0, 0, 0xFFFF],
        )
        .unwrap();
        let mut factory = SkiaTextureFactory::new();
        let pixmap = factory.upload(&buffer).unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (2, 1));
        assert_eq!(&pixmap.data()[..4], &[0xFF, 0x80, 0x01, 0xFF]);
    }
}
