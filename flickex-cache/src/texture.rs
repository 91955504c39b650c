use flickex_image::PixelBuffer;

#[derive(Debug, thiserror::Error)]
#[error("texture upload failed: {0}")]
pub struct UploadError(pub String);

/// Turns decoded pixels into something the presenter can draw.
///
/// Textures are released by dropping them.
pub trait TextureFactory {
    type Texture;

    fn upload(&mut self, buffer: &PixelBuffer) -> Result<Self::Texture, UploadError>;
}
