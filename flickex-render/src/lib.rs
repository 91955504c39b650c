pub mod render;
pub mod texture;

pub use render::{FrameStats, RenderError, SkiaCompositor, Viewport, blit, side_positions};
pub use texture::SkiaTextureFactory;
