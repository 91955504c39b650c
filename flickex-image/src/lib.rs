pub mod buffer;
pub mod error;
pub mod loader;

pub use buffer::{ChannelMap, PixelBuffer, SourceImage};
pub use error::{ImageError, Result};
pub use loader::{ImageLoader, PnmLoader};
