pub mod cache;
pub mod paths;
pub mod texture;

pub use cache::{CacheError, ResourceCache, StaticScreens, VariantSet, Variants};
pub use paths::{StimulusLayout, Variant};
pub use texture::{TextureFactory, UploadError};
