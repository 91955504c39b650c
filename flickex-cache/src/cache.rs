use crate::paths::{StimulusLayout, Variant};
use crate::texture::{TextureFactory, UploadError};
use flickex_core::{Eye, Pair, Region, Trial, ViewingMode};
use flickex_image::{ImageError, ImageLoader};
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error("{}: {source}", path.display())]
    Upload {
        path: PathBuf,
        #[source]
        source: UploadError,
    },
}

/// Both renditions of one eye's stimulus. Without flicker the two slots
/// point at the same texture.
pub struct Variants<X> {
    pub original: Rc<X>,
    pub compressed: Rc<X>,
}

impl<X> Variants<X> {
    pub fn new(original: X, compressed: X) -> Self {
        Self {
            original: Rc::new(original),
            compressed: Rc::new(compressed),
        }
    }

    /// One texture in both slots.
    pub fn single(texture: X) -> Self {
        let original = Rc::new(texture);
        Self {
            compressed: Rc::clone(&original),
            original,
        }
    }

    pub fn get(&self, variant: Variant) -> &X {
        match variant {
            Variant::Original => &self.original,
            Variant::Compressed => &self.compressed,
        }
    }

    pub fn is_shared(&self) -> bool {
        Rc::ptr_eq(&self.original, &self.compressed)
    }
}

impl<X> Clone for Variants<X> {
    fn clone(&self) -> Self {
        Self {
            original: Rc::clone(&self.original),
            compressed: Rc::clone(&self.compressed),
        }
    }
}

/// Every texture one trial needs, keyed by the eye window that shows it.
pub struct VariantSet<X> {
    trial: usize,
    eyes: Pair<Variants<X>>,
}

impl<X> VariantSet<X> {
    pub fn new(trial: usize, eyes: Pair<Variants<X>>) -> Self {
        Self { trial, eyes }
    }

    pub fn trial_index(&self) -> usize {
        self.trial
    }

    pub fn eye(&self, eye: Eye) -> &Variants<X> {
        &self.eyes[eye]
    }

    pub fn texture(&self, eye: Eye, variant: Variant) -> &X {
        self.eyes[eye].get(variant)
    }
}

/// Full-frame instruction screens, one per eye.
pub struct StaticScreens<X> {
    pub start: Pair<X>,
    pub prompt: Pair<X>,
}

/// Owns the textures of the current trial.
///
/// [`ResourceCache::populate`] builds the complete set for the next trial
/// before replacing the old one, so a failed load leaves the previous
/// trial's textures untouched.
pub struct ResourceCache<L, F: TextureFactory> {
    loader: L,
    factory: F,
    layout: StimulusLayout,
    flicker: bool,
    current: Option<VariantSet<F::Texture>>,
    uploads: usize,
}

impl<L: ImageLoader, F: TextureFactory> ResourceCache<L, F> {
    pub fn new(loader: L, factory: F, layout: StimulusLayout, flicker: bool) -> Self {
        Self {
            loader,
            factory,
            layout,
            flicker,
            current: None,
            uploads: 0,
        }
    }

    pub fn layout(&self) -> &StimulusLayout {
        &self.layout
    }

    pub fn current(&self) -> Option<&VariantSet<F::Texture>> {
        self.current.as_ref()
    }

    /// Total number of textures uploaded so far.
    pub fn uploads(&self) -> usize {
        self.uploads
    }

    pub fn populate(&mut self, index: usize, trial: &Trial) -> Result<&VariantSet<F::Texture>, CacheError> {
        let eyes = match trial.mode {
            ViewingMode::Stereo => Pair::new(
                self.load_variants(trial, Eye::Left)?,
                self.load_variants(trial, Eye::Right)?,
            ),
            ViewingMode::MonoLeft => Pair::splat(self.load_variants(trial, Eye::Left)?),
            ViewingMode::MonoRight => Pair::splat(self.load_variants(trial, Eye::Right)?),
        };

        if let Some(old) = &self.current {
            log::debug!("releasing textures of trial {}", old.trial);
        }
        log::info!(
            "trial {} ready: {}/{} ({}, {})",
            index + 1,
            trial.directory,
            trial.image,
            trial.mode,
            trial.region
        );
        Ok(&*self.current.insert(VariantSet::new(index, eyes)))
    }

    pub fn release(&mut self) {
        self.current = None;
    }

    /// Loads `<dir>/<start>_{L,R}` and `<dir>/<prompt>_{L,R}` uncropped.
    pub fn load_screens(
        &mut self,
        dir: &Path,
        start: &str,
        prompt: &str,
    ) -> Result<StaticScreens<F::Texture>, CacheError> {
        let (start_l, start_r) = self.layout.screen_paths(dir, start);
        let (prompt_l, prompt_r) = self.layout.screen_paths(dir, prompt);
        Ok(StaticScreens {
            start: Pair::new(self.load_texture(&start_l, None)?, self.load_texture(&start_r, None)?),
            prompt: Pair::new(
                self.load_texture(&prompt_l, None)?,
                self.load_texture(&prompt_r, None)?,
            ),
        })
    }

    fn load_variants(&mut self, trial: &Trial, eye: Eye) -> Result<Variants<F::Texture>, CacheError> {
        // An empty region means the whole file.
        let crop = (!trial.region.is_empty()).then_some(trial.region);
        let path = self.layout.variant_path(trial, eye, Variant::Original);
        let original = self.load_texture(&path, crop)?;
        if !self.flicker {
            return Ok(Variants::single(original));
        }
        let path = self.layout.variant_path(trial, eye, Variant::Compressed);
        let compressed = self.load_texture(&path, crop)?;
        Ok(Variants::new(original, compressed))
    }

    fn load_texture(&mut self, path: &Path, crop: Option<Region>) -> Result<F::Texture, CacheError> {
        let buffer = self.loader.load(path, crop)?;
        let texture = self.factory.upload(&buffer).map_err(|source| CacheError::Upload {
            path: path.to_path_buf(),
            source,
        })?;
        self.uploads += 1;
        Ok(texture)
    }
}
