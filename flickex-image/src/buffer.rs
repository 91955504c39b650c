use crate::error::{ImageError, Result};
use flickex_core::Region;

/// Decoded samples in the file's own channel order, 16 bits per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceImage {
    width: u32,
    height: u32,
    channels: usize,
    samples: Vec<u16>,
}

impl SourceImage {
    pub fn new(width: u32, height: u32, channels: usize, samples: Vec<u16>) -> Result<Self> {
        if channels != 3 {
            return Err(ImageError::ChannelCount(channels));
        }
        let expected = width as usize * height as usize * channels;
        if samples.len() != expected {
            return Err(ImageError::BufferSize {
                expected,
                actual: samples.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            samples,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> &[u16] {
        let i = (y as usize * self.width as usize + x as usize) * self.channels;
        &self.samples[i..i + self.channels]
    }
}

/// Destination channel `i` (of R, G, B) takes source channel `self.0[i]`;
/// alpha is always forced opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMap(pub [usize; 3]);

impl ChannelMap {
    /// The lab pipeline's remap: `dst = [src[2], src[0], src[1], opaque]`.
    pub const BGR_TO_RGBA: ChannelMap = ChannelMap([2, 0, 1]);
    pub const IDENTITY: ChannelMap = ChannelMap([0, 1, 2]);

    pub fn is_valid(&self) -> bool {
        self.0.iter().all(|&c| c < 3)
    }

    #[inline]
    pub fn remap(&self, src: &[u16]) -> [u16; 4] {
        [src[self.0[0]], src[self.0[1]], src[self.0[2]], u16::MAX]
    }
}

impl Default for ChannelMap {
    fn default() -> Self {
        Self::BGR_TO_RGBA
    }
}

/// GPU-ready RGBA pixels, 16 bits per channel, row-major, tightly packed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u16>,
}

impl PixelBuffer {
    pub fn from_rgba(width: u32, height: u32, data: Vec<u16>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(ImageError::BufferSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Remaps channels of `source` and, when given, extracts exactly `crop`.
    pub fn from_source(source: &SourceImage, map: ChannelMap, crop: Option<Region>) -> Result<Self> {
        let region = match crop {
            Some(region) => {
                if region.is_empty() {
                    return Err(ImageError::EmptyRegion(region));
                }
                if !region.fits_within(source.width, source.height) {
                    return Err(ImageError::CropOutOfBounds {
                        region,
                        width: source.width,
                        height: source.height,
                    });
                }
                region
            }
            None => Region::new(0, 0, source.width, source.height),
        };

        let mut data = Vec::with_capacity(region.w as usize * region.h as usize * 4);
        for y in region.y..region.y + region.h {
            let row = (y as usize * source.width as usize + region.x as usize) * source.channels;
            let row_end = row + region.w as usize * source.channels;
            for px in source.samples[row..row_end].chunks_exact(source.channels) {
                data.extend_from_slice(&map.remap(px));
            }
        }

        Ok(Self {
            width: region.w,
            height: region.h,
            data,
        })
    }

    /// Copies out a sub-rectangle; the region must lie inside the buffer.
    pub fn crop(&self, region: Region) -> Result<Self> {
        if region.is_empty() {
            return Err(ImageError::EmptyRegion(region));
        }
        if !region.fits_within(self.width, self.height) {
            return Err(ImageError::CropOutOfBounds {
                region,
                width: self.width,
                height: self.height,
            });
        }
        let stride = self.width as usize * 4;
        let mut data = Vec::with_capacity(region.w as usize * region.h as usize * 4);
        for y in region.y as usize..(region.y + region.h) as usize {
            let start = y * stride + region.x as usize * 4;
            data.extend_from_slice(&self.data[start..start + region.w as usize * 4]);
        }
        Ok(Self {
            width: region.w,
            height: region.h,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u16] {
        &self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u16; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    /// Drops the low byte of each channel.
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.data.iter().map(|&v| (v >> 8) as u8).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> SourceImage {
        let mut samples = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                samples.extend_from_slice(&[x as u16, y as u16, (x ^ y) as u16]);
            }
        }
        SourceImage::new(width, height, 3, samples).unwrap()
    }

    #[test]
    fn crop_of_full_hd_source_is_exact_subrectangle() {
        let source = gradient(1920, 1080);
        let region = Region::new(100, 200, 500, 600);
        let out = PixelBuffer::from_source(&source, ChannelMap::BGR_TO_RGBA, Some(region)).unwrap();

        assert_eq!((out.width(), out.height()), (500, 600));
        assert_eq!(out.data().len(), 500 * 600 * 4);
        for y in 0..600 {
            for x in 0..500 {
                let src = source.pixel(x + 100, y + 200);
                assert_eq!(out.pixel(x, y), [src[2], src[0], src[1], u16::MAX]);
            }
        }
    }

    #[test]
    fn remap_forces_opaque_alpha() {
        let source = SourceImage::new(1, 1, 3, vec![10, 20, 30]).unwrap();
        let out = PixelBuffer::from_source(&source, ChannelMap::default(), None).unwrap();
        assert_eq!(out.pixel(0, 0), [30, 10, 20, u16::MAX]);

        let straight = PixelBuffer::from_source(&source, ChannelMap::IDENTITY, None).unwrap();
        assert_eq!(straight.pixel(0, 0), [10, 20, 30, u16::MAX]);
    }

    #[test]
    fn out_of_bounds_crop_is_rejected() {
        let source = gradient(64, 32);
        let err = PixelBuffer::from_source(
            &source,
            ChannelMap::default(),
            Some(Region::new(40, 0, 25, 10)),
        )
        .unwrap_err();
        assert!(matches!(err, ImageError::CropOutOfBounds { width: 64, height: 32, .. }));

        let err = PixelBuffer::from_source(
            &source,
            ChannelMap::default(),
            Some(Region::new(0, 0, 0, 10)),
        )
        .unwrap_err();
        assert!(matches!(err, ImageError::EmptyRegion(_)));
    }

    #[test]
    fn crop_after_remap_matches_crop_during_remap() {
        let source = gradient(40, 30);
        let region = Region::new(5, 7, 12, 9);
        let full = PixelBuffer::from_source(&source, ChannelMap::default(), None).unwrap();
        let direct = PixelBuffer::from_source(&source, ChannelMap::default(), Some(region)).unwrap();
        assert_eq!(full.crop(region).unwrap(), direct);
        assert!(full.crop(Region::new(30, 0, 11, 1)).is_err());
    }

    #[test]
    fn sizes_are_validated() {
        assert!(matches!(
            SourceImage::new(2, 2, 4, vec![0; 16]),
            Err(ImageError::ChannelCount(4))
        ));
        assert!(matches!(
            SourceImage::new(2, 2, 3, vec![0; 11]),
            Err(ImageError::BufferSize { expected: 12, actual: 11 })
        ));
        assert!(PixelBuffer::from_rgba(1, 2, vec![0; 8]).is_ok());
    }

    #[test]
    fn rgba8_keeps_the_high_byte() {
        let buffer = PixelBuffer::from_rgba(1, 1, vec![0xABCD, 0x00FF, 0x0100, 0xFFFF]).unwrap();
        assert_eq!(buffer.to_rgba8(), vec![0xAB, 0x00, 0x01, 0xFF]);
    }
}
