use bytemuck::{cast_slice, cast_slice_mut};
use flickex_core::Pair;
use flickex_experiment::EyeFrame;
use flickex_timing::Timer;
use std::time::Duration;
use thiserror::Error;
use tiny_skia::{FilterQuality, IntRect, Pixmap, PixmapPaint, Transform};

const OPAQUE_BLACK: [u8; 4] = [0, 0, 0, 255];

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid surface size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("frame buffer holds {actual} bytes, viewport needs {expected}")]
    FrameBuffer { expected: usize, actual: usize },
    #[error("viewport at x={x_offset} does not fit a {frame_width} px wide frame")]
    Viewport { x_offset: u32, frame_width: u32 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub clear: Duration,
    pub draw: Duration,
    pub copy: Duration,
    pub total: Duration,
    pub dirty_count: usize,
}

/// Where an eye's canvas lands inside a presentation frame buffer.
///
/// A window per eye uses [`Viewport::full`]; a single window shared by both
/// eyes places each canvas side by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub frame_width: u32,
    pub x_offset: u32,
}

impl Viewport {
    pub fn full(width: u32) -> Self {
        Self {
            frame_width: width,
            x_offset: 0,
        }
    }
}

/// Top-left corners of the left and right stimulus on a `surface`-sized
/// eye surface: both vertically centred, `distance` pixels apart around the
/// horizontal centre.
pub fn side_positions(surface: (u32, u32), image: (u32, u32), distance: u32) -> Pair<(i32, i32)> {
    let (sw, sh) = (surface.0 as i32, surface.1 as i32);
    let (w, h) = (image.0 as i32, image.1 as i32);
    let half_gap = distance as i32 / 2;
    let y = sh / 2 - h / 2;
    Pair::new((sw / 2 - half_gap - w, y), (sw / 2 + half_gap, y))
}

/// Copies the opaque `src` onto `dst` with its top-left corner at (x, y),
/// clipped to `dst`. With `mirror` each row is reversed, i.e. the image is
/// flipped about its own vertical axis.
///
/// Returns the destination rectangle that was written, if any.
pub fn blit(dst: &mut Pixmap, src: &Pixmap, x: i32, y: i32, mirror: bool) -> Option<IntRect> {
    let (dst_w, dst_h) = (dst.width() as i32, dst.height() as i32);
    let (w, h) = (src.width() as i32, src.height() as i32);

    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + w).min(dst_w);
    let y1 = (y + h).min(dst_h);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    let cols = (x1 - x0) as usize;
    let src_stride = w as usize;
    let dst_stride = dst_w as usize;
    let src_px: &[u32] = cast_slice(src.data());
    let dst_px: &mut [u32] = cast_slice_mut(dst.data_mut());

    for row in y0..y1 {
        let src_row = (row - y) as usize * src_stride;
        let dst_row = row as usize * dst_stride + x0 as usize;
        let dst_slice = &mut dst_px[dst_row..dst_row + cols];
        if mirror {
            // dst column c maps to src column w - 1 - c
            let first = (w - 1 - (x0 - x)) as usize;
            for (i, px) in dst_slice.iter_mut().enumerate() {
                *px = src_px[src_row + first - i];
            }
        } else {
            let first = (x0 - x) as usize;
            dst_slice.copy_from_slice(&src_px[src_row + first..src_row + first + cols]);
        }
    }

    IntRect::from_xywh(x0, y0, cols as u32, (y1 - y0) as u32)
}

/// Draws one eye's content onto an offscreen canvas and copies the changed
/// regions into a presentation frame buffer.
pub struct SkiaCompositor {
    width: u32,
    height: u32,
    distance: u32,
    mirror: bool,
    canvas: Pixmap,
    clear_buffer: Vec<u8>,
    dirty_regions: Vec<IntRect>,
    first_frame: bool,
}

impl SkiaCompositor {
    pub fn new(width: u32, height: u32, distance: u32, mirror: bool) -> Result<Self, RenderError> {
        let (canvas, clear_buffer) = blank_canvas(width, height)?;
        Ok(Self {
            width,
            height,
            distance,
            mirror,
            canvas,
            clear_buffer,
            dirty_regions: Vec::with_capacity(4),
            first_frame: true,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        let (canvas, clear_buffer) = blank_canvas(width, height)?;
        self.width = width;
        self.height = height;
        self.canvas = canvas;
        self.clear_buffer = clear_buffer;
        self.dirty_regions.clear();
        self.first_frame = true;
        log::debug!("eye canvas resized to {}x{}", width, height);
        Ok(())
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn canvas(&self) -> &Pixmap {
        &self.canvas
    }

    /// Renders `frame` and copies the result into `frame_buffer`, an RGBA8
    /// surface `viewport.frame_width` pixels wide and as tall as the canvas.
    pub fn render_frame<T: Timer>(
        &mut self,
        frame: &EyeFrame<'_, Pixmap>,
        frame_buffer: &mut [u8],
        viewport: Viewport,
        timer: &T,
    ) -> Result<FrameStats, RenderError> {
        self.check_viewport(frame_buffer, viewport)?;
        let start = timer.now();

        if self.first_frame {
            self.first_frame = false;
            self.canvas.data_mut().copy_from_slice(&self.clear_buffer);
            self.dirty_regions.clear();
            self.dirty_regions
                .extend(IntRect::from_xywh(0, 0, self.width, self.height));
        }
        let mut present = std::mem::take(&mut self.dirty_regions);

        let clear = {
            let t = timer.now();
            self.clear_regions(&present);
            timer.elapsed(t)
        };

        let draw = {
            let t = timer.now();
            self.draw(frame);
            timer.elapsed(t)
        };

        let copy = {
            let t = timer.now();
            present.extend_from_slice(&self.dirty_regions);
            for rect in &present {
                self.copy_region(*rect, frame_buffer, viewport);
            }
            timer.elapsed(t)
        };

        Ok(FrameStats {
            clear,
            draw,
            copy,
            total: timer.elapsed(start),
            dirty_count: present.len(),
        })
    }

    fn draw(&mut self, frame: &EyeFrame<'_, Pixmap>) {
        match frame {
            EyeFrame::Blank => {}
            EyeFrame::Full(screen) => self.draw_full(screen),
            EyeFrame::Stimulus(pair) => {
                let positions = side_positions(
                    (self.width, self.height),
                    (pair.left.width(), pair.left.height()),
                    self.distance,
                );
                for (texture, (x, y)) in [(pair.left, positions.left), (pair.right, positions.right)] {
                    if let Some(rect) = blit(&mut self.canvas, texture, x, y, self.mirror) {
                        self.dirty_regions.push(rect);
                    }
                }
            }
        }
    }

    /// Start and prompt screens cover the whole surface, scaled when their
    /// size differs from it.
    fn draw_full(&mut self, screen: &Pixmap) {
        if (screen.width(), screen.height()) == (self.width, self.height) {
            if let Some(rect) = blit(&mut self.canvas, screen, 0, 0, self.mirror) {
                self.dirty_regions.push(rect);
            }
            return;
        }

        let sx = self.width as f32 / screen.width() as f32;
        let sy = self.height as f32 / screen.height() as f32;
        let transform = if self.mirror {
            Transform::from_row(-sx, 0.0, 0.0, sy, self.width as f32, 0.0)
        } else {
            Transform::from_scale(sx, sy)
        };
        let paint = PixmapPaint {
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        self.canvas
            .draw_pixmap(0, 0, screen.as_ref(), &paint, transform, None);
        self.dirty_regions
            .extend(IntRect::from_xywh(0, 0, self.width, self.height));
    }

    fn clear_regions(&mut self, regions: &[IntRect]) {
        let stride = self.width as usize * 4;
        let canvas = self.canvas.data_mut();
        for rect in regions {
            let x0 = rect.x() as usize * 4;
            let row_len = rect.width() as usize * 4;
            for y in rect.y() as usize..rect.bottom() as usize {
                let off = y * stride + x0;
                canvas[off..off + row_len].copy_from_slice(&self.clear_buffer[off..off + row_len]);
            }
        }
    }

    fn copy_region(&self, rect: IntRect, frame_buffer: &mut [u8], viewport: Viewport) {
        let src_stride = self.width as usize * 4;
        let dst_stride = viewport.frame_width as usize * 4;
        let row_len = rect.width() as usize * 4;
        let canvas = self.canvas.data();
        for y in rect.y() as usize..rect.bottom() as usize {
            let src = y * src_stride + rect.x() as usize * 4;
            let dst = y * dst_stride + (viewport.x_offset as usize + rect.x() as usize) * 4;
            frame_buffer[dst..dst + row_len].copy_from_slice(&canvas[src..src + row_len]);
        }
    }

    fn check_viewport(&self, frame_buffer: &[u8], viewport: Viewport) -> Result<(), RenderError> {
        if viewport.x_offset as u64 + self.width as u64 > viewport.frame_width as u64 {
            return Err(RenderError::Viewport {
                x_offset: viewport.x_offset,
                frame_width: viewport.frame_width,
            });
        }
        let expected = viewport.frame_width as usize * self.height as usize * 4;
        if frame_buffer.len() < expected {
            return Err(RenderError::FrameBuffer {
                expected,
                actual: frame_buffer.len(),
            });
        }
        Ok(())
    }
}

fn blank_canvas(width: u32, height: u32) -> Result<(Pixmap, Vec<u8>), RenderError> {
    let mut canvas = Pixmap::new(width, height).ok_or(RenderError::InvalidSize { width, height })?;
    let clear_buffer: Vec<u8> = OPAQUE_BLACK
        .into_iter()
        .cycle()
        .take(width as usize * height as usize * 4)
        .collect();
    canvas.data_mut().copy_from_slice(&clear_buffer);
    Ok((canvas, clear_buffer))
}
