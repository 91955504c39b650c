use flickex_core::Eye;
use flickex_render::Viewport;

/// How the two eye surfaces map onto windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceLayout {
    /// A fullscreen window per eye on the first two monitors.
    WindowPerEye,
    /// One window, left eye in the left half.
    SideBySide,
}

impl SurfaceLayout {
    pub fn choose(monitors: usize, windowed: bool) -> Self {
        if !windowed && monitors >= 2 {
            SurfaceLayout::WindowPerEye
        } else {
            SurfaceLayout::SideBySide
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EyeViewport {
    pub eye: Eye,
    pub width: u32,
    pub height: u32,
    pub viewport: Viewport,
}

/// Eye canvases hosted by window `index` of `layout` at `size`.
pub fn eye_viewports(layout: SurfaceLayout, index: usize, size: (u32, u32)) -> Vec<EyeViewport> {
    let (width, height) = size;
    match layout {
        SurfaceLayout::WindowPerEye => {
            let eye = if index == 0 { Eye::Left } else { Eye::Right };
            vec![EyeViewport {
                eye,
                width,
                height,
                viewport: Viewport::full(width),
            }]
        }
        SurfaceLayout::SideBySide => {
            let half = width / 2;
            vec![
                EyeViewport {
                    eye: Eye::Left,
                    width: half,
                    height,
                    viewport: Viewport {
                        frame_width: width,
                        x_offset: 0,
                    },
                },
                EyeViewport {
                    eye: Eye::Right,
                    width: width - half,
                    height,
                    viewport: Viewport {
                        frame_width: width,
                        x_offset: half,
                    },
                },
            ]
        }
    }
}
