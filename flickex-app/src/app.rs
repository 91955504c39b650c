use crate::display::{SurfaceLayout, eye_viewports};
use crate::input::{KeyAction, KeyLatch};
use anyhow::{Result, anyhow};
use flickex_core::{Eye, TrialPhase};
use flickex_experiment::{Experiment, ResponseOutcome};
use flickex_image::PnmLoader;
use flickex_render::{SkiaCompositor, SkiaTextureFactory, Viewport};
use flickex_timing::{HighPrecisionTimer, Timer};
use pixels::{Pixels, SurfaceTexture};
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::PhysicalKey,
    window::{Fullscreen, Window, WindowId},
};

pub type FlickerExperiment = Experiment<HighPrecisionTimer, PnmLoader, SkiaTextureFactory>;

/// Waits shorter than this are slept on the high precision timer instead of
/// the event loop's coarser wakeup.
const SLEEP_SLACK: Duration = Duration::from_millis(2);

#[derive(Debug, Clone, Copy)]
pub struct DisplaySettings {
    /// Gap between the two images of an eye surface, in pixels.
    pub distance: u32,
    pub mirror: bool,
    pub windowed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Completed,
    Aborted,
}

struct EyeCanvas {
    eye: Eye,
    viewport: Viewport,
    compositor: SkiaCompositor,
}

struct Surface {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    eyes: Vec<EyeCanvas>,
}

pub struct App {
    experiment: FlickerExperiment,
    display: DisplaySettings,
    layout: SurfaceLayout,
    surfaces: Vec<Surface>,
    keys: KeyLatch,
    phase: TrialPhase,
    status: Option<ExitStatus>,
    error: Option<anyhow::Error>,
}

impl App {
    pub fn new(experiment: FlickerExperiment, display: DisplaySettings) -> Self {
        let phase = experiment.phase();
        Self {
            experiment,
            display,
            layout: SurfaceLayout::SideBySide,
            surfaces: Vec::new(),
            keys: KeyLatch::default(),
            phase,
            status: None,
            error: None,
        }
    }

    pub fn run(mut self) -> Result<ExitStatus> {
        #[cfg(windows)]
        unsafe {
            windows::Win32::Media::timeBeginPeriod(1);
        }

        log::info!(
            "flickex {} on {}/{}",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            std::env::consts::ARCH
        );
        let result = EventLoop::new()
            .map_err(anyhow::Error::from)
            .and_then(|event_loop| event_loop.run_app(&mut self).map_err(Into::into));

        #[cfg(windows)]
        unsafe {
            windows::Win32::Media::timeEndPeriod(1);
        }

        result?;
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        Ok(self.status.unwrap_or(ExitStatus::Aborted))
    }

    fn create_surfaces(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let monitors: Vec<_> = event_loop.available_monitors().collect();
        let primary = event_loop
            .primary_monitor()
            .or_else(|| monitors.first().cloned())
            .ok_or_else(|| anyhow!("no monitor available"))?;

        self.layout = SurfaceLayout::choose(monitors.len(), self.display.windowed);
        let targets = match self.layout {
            SurfaceLayout::WindowPerEye => monitors[..2].to_vec(),
            SurfaceLayout::SideBySide => vec![primary],
        };
        log::info!(
            "{} monitor(s), {:?} layout, mirrored images: {}",
            monitors.len(),
            self.layout,
            self.display.mirror
        );

        for (index, monitor) in targets.into_iter().enumerate() {
            let refresh = monitor
                .refresh_rate_millihertz()
                .map(|rate| rate as f64 / 1000.0);
            let mut attributes = Window::default_attributes()
                .with_title("flickex")
                .with_resizable(self.display.windowed);
            attributes = if self.display.windowed {
                attributes.with_inner_size(PhysicalSize::new(1600, 700))
            } else {
                attributes.with_fullscreen(Some(Fullscreen::Borderless(Some(monitor))))
            };

            let window = Arc::new(event_loop.create_window(attributes)?);
            // a surface can report zero until fullscreen has been applied
            let size = window.inner_size();
            let size = PhysicalSize::new(size.width.max(1), size.height.max(1));
            log::info!(
                "surface {}: {}x{} px, scale {:.2}, refresh {}",
                index,
                size.width,
                size.height,
                window.scale_factor(),
                refresh.map_or("unknown".to_string(), |hz| format!("{hz:.1} Hz"))
            );

            let texture = SurfaceTexture::new(size.width, size.height, window.clone());
            let pixels = Pixels::new(size.width, size.height, texture)?;
            let eyes = eye_canvases(self.layout, index, size, self.display)?;
            if !self.display.windowed {
                window.set_cursor_visible(false);
            }
            self.surfaces.push(Surface {
                window,
                pixels,
                eyes,
            });
        }
        Ok(())
    }

    /// One pass of the frame loop: tick the experiment and present when a
    /// frame is due.
    fn step(&mut self) -> Result<()> {
        let tick = self.experiment.tick(self.keys.state())?;
        if !tick.frame_due {
            return Ok(());
        }
        self.keys.consume();
        self.phase = tick.phase;

        match tick.outcome {
            ResponseOutcome::RunComplete { .. } => {
                self.log_frame_stats();
                self.status = Some(ExitStatus::Completed);
                return Ok(());
            }
            ResponseOutcome::SessionComplete { session, .. } => {
                log::info!("waiting for start of session {}", session + 2);
            }
            _ => {}
        }

        let elapsed = self.present()?;
        self.experiment.record_frame(elapsed);
        Ok(())
    }

    /// Clears, composites and presents every eye canvas, in that order.
    fn present(&mut self) -> Result<Duration> {
        let timer = self.experiment.timer();
        let start = timer.now();
        let frames = self.experiment.frame(self.phase)?;

        for surface in &mut self.surfaces {
            let buffer = surface.pixels.frame_mut();
            for canvas in &mut surface.eyes {
                let stats = canvas.compositor.render_frame(
                    &frames[canvas.eye],
                    buffer,
                    canvas.viewport,
                    timer,
                )?;
                log::trace!(
                    "{:?} eye: clear {:.3} ms, draw {:.3} ms, copy {:.3} ms, {} region(s)",
                    canvas.eye,
                    stats.clear.as_secs_f64() * 1e3,
                    stats.draw.as_secs_f64() * 1e3,
                    stats.copy.as_secs_f64() * 1e3,
                    stats.dirty_count
                );
            }
            surface.pixels.render()?;
        }
        Ok(timer.elapsed(start))
    }

    fn resize(&mut self, id: WindowId, size: PhysicalSize<u32>) -> Result<()> {
        if size.width == 0 || size.height == 0 {
            return Ok(());
        }
        let layout = self.layout;
        let Some((index, surface)) = self
            .surfaces
            .iter_mut()
            .enumerate()
            .find(|(_, s)| s.window.id() == id)
        else {
            return Ok(());
        };

        surface.pixels.resize_surface(size.width, size.height)?;
        surface.pixels.resize_buffer(size.width, size.height)?;
        let viewports = eye_viewports(layout, index, (size.width, size.height));
        for (canvas, placement) in surface.eyes.iter_mut().zip(viewports) {
            canvas.compositor.resize(placement.width, placement.height)?;
            canvas.viewport = placement.viewport;
        }
        log::info!("surface {} resized to {}x{}", index, size.width, size.height);
        self.experiment.reset_flicker();
        Ok(())
    }

    fn log_frame_stats(&self) {
        let stats = self.experiment.frame_stats();
        log::info!(
            "frame times over {} frame(s): avg {:.3} ms, jitter {:.3} ms, min {:.3} ms, max {:.3} ms, {:.1} fps, {} missed tick(s)",
            stats.samples,
            stats.average_frame_time_ns / 1e6,
            stats.jitter_ns / 1e6,
            stats.min_frame_time_ns / 1e6,
            stats.max_frame_time_ns / 1e6,
            stats.effective_fps,
            self.experiment.scheduler().missed_frames()
        );
    }

    fn abort(&mut self, event_loop: &ActiveEventLoop) {
        log::warn!(
            "aborted by operator at trial {}/{}; the open session is not exported",
            self.experiment.run().current_index() + 1,
            self.experiment.run().len()
        );
        self.status = Some(ExitStatus::Aborted);
        self.exit(event_loop);
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        self.error = Some(err);
        self.exit(event_loop);
    }

    fn exit(&mut self, event_loop: &ActiveEventLoop) {
        for surface in &self.surfaces {
            surface.window.set_cursor_visible(true);
        }
        event_loop.exit();
    }
}

fn eye_canvases(
    layout: SurfaceLayout,
    index: usize,
    size: PhysicalSize<u32>,
    display: DisplaySettings,
) -> Result<Vec<EyeCanvas>> {
    eye_viewports(layout, index, (size.width, size.height))
        .into_iter()
        .map(|v| {
            Ok(EyeCanvas {
                eye: v.eye,
                viewport: v.viewport,
                compositor: SkiaCompositor::new(v.width, v.height, display.distance, display.mirror)?,
            })
        })
        .collect()
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.surfaces.is_empty() {
            if let Err(err) = self.create_surfaces(event_loop) {
                self.fail(event_loop, err.context("failed to create presentation surfaces"));
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.abort(event_loop),
            WindowEvent::KeyboardInput { event, .. } if !event.repeat => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    if self.keys.key(code, event.state.is_pressed()) == KeyAction::Exit {
                        self.abort(event_loop);
                    }
                }
            }
            // presents happen on the frame clock only, see `step`
            WindowEvent::RedrawRequested => {}
            WindowEvent::Resized(size) => {
                if let Err(err) = self.resize(id, size) {
                    self.fail(event_loop, err);
                }
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                let size = self
                    .surfaces
                    .iter()
                    .find(|s| s.window.id() == id)
                    .map(|s| s.window.inner_size());
                if let Some(size) = size {
                    if let Err(err) = self.resize(id, size) {
                        self.fail(event_loop, err);
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.status.is_some() || self.error.is_some() {
            event_loop.exit();
            return;
        }
        if self.surfaces.is_empty() {
            return;
        }
        self.experiment.sleep_until_frame(SLEEP_SLACK);
        if let Err(err) = self.step() {
            self.fail(event_loop, err);
            return;
        }
        if self.status.is_some() {
            self.exit(event_loop);
            return;
        }
        let wake = Instant::now() + self.experiment.until_next_frame().saturating_sub(SLEEP_SLACK);
        event_loop.set_control_flow(ControlFlow::WaitUntil(wake));
    }
}
