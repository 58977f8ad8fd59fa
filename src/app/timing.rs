use std::time::{Duration, Instant};
use winit::window::Window;

const TITLE_REFRESH: Duration = Duration::from_millis(500);

/// Frame cadence and render cost, reported in the window title.
pub struct FrameTiming {
    last_frame_time: Option<Instant>,
    last_title_time: Instant,
    frame_count: u32,
    fps: f32,
    frame_dt: f32,
    render_ms: f32,
    base_title: String,
}

impl FrameTiming {
    pub fn new(base_title: String, now: Instant) -> Self {
        Self {
            last_frame_time: None,
            last_title_time: now,
            frame_count: 0,
            fps: 0.0,
            frame_dt: 1.0 / 60.0,
            render_ms: 0.0,
            base_title,
        }
    }

    pub fn set_render_ms(&mut self, render_ms: f32) {
        self.render_ms = render_ms;
    }

    /// Records a frame. Returns the new title when it is due for a refresh.
    pub fn update(&mut self, now: Instant, status: &str) -> Option<String> {
        let dt = match self.last_frame_time {
            Some(last) => now.saturating_duration_since(last),
            None => Duration::from_millis(16),
        };
        self.last_frame_time = Some(now);
        self.frame_dt = dt.as_secs_f32();
        self.frame_count = self.frame_count.saturating_add(1);

        let elapsed = now.saturating_duration_since(self.last_title_time);
        if elapsed < TITLE_REFRESH {
            return None;
        }
        self.fps = self.frame_count as f32 / elapsed.as_secs_f32();
        self.frame_count = 0;
        self.last_title_time = now;
        Some(format!(
            "{} - {:.1} fps (cadence {:.2} ms, render {:.2} ms) - {}",
            self.base_title,
            self.fps,
            self.frame_dt * 1000.0,
            self.render_ms,
            status
        ))
    }

    pub fn update_window(&mut self, window: &Window, now: Instant, status: &str) {
        if let Some(title) = self.update(now, status) {
            window.set_title(&title);
        }
    }
}
