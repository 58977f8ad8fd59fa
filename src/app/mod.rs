mod egui_host;
mod input;
mod timing;

use crate::assets::FileSource;
use crate::config::{Config, ConfigError};
use crate::configurator::Configurator;
use crate::params::share::{ShareOutcome, SystemClipboard};
use crate::render::HeadlessBackend;
use crate::ui::{self, ActionOutcome, ControlId, ControlPanel, ControlValue};
use egui_host::EguiHost;
use input::InputAction;
use timing::FrameTiming;

use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

const PIXELS_PER_WHEEL_LINE: f32 = 50.0;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
}

pub struct App {
    session: Configurator,
    /// Shares its frame log with the backend owned by the session.
    backend: HeadlessBackend,
    panel: ControlPanel,
    window: Option<Arc<Window>>,
    egui: Option<EguiHost>,
    timing: FrameTiming,
    target_frame_duration: Duration,
    next_frame_time: Instant,
    cursor: Option<(f32, f32)>,
    orbiting: bool,
    error: Option<AppError>,
}

impl App {
    fn new(config: Config, query: Option<&str>) -> Result<Self, AppError> {
        let title = config.window.title.clone();
        let backend = HeadlessBackend::new();
        let mut session = Configurator::new(
            config,
            Box::new(backend.clone()),
            Arc::new(FileSource),
            Box::new(SystemClipboard::new()),
        )?;
        let rejected = session.start(query);
        if !rejected.is_empty() {
            log::warn!("{} link field(s) ignored", rejected.len());
        }

        let now = Instant::now();
        Ok(Self {
            session,
            backend,
            panel: ControlPanel::new(),
            window: None,
            egui: None,
            timing: FrameTiming::new(title, now),
            target_frame_duration: Duration::from_millis(16),
            next_frame_time: now,
            cursor: None,
            orbiting: false,
            error: None,
        })
    }

    fn update_target_frame_duration(&mut self, window: &Window) {
        let mut target = Duration::from_millis(16);
        if let Some(millihz) = window
            .current_monitor()
            .and_then(|monitor| monitor.refresh_rate_millihertz())
        {
            let hz = millihz as f32 / 1000.0;
            if hz > 1.0 {
                target = Duration::from_secs_f32(1.0 / hz);
            }
        }
        self.target_frame_duration = target;
        self.next_frame_time = Instant::now() + self.target_frame_duration;
    }

    fn redraw(&mut self) {
        let Some(window) = self.window.clone() else {
            return;
        };
        let frame_start = Instant::now();
        self.session.poll_assets();

        let shared = self
            .egui
            .as_mut()
            .and_then(|egui| egui.draw_panel(&window, &self.panel, &mut self.session));
        if let Some(outcome) = shared {
            announce_share(&outcome);
        }

        let report = self.session.tick();
        self.timing
            .set_render_ms(frame_start.elapsed().as_secs_f32() * 1000.0);
        let viewport = self.session.pipeline().viewport();
        let status = format!(
            "{:.1}° {} - {}x{} - model {}",
            report.rotation_degrees,
            if self.session.params().is_playing() {
                "playing"
            } else {
                "paused"
            },
            viewport.width,
            viewport.height,
            self.session.loader().model_state().label()
        );
        self.timing.update_window(&window, Instant::now(), &status);
    }

    fn handle_action(&mut self, action: InputAction, event_loop: &ActiveEventLoop) {
        let result = match action {
            InputAction::None => Ok(()),
            InputAction::Quit => {
                event_loop.exit();
                Ok(())
            }
            InputAction::TogglePlaying => {
                let playing = self.session.params().is_playing();
                self.panel.set(
                    ControlId::Playing,
                    &mut self.session,
                    ControlValue::Toggle(!playing),
                )
            }
            InputAction::Nudge { control, delta } => {
                self.panel.nudge(control, &mut self.session, delta)
            }
            InputAction::Share => self.trigger(ControlId::Share),
            InputAction::Reapply(channel) => self.trigger(ControlId::Reapply(channel)),
        };
        if let Err(err) = result {
            log::warn!("{}", err);
        }
    }

    fn trigger(&mut self, id: ControlId) -> ui::Result<()> {
        if let ActionOutcome::Shared(outcome) = self.panel.trigger(id, &mut self.session)? {
            announce_share(&outcome);
        }
        Ok(())
    }

    fn handle_resize(&mut self, size: PhysicalSize<u32>) {
        self.session.resize(size.width, size.height);
    }
}

/// A copied link is acknowledged in the log and the panel label. A link
/// that could not be copied also gets a warning dialog, which blocks the
/// frame loop until dismissed.
fn announce_share(outcome: &ShareOutcome) {
    match share_dialog(outcome) {
        Some(dialog) => {
            dialog.show();
        }
        None => log::info!("Link copied: {}", outcome.link()),
    }
}

fn share_dialog(outcome: &ShareOutcome) -> Option<rfd::MessageDialog> {
    match outcome {
        ShareOutcome::Copied { .. } => None,
        ShareOutcome::ShownAsText { .. } => Some(
            rfd::MessageDialog::new()
                .set_title("Share")
                .set_description(outcome.message())
                .set_level(rfd::MessageLevel::Warning)
                .set_buttons(rfd::MessageButtons::Ok),
        ),
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let config = &self.session.config().window;
        let window_attrs = WindowAttributes::default()
            .with_title(config.title.clone())
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .with_resizable(true);

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Failed to create window: {}", err);
                self.error = Some(err.into());
                event_loop.exit();
                return;
            }
        };

        self.egui = Some(EguiHost::attach(&window));
        self.handle_resize(window.inner_size());
        self.update_target_frame_duration(&window);
        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let consumed = match (&mut self.egui, &self.window) {
            (Some(egui), Some(window)) => egui.feed(window, &event),
            _ => false,
        };
        let ui_wants_pointer = self.egui.as_ref().is_some_and(EguiHost::captures_pointer);
        let ui_wants_keyboard = self.egui.as_ref().is_some_and(EguiHost::captures_keyboard);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Focused(false) => {
                self.orbiting = false;
                self.cursor = None;
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if consumed || ui_wants_keyboard || event.state != ElementState::Pressed {
                    return;
                }
                let action = input::action_for_key(event.physical_key);
                if event.repeat && !action.repeats() {
                    return;
                }
                self.handle_action(action, event_loop);
            }
            WindowEvent::Resized(new_size) => {
                self.handle_resize(new_size);
                if let Some(window) = self.window.clone() {
                    self.update_target_frame_duration(&window);
                }
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(window) = self.window.clone() {
                    self.handle_resize(window.inner_size());
                }
            }
            WindowEvent::Moved(_) => {
                if let Some(window) = self.window.clone() {
                    self.update_target_frame_duration(&window);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let position = (position.x as f32, position.y as f32);
                if let (true, Some((x, y))) = (self.orbiting, self.cursor) {
                    self.session
                        .orbit_mut()
                        .rotate(position.0 - x, position.1 - y);
                }
                self.cursor = Some(position);
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.orbiting =
                    state == ElementState::Pressed && !consumed && !ui_wants_pointer;
            }
            WindowEvent::MouseWheel { delta, .. } => {
                if consumed || ui_wants_pointer {
                    return;
                }
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / PIXELS_PER_WHEEL_LINE,
                };
                self.session.orbit_mut().zoom(steps);
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        if now >= self.next_frame_time {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
            self.next_frame_time = now + self.target_frame_duration;
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_frame_time));
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        log::info!(
            "Session ended after {} ticks: {}",
            self.session.ticks(),
            self.backend.log().summary()
        );
    }
}

/// Opens the window and drives the session until it closes.
pub fn run(config: Config, query: Option<String>) -> Result<(), AppError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config, query.as_deref())?;
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
