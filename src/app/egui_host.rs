use crate::configurator::Configurator;
use crate::params::share::ShareOutcome;
use crate::render::OverlayFrame;
use crate::ui::{self, ControlPanel};
use egui_winit::winit::event::WindowEvent;
use winit::dpi::PhysicalSize;
use winit::window::Window;

/// Owns the egui context for the control panel. Each frame it draws the
/// panel against the session and hands the tessellated overlay to the
/// session's render pipeline.
pub struct EguiHost {
    ctx: egui::Context,
    input: egui_winit::State,
    captures_pointer: bool,
    captures_keyboard: bool,
}

impl EguiHost {
    pub fn attach(window: &Window) -> Self {
        let ctx = egui::Context::default();
        ctx.set_pixels_per_point(window.scale_factor() as f32);
        let input = egui_winit::State::new(
            ctx.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            window.theme(),
            None,
        );
        Self {
            ctx,
            input,
            captures_pointer: false,
            captures_keyboard: false,
        }
    }

    /// Forwards a window event. Returns true when the scene must not see it.
    pub fn feed(&mut self, window: &Window, event: &WindowEvent) -> bool {
        let response = self.input.on_window_event(window, event);
        if response.repaint {
            window.request_redraw();
        }
        response.consumed
    }

    /// True while the pointer is over the panel or dragging one of its widgets.
    pub fn captures_pointer(&self) -> bool {
        self.captures_pointer
    }

    /// True while a panel widget holds keyboard focus.
    pub fn captures_keyboard(&self) -> bool {
        self.captures_keyboard
    }

    /// Draws the control panel and installs the overlay on the session's
    /// pipeline. Returns the outcome of a share triggered from the panel.
    pub fn draw_panel(
        &mut self,
        window: &Window,
        panel: &ControlPanel,
        session: &mut Configurator,
    ) -> Option<ShareOutcome> {
        let raw_input = self.input.take_egui_input(window);
        let mut shared = None;
        let output = self.ctx.run(raw_input, |ctx| {
            if let Some(outcome) = ui::draw_panel(ctx, panel, session) {
                shared = Some(outcome);
            }
        });
        self.input
            .handle_platform_output(window, output.platform_output);

        self.captures_pointer = self.ctx.wants_pointer_input();
        self.captures_keyboard = self.ctx.wants_keyboard_input();

        let overlay = OverlayFrame {
            primitives: self.ctx.tessellate(output.shapes, output.pixels_per_point),
            textures_delta: output.textures_delta,
            pixels_per_point: output.pixels_per_point,
            screen_size_px: overlay_extent(window.inner_size()),
        };
        session.pipeline_mut().set_overlay(overlay);
        shared
    }
}

/// Screen extent for the overlay; a minimised window still paints into 1x1.
fn overlay_extent(size: PhysicalSize<u32>) -> [u32; 2] {
    [size.width.max(1), size.height.max(1)]
}
