use super::{ActionOutcome, Binding, ControlKind, ControlPanel, ControlValue, Folder};
use crate::configurator::Configurator;
use crate::params::share::ShareOutcome;

/// Draws the control panel. Returns the outcome of a share triggered this
/// frame, if any.
pub fn draw_panel(
    ctx: &egui::Context,
    panel: &ControlPanel,
    configurator: &mut Configurator,
) -> Option<ShareOutcome> {
    let mut shared = None;
    egui::Window::new("Controls")
        .default_pos(egui::pos2(12.0, 12.0))
        .resizable(false)
        .show(ctx, |ui| {
            for folder in Folder::ALL {
                if folder == Folder::Top {
                    for binding in panel.folder(folder) {
                        shared = draw_binding(ui, panel, binding, configurator).or(shared.take());
                    }
                    continue;
                }
                egui::CollapsingHeader::new(folder.label())
                    .default_open(folder == Folder::Animation)
                    .show(ui, |ui| {
                        for binding in panel.folder(folder) {
                            shared = draw_binding(ui, panel, binding, configurator).or(shared.take());
                        }
                    });
            }

            if let Some(outcome) = configurator.last_share() {
                ui.separator();
                match outcome {
                    ShareOutcome::Copied { .. } => {
                        ui.label(outcome.message());
                    }
                    ShareOutcome::ShownAsText { link, .. } => {
                        ui.label("Copy this link:");
                        let mut text = link.to_string();
                        ui.add(egui::TextEdit::singleline(&mut text).desired_width(280.0));
                    }
                }
            }
        });
    shared
}

fn draw_binding(
    ui: &mut egui::Ui,
    panel: &ControlPanel,
    binding: &Binding,
    configurator: &mut Configurator,
) -> Option<ShareOutcome> {
    let value = match binding.kind {
        ControlKind::Action => {
            if !ui.button(binding.label.as_str()).clicked() {
                return None;
            }
            return match panel.trigger(binding.id, configurator) {
                Ok(ActionOutcome::Shared(outcome)) => Some(outcome),
                Ok(ActionOutcome::Done) => None,
                Err(err) => {
                    log::warn!("{}", err);
                    None
                }
            };
        }
        _ => match panel.get(binding.id, configurator) {
            Ok(value) => value,
            Err(err) => {
                log::warn!("{}", err);
                return None;
            }
        },
    };

    let edited = match (binding.kind, value) {
        (ControlKind::Number { min, max, step }, ControlValue::Number(mut number)) => {
            let mut slider = egui::Slider::new(&mut number, min..=max).text(binding.label.as_str());
            if let Some(step) = step {
                slider = slider.step_by(step);
            }
            ui.add(slider).changed().then_some(ControlValue::Number(number))
        }
        (ControlKind::Toggle, ControlValue::Toggle(mut on)) => ui
            .checkbox(&mut on, binding.label.as_str())
            .changed()
            .then_some(ControlValue::Toggle(on)),
        (ControlKind::Color, ControlValue::Color(mut rgb)) => ui
            .horizontal(|ui| {
                let changed = ui.color_edit_button_rgb(&mut rgb).changed();
                ui.label(binding.label.as_str());
                changed
            })
            .inner
            .then_some(ControlValue::Color(rgb)),
        _ => None,
    };

    if let Some(value) = edited {
        if let Err(err) = panel.set(binding.id, configurator, value) {
            log::warn!("{}", err);
        }
    }
    None
}
