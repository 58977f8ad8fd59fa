//! Control panel binding table.
//!
//! Each control names the getter/setter (or trigger) it drives on the
//! session. The table is built once; the egui panel and the keyboard
//! shortcuts both go through it, so there are no side channels.

mod panel;

pub use panel::draw_panel;

use crate::configurator::Configurator;
use crate::material::TextureChannel;
use crate::params::share::ShareOutcome;
use crate::params::{ROTATION_PERIOD_DEG, SPEED_MAX, SPEED_MIN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlId {
    Play,
    Pause,
    Speed,
    Rotation,
    Playing,
    Reapply(TextureChannel),
    EmissiveColor,
    EmissiveIntensity,
    DisplacementScale,
    AmbientIntensity,
    DirectionalIntensity,
    Share,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Folder {
    Animation,
    Textures,
    Material,
    Lights,
    /// Controls shown outside any folder.
    Top,
}

impl Folder {
    pub const ALL: [Folder; 5] = [
        Folder::Animation,
        Folder::Textures,
        Folder::Material,
        Folder::Lights,
        Folder::Top,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Folder::Animation => "Animation",
            Folder::Textures => "Textures",
            Folder::Material => "Material",
            Folder::Lights => "Lights",
            Folder::Top => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlKind {
    Number { min: f64, max: f64, step: Option<f64> },
    Toggle,
    Color,
    Action,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlValue {
    Number(f64),
    Toggle(bool),
    Color([f32; 3]),
}

#[derive(Debug, Clone)]
pub enum ActionOutcome {
    Done,
    Shared(ShareOutcome),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BindError {
    #[error("no control bound to {0:?}")]
    Unknown(ControlId),
    #[error("control {id:?} does not accept {value:?}")]
    WrongValue { id: ControlId, value: ControlValue },
    #[error("control {0:?} is an action")]
    NotAValue(ControlId),
    #[error("control {0:?} is not an action")]
    NotAnAction(ControlId),
}

pub type Result<T> = std::result::Result<T, BindError>;

type Getter = fn(&Configurator) -> ControlValue;
type Setter = fn(&mut Configurator, ControlValue) -> bool;
type Trigger = fn(&mut Configurator, ControlId) -> ActionOutcome;

#[derive(Clone, Copy)]
enum Access {
    Value { get: Getter, set: Setter },
    Action(Trigger),
}

#[derive(Clone)]
pub struct Binding {
    pub id: ControlId,
    pub label: String,
    pub folder: Folder,
    pub kind: ControlKind,
    access: Access,
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("folder", &self.folder)
            .field("kind", &self.kind)
            .finish()
    }
}

impl Binding {
    fn value(
        id: ControlId,
        label: &str,
        folder: Folder,
        kind: ControlKind,
        get: Getter,
        set: Setter,
    ) -> Self {
        Self {
            id,
            label: label.to_string(),
            folder,
            kind,
            access: Access::Value { get, set },
        }
    }

    fn action(id: ControlId, label: &str, folder: Folder, trigger: Trigger) -> Self {
        Self {
            id,
            label: label.to_string(),
            folder,
            kind: ControlKind::Action,
            access: Access::Action(trigger),
        }
    }
}

fn number(min: f64, max: f64) -> ControlKind {
    ControlKind::Number {
        min,
        max,
        step: None,
    }
}

pub struct ControlPanel {
    bindings: Vec<Binding>,
}

impl Default for ControlPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlPanel {
    pub fn new() -> Self {
        let mut bindings = vec![
            Binding::action(ControlId::Play, "play", Folder::Animation, |c, _| {
                c.play();
                ActionOutcome::Done
            }),
            Binding::action(ControlId::Pause, "pause", Folder::Animation, |c, _| {
                c.pause();
                ActionOutcome::Done
            }),
            Binding::value(
                ControlId::Speed,
                "speed",
                Folder::Animation,
                ControlKind::Number {
                    min: SPEED_MIN,
                    max: SPEED_MAX,
                    step: Some(0.001),
                },
                |c| ControlValue::Number(c.params().speed()),
                |c, value| match value {
                    ControlValue::Number(speed) => {
                        c.params_mut().set_speed(speed);
                        true
                    }
                    _ => false,
                },
            ),
            Binding::value(
                ControlId::Rotation,
                "rotation",
                Folder::Animation,
                number(0.0, ROTATION_PERIOD_DEG),
                |c| ControlValue::Number(c.params().rotation_degrees()),
                |c, value| match value {
                    ControlValue::Number(degrees) => {
                        c.params_mut().set_rotation_degrees(degrees);
                        true
                    }
                    _ => false,
                },
            ),
            Binding::value(
                ControlId::Playing,
                "playing",
                Folder::Animation,
                ControlKind::Toggle,
                |c| ControlValue::Toggle(c.params().is_playing()),
                |c, value| match value {
                    ControlValue::Toggle(true) => {
                        c.play();
                        true
                    }
                    ControlValue::Toggle(false) => {
                        c.pause();
                        true
                    }
                    _ => false,
                },
            ),
        ];

        for channel in TextureChannel::ALL {
            bindings.push(Binding::action(
                ControlId::Reapply(channel),
                &format!("re-apply {}", channel),
                Folder::Textures,
                reapply_channel,
            ));
        }

        bindings.extend([
            Binding::value(
                ControlId::EmissiveColor,
                "emissive color",
                Folder::Material,
                ControlKind::Color,
                |c| ControlValue::Color(c.materials().constants().emissive_rgb),
                |c, value| match value {
                    ControlValue::Color(rgb) => {
                        c.set_emissive_rgb(rgb);
                        true
                    }
                    _ => false,
                },
            ),
            Binding::value(
                ControlId::EmissiveIntensity,
                "emissive intensity",
                Folder::Material,
                number(0.0, 10.0),
                |c| ControlValue::Number(c.materials().constants().emissive_intensity as f64),
                |c, value| match value {
                    ControlValue::Number(intensity) => {
                        c.set_emissive_intensity(intensity as f32);
                        true
                    }
                    _ => false,
                },
            ),
            Binding::value(
                ControlId::DisplacementScale,
                "displacement scale",
                Folder::Material,
                number(0.0, 1.0),
                |c| ControlValue::Number(c.materials().constants().displacement_scale as f64),
                |c, value| match value {
                    ControlValue::Number(scale) => {
                        c.set_displacement_scale(scale as f32);
                        true
                    }
                    _ => false,
                },
            ),
            Binding::value(
                ControlId::AmbientIntensity,
                "ambient intensity",
                Folder::Lights,
                number(0.0, 2.0),
                |c| ControlValue::Number(c.ambient_intensity() as f64),
                |c, value| match value {
                    ControlValue::Number(intensity) => {
                        c.set_ambient_intensity(intensity as f32);
                        true
                    }
                    _ => false,
                },
            ),
            Binding::value(
                ControlId::DirectionalIntensity,
                "directional intensity",
                Folder::Lights,
                number(0.0, 5.0),
                |c| ControlValue::Number(c.directional_intensity() as f64),
                |c, value| match value {
                    ControlValue::Number(intensity) => {
                        c.set_directional_intensity(intensity as f32);
                        true
                    }
                    _ => false,
                },
            ),
            Binding::action(ControlId::Share, "share", Folder::Top, |c, _| {
                ActionOutcome::Shared(c.share())
            }),
        ]);

        Self { bindings }
    }

    pub fn folder(&self, folder: Folder) -> impl Iterator<Item = &Binding> {
        self.bindings
            .iter()
            .filter(move |binding| binding.folder == folder)
    }

    pub fn binding(&self, id: ControlId) -> Result<&Binding> {
        self.bindings
            .iter()
            .find(|binding| binding.id == id)
            .ok_or(BindError::Unknown(id))
    }

    pub fn get(&self, id: ControlId, configurator: &Configurator) -> Result<ControlValue> {
        match self.binding(id)?.access {
            Access::Value { get, .. } => Ok(get(configurator)),
            Access::Action(_) => Err(BindError::NotAValue(id)),
        }
    }

    pub fn set(
        &self,
        id: ControlId,
        configurator: &mut Configurator,
        value: ControlValue,
    ) -> Result<()> {
        match self.binding(id)?.access {
            Access::Value { set, .. } => {
                if set(configurator, value) {
                    log::debug!("{:?} <- {:?}", id, value);
                    Ok(())
                } else {
                    Err(BindError::WrongValue { id, value })
                }
            }
            Access::Action(_) => Err(BindError::NotAValue(id)),
        }
    }

    /// Adds `delta` to a numeric control.
    pub fn nudge(&self, id: ControlId, configurator: &mut Configurator, delta: f64) -> Result<()> {
        match self.get(id, configurator)? {
            ControlValue::Number(current) => {
                self.set(id, configurator, ControlValue::Number(current + delta))
            }
            value => Err(BindError::WrongValue { id, value }),
        }
    }

    pub fn trigger(&self, id: ControlId, configurator: &mut Configurator) -> Result<ActionOutcome> {
        match self.binding(id)?.access {
            Access::Action(trigger) => {
                log::debug!("{:?} triggered", id);
                Ok(trigger(configurator, id))
            }
            Access::Value { .. } => Err(BindError::NotAnAction(id)),
        }
    }
}

fn reapply_channel(configurator: &mut Configurator, id: ControlId) -> ActionOutcome {
    if let ControlId::Reapply(channel) = id {
        configurator.reapply_channel(channel);
    }
    ActionOutcome::Done
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::tests::StubSource;
    use crate::config::Config;
    use crate::params::share::{ClipboardError, ClipboardSink};
    use crate::render::HeadlessBackend;
    use std::sync::Arc;

    struct NoClipboard;

    impl ClipboardSink for NoClipboard {
        fn write_text(&mut self, _text: &str) -> std::result::Result<(), ClipboardError> {
            Err(ClipboardError::Unavailable("headless".to_string()))
        }
    }

    fn configurator() -> Configurator {
        Configurator::new(
            Config::default(),
            Box::new(HeadlessBackend::new()),
            Arc::new(StubSource),
            Box::new(NoClipboard),
        )
        .unwrap()
    }

    #[test]
    fn table_covers_every_folder() {
        let panel = ControlPanel::new();
        let ids: Vec<_> = panel.folder(Folder::Animation).map(|b| b.id).collect();
        assert_eq!(
            ids,
            [
                ControlId::Play,
                ControlId::Pause,
                ControlId::Speed,
                ControlId::Rotation,
                ControlId::Playing
            ]
        );
        assert_eq!(panel.folder(Folder::Textures).count(), 6);
        assert_eq!(panel.folder(Folder::Material).count(), 3);
        assert_eq!(panel.folder(Folder::Lights).count(), 2);
        assert!(panel.binding(ControlId::Share).is_ok());
    }

    #[test]
    fn sets_go_straight_to_the_store() {
        let panel = ControlPanel::new();
        let mut c = configurator();
        panel
            .set(ControlId::Speed, &mut c, ControlValue::Number(0.5))
            .unwrap();
        assert_eq!(c.params().speed(), SPEED_MAX);
        panel
            .set(ControlId::Playing, &mut c, ControlValue::Toggle(false))
            .unwrap();
        assert!(!c.params().is_playing());
        assert_eq!(
            panel.get(ControlId::Playing, &c).unwrap(),
            ControlValue::Toggle(false)
        );
    }

    #[test]
    fn rotation_nudge_wraps() {
        let panel = ControlPanel::new();
        let mut c = configurator();
        panel
            .set(ControlId::Rotation, &mut c, ControlValue::Number(358.0))
            .unwrap();
        panel.nudge(ControlId::Rotation, &mut c, 5.0).unwrap();
        assert!((c.params().rotation_degrees() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn wrong_value_kind_is_rejected() {
        let panel = ControlPanel::new();
        let mut c = configurator();
        assert!(matches!(
            panel.set(ControlId::Speed, &mut c, ControlValue::Toggle(true)),
            Err(BindError::WrongValue { .. })
        ));
        assert_eq!(
            panel.get(ControlId::Share, &c),
            Err(BindError::NotAValue(ControlId::Share))
        );
        assert!(matches!(
            panel.trigger(ControlId::Speed, &mut c),
            Err(BindError::NotAnAction(ControlId::Speed))
        ));
    }

    #[test]
    fn share_action_falls_back_to_text() {
        let panel = ControlPanel::new();
        let mut c = configurator();
        let outcome = panel.trigger(ControlId::Share, &mut c).unwrap();
        let ActionOutcome::Shared(ShareOutcome::ShownAsText { link, .. }) = outcome else {
            panic!("expected a text fallback");
        };
        assert_eq!(link.query(), Some("rotation=0&speed=0.01&isAnimating=1"));
    }

    #[test]
    fn material_controls_reach_the_pipeline() {
        let panel = ControlPanel::new();
        let mut c = configurator();
        panel
            .set(ControlId::EmissiveIntensity, &mut c, ControlValue::Number(7.5))
            .unwrap();
        panel
            .set(ControlId::EmissiveColor, &mut c, ControlValue::Color([0.0, 1.0, 0.5]))
            .unwrap();
        assert_eq!(c.materials().constants().emissive_intensity, 7.5);
        assert_eq!(c.materials().constants().emissive_rgb, [0.0, 1.0, 0.5]);
        assert!(matches!(
            panel.trigger(ControlId::Reapply(TextureChannel::Normal), &mut c),
            Ok(ActionOutcome::Done)
        ));
    }
}
