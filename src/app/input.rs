use crate::material::TextureChannel;
use crate::ui::ControlId;
use winit::keyboard::{KeyCode, PhysicalKey};

pub const ROTATION_STEP_DEG: f64 = 5.0;
pub const SPEED_STEP: f64 = 0.005;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputAction {
    None,
    TogglePlaying,
    Nudge { control: ControlId, delta: f64 },
    Share,
    Reapply(TextureChannel),
    Quit,
}

impl InputAction {
    /// Whether a held key should keep firing the action.
    pub fn repeats(self) -> bool {
        matches!(self, InputAction::Nudge { .. })
    }
}

pub fn action_for_key(key: PhysicalKey) -> InputAction {
    let PhysicalKey::Code(code) = key else {
        return InputAction::None;
    };
    match code {
        KeyCode::Escape => InputAction::Quit,
        KeyCode::Space => InputAction::TogglePlaying,
        KeyCode::KeyS => InputAction::Share,
        KeyCode::ArrowLeft => nudge(ControlId::Rotation, -ROTATION_STEP_DEG),
        KeyCode::ArrowRight => nudge(ControlId::Rotation, ROTATION_STEP_DEG),
        KeyCode::ArrowUp => nudge(ControlId::Speed, SPEED_STEP),
        KeyCode::ArrowDown => nudge(ControlId::Speed, -SPEED_STEP),
        KeyCode::Digit1 => InputAction::Reapply(TextureChannel::Albedo),
        KeyCode::Digit2 => InputAction::Reapply(TextureChannel::Metalness),
        KeyCode::Digit3 => InputAction::Reapply(TextureChannel::Roughness),
        KeyCode::Digit4 => InputAction::Reapply(TextureChannel::Normal),
        KeyCode::Digit5 => InputAction::Reapply(TextureChannel::Height),
        KeyCode::Digit6 => InputAction::Reapply(TextureChannel::Emissive),
        _ => InputAction::None,
    }
}

fn nudge(control: ControlId, delta: f64) -> InputAction {
    InputAction::Nudge { control, delta }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrows_nudge_rotation_and_speed() {
        assert_eq!(
            action_for_key(PhysicalKey::Code(KeyCode::ArrowLeft)),
            InputAction::Nudge {
                control: ControlId::Rotation,
                delta: -5.0
            }
        );
        assert_eq!(
            action_for_key(PhysicalKey::Code(KeyCode::ArrowUp)),
            InputAction::Nudge {
                control: ControlId::Speed,
                delta: 0.005
            }
        );
    }

    #[test]
    fn digits_follow_channel_order() {
        let digits = [
            KeyCode::Digit1,
            KeyCode::Digit2,
            KeyCode::Digit3,
            KeyCode::Digit4,
            KeyCode::Digit5,
            KeyCode::Digit6,
        ];
        for (code, channel) in digits.into_iter().zip(TextureChannel::ALL) {
            assert_eq!(
                action_for_key(PhysicalKey::Code(code)),
                InputAction::Reapply(channel)
            );
        }
    }

    #[test]
    fn only_nudges_repeat() {
        assert!(!action_for_key(PhysicalKey::Code(KeyCode::Space)).repeats());
        assert!(action_for_key(PhysicalKey::Code(KeyCode::ArrowDown)).repeats());
        assert_eq!(action_for_key(PhysicalKey::Code(KeyCode::KeyQ)), InputAction::None);
    }
}
