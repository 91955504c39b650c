use flickex_experiment::InputState;
use winit::keyboard::KeyCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Input,
    Exit,
    Ignored,
}

/// Keyboard state between frame ticks.
///
/// Keys are sampled only when a frame is due, so a press that is released
/// again before the next tick is latched until [`KeyLatch::consume`].
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyLatch {
    held: InputState,
    pressed: InputState,
}

impl KeyLatch {
    pub fn key(&mut self, code: KeyCode, down: bool) -> KeyAction {
        let slot = match code {
            KeyCode::Enter | KeyCode::NumpadEnter | KeyCode::Space => Slot::Start,
            KeyCode::ArrowLeft => Slot::Left,
            KeyCode::ArrowRight => Slot::Right,
            KeyCode::Escape if down => return KeyAction::Exit,
            _ => return KeyAction::Ignored,
        };
        *slot.of(&mut self.held) = down;
        if down {
            *slot.of(&mut self.pressed) = true;
        }
        KeyAction::Input
    }

    pub fn state(&self) -> InputState {
        self.held.merge(self.pressed)
    }

    /// Drops latched presses once a tick has sampled them.
    pub fn consume(&mut self) {
        self.pressed = InputState::default();
    }
}

#[derive(Clone, Copy)]
enum Slot {
    Start,
    Left,
    Right,
}

impl Slot {
    fn of(self, state: &mut InputState) -> &mut bool {
        match self {
            Slot::Start => &mut state.start,
            Slot::Left => &mut state.left,
            Slot::Right => &mut state.right,
        }
    }
}
