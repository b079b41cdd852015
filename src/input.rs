//! Program-visible input state.

use bitflags::bitflags;

bitflags! {
    /// Virtual gamepad buttons, one bit per button.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Buttons: u8 {
        const LEFT   = 0x01;
        const RIGHT  = 0x02;
        const UP     = 0x04;
        const DOWN   = 0x08;
        const A      = 0x10;
        const B      = 0x20;
        const START  = 0x40;
        const SELECT = 0x80;
    }
}

/// Button indices exposed to programs, in `Buttons` bit order.
pub const BUTTON_COUNT: u8 = 8;

#[derive(Debug, Clone, Copy, Default)]
pub struct InputState {
    buttons: Buttons,
    restart_chord: bool,
}

impl InputState {
    /// Replace the whole button mask for this frame.
    pub fn set_buttons(&mut self, buttons: Buttons) {
        self.buttons = buttons;
    }

    pub fn set_restart_chord(&mut self, down: bool) {
        self.restart_chord = down;
    }

    /// Is button index `i` (0-7) held this frame?
    pub fn pressed(&self, i: u8) -> bool {
        debug_assert!(i < BUTTON_COUNT);
        self.buttons.bits() & (1 << i) != 0
    }

    /// Is the restart chord held this frame?
    pub fn restart_chord(&self) -> bool {
        self.restart_chord
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_match_flag_order() {
        let mut input = InputState::default();
        input.set_buttons(Buttons::LEFT | Buttons::A | Buttons::SELECT);
        assert!(input.pressed(0));
        assert!(!input.pressed(1));
        assert!(input.pressed(4));
        assert!(input.pressed(7));
        assert!(!input.pressed(6));
    }
}
