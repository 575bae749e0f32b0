use bitflags::bitflags;

bitflags! {
    /// The eight physical buttons, independent of which nibble the game has
    /// selected on `P1`/`0xFF00`.
    #[derive(Default)]
    pub struct JoypadFlags: u8 {
        const RIGHT  = 0b0000_0001;
        const LEFT   = 0b0000_0010;
        const UP     = 0b0000_0100;
        const DOWN   = 0b0000_1000;
        const A      = 0b0001_0000;
        const B      = 0b0010_0000;
        const SELECT = 0b0100_0000;
        const START  = 0b1000_0000;
    }
}

const DIRECTION_KEYS: JoypadFlags = JoypadFlags::from_bits_truncate(
    JoypadFlags::RIGHT.bits() | JoypadFlags::LEFT.bits() | JoypadFlags::UP.bits() | JoypadFlags::DOWN.bits(),
);
const ACTION_KEYS: JoypadFlags = JoypadFlags::from_bits_truncate(
    JoypadFlags::A.bits() | JoypadFlags::B.bits() | JoypadFlags::SELECT.bits() | JoypadFlags::START.bits(),
);

/// The joypad matrix. Buttons are active-low both in the physical state we
/// track and in the `P1` register byte the CPU reads.
#[derive(Debug, Default)]
pub struct Joypad {
    pressed: JoypadFlags,
    select_directions: bool,
    select_actions: bool,
}

impl Joypad {
    /// Replaces the full pressed-button state. Returns `true` if any button
    /// transitioned released-to-pressed, regardless of which nibble is
    /// currently selected on `P1` — every such transition raises JOYPAD.
    pub fn set_keys(&mut self, pressed: JoypadFlags) -> bool {
        let newly_pressed = pressed & !self.pressed;
        self.pressed = pressed;
        newly_pressed != JoypadFlags::empty()
    }

    pub fn read_p1(&self) -> u8 {
        let mut low_nibble = 0x0F;
        if self.select_directions {
            low_nibble &= !(self.pressed & DIRECTION_KEYS).bits();
        }
        if self.select_actions {
            low_nibble &= !((self.pressed & ACTION_KEYS).bits() >> 4);
        }

        let mut byte = low_nibble & 0x0F;
        if !self.select_directions {
            byte |= 0b0001_0000;
        }
        if !self.select_actions {
            byte |= 0b0010_0000;
        }
        byte | 0b1100_0000
    }

    pub fn write_p1(&mut self, value: u8) {
        self.select_directions = value & 0b0001_0000 == 0;
        self.select_actions = value & 0b0010_0000 == 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_keys_pressed_reads_all_ones() {
        let mut joypad = Joypad::default();
        joypad.write_p1(0x00);
        assert_eq!(joypad.read_p1() & 0x0F, 0x0F);
    }

    #[test]
    fn test_direction_select_reflects_pressed_key() {
        let mut joypad = Joypad::default();
        joypad.set_keys(JoypadFlags::DOWN);
        joypad.write_p1(0b1110_1111);
        assert_eq!(joypad.read_p1() & 0x0F, 0b0111);
    }

    #[test]
    fn test_any_press_transition_raises_interrupt_regardless_of_selection() {
        let mut joypad = Joypad::default();
        joypad.write_p1(0b1110_1111); // directions selected
        assert!(joypad.set_keys(JoypadFlags::DOWN));

        // action nibble selected instead, but a direction key transition
        // still raises JOYPAD: selection only gates what P1 reports back.
        let mut joypad = Joypad::default();
        joypad.write_p1(0b1101_1111);
        assert!(joypad.set_keys(JoypadFlags::DOWN));

        // no transition at all: already-pressed key re-sent changes nothing.
        assert!(!joypad.set_keys(JoypadFlags::DOWN));
    }
}
