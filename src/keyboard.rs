use crate::error::EmulatorError;

pub const NUM_KEYS: usize = 16;

/// State of the 16-key hex pad, indexed 0x0..=0xF.
///
/// The engine never reads host input devices; the input collaborator pushes
/// presses and releases in through [`Keyboard::set_key`].
pub struct Keyboard {
    keys: [bool; NUM_KEYS],
}

impl Keyboard {
    pub fn new() -> Self {
        Self {
            keys: [false; NUM_KEYS],
        }
    }

    pub fn set_key(&mut self, key: u8, pressed: bool) -> Result<(), EmulatorError> {
        match self.keys.get_mut(key as usize) {
            Some(slot) => {
                *slot = pressed;
                Ok(())
            }
            None => Err(EmulatorError::InvalidRegisterIndex { index: key }),
        }
    }

    pub fn is_pressed(&self, key: u8) -> Result<bool, EmulatorError> {
        self.keys
            .get(key as usize)
            .copied()
            .ok_or(EmulatorError::InvalidRegisterIndex { index: key })
    }

    pub fn reset(&mut self) {
        self.keys = [false; NUM_KEYS];
    }
}

impl Default for Keyboard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_start_released() {
        let keyboard = Keyboard::new();
        for key in 0..NUM_KEYS as u8 {
            assert_eq!(keyboard.is_pressed(key), Ok(false));
        }
    }

    #[test]
    fn press_and_release_roundtrip() {
        let mut keyboard = Keyboard::new();
        keyboard.set_key(0xA, true).unwrap();
        assert_eq!(keyboard.is_pressed(0xA), Ok(true));
        keyboard.set_key(0xA, false).unwrap();
        assert_eq!(keyboard.is_pressed(0xA), Ok(false));
    }

    #[test]
    fn out_of_range_key_is_rejected() {
        let mut keyboard = Keyboard::new();
        assert_eq!(
            keyboard.set_key(16, true),
            Err(EmulatorError::InvalidRegisterIndex { index: 16 })
        );
        assert_eq!(
            keyboard.is_pressed(16),
            Err(EmulatorError::InvalidRegisterIndex { index: 16 })
        );
    }
}
