//! Control characteristic payloads.
//!
//! Two wire layouts share the characteristic, picked per deployment:
//! ```text
//! Button:  1 byte, ASCII  'a' | 'b' | 'x' | 'y' | '!' (idle)
//!          (2-byte form [ascii, 0x00] from the i16-packing remote is accepted)
//! Reading: 2 bytes, i16 little-endian, hundredths of a unit
//! ```
//! Decoding is total: anything unrecognised becomes [`Command::Unknown`].

/// Largest payload any command encodes to.
pub const MAX_COMMAND_SIZE: usize = 2;

/// Idle sentinel byte sent when no button is held.
pub const IDLE_BYTE: u8 = b'!';

/// Which layout the control characteristic carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PayloadKind {
    Button,
    Reading,
}

/// Physical button on the remote.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Button {
    A,
    B,
    X,
    Y,
}

impl Button {
    /// Sampling priority: the first pressed button in this order wins.
    pub const PRIORITY: [Button; 4] = [Button::A, Button::B, Button::X, Button::Y];
}

/// Signed fixed-point value in hundredths of a unit.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reading(pub i16);

impl Reading {
    pub const ZERO: Reading = Reading(0);

    /// Scale by 100, truncating toward zero and saturating at the i16 range.
    pub fn from_f32(value: f32) -> Self {
        // `as` from float saturates and maps NaN to 0.
        Reading((value * 100.0) as i16)
    }

    pub fn as_f32(self) -> f32 {
        f32::from(self.0) / 100.0
    }

    /// Hundredths as stored on the wire.
    pub fn centi(self) -> i16 {
        self.0
    }

    /// Little-endian i16 decode. Anything but exactly two bytes is `0`.
    pub fn decode(data: &[u8]) -> Self {
        match data {
            [lo, hi] => Reading(i16::from_le_bytes([*lo, *hi])),
            _ => Reading::ZERO,
        }
    }
}

/// Logical event carried by the control characteristic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    ButtonA,
    ButtonB,
    ButtonX,
    ButtonY,
    /// No button held.
    Idle,
    /// Numeric sensor value.
    Reading(Reading),
    /// Payload outside the command set.
    Unknown,
}

impl From<Button> for Command {
    fn from(button: Button) -> Self {
        match button {
            Button::A => Command::ButtonA,
            Button::B => Command::ButtonB,
            Button::X => Command::ButtonX,
            Button::Y => Command::ButtonY,
        }
    }
}

impl From<Reading> for Command {
    fn from(reading: Reading) -> Self {
        Command::Reading(reading)
    }
}

impl Command {
    /// Decode raw characteristic bytes. Never fails.
    pub fn decode(data: &[u8], kind: PayloadKind) -> Self {
        match kind {
            PayloadKind::Button => match data {
                [b] | [b, 0] => Self::from_button_byte(*b),
                _ => Command::Unknown,
            },
            PayloadKind::Reading => match data {
                [_, _] => Command::Reading(Reading::decode(data)),
                _ => Command::Unknown,
            },
        }
    }

    fn from_button_byte(byte: u8) -> Self {
        match byte {
            b'a' => Command::ButtonA,
            b'b' => Command::ButtonB,
            b'x' => Command::ButtonX,
            b'y' => Command::ButtonY,
            IDLE_BYTE => Command::Idle,
            _ => Command::Unknown,
        }
    }

    /// Serialise into `buf`. Returns the number of bytes written, or 0 when
    /// the buffer is too small or the command has no wire form (`Unknown`).
    pub fn encode(&self, buf: &mut [u8]) -> usize {
        let byte = match self {
            Command::ButtonA => b'a',
            Command::ButtonB => b'b',
            Command::ButtonX => b'x',
            Command::ButtonY => b'y',
            Command::Idle => IDLE_BYTE,
            Command::Reading(reading) => {
                let Some(out) = buf.get_mut(..2) else {
                    return 0;
                };
                out.copy_from_slice(&reading.0.to_le_bytes());
                return 2;
            }
            Command::Unknown => return 0,
        };
        match buf.first_mut() {
            Some(slot) => {
                *slot = byte;
                1
            }
            None => 0,
        }
    }

    /// Wire layout this command belongs to.
    pub fn kind(&self) -> PayloadKind {
        match self {
            Command::Reading(_) => PayloadKind::Reading,
            _ => PayloadKind::Button,
        }
    }

    /// `true` for the four buttons.
    pub fn is_button(&self) -> bool {
        matches!(
            self,
            Command::ButtonA | Command::ButtonB | Command::ButtonX | Command::ButtonY
        )
    }
}
