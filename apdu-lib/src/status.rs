use crate::constants::*;
use num_enum::{FromPrimitive, IntoPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::Display;

/// Well-known ISO 7816-4 status words.
///
/// Named for display only. The codec never acts on these; anything outside
/// the 61XX/6CXX ranges is handed to the application unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive, Display)]
#[repr(u16)]
pub enum StatusCode {
    #[strum(to_string = "no error")]
    NoError = 0x9000,
    #[strum(to_string = "wrong length")]
    WrongLength = 0x6700,
    #[strum(to_string = "security status not satisfied")]
    SecurityStatusNotSatisfied = 0x6982,
    #[strum(to_string = "conditions of use not satisfied")]
    ConditionsNotSatisfied = 0x6985,
    #[strum(to_string = "wrong data")]
    WrongData = 0x6A80,
    #[strum(to_string = "file or application not found")]
    FileNotFound = 0x6A82,
    #[strum(to_string = "wrong P1/P2")]
    WrongP1P2 = 0x6B00,
    #[strum(to_string = "instruction not supported")]
    InsNotSupported = 0x6D00,
    #[strum(to_string = "class not supported")]
    ClaNotSupported = 0x6E00,
    #[strum(to_string = "no precise diagnosis")]
    NoPreciseDiagnosis = 0x6F00,

    #[num_enum(catch_all)]
    #[strum(to_string = "unrecognised")]
    Unknown(u16),
}

/// The two trailing bytes of every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusWord {
    pub sw1: u8,
    pub sw2: u8,
}

impl StatusWord {
    pub const SUCCESS: StatusWord = StatusWord::new(0x90, 0x00);

    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self { sw1, sw2 }
    }

    pub fn as_u16(&self) -> u16 {
        u16::from_be_bytes([self.sw1, self.sw2])
    }

    pub fn is_success(&self) -> bool {
        self.as_u16() == SW_NO_ERROR
    }

    /// Bytes announced by a `61XX` status. Zero means the count is unknown.
    pub fn bytes_remaining(&self) -> Option<u8> {
        (self.sw1 == SW1_BYTES_REMAINING).then_some(self.sw2)
    }

    /// The exact Le demanded by a `6CXX` status, `00` meaning 256.
    pub fn corrected_length(&self) -> Option<u32> {
        (self.sw1 == SW1_WRONG_LE).then(|| {
            if self.sw2 == 0 {
                MAX_SHORT_EXPECTED_LEN
            } else {
                self.sw2 as u32
            }
        })
    }

    pub fn code(&self) -> StatusCode {
        StatusCode::from_primitive(self.as_u16())
    }

    pub fn to_bytes(&self) -> [u8; STATUS_WORD_SIZE] {
        [self.sw1, self.sw2]
    }
}

impl From<u16> for StatusWord {
    fn from(sw: u16) -> Self {
        let [sw1, sw2] = sw.to_be_bytes();
        Self { sw1, sw2 }
    }
}

impl From<StatusWord> for u16 {
    fn from(sw: StatusWord) -> Self {
        sw.as_u16()
    }
}

impl From<[u8; STATUS_WORD_SIZE]> for StatusWord {
    fn from(b: [u8; STATUS_WORD_SIZE]) -> Self {
        Self::new(b[0], b[1])
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.as_u16())?;
        if let Some(remaining) = self.bytes_remaining() {
            return write!(f, " ({} more bytes available)", remaining);
        }
        if let Some(length) = self.corrected_length() {
            return write!(f, " (wrong Le, exact length {})", length);
        }
        match self.code() {
            StatusCode::Unknown(_) => Ok(()),
            code => write!(f, " ({})", code),
        }
    }
}
