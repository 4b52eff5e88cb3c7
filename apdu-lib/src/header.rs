use crate::constants::*;
use crate::error::ApduError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::Display;
use tracing::trace;

/// The 4-byte header that starts every command, identical in short and extended form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandHeader {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
}

impl CommandHeader {
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self { cla, ins, p1, p2 }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        [self.cla, self.ins, self.p1, self.p2]
    }
}

impl From<[u8; HEADER_SIZE]> for CommandHeader {
    fn from(b: [u8; HEADER_SIZE]) -> Self {
        Self::new(b[0], b[1], b[2], b[3])
    }
}

impl From<CommandHeader> for [u8; HEADER_SIZE] {
    fn from(header: CommandHeader) -> Self {
        header.to_bytes()
    }
}

impl TryFrom<Bytes> for CommandHeader {
    type Error = ApduError;

    fn try_from(mut bytes: Bytes) -> Result<Self, Self::Error> {
        if bytes.remaining() < HEADER_SIZE {
            return Err(ApduError::InsufficientData {
                expected: HEADER_SIZE,
                actual: bytes.remaining(),
            });
        }
        Ok(Self {
            cla: bytes.get_u8(),
            ins: bytes.get_u8(),
            p1: bytes.get_u8(),
            p2: bytes.get_u8(),
        })
    }
}

impl fmt::Display for CommandHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CLA={:02X} INS={:02X} P1={:02X} P2={:02X}",
            self.cla, self.ins, self.p1, self.p2
        )
    }
}

/// Which length encoding a command uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthForm {
    #[default]
    #[strum(to_string = "short")]
    Short,
    #[strum(to_string = "extended")]
    Extended,
}

/// Encoder settings supplied by whoever owns the transport.
///
/// The frame limit is passed in explicitly so the encoder stays independent
/// of any particular transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Largest frame the transport accepts in a single send
    pub frame_limit: usize,
    /// Whether the transport accepts extended-length APDUs
    pub extended_supported: bool,
    /// Use extended form even when the lengths fit short form.
    /// Only honoured when `extended_supported` is set.
    pub prefer_extended: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            frame_limit: MAX_ENCODED_COMMAND_SIZE,
            extended_supported: true,
            prefer_extended: false,
        }
    }
}

impl EncoderConfig {
    pub fn with_frame_limit(frame_limit: usize) -> Self {
        Self {
            frame_limit,
            ..Self::default()
        }
    }

    fn wants_extended(&self) -> bool {
        self.extended_supported && self.prefer_extended
    }
}

/// The Lc/Le fields of a command in the chosen form.
///
/// A zero `le` means "as much as available": 256 bytes in short form,
/// 65536 in extended form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandLength {
    Short { lc: u8, le: Option<u8> },
    Extended { lc: u16, le: Option<u16> },
}

impl CommandLength {
    /// Pick the form for a data length and optional expected response length.
    ///
    /// Extended form is mandatory once either length leaves the short range.
    pub fn select(data_len: usize, expected_len: Option<u32>, config: &EncoderConfig) -> Result<Self, ApduError> {
        if data_len > MAX_EXTENDED_DATA_LEN {
            return Err(ApduError::LengthOverflow(data_len));
        }
        if let Some(le) = expected_len {
            if le > MAX_EXTENDED_EXPECTED_LEN {
                return Err(ApduError::InvalidExpectedLength(le));
            }
        }

        let fits_short =
            data_len <= MAX_SHORT_DATA_LEN && expected_len.is_none_or(|le| le <= MAX_SHORT_EXPECTED_LEN);
        let form = if fits_short && !config.wants_extended() {
            LengthForm::Short
        } else {
            LengthForm::Extended
        };
        trace!(data_len, ?expected_len, %form, "Selected APDU length form");

        // 256 truncates to 0x00 and 65536 to 0x0000, which is exactly the "maximum" encoding.
        Ok(match form {
            LengthForm::Short => CommandLength::Short {
                lc: data_len as u8,
                le: expected_len.map(|le| le as u8),
            },
            LengthForm::Extended => CommandLength::Extended {
                lc: data_len as u16,
                le: expected_len.map(|le| le as u16),
            },
        })
    }

    pub fn form(&self) -> LengthForm {
        match self {
            CommandLength::Short { .. } => LengthForm::Short,
            CommandLength::Extended { .. } => LengthForm::Extended,
        }
    }

    pub fn data_len(&self) -> usize {
        match self {
            CommandLength::Short { lc, .. } => *lc as usize,
            CommandLength::Extended { lc, .. } => *lc as usize,
        }
    }

    /// Expected response length with the zero encoding expanded to its maximum.
    pub fn expected_len(&self) -> Option<u32> {
        match self {
            CommandLength::Short { le, .. } => le.map(|le| if le == 0 { MAX_SHORT_EXPECTED_LEN } else { le as u32 }),
            CommandLength::Extended { le, .. } => {
                le.map(|le| if le == 0 { MAX_EXTENDED_EXPECTED_LEN } else { le as u32 })
            }
        }
    }

    /// Bytes taken by the Lc and Le fields together.
    pub fn encoded_size(&self) -> usize {
        match self {
            CommandLength::Short { le, .. } => 1 + usize::from(le.is_some()),
            CommandLength::Extended { le, .. } => EXTENDED_LC_SIZE + if le.is_some() { EXTENDED_LE_SIZE } else { 0 },
        }
    }

    pub(crate) fn put_lc(&self, buf: &mut BytesMut) {
        match self {
            CommandLength::Short { lc, .. } => buf.put_u8(*lc),
            CommandLength::Extended { lc, .. } => {
                buf.put_u8(EXTENDED_LENGTH_MARKER);
                buf.put_u16(*lc);
            }
        }
    }

    pub(crate) fn put_le(&self, buf: &mut BytesMut) {
        match self {
            CommandLength::Short { le: Some(le), .. } => buf.put_u8(*le),
            CommandLength::Extended { le: Some(le), .. } => buf.put_u16(*le),
            _ => {}
        }
    }
}
