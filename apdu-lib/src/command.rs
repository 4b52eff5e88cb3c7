use crate::constants::*;
use crate::error::ApduError;
use crate::header::{CommandHeader, CommandLength, EncoderConfig, LengthForm};
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use tracing::debug;

/// A logical command, built by the application once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub header: CommandHeader,
    pub data: Bytes,
    /// `None` omits the Le field. `Some(0)` asks for as much as the card has.
    pub expected_len: Option<u32>,
}

impl Command {
    pub fn new(header: CommandHeader) -> Self {
        Self {
            header,
            data: Bytes::new(),
            expected_len: None,
        }
    }

    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self
    }

    pub fn with_expected_len(mut self, expected_len: u32) -> Self {
        self.expected_len = Some(expected_len);
        self
    }

    /// GET RESPONSE for the bytes announced by a `61XX` status.
    pub fn get_response(cla: u8, expected_len: u32) -> Self {
        Self::new(CommandHeader::new(cla, INS_GET_RESPONSE, 0x00, 0x00)).with_expected_len(expected_len)
    }

    /// The Lc/Le fields this command encodes to under `config`.
    pub fn length(&self, config: &EncoderConfig) -> Result<CommandLength, ApduError> {
        CommandLength::select(self.data.len(), self.expected_len, config)
    }

    pub fn encode(&self, config: &EncoderConfig) -> Result<EncodedCommand, ApduError> {
        let length = self.length(config)?;

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + length.encoded_size() + self.data.len());
        buf.put_slice(&self.header.to_bytes());
        length.put_lc(&mut buf);
        buf.put_slice(&self.data);
        length.put_le(&mut buf);

        let encoded = EncodedCommand {
            form: length.form(),
            bytes: buf.freeze(),
            frame_limit: config.frame_limit,
        };
        debug!(bytes = hex::encode(&encoded.bytes), form = %encoded.form, "Encoded command");
        if encoded.requires_fragmentation() {
            debug!(
                len = encoded.len(),
                limit = encoded.frame_limit,
                "Encoded command exceeds the transport frame limit"
            );
        }
        Ok(encoded)
    }

    /// Encode with default settings: the smallest legal form, no frame limit.
    pub fn to_bytes(&self) -> Result<Bytes, ApduError> {
        Ok(self.encode(&EncoderConfig::default())?.into_bytes())
    }
}

/// Encode a command from its parts against an explicit transport frame limit.
pub fn encode(
    header: CommandHeader,
    data: &[u8],
    expected_len: Option<u32>,
    frame_limit: usize,
) -> Result<EncodedCommand, ApduError> {
    let command = Command {
        header,
        data: Bytes::copy_from_slice(data),
        expected_len,
    };
    command.encode(&EncoderConfig::with_frame_limit(frame_limit))
}

/// An encoded command ready for the transport.
///
/// The encoder never splits a command. When the encoding is longer than the
/// frame limit it is flagged instead, and fragmenting it (continuation
/// headers, chaining bits) is left to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCommand {
    form: LengthForm,
    bytes: Bytes,
    frame_limit: usize,
}

impl EncodedCommand {
    pub fn form(&self) -> LengthForm {
        self.form
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn frame_limit(&self) -> usize {
        self.frame_limit
    }

    pub fn requires_fragmentation(&self) -> bool {
        self.bytes.len() > self.frame_limit
    }
}

impl TryFrom<Bytes> for Command {
    type Error = ApduError;

    fn try_from(mut bytes: Bytes) -> Result<Self, Self::Error> {
        if bytes.len() < MIN_COMMAND_SIZE {
            return Err(ApduError::InsufficientData {
                expected: MIN_COMMAND_SIZE,
                actual: bytes.len(),
            });
        }

        let header = CommandHeader::try_from(bytes.split_to(HEADER_SIZE))?;
        let length = parse_length(&bytes)?;
        let lc_size = match length.form() {
            LengthForm::Short => 1,
            LengthForm::Extended => EXTENDED_LC_SIZE,
        };
        let data = bytes.slice(lc_size..lc_size + length.data_len());

        Ok(Command {
            header,
            data,
            expected_len: length.expected_len(),
        })
    }
}

/// Work out the length fields from everything after the header.
///
/// A zero first byte is short form with no data when the body is one or two
/// bytes long, and the extended marker otherwise.
fn parse_length(body: &[u8]) -> Result<CommandLength, ApduError> {
    match body {
        [] => Err(ApduError::InsufficientData {
            expected: MIN_COMMAND_SIZE,
            actual: HEADER_SIZE,
        }),
        [0] => Ok(CommandLength::Short { lc: 0, le: None }),
        [0, le] => Ok(CommandLength::Short { lc: 0, le: Some(*le) }),
        [EXTENDED_LENGTH_MARKER, hi, lo, rest @ ..] => {
            let lc = u16::from_be_bytes([*hi, *lo]);
            let declared = lc as usize;
            if rest.len() == declared {
                Ok(CommandLength::Extended { lc, le: None })
            } else if rest.len() == declared + EXTENDED_LE_SIZE {
                let le = u16::from_be_bytes([rest[declared], rest[declared + 1]]);
                Ok(CommandLength::Extended { lc, le: Some(le) })
            } else {
                Err(ApduError::InconsistentLength {
                    declared,
                    actual: rest.len(),
                })
            }
        }
        [lc, rest @ ..] => {
            let declared = *lc as usize;
            if rest.len() == declared {
                Ok(CommandLength::Short { lc: *lc, le: None })
            } else if rest.len() == declared + 1 {
                Ok(CommandLength::Short {
                    lc: *lc,
                    le: Some(rest[declared]),
                })
            } else {
                Err(ApduError::InconsistentLength {
                    declared,
                    actual: rest.len(),
                })
            }
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Lc={}", self.header, self.data.len())?;
        if !self.data.is_empty() {
            write!(f, " data={}", hex::encode(&self.data))?;
        }
        if let Some(le) = self.expected_len {
            write!(f, " Le={}", le)?;
        }
        Ok(())
    }
}
