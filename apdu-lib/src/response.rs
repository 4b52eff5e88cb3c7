use crate::constants::*;
use crate::error::ApduError;
use crate::status::StatusWord;
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use strum_macros::Display;
use tracing::{debug, trace};

/// A finalized response: data plus the status word that ended it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub data: Bytes,
    pub status: StatusWord,
}

impl Response {
    pub fn new(data: impl Into<Bytes>, status: StatusWord) -> Self {
        Self {
            data: data.into(),
            status,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Wire form: data followed by SW1 SW2.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.data.len() + STATUS_WORD_SIZE);
        buf.put_slice(&self.data);
        buf.put_slice(&self.status.to_bytes());
        buf.freeze()
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SW={} data[{}]", self.status, self.data.len())?;
        if !self.data.is_empty() {
            write!(f, "={}", hex::encode(&self.data))?;
        }
        Ok(())
    }
}

/// What a received frame means for the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// The response is complete, whatever its status.
    Complete(Response),
    /// `61XX`: more data is waiting behind a GET RESPONSE. `data` is what this
    /// frame carried; [`ResponseAssembler::pending_data`] has the running total.
    ContinuationRequired { data: Bytes, status: StatusWord },
    /// `6CXX`: the last request must be resent with the corrected Le.
    RetryWithLength { length: u32, status: StatusWord },
}

impl Decoded {
    pub fn status(&self) -> StatusWord {
        match self {
            Decoded::Complete(response) => response.status,
            Decoded::ContinuationRequired { status, .. } => *status,
            Decoded::RetryWithLength { status, .. } => *status,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Decoded::Complete(_))
    }
}

/// Split one received frame into data and status and classify it.
///
/// Stateless: data carried by a `61XX` frame is returned in
/// [`Decoded::ContinuationRequired`] and must be accumulated by the caller,
/// or use [`ResponseAssembler`] which does that.
pub fn decode(mut raw: Bytes) -> Result<Decoded, ApduError> {
    if raw.len() < STATUS_WORD_SIZE {
        return Err(ApduError::TruncatedResponse(raw.len()));
    }
    let trailer = raw.split_off(raw.len() - STATUS_WORD_SIZE);
    let status = StatusWord::new(trailer[0], trailer[1]);
    trace!(data_len = raw.len(), %status, "Decoded response frame");

    if status.bytes_remaining().is_some() {
        return Ok(Decoded::ContinuationRequired { data: raw, status });
    }
    if let Some(length) = status.corrected_length() {
        return Ok(Decoded::RetryWithLength { length, status });
    }
    Ok(Decoded::Complete(Response { data: raw, status }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum AssemblerState {
    #[default]
    AwaitingFirstFrame,
    ContinuationPending,
    Finalized,
    Failed,
}

/// Reassembles one logical response across GET RESPONSE rounds.
///
/// One assembler per exchange. Data is accumulated in arrival order; the
/// status word of the final frame becomes the response status.
#[derive(Debug, Default)]
pub struct ResponseAssembler {
    state: AssemblerState,
    buffer: BytesMut,
    continuations: usize,
}

impl ResponseAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AssemblerState {
        self.state
    }

    /// Number of `61XX` frames seen so far.
    pub fn continuation_rounds(&self) -> usize {
        self.continuations
    }

    /// Data received so far and not yet handed out in a complete response.
    pub fn pending_data(&self) -> &[u8] {
        &self.buffer
    }

    /// Feed the next frame received from the transport.
    pub fn feed(&mut self, raw: Bytes) -> Result<Decoded, ApduError> {
        match self.state {
            AssemblerState::Finalized => return Err(ApduError::ExchangeComplete),
            AssemblerState::Failed => return Err(ApduError::ExchangeFailed),
            _ => {}
        }

        let decoded = match decode(raw) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.fail();
                return Err(e);
            }
        };

        match decoded {
            Decoded::ContinuationRequired { data, status } => {
                self.buffer.put_slice(&data);
                self.continuations += 1;
                self.state = AssemblerState::ContinuationPending;
                debug!(
                    received = self.buffer.len(),
                    round = self.continuations,
                    %status,
                    "Response continues"
                );
                Ok(Decoded::ContinuationRequired { data, status })
            }
            // The resent request answers in full, so accumulated data and state are kept.
            retry @ Decoded::RetryWithLength { .. } => Ok(retry),
            Decoded::Complete(Response { data, status }) => {
                self.buffer.put_slice(&data);
                self.state = AssemblerState::Finalized;
                let data = self.buffer.split().freeze();
                debug!(len = data.len(), %status, "Response finalized");
                Ok(Decoded::Complete(Response { data, status }))
            }
        }
    }

    /// Mark the exchange failed and drop any partial data, e.g. after a transport error.
    pub fn fail(&mut self) {
        self.buffer.clear();
        self.state = AssemblerState::Failed;
    }

    /// Start over for a new, independent exchange.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.continuations = 0;
        self.state = AssemblerState::AwaitingFirstFrame;
    }
}
