use crate::command::Command;
use crate::constants::*;
use crate::error::ApduError;
use crate::header::EncoderConfig;
use crate::response::{Decoded, Response, ResponseAssembler};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::{self, Future};
use std::time::Duration;
use tracing::{debug, info, warn};

/// The byte-moving layer under the codec (BLE, USB HID, NFC, ...).
///
/// One `send` carries one complete command and yields one complete response
/// frame, in order and without loss.
pub trait Transport {
    fn send(&mut self, apdu: Bytes) -> impl Future<Output = Result<Bytes, ApduError>> + Send;

    /// Whether the transport splits frames longer than its limit on its own.
    fn fragments_oversized_frames(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub encoder: EncoderConfig,
    /// GET RESPONSE rounds allowed before giving up
    pub max_continuations: usize,
    /// Corrected-Le resends allowed per request before giving up
    pub max_length_retries: usize,
    /// Class byte for GET RESPONSE. `None` reuses the original command's class.
    pub get_response_cla: Option<u8>,
    /// Per-frame timeout around `Transport::send`
    pub timeout_ms: Option<u64>,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            encoder: EncoderConfig::default(),
            max_continuations: DEFAULT_MAX_CONTINUATIONS,
            max_length_retries: DEFAULT_MAX_LENGTH_RETRIES,
            get_response_cla: None,
            timeout_ms: None,
        }
    }
}

impl ExchangeConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Drives command/response exchanges over a transport, one at a time.
///
/// `transmit` borrows the exchange mutably, so a second command cannot start
/// on the same transport before the current one is finalized or has failed.
pub struct Exchange<T> {
    transport: T,
    config: ExchangeConfig,
}

impl<T: Transport> Exchange<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ExchangeConfig::default())
    }

    pub fn with_config(transport: T, config: ExchangeConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Send `command` and follow `61XX`/`6CXX` signals until the response is final.
    ///
    /// On any error the partially assembled data is dropped with the assembler.
    pub async fn transmit(&mut self, command: &Command) -> Result<Response, ApduError> {
        let mut assembler = ResponseAssembler::new();
        let mut request = command.clone();
        let mut length_retries = 0;
        let get_response_cla = self.config.get_response_cla.unwrap_or(command.header.cla);

        loop {
            let raw = self.send(&request).await?;
            match assembler.feed(raw)? {
                Decoded::Complete(response) => {
                    info!(
                        header = %command.header,
                        status = %response.status,
                        len = response.data.len(),
                        rounds = assembler.continuation_rounds(),
                        "Exchange complete"
                    );
                    return Ok(response);
                }
                Decoded::ContinuationRequired { status, .. } => {
                    if assembler.continuation_rounds() > self.config.max_continuations {
                        warn!(
                            limit = self.config.max_continuations,
                            received = assembler.pending_data().len(),
                            "Card keeps announcing more data, abandoning exchange"
                        );
                        return Err(ApduError::TooManyContinuations {
                            limit: self.config.max_continuations,
                        });
                    }
                    let remaining = status.bytes_remaining().unwrap_or(0);
                    request = Command::get_response(get_response_cla, remaining as u32);
                    length_retries = 0;
                }
                Decoded::RetryWithLength { length, .. } => {
                    length_retries += 1;
                    if length_retries > self.config.max_length_retries {
                        warn!(
                            limit = self.config.max_length_retries,
                            length, "Card keeps rejecting Le, abandoning exchange"
                        );
                        return Err(ApduError::TooManyLengthRetries {
                            limit: self.config.max_length_retries,
                        });
                    }
                    debug!(length, "Resending with corrected Le");
                    request.expected_len = Some(length);
                }
            }
        }
    }

    async fn send(&mut self, request: &Command) -> Result<Bytes, ApduError> {
        let encoded = request.encode(&self.config.encoder)?;
        if encoded.requires_fragmentation() && !self.transport.fragments_oversized_frames() {
            return Err(ApduError::FrameTooLarge {
                len: encoded.len(),
                limit: encoded.frame_limit(),
            });
        }

        let apdu = encoded.into_bytes();
        debug!(bytes = hex::encode(&apdu), "APDU Write");
        let response = match self.config.timeout() {
            Some(timeout) => tokio::time::timeout(timeout, self.transport.send(apdu)).await??,
            None => self.transport.send(apdu).await?,
        };
        debug!(bytes = hex::encode(&response), "APDU Read");
        Ok(response)
    }
}

/// Transport that answers from a fixed script of response frames and records
/// everything sent to it.
#[derive(Debug, Default)]
pub struct ReplayTransport {
    responses: VecDeque<Bytes>,
    sent: Vec<Bytes>,
    fragments: bool,
}

impl ReplayTransport {
    pub fn new(responses: impl IntoIterator<Item = Bytes>) -> Self {
        Self {
            responses: responses.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Pretend the transport fragments oversized frames itself.
    pub fn with_fragmentation(mut self, fragments: bool) -> Self {
        self.fragments = fragments;
        self
    }

    pub fn sent(&self) -> &[Bytes] {
        &self.sent
    }

    pub fn remaining(&self) -> usize {
        self.responses.len()
    }
}

impl Transport for ReplayTransport {
    fn send(&mut self, apdu: Bytes) -> impl Future<Output = Result<Bytes, ApduError>> + Send {
        self.sent.push(apdu);
        let next = self
            .responses
            .pop_front()
            .ok_or_else(|| ApduError::Transport("replay script exhausted".to_string()));
        future::ready(next)
    }

    fn fragments_oversized_frames(&self) -> bool {
        self.fragments
    }
}
