//! Text transcripts of APDU traffic and their grouping into transactions.
//!
//! One frame per line, `>` for commands sent to the authenticator and `<` for
//! responses. Hex may be split by spaces or colons. Blank lines and lines
//! starting with `#` are skipped.
//!
//! ```text
//! # register
//! > 00 01 03 00 40 ...
//! < 05 04 01 02 03 61 08
//! > 00 c0 00 00 00 08
//! < 04 05 06 07 08 09 0a 0b 90 00
//! ```

use anyhow::{Context, Result, bail};
use apdu_lib::constants::INS_GET_RESPONSE;
use apdu_lib::{ApduError, Command, CommandHeader, Decoded, Response, ResponseAssembler};
use bytes::Bytes;
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host to authenticator
    Command,
    /// Authenticator to host
    Response,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub line: usize,
    pub direction: Direction,
    pub bytes: Bytes,
}

/// Decode hex written with optional spaces or colons between bytes.
pub fn decode_hex(text: &str) -> Result<Bytes> {
    let clean: String = text.chars().filter(|c| !c.is_whitespace() && *c != ':').collect();
    let data = hex::decode(&clean).with_context(|| format!("Invalid hex: {:?}", text))?;
    Ok(Bytes::from(data))
}

/// Parse one transcript line. `Ok(None)` for blank and comment lines.
pub fn parse_line(line: usize, text: &str) -> Result<Option<Frame>> {
    let text = text.trim();
    if text.is_empty() || text.starts_with('#') {
        return Ok(None);
    }

    let (direction, rest) = if let Some(rest) = text.strip_prefix('>') {
        (Direction::Command, rest)
    } else if let Some(rest) = text.strip_prefix('<') {
        (Direction::Response, rest)
    } else {
        bail!("Line {}: expected '>' or '<', got {:?}", line, text);
    };

    let bytes = decode_hex(rest).with_context(|| format!("Line {}", line))?;
    Ok(Some(Frame { line, direction, bytes }))
}

pub fn parse_transcript(text: &str) -> Result<Vec<Frame>> {
    let mut frames = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if let Some(frame) = parse_line(i + 1, line)? {
            frames.push(frame);
        }
    }
    Ok(frames)
}

/// How a transaction ended.
#[derive(Debug)]
pub enum Outcome {
    /// The transcript ended with a command still unanswered or a follow-up not sent.
    Pending,
    Complete(Response),
    Failed(ApduError),
}

/// The command a `61XX` or `6CXX` answer asks the host to send next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Followup {
    GetResponse,
    /// The last command again, same header, corrected Le
    Resend(CommandHeader),
}

/// A command together with its GET RESPONSE rounds, Le retries and responses.
#[derive(Debug)]
pub struct Transaction {
    pub request: Frame,
    pub command: Result<Command, ApduError>,
    /// GET RESPONSE commands and corrected-Le resends, in order
    pub followups: Vec<Frame>,
    pub responses: Vec<Frame>,
    pub outcome: Outcome,
    assembler: ResponseAssembler,
    outstanding: bool,
    last_header: Option<CommandHeader>,
    followup: Option<Followup>,
}

impl Transaction {
    fn start(request: Frame) -> Self {
        let command = Command::try_from(request.bytes.clone());
        if let Err(e) = &command {
            warn!(line = request.line, "Unparseable command: {}", e);
        }
        let last_header = command.as_ref().ok().map(|c| c.header);
        Self {
            request,
            command,
            followups: Vec::new(),
            responses: Vec::new(),
            outcome: Outcome::Pending,
            assembler: ResponseAssembler::new(),
            outstanding: true,
            last_header,
            followup: None,
        }
    }

    /// Whether `command` is what the last response asked for: a GET RESPONSE
    /// after `61XX`, the same header again after `6CXX`.
    fn accepts_followup(&self, command: &Command) -> bool {
        if !matches!(self.outcome, Outcome::Pending) {
            return false;
        }
        match self.followup {
            Some(Followup::GetResponse) => command.header.ins == INS_GET_RESPONSE,
            Some(Followup::Resend(header)) => command.header == header,
            None => false,
        }
    }

    fn record_followup(&mut self, frame: Frame, header: CommandHeader) {
        self.followups.push(frame);
        self.outstanding = true;
        self.last_header = Some(header);
        self.followup = None;
    }

    fn record_response(&mut self, frame: Frame) {
        let raw = frame.bytes.clone();
        self.responses.push(frame);
        self.outstanding = false;

        match self.assembler.feed(raw) {
            Ok(Decoded::Complete(response)) => self.outcome = Outcome::Complete(response),
            Ok(Decoded::ContinuationRequired { status, .. }) => {
                debug!(line = self.request.line, %status, "Transaction continues");
                self.followup = Some(Followup::GetResponse);
            }
            Ok(Decoded::RetryWithLength { status, .. }) => {
                debug!(line = self.request.line, %status, "Transaction continues");
                self.followup = self.last_header.map(Followup::Resend);
            }
            Err(e) => self.outcome = Outcome::Failed(e),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.outcome, Outcome::Complete(_))
    }
}

#[derive(Debug, Default)]
pub struct Transcript {
    pub transactions: Vec<Transaction>,
    /// Responses with no command waiting for them
    pub orphans: Vec<Frame>,
}

/// Group frames into transactions.
///
/// A command starts a new transaction unless the previous one is waiting for
/// a GET RESPONSE or a corrected-Le resend and the command is exactly that,
/// in which case it joins it. Any other command leaves the previous
/// transaction incomplete.
pub fn group_transactions(frames: impl IntoIterator<Item = Frame>) -> Transcript {
    let mut transcript = Transcript::default();

    for frame in frames {
        match frame.direction {
            Direction::Command => {
                if let Some(t) = transcript.transactions.last_mut() {
                    if let Ok(command) = Command::try_from(frame.bytes.clone()) {
                        if t.accepts_followup(&command) {
                            t.record_followup(frame, command.header);
                            continue;
                        }
                    }
                    if t.outstanding {
                        warn!(line = t.request.line, "Command got no response");
                    } else if t.followup.is_some() {
                        warn!(line = t.request.line, "Exchange abandoned before the response was complete");
                    }
                }
                transcript.transactions.push(Transaction::start(frame));
            }
            Direction::Response => match transcript.transactions.last_mut() {
                Some(t) if t.outstanding => t.record_response(frame),
                _ => {
                    warn!(line = frame.line, "Response without a pending command");
                    transcript.orphans.push(frame);
                }
            },
        }
    }

    transcript
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pending => write!(f, "incomplete"),
            Outcome::Complete(response) => write!(f, "{}", response),
            Outcome::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}
