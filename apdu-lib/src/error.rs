use std::io;
use thiserror::Error;

/// The primary error type for the `apdu-lib` library.
#[derive(Error, Debug)]
pub enum ApduError {
    #[error("Command data is {0} bytes, the extended-form maximum is 65535")]
    LengthOverflow(usize),

    #[error("Expected response length {0} exceeds the maximum of 65536")]
    InvalidExpectedLength(u32),

    #[error("Truncated response: a status word needs 2 bytes, got {0}")]
    TruncatedResponse(usize),

    #[error("Insufficient data: expected at least {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("Inconsistent command length: Lc declares {declared} data bytes, body has {actual} bytes")]
    InconsistentLength { declared: usize, actual: usize },

    #[error("Encoded command is {len} bytes but the transport frame limit is {limit}")]
    FrameTooLarge { len: usize, limit: usize },

    #[error("Gave up after {limit} GET RESPONSE rounds")]
    TooManyContinuations { limit: usize },

    #[error("Gave up after {limit} wrong-length retries")]
    TooManyLengthRetries { limit: usize },

    #[error("Response already finalized, start a new exchange")]
    ExchangeComplete,

    #[error("Exchange previously failed, start a new exchange")]
    ExchangeFailed,

    #[error("Timeout waiting for the transport: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
