//! ISO 7816-4 APDU codec for security keys spoken to over a byte transport.
//!
//! Commands are encoded in short or extended form depending on their data
//! and expected-response lengths; responses are split into data and status
//! word, with `61XX` (more data) and `6CXX` (wrong Le) surfaced as control
//! signals rather than errors.

pub mod command;
pub mod constants;
pub mod error;
pub mod exchange;
pub mod header;
pub mod response;
pub mod status;


pub use command::{Command, EncodedCommand, encode};
pub use error::ApduError;
pub use exchange::{Exchange, ExchangeConfig, ReplayTransport, Transport};
pub use header::{CommandHeader, CommandLength, EncoderConfig, LengthForm};
pub use response::{AssemblerState, Decoded, Response, ResponseAssembler, decode};
pub use status::{StatusCode, StatusWord};
