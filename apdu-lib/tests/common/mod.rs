//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use apdu_lib::constants::*;
#[allow(unused_imports)]
pub use apdu_lib::{
    ApduError, AssemblerState, Command, CommandHeader, CommandLength, Decoded, EncoderConfig, Exchange,
    ExchangeConfig, LengthForm, ReplayTransport, Response, ResponseAssembler, StatusCode, StatusWord, Transport,
    decode, encode,
};
#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use hex;

/// Decode hex string to bytes for testing
#[allow(dead_code)]
pub fn hex_to_bytes(hex_data: &str) -> Bytes {
    Bytes::from(hex::decode(hex_data).expect("Failed to decode hex"))
}

/// U2F register header: CLA=00 INS=01 P1=03 P2=00
#[allow(dead_code)]
pub const REGISTER_HEADER: CommandHeader = CommandHeader::new(0x00, 0x01, 0x03, 0x00);

/// 64-byte register payload: challenge parameter followed by application parameter
#[allow(dead_code)]
pub fn register_payload() -> Vec<u8> {
    let mut data = vec![0x41; 32];
    data.extend(std::iter::repeat_n(0x42, 32));
    data
}

/// Register command as it appears on the wire (short form, no Le)
#[allow(dead_code)]
pub const REGISTER_COMMAND_HEX: &str = concat!(
    "0001030040",
    "4141414141414141414141414141414141414141414141414141414141414141",
    "4242424242424242424242424242424242424242424242424242424242424242",
);

/// Payload of `len` bytes counting up from zero
#[allow(dead_code)]
pub fn counting_payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| i as u8).collect()
}
