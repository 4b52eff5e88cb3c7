// Protocol constants for ISO 7816-4 APDUs

/// Size of the command header: CLA, INS, P1, P2 (4 bytes)
pub const HEADER_SIZE: usize = 4;

/// Size of the trailing status word: SW1, SW2 (2 bytes)
pub const STATUS_WORD_SIZE: usize = 2;

/// Largest data field a short-form command can carry
pub const MAX_SHORT_DATA_LEN: usize = 0xFF;

/// Largest expected response length a short-form Le byte can express (0x00 = 256)
pub const MAX_SHORT_EXPECTED_LEN: u32 = 256;

/// Largest data field an extended-form command can carry
pub const MAX_EXTENDED_DATA_LEN: usize = 0xFFFF;

/// Largest expected response length an extended-form Le field can express (0x0000 = 65536)
pub const MAX_EXTENDED_EXPECTED_LEN: u32 = 65536;

/// Byte following P2 that marks the extended length encoding
pub const EXTENDED_LENGTH_MARKER: u8 = 0x00;

/// Size of the extended Lc field including the marker byte
pub const EXTENDED_LC_SIZE: usize = 3;

/// Size of the extended Le field
pub const EXTENDED_LE_SIZE: usize = 2;

/// Largest possible encoded command: header, extended Lc, full data field, extended Le
pub const MAX_ENCODED_COMMAND_SIZE: usize =
    HEADER_SIZE + EXTENDED_LC_SIZE + MAX_EXTENDED_DATA_LEN + EXTENDED_LE_SIZE;

/// Smallest parseable command: header plus a single length byte
pub const MIN_COMMAND_SIZE: usize = HEADER_SIZE + 1;

/// SW1 value signalling that SW2 more response bytes can be fetched with GET RESPONSE
pub const SW1_BYTES_REMAINING: u8 = 0x61;

/// SW1 value signalling a wrong Le; SW2 carries the exact length
pub const SW1_WRONG_LE: u8 = 0x6C;

/// Status word for normal completion
pub const SW_NO_ERROR: u16 = 0x9000;

/// GET RESPONSE instruction byte
pub const INS_GET_RESPONSE: u8 = 0xC0;

/// Default number of GET RESPONSE rounds before an exchange is abandoned
pub const DEFAULT_MAX_CONTINUATIONS: usize = 64;

/// Default number of corrected-Le resends before an exchange is abandoned
pub const DEFAULT_MAX_LENGTH_RETRIES: usize = 2;
