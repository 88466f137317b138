use thiserror::Error;

/// Errors produced while constructing, decoding, or encoding Gecko codes.
///
/// `PreApplyUnmapped` is deliberately not a variant here: pre-application
/// never fails, it returns a boolean (see [`crate::apply`]).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeckoError {
    #[error("invalid gecko command at line {line}: opcode 0x{opcode:02X} is not a known kind")]
    InvalidCommand { line: usize, opcode: u8 },

    #[error("invalid gecko command at line {line}: register {value} out of range (0..=15)")]
    InvalidRegister { line: usize, value: u32 },

    #[error("codelist does not begin with the Gecko magic (00D0C0DE 00D0C0DE)")]
    MagicMismatch,

    #[error("truncated input: expected {expected} more bytes at line {line}, found {found}")]
    TruncatedInput {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("malformed textual codelist: {reason}")]
    MalformedText { reason: String },
}

pub type Result<T> = std::result::Result<T, GeckoError>;
