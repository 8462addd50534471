//! NAS error types

use thiserror::Error;

/// NAS error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NasError {
    /// Buffer too short for decoding
    #[error("Buffer too short: expected {expected} bytes, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    /// Invalid message type
    #[error("Invalid message type: 0x{0:02x}")]
    InvalidMessageType(u8),

    /// Invalid protocol discriminator
    #[error("Invalid protocol discriminator: 0x{0:02x}")]
    InvalidProtocolDiscriminator(u8),

    /// Invalid security header type
    #[error("Invalid security header type: {0}")]
    InvalidSecurityHeaderType(u8),

    /// Integrity algorithm identifier outside NIA0..NIA3
    #[error("Unsupported integrity algorithm: {0}")]
    UnsupportedIntegrityAlgorithm(u8),

    /// Ciphering algorithm identifier outside NEA0..NEA3
    #[error("Unsupported ciphering algorithm: {0}")]
    UnsupportedCipheringAlgorithm(u8),

    /// NIA0 configured together with a non-null ciphering algorithm
    #[error("Null integrity with ciphering algorithm {ciphering} is not allowed")]
    NullIntegrityWithCiphering { ciphering: u8 },

    /// Ciphered message without payload
    #[error("Empty ciphered payload")]
    EmptyPayload,

    /// Decoding error
    #[error("Decoding error: {0}")]
    DecodingError(String),
}

/// NAS result type
pub type NasResult<T> = Result<T, NasError>;
