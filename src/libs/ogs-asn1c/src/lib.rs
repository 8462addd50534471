//! NextGCore ASN.1 Codec Library
//!
//! This crate provides the Aligned PER primitives and the NGAP envelope
//! types needed to inspect NGAP messages without a full decode.
//!
//! # Modules
//!
//! - `per` - Packed Encoding Rules (APER) encoder/decoder
//! - `ngap` - NGAP PDU envelope and IE containers (3GPP TS 38.413)

pub mod per;    // Packed Encoding Rules
pub mod ngap;   // NGAP envelope (directory module)


// Re-export commonly used types
pub use per::{AperEncoder, AperDecoder, AperEncode, AperDecode, PerError, PerResult};
