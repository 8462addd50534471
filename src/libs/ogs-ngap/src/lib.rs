//! NextGCore NGAP Protocol Library
//!
//! NGAP (NG Application Protocol, 3GPP TS 38.413) helpers used on the AMF
//! receive path, layered on the `ogs-asn1c` envelope codec:
//!
//! - **Routing** (`routing`): per-procedure extraction of the UE routing key
//!   (AMF-UE-NGAP-ID, falling back to RAN-UE-NGAP-ID) from a raw PDU
//! - **Builders** (`builder`): envelope-level construction of NG Setup,
//!   NAS transport and UE context release messages
//!
//! # Example
//!
//! ```
//! use ogs_ngap::{builder, extract_routing_key};
//!
//! let bytes = builder::build_uplink_nas_transport(1, 100, &[0x7e, 0x00, 0x56]).unwrap();
//! assert_eq!(extract_routing_key(&bytes), Some(1));
//! ```

pub mod builder;
pub mod error;
pub mod routing;

#[cfg(test)]
mod property_tests;

// Re-export key types for convenience
pub use error::{NgapError, NgapResult};
pub use routing::{extract_routing_key, is_ng_setup_request, key_source, peek_procedure, KeySource};
