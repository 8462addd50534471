//! NGAP envelope codec (3GPP TS 38.413)
//!
//! Outer PDU, procedure codes, IE containers and the UE identifier IEs.
//! Message bodies beyond the IE container are left encoded.

pub mod ies;
pub mod pdu;
pub mod types;

pub use ies::{
    encode_ie_value, encode_message_value, AmfUeNgapId, IeIter, NasPdu, ProtocolIeContainer,
    ProtocolIeField, RanUeNgapId,
};
pub use pdu::{MessageKind, NgapPdu};
pub use types::{Criticality, ProcedureCode, ProtocolIeId};
