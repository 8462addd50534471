//! NGAP PDU Types
//!
//! The outer NGAP-PDU CHOICE from NGAP-PDU-Descriptions (3GPP TS 38.413).
//! Only the envelope is modelled: message kind, procedure code, criticality
//! and the still-encoded message value. Procedure bodies are reached through
//! [`ProtocolIeContainer`].

use crate::per::{AperDecode, AperDecoder, AperEncode, AperEncoder, PerError, PerResult};
use super::ies::ProtocolIeContainer;
use super::types::{Criticality, ProcedureCode};

/// NGAP-PDU alternative
/// ASN.1: NGAP-PDU ::= CHOICE { initiatingMessage, successfulOutcome, unsuccessfulOutcome, ... }
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    InitiatingMessage = 0,
    SuccessfulOutcome = 1,
    UnsuccessfulOutcome = 2,
}

impl MessageKind {
    pub const NUM_ALTERNATIVES: usize = 3;
    pub const EXTENSIBLE: bool = true;

    fn from_index(index: usize) -> PerResult<Self> {
        match index {
            0 => Ok(MessageKind::InitiatingMessage),
            1 => Ok(MessageKind::SuccessfulOutcome),
            2 => Ok(MessageKind::UnsuccessfulOutcome),
            _ => Err(PerError::InvalidChoiceIndex {
                index,
                max: Self::NUM_ALTERNATIVES - 1,
            }),
        }
    }
}

/// Borrowed view of an NGAP PDU
///
/// ASN.1: InitiatingMessage / SuccessfulOutcome / UnsuccessfulOutcome ::=
/// SEQUENCE { procedureCode, criticality, value }
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NgapPdu<'a> {
    pub kind: MessageKind,
    pub procedure_code: ProcedureCode,
    pub criticality: Criticality,
    /// APER encoding of the procedure's message value (open type contents)
    pub value: &'a [u8],
}

impl<'a> NgapPdu<'a> {
    /// Decode the outer envelope without touching the message body.
    pub fn decode(data: &'a [u8]) -> PerResult<Self> {
        let mut decoder = AperDecoder::new(data);
        let index =
            decoder.decode_choice_index(MessageKind::NUM_ALTERNATIVES, MessageKind::EXTENSIBLE)?;
        let kind = MessageKind::from_index(index)?;
        let procedure_code = ProcedureCode::decode_aper(&mut decoder)?;
        let criticality = Criticality::decode_aper(&mut decoder)?;
        let value = decoder.decode_open_type()?;
        Ok(NgapPdu {
            kind,
            procedure_code,
            criticality,
            value,
        })
    }

    /// IE container of the message value
    pub fn protocol_ies(&self) -> PerResult<ProtocolIeContainer<'a>> {
        ProtocolIeContainer::decode_message_value(self.value)
    }

    pub fn is_initiating(&self) -> bool {
        self.kind == MessageKind::InitiatingMessage
    }

    /// Encode a PDU around an already-encoded message value.
    pub fn encode(&self) -> PerResult<Vec<u8>> {
        let mut encoder = AperEncoder::new();
        self.encode_aper(&mut encoder)?;
        Ok(encoder.into_bytes().to_vec())
    }
}

impl AperEncode for NgapPdu<'_> {
    fn encode_aper(&self, encoder: &mut AperEncoder) -> PerResult<()> {
        encoder.encode_choice_index(
            self.kind as usize,
            MessageKind::NUM_ALTERNATIVES,
            MessageKind::EXTENSIBLE,
        )?;
        self.procedure_code.encode_aper(encoder)?;
        self.criticality.encode_aper(encoder)?;
        encoder.encode_open_type(self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ngap::ies::{encode_ie_value, encode_message_value, RanUeNgapId};
    use crate::ngap::types::ProtocolIeId;

    fn initial_ue_value() -> Vec<u8> {
        encode_message_value(&[(
            ProtocolIeId::RAN_UE_NGAP_ID,
            Criticality::Reject,
            encode_ie_value(&RanUeNgapId(1)).unwrap(),
        )])
        .unwrap()
    }

    #[test]
    fn test_choice_first_octet() {
        let value = initial_ue_value();
        for (kind, first) in [
            (MessageKind::InitiatingMessage, 0x00u8),
            (MessageKind::SuccessfulOutcome, 0x20),
            (MessageKind::UnsuccessfulOutcome, 0x40),
        ] {
            let pdu = NgapPdu {
                kind,
                procedure_code: ProcedureCode::INITIAL_UE_MESSAGE,
                criticality: Criticality::Ignore,
                value: &value,
            };
            let bytes = pdu.encode().unwrap();
            assert_eq!(bytes[0], first);
            assert_eq!(bytes[1], 15);
            // criticality ignore in the top two bits
            assert_eq!(bytes[2], 0x40);
        }
    }

    #[test]
    fn test_decode_envelope() {
        let value = initial_ue_value();
        let pdu = NgapPdu {
            kind: MessageKind::InitiatingMessage,
            procedure_code: ProcedureCode::INITIAL_UE_MESSAGE,
            criticality: Criticality::Ignore,
            value: &value,
        };
        let bytes = pdu.encode().unwrap();

        let decoded = NgapPdu::decode(&bytes).unwrap();
        assert!(decoded.is_initiating());
        assert_eq!(decoded.procedure_code, ProcedureCode::INITIAL_UE_MESSAGE);
        assert_eq!(decoded.criticality, Criticality::Ignore);
        assert_eq!(decoded.value, &value[..]);
        assert_eq!(decoded.protocol_ies().unwrap().len(), 1);
    }

    #[test]
    fn test_extension_choice_rejected() {
        // extension bit set
        assert!(matches!(
            NgapPdu::decode(&[0x80, 0x00, 0x00, 0x00]),
            Err(PerError::UnsupportedExtension)
        ));
    }

    #[test]
    fn test_empty_and_short_input() {
        assert!(NgapPdu::decode(&[]).is_err());
        assert!(NgapPdu::decode(&[0x00]).is_err());
        assert!(NgapPdu::decode(&[0x00, 0x0f, 0x40, 0x05, 0x00]).is_err());
    }

    #[test]
    fn test_fourth_alternative_rejected() {
        // root index 3 does not exist
        assert!(NgapPdu::decode(&[0x60, 0x0f, 0x40, 0x00]).is_err());
    }
}
