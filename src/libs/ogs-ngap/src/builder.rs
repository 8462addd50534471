//! NGAP Message Builders
//!
//! Envelope-level builders for the messages the AMF exchanges most often.
//! IE values other than the UE identifiers and the NAS-PDU are supplied
//! already encoded by the caller.

use ogs_asn1c::ngap::{
    encode_ie_value, encode_message_value, AmfUeNgapId, Criticality, MessageKind, NasPdu,
    NgapPdu, ProcedureCode, ProtocolIeId, RanUeNgapId,
};

use crate::error::NgapResult;

/// One IE in owned, encoded form
pub type EncodedIe = (ProtocolIeId, Criticality, Vec<u8>);

/// Wrap an IE list in a PDU of the given kind and APER-encode it
pub fn build_pdu(
    kind: MessageKind,
    procedure_code: ProcedureCode,
    criticality: Criticality,
    ies: &[EncodedIe],
) -> NgapResult<Vec<u8>> {
    let value = encode_message_value(ies)?;
    let pdu = NgapPdu {
        kind,
        procedure_code,
        criticality,
        value: &value,
    };
    Ok(pdu.encode()?)
}

pub fn amf_ue_ngap_id_ie(id: u64) -> NgapResult<EncodedIe> {
    Ok((
        ProtocolIeId::AMF_UE_NGAP_ID,
        Criticality::Reject,
        encode_ie_value(&AmfUeNgapId(id))?,
    ))
}

pub fn ran_ue_ngap_id_ie(id: u32) -> NgapResult<EncodedIe> {
    Ok((
        ProtocolIeId::RAN_UE_NGAP_ID,
        Criticality::Reject,
        encode_ie_value(&RanUeNgapId(id))?,
    ))
}

pub fn nas_pdu_ie(nas_pdu: &[u8]) -> NgapResult<EncodedIe> {
    Ok((
        ProtocolIeId::NAS_PDU,
        Criticality::Reject,
        encode_ie_value(&NasPdu(nas_pdu.to_vec()))?,
    ))
}

// ============================================================================
// NG Setup
// ============================================================================

/// Build an NG Setup Request carrying an opaque, pre-encoded GlobalRANNodeID
pub fn build_ng_setup_request(global_ran_node_id: &[u8]) -> NgapResult<Vec<u8>> {
    build_pdu(
        MessageKind::InitiatingMessage,
        ProcedureCode::NG_SETUP,
        Criticality::Reject,
        &[(
            ProtocolIeId::GLOBAL_RAN_NODE_ID,
            Criticality::Reject,
            global_ran_node_id.to_vec(),
        )],
    )
}

// ============================================================================
// NAS Transport
// ============================================================================

/// Build an Initial UE Message
pub fn build_initial_ue_message(ran_ue_ngap_id: u32, nas_pdu: &[u8]) -> NgapResult<Vec<u8>> {
    build_pdu(
        MessageKind::InitiatingMessage,
        ProcedureCode::INITIAL_UE_MESSAGE,
        Criticality::Ignore,
        &[ran_ue_ngap_id_ie(ran_ue_ngap_id)?, nas_pdu_ie(nas_pdu)?],
    )
}

/// Build an Uplink NAS Transport
pub fn build_uplink_nas_transport(
    amf_ue_ngap_id: u64,
    ran_ue_ngap_id: u32,
    nas_pdu: &[u8],
) -> NgapResult<Vec<u8>> {
    build_pdu(
        MessageKind::InitiatingMessage,
        ProcedureCode::UPLINK_NAS_TRANSPORT,
        Criticality::Ignore,
        &[
            amf_ue_ngap_id_ie(amf_ue_ngap_id)?,
            ran_ue_ngap_id_ie(ran_ue_ngap_id)?,
            nas_pdu_ie(nas_pdu)?,
        ],
    )
}

/// Build a Downlink NAS Transport
pub fn build_downlink_nas_transport(
    amf_ue_ngap_id: u64,
    ran_ue_ngap_id: u32,
    nas_pdu: &[u8],
) -> NgapResult<Vec<u8>> {
    build_pdu(
        MessageKind::InitiatingMessage,
        ProcedureCode::DOWNLINK_NAS_TRANSPORT,
        Criticality::Ignore,
        &[
            amf_ue_ngap_id_ie(amf_ue_ngap_id)?,
            ran_ue_ngap_id_ie(ran_ue_ngap_id)?,
            nas_pdu_ie(nas_pdu)?,
        ],
    )
}

// ============================================================================
// UE Context Release
// ============================================================================

/// Build a UE Context Release Request (RAN-initiated)
pub fn build_ue_context_release_request(
    amf_ue_ngap_id: u64,
    ran_ue_ngap_id: u32,
) -> NgapResult<Vec<u8>> {
    build_pdu(
        MessageKind::InitiatingMessage,
        ProcedureCode::UE_CONTEXT_RELEASE_REQUEST,
        Criticality::Ignore,
        &[
            amf_ue_ngap_id_ie(amf_ue_ngap_id)?,
            ran_ue_ngap_id_ie(ran_ue_ngap_id)?,
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_initial_ue_message_envelope() {
        let bytes = build_initial_ue_message(42, &[0x7e, 0x00, 0x41]).unwrap();
        assert_eq!(bytes[0], 0x00);
        assert_eq!(bytes[1], 15);

        let pdu = NgapPdu::decode(&bytes).unwrap();
        assert_eq!(pdu.procedure_code, ProcedureCode::INITIAL_UE_MESSAGE);
        let ies = pdu.protocol_ies().unwrap();
        assert_eq!(ies.len(), 2);
        let nas = ies.find(ProtocolIeId::NAS_PDU).unwrap().unwrap();
        assert_eq!(nas.value_as::<NasPdu>().unwrap().0, vec![0x7e, 0x00, 0x41]);
    }

    #[test]
    fn test_build_ng_setup_request() {
        let bytes = build_ng_setup_request(&[0x00, 0x02, 0xf8, 0x39]).unwrap();
        let pdu = NgapPdu::decode(&bytes).unwrap();
        assert_eq!(pdu.procedure_code, ProcedureCode::NG_SETUP);
        assert_eq!(pdu.criticality, Criticality::Reject);
        let ies = pdu.protocol_ies().unwrap();
        let field = ies.find(ProtocolIeId::GLOBAL_RAN_NODE_ID).unwrap().unwrap();
        assert_eq!(field.value, &[0x00, 0x02, 0xf8, 0x39]);
    }

    #[test]
    fn test_build_release_request_has_both_ids() {
        let bytes = build_ue_context_release_request(9, 3).unwrap();
        let pdu = NgapPdu::decode(&bytes).unwrap();
        let ies = pdu.protocol_ies().unwrap();
        assert!(ies.find(ProtocolIeId::AMF_UE_NGAP_ID).unwrap().is_some());
        assert!(ies.find(ProtocolIeId::RAN_UE_NGAP_ID).unwrap().is_some());
    }
}
