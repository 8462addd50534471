//! NGAP routing-key extraction
//!
//! Finds the UE identifier that pins a message to one scheduler lane,
//! reading only the PDU envelope and walking the IE container until the
//! wanted IE turns up. Nothing here allocates.
//!
//! Which identifier to look for is decided per procedure by
//! [`key_source`]; procedures absent from that table are node-level and
//! yield no key.

use ogs_asn1c::ngap::{
    AmfUeNgapId, MessageKind, NgapPdu, ProcedureCode, ProtocolIeContainer, ProtocolIeId,
    RanUeNgapId,
};

/// Where a procedure's routing key comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// AMF-UE-NGAP-ID when present, otherwise RAN-UE-NGAP-ID
    AmfThenRan,
    /// RAN-UE-NGAP-ID only (no AMF identifier has been assigned yet)
    RanOnly,
}

impl KeySource {
    /// Walk the container once and pull out the key.
    ///
    /// Stops at the first AMF-UE-NGAP-ID (or the first RAN-UE-NGAP-ID for
    /// [`KeySource::RanOnly`]). An AMF-UE-NGAP-ID whose value does not
    /// decode is skipped so the RAN-UE-NGAP-ID can still serve as the key;
    /// any other field that fails to decode ends the walk with no key.
    pub fn extract(self, ies: &ProtocolIeContainer<'_>) -> Option<u64> {
        let mut ran_id = None;
        for field in ies.iter() {
            let field = field.ok()?;
            match field.id {
                ProtocolIeId::AMF_UE_NGAP_ID if self == KeySource::AmfThenRan => {
                    match field.value_as::<AmfUeNgapId>() {
                        Ok(id) => return Some(id.0),
                        Err(e) => log::debug!("Routing key: undecodable AMF-UE-NGAP-ID ({})", e),
                    }
                }
                ProtocolIeId::RAN_UE_NGAP_ID if ran_id.is_none() => {
                    let id = field.value_as::<RanUeNgapId>().ok()?.0 as u64;
                    if self == KeySource::RanOnly {
                        return Some(id);
                    }
                    ran_id = Some(id);
                }
                _ => {}
            }
        }
        ran_id
    }
}

/// Procedure code → key source table.
///
/// UE-associated procedures map to a source; node-level procedures
/// (NG Setup, RAN/AMF Configuration Update, NG Reset, Paging, Overload,
/// PWS, Write-Replace Warning, non-UE NRPPa, configuration transfer,
/// AMF Status Indication, Private Message) and unknown codes map to `None`.
pub fn key_source(code: ProcedureCode) -> Option<KeySource> {
    use KeySource::*;
    let source = match code {
        ProcedureCode::INITIAL_UE_MESSAGE => RanOnly,

        ProcedureCode::CELL_TRAFFIC_TRACE
        | ProcedureCode::DEACTIVATE_TRACE
        | ProcedureCode::DOWNLINK_NAS_TRANSPORT
        | ProcedureCode::DOWNLINK_RAN_STATUS_TRANSFER
        | ProcedureCode::DOWNLINK_UE_ASSOCIATED_NRPPA_TRANSPORT
        | ProcedureCode::ERROR_INDICATION
        | ProcedureCode::HANDOVER_CANCEL
        | ProcedureCode::HANDOVER_NOTIFICATION
        | ProcedureCode::HANDOVER_PREPARATION
        | ProcedureCode::HANDOVER_RESOURCE_ALLOCATION
        | ProcedureCode::INITIAL_CONTEXT_SETUP
        | ProcedureCode::LOCATION_REPORTING_CONTROL
        | ProcedureCode::LOCATION_REPORTING_FAILURE_INDICATION
        | ProcedureCode::LOCATION_REPORT
        | ProcedureCode::NAS_NON_DELIVERY_INDICATION
        | ProcedureCode::PATH_SWITCH_REQUEST
        | ProcedureCode::PDU_SESSION_RESOURCE_MODIFY
        | ProcedureCode::PDU_SESSION_RESOURCE_MODIFY_INDICATION
        | ProcedureCode::PDU_SESSION_RESOURCE_RELEASE
        | ProcedureCode::PDU_SESSION_RESOURCE_SETUP
        | ProcedureCode::PDU_SESSION_RESOURCE_NOTIFY
        | ProcedureCode::REROUTE_NAS_REQUEST
        | ProcedureCode::RRC_INACTIVE_TRANSITION_REPORT
        | ProcedureCode::TRACE_FAILURE_INDICATION
        | ProcedureCode::TRACE_START
        | ProcedureCode::UE_CONTEXT_MODIFICATION
        | ProcedureCode::UE_CONTEXT_RELEASE
        | ProcedureCode::UE_CONTEXT_RELEASE_REQUEST
        | ProcedureCode::UE_RADIO_CAPABILITY_CHECK
        | ProcedureCode::UE_RADIO_CAPABILITY_INFO_INDICATION
        | ProcedureCode::UE_TNLA_BINDING_RELEASE
        | ProcedureCode::UPLINK_NAS_TRANSPORT
        | ProcedureCode::UPLINK_RAN_STATUS_TRANSFER
        | ProcedureCode::UPLINK_UE_ASSOCIATED_NRPPA_TRANSPORT
        | ProcedureCode::SECONDARY_RAT_DATA_USAGE_REPORT => AmfThenRan,

        _ => return None,
    };
    Some(source)
}

/// Extract the routing key of a raw NGAP message.
///
/// Returns `None` for node-level procedures, for UE-associated messages
/// that carry neither identifier, and for anything that fails to decode.
pub fn extract_routing_key(data: &[u8]) -> Option<u64> {
    let pdu = match NgapPdu::decode(data) {
        Ok(pdu) => pdu,
        Err(e) => {
            log::debug!("Routing key: undecodable NGAP envelope ({})", e);
            return None;
        }
    };

    let source = key_source(pdu.procedure_code)?;

    let ies = match pdu.protocol_ies() {
        Ok(ies) => ies,
        Err(e) => {
            log::debug!(
                "Routing key: undecodable IE container in {} ({})",
                pdu.procedure_code,
                e
            );
            return None;
        }
    };

    source.extract(&ies)
}

/// Message kind and procedure code, if the envelope decodes
pub fn peek_procedure(data: &[u8]) -> Option<(MessageKind, ProcedureCode)> {
    NgapPdu::decode(data)
        .ok()
        .map(|pdu| (pdu.kind, pdu.procedure_code))
}

/// True for an NG Setup Request (the node-registration message)
pub fn is_ng_setup_request(data: &[u8]) -> bool {
    matches!(
        peek_procedure(data),
        Some((MessageKind::InitiatingMessage, ProcedureCode::NG_SETUP))
    )
}
