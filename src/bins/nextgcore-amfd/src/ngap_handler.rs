//! NGAP Message Handler
//!
//! Runs inside a worker lane, once per dispatched message. Decodes the
//! NGAP envelope and, for messages carrying a NAS-PDU, removes NAS
//! security before the plain message reaches the 5GMM layer.

use std::sync::Arc;

use anyhow::{anyhow, Context as _, Result};
use bytes::Bytes;
use ogs_asn1c::ngap::{MessageKind, NasPdu, NgapPdu, ProcedureCode, ProtocolIeId};
use ogs_nas::common::security::{self, DecodedMessage};
use ogs_ngap::key_source;
use ogs_sctp::Connection;

use crate::context::AmfContext;
use crate::metrics::{AmfMetrics, DispatchMetric};

/// Per-message entry point handed to the scheduler
pub struct NgapHandler {
    context: Arc<AmfContext>,
    metrics: Arc<AmfMetrics>,
}

impl NgapHandler {
    pub fn new(context: Arc<AmfContext>, metrics: Arc<AmfMetrics>) -> Self {
        Self { context, metrics }
    }

    /// Handle one NGAP message; failures are logged, never propagated
    pub fn handle(&self, conn: Connection, payload: Bytes) {
        self.metrics.inc(DispatchMetric::Handled);
        if let Err(e) = self.dispatch(conn, &payload) {
            log::warn!("[{}] {:#}", conn, e);
        }
    }

    fn dispatch(&self, conn: Connection, payload: &[u8]) -> Result<()> {
        let pdu = NgapPdu::decode(payload).context("undecodable NGAP PDU")?;
        log::debug!("[{}] {} ({:?})", conn, pdu.procedure_code, pdu.kind);

        if pdu.kind != MessageKind::InitiatingMessage {
            return Ok(());
        }
        match pdu.procedure_code {
            ProcedureCode::NG_SETUP => {
                log::info!("[{}] NG Setup Request", conn);
                Ok(())
            }
            ProcedureCode::INITIAL_UE_MESSAGE => self.handle_nas_transport(conn, &pdu, true),
            ProcedureCode::UPLINK_NAS_TRANSPORT => self.handle_nas_transport(conn, &pdu, false),
            _ => Ok(()),
        }
    }

    /// Initial UE Message / Uplink NAS Transport
    fn handle_nas_transport(&self, conn: Connection, pdu: &NgapPdu<'_>, is_initial: bool) -> Result<()> {
        let ies = pdu
            .protocol_ies()
            .with_context(|| format!("undecodable IEs in {}", pdu.procedure_code))?;

        let routing_key = key_source(pdu.procedure_code)
            .and_then(|source| source.extract(&ies))
            .ok_or_else(|| anyhow!("{} without UE NGAP ID", pdu.procedure_code))?;

        let nas_pdu = ies
            .find(ProtocolIeId::NAS_PDU)?
            .ok_or_else(|| anyhow!("{} without NAS-PDU", pdu.procedure_code))?
            .value_as::<NasPdu>()?;

        let ue = self.context.ue_find_or_add(conn.id, routing_key);
        self.metrics.set(DispatchMetric::RanUe, self.context.ue_count() as u64);

        let mut sec = ue.security();
        let decoded = security::decode(&mut sec, Bytes::from(nas_pdu.0), is_initial)
            .with_context(|| format!("[ue {}] NAS decode failed", routing_key))?;
        self.check_integrity(routing_key, sec.security_context_available, &decoded);

        log::debug!(
            "[ue {}] {} (integrity {})",
            routing_key,
            decoded.message.name(),
            if decoded.integrity_verified { "ok" } else { "not verified" }
        );
        Ok(())
    }

    fn check_integrity(&self, routing_key: u64, context_available: bool, decoded: &DecodedMessage) {
        if context_available && decoded.security_header_type.is_protected() && !decoded.integrity_verified {
            self.metrics.inc(DispatchMetric::MacFailures);
            log::warn!(
                "[ue {}] NAS MAC verification failed on {}",
                routing_key,
                decoded.message.name()
            );
        }
    }
}
