//! NGAP Dispatcher
//!
//! Entry point for everything the SCTP layer reports. Association-level
//! events (close, notifications, errors) are handled right here on the
//! reader thread; NGAP messages get a routing key and go to the scheduler.

use std::sync::Arc;

use bytes::Bytes;
use ogs_ngap::{extract_routing_key, is_ng_setup_request};
use ogs_sctp::{AssociationHandler, Connection, SctpError, SctpNotification};

use crate::context::AmfContext;
use crate::metrics::{AmfMetrics, DispatchMetric};
use crate::scheduler::Scheduler;
use crate::worker::WorkItem;

/// Routes transport events to gNB bookkeeping and NGAP messages to workers
pub struct NgapDispatcher {
    scheduler: Arc<Scheduler<Connection>>,
    context: Arc<AmfContext>,
    metrics: Arc<AmfMetrics>,
}

impl NgapDispatcher {
    pub fn new(
        scheduler: Arc<Scheduler<Connection>>,
        context: Arc<AmfContext>,
        metrics: Arc<AmfMetrics>,
    ) -> Self {
        Self { scheduler, context, metrics }
    }

    fn remove_gnb(&self, conn: Connection, reason: &str) {
        match self.context.gnb_remove(conn.id) {
            Some(_) => {
                log::info!("[{}] gNB context released ({})", conn, reason);
                self.metrics.set(DispatchMetric::Gnb, self.context.gnb_count() as u64);
                self.metrics.set(DispatchMetric::RanUe, self.context.ue_count() as u64);
            }
            None => log::debug!("[{}] No gNB context to release ({})", conn, reason),
        }
    }
}

impl AssociationHandler for NgapDispatcher {
    fn on_message(&self, conn: Connection, data: Bytes) {
        if data.is_empty() {
            self.metrics.inc(DispatchMetric::ConnectionCloses);
            if self.context.gnb_find(conn.id).is_some() {
                self.remove_gnb(conn, "connection closed");
            } else {
                log::warn!("[{}] Close on connection without gNB context", conn);
            }
            return;
        }

        self.metrics.inc(DispatchMetric::Received);

        if is_ng_setup_request(&data) {
            if self.context.gnb_add(conn) {
                self.metrics.set(DispatchMetric::Gnb, self.context.gnb_count() as u64);
            }
        } else if self.context.gnb_find(conn.id).is_none() {
            self.metrics.inc(DispatchMetric::Dropped);
            log::warn!("[{}] NGAP message before NG Setup dropped", conn);
            return;
        }

        let routing_key = extract_routing_key(&data).unwrap_or(0);

        if self.scheduler.dispatch(WorkItem::new(routing_key, conn, data)) {
            self.metrics.inc(DispatchMetric::Dispatched);
        } else {
            self.metrics.inc(DispatchMetric::Rejected);
            log::warn!("[{}] Scheduler refused message (key {})", conn, routing_key);
        }
    }

    fn on_notification(&self, conn: Connection, notification: SctpNotification) {
        if notification.is_terminal() {
            log::info!("[{}] {}", conn, notification);
            self.remove_gnb(conn, "association terminated");
        } else {
            log::debug!("[{}] {} ignored", conn, notification);
        }
    }

    fn on_connection_error(&self, conn: Connection, error: &SctpError) {
        log::error!("[{}] SCTP connection error: {}", conn, error);
        self.remove_gnb(conn, "connection error");
    }
}
