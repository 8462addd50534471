//! AMF Metrics
//!
//! Counters for the NGAP receive path: what arrived, what was dispatched
//! to a worker lane, and what was turned away along the way.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// Metric identifiers
// ============================================================================

/// Dispatch path metric types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchMetric {
    // Gauges
    /// gNBs with a completed NG Setup binding
    Gnb,
    /// UE contexts
    RanUe,
    /// Items waiting in worker queues
    Queued,

    // Counters
    /// NGAP messages received from the transport
    Received,
    /// Messages accepted by a worker lane
    Dispatched,
    /// Messages refused by the scheduler (shutting down)
    Rejected,
    /// Messages from connections without a gNB binding
    Dropped,
    /// Association closes signalled by an empty read
    ConnectionCloses,
    /// Messages run through the business handler
    Handled,
    /// Handler invocations that panicked
    HandlerPanics,
    /// Uplink NAS messages that failed the integrity check
    MacFailures,
}

impl DispatchMetric {
    pub const ALL: [DispatchMetric; 11] = [
        DispatchMetric::Gnb,
        DispatchMetric::RanUe,
        DispatchMetric::Queued,
        DispatchMetric::Received,
        DispatchMetric::Dispatched,
        DispatchMetric::Rejected,
        DispatchMetric::Dropped,
        DispatchMetric::ConnectionCloses,
        DispatchMetric::Handled,
        DispatchMetric::HandlerPanics,
        DispatchMetric::MacFailures,
    ];

    /// Get metric name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gnb => "gnb",
            Self::RanUe => "ran_ue",
            Self::Queued => "amf_ngap_queued",
            Self::Received => "amf_ngap_received_total",
            Self::Dispatched => "amf_ngap_dispatched_total",
            Self::Rejected => "amf_ngap_rejected_total",
            Self::Dropped => "amf_ngap_dropped_total",
            Self::ConnectionCloses => "amf_ngap_connection_closes_total",
            Self::Handled => "amf_ngap_handled_total",
            Self::HandlerPanics => "amf_ngap_handler_panics_total",
            Self::MacFailures => "amf_nas_mac_failures_total",
        }
    }

    /// Get metric description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Gnb => "gNodeBs",
            Self::RanUe => "RAN UEs",
            Self::Queued => "NGAP messages waiting in worker queues",
            Self::Received => "Number of NGAP messages received from gNBs",
            Self::Dispatched => "Number of NGAP messages handed to a worker",
            Self::Rejected => "Number of NGAP messages refused by the scheduler",
            Self::Dropped => "Number of NGAP messages dropped before NG Setup",
            Self::ConnectionCloses => "Number of SCTP associations closed by the peer",
            Self::Handled => "Number of NGAP messages processed by the handler",
            Self::HandlerPanics => "Number of handler invocations that panicked",
            Self::MacFailures => "Number of uplink NAS messages failing integrity",
        }
    }

    /// Check if this is a gauge metric
    pub fn is_gauge(&self) -> bool {
        matches!(self, Self::Gnb | Self::RanUe | Self::Queued)
    }
}

// ============================================================================
// Metrics Manager
// ============================================================================

/// AMF metrics manager
pub struct AmfMetrics {
    counters: HashMap<DispatchMetric, AtomicU64>,
}

impl Default for AmfMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AmfMetrics {
    pub fn new() -> Self {
        let counters = DispatchMetric::ALL
            .iter()
            .map(|metric| (*metric, AtomicU64::new(0)))
            .collect();
        Self { counters }
    }

    pub fn inc(&self, metric: DispatchMetric) {
        self.add(metric, 1);
    }

    pub fn add(&self, metric: DispatchMetric, value: u64) {
        if let Some(counter) = self.counters.get(&metric) {
            counter.fetch_add(value, Ordering::Relaxed);
        }
    }

    /// Set a gauge (or mirror a counter kept elsewhere)
    pub fn set(&self, metric: DispatchMetric, value: u64) {
        if let Some(counter) = self.counters.get(&metric) {
            counter.store(value, Ordering::Relaxed);
        }
    }

    pub fn get(&self, metric: DispatchMetric) -> u64 {
        self.counters
            .get(&metric)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn reset(&self) {
        for counter in self.counters.values() {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let mut output = String::new();
        for metric in DispatchMetric::ALL {
            let metric_type = if metric.is_gauge() { "gauge" } else { "counter" };
            output.push_str(&format!("# HELP {} {}\n", metric.name(), metric.description()));
            output.push_str(&format!("# TYPE {} {}\n", metric.name(), metric_type));
            output.push_str(&format!("{} {}\n", metric.name(), self.get(metric)));
        }
        output
    }

    pub fn get_summary(&self) -> MetricsSummary {
        let received = self.get(DispatchMetric::Received);
        let dispatched = self.get(DispatchMetric::Dispatched);
        MetricsSummary {
            gnbs: self.get(DispatchMetric::Gnb),
            ran_ues: self.get(DispatchMetric::RanUe),
            received,
            dispatched,
            rejected: self.get(DispatchMetric::Rejected),
            dropped: self.get(DispatchMetric::Dropped),
            handler_panics: self.get(DispatchMetric::HandlerPanics),
            mac_failures: self.get(DispatchMetric::MacFailures),
            dispatch_rate: if received == 0 {
                0.0
            } else {
                (dispatched as f64 / received as f64) * 100.0
            },
        }
    }
}

/// Metrics summary
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub gnbs: u64,
    pub ran_ues: u64,
    pub received: u64,
    pub dispatched: u64,
    pub rejected: u64,
    pub dropped: u64,
    pub handler_panics: u64,
    pub mac_failures: u64,
    /// Dispatched as a percentage of received
    pub dispatch_rate: f64,
}

impl fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "gNBs={} UEs={} received={} dispatched={} ({:.1}%) rejected={} dropped={} panics={} mac_failures={}",
            self.gnbs,
            self.ran_ues,
            self.received,
            self.dispatched,
            self.dispatch_rate,
            self.rejected,
            self.dropped,
            self.handler_panics,
            self.mac_failures
        )
    }
}
