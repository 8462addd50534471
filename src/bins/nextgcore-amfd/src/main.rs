//! NextGCore AMF (Access and Mobility Management Function)
//!
//! NGAP front end: SCTP associations from gNBs feed a keyed worker pool,
//! so messages for one UE are always handled in arrival order while
//! different UEs proceed in parallel.

pub mod config;
pub mod context;
pub mod dispatcher;
pub mod metrics;
pub mod nas_security;
pub mod ngap_handler;
pub mod scheduler;
pub mod worker;


use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context as _, Result};
use clap::Parser;
use ogs_sctp::{Connection, SctpServer};

use crate::config::{AmfConfig, Config};
use crate::context::AmfContext;
use crate::dispatcher::NgapDispatcher;
use crate::metrics::{AmfMetrics, DispatchMetric};
use crate::ngap_handler::NgapHandler;
use crate::scheduler::Scheduler;

/// Main loop tick
const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Metrics summary period, in ticks
const SUMMARY_TICKS: u64 = 600;

/// NextGCore AMF - Access and Mobility Management Function
#[derive(Parser, Debug)]
#[command(name = "nextgcore-amfd")]
#[command(author = "NextGCore")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "5G Core Access and Mobility Management Function")]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/nextgcore/amf.yaml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// NGAP bind address, "ip" or "ip:port" (overrides amf.ngap)
    #[arg(long)]
    ngap_addr: Option<String>,

    /// Worker threads, 0 for one per CPU (overrides amf.scheduler.workers)
    #[arg(long)]
    workers: Option<i64>,

    /// Per-worker queue depth, 0 for the default (overrides amf.scheduler.queue_capacity)
    #[arg(long)]
    queue_capacity: Option<i64>,
}

/// AMF application state
pub struct AmfApp {
    /// Running flag
    running: Arc<AtomicBool>,
    /// Metrics
    metrics: Arc<AmfMetrics>,
    /// Effective configuration
    config: AmfConfig,
    /// gNB and UE registries
    context: Arc<AmfContext>,
    scheduler: Option<Arc<Scheduler<Connection>>>,
    server: Option<SctpServer>,
}

impl AmfApp {
    /// Create a new AMF application
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            metrics: Arc::new(AmfMetrics::new()),
            config: AmfConfig::default(),
            context: Arc::new(AmfContext::default()),
            scheduler: None,
            server: None,
        }
    }

    /// Load the configuration file and apply command-line overrides
    pub fn load_config(&mut self, config_path: &str, args_override: impl FnOnce(&mut AmfConfig)) -> Result<()> {
        let mut config = Config::load(config_path)?.amf;
        args_override(&mut config);

        let order = config.security_order().context("Invalid amf.security")?;
        log::info!(
            "NAS security: integrity {:?}, ciphering {:?}, policy {:?}",
            order.integrity_order,
            order.ciphering_order,
            order.policy
        );
        self.context = Arc::new(AmfContext::new(order));
        self.config = config;
        Ok(())
    }

    /// Start the worker pool
    pub fn init(&mut self) -> Result<()> {
        log::info!("Initializing AMF...");

        let handler = NgapHandler::new(Arc::clone(&self.context), Arc::clone(&self.metrics));
        let scheduler = scheduler::amf_scheduler_init(
            self.config.worker_count(),
            self.config.queue_capacity(),
            move |conn, payload| handler.handle(conn, payload),
        )
        .context("Failed to start worker threads")?;
        self.scheduler = Some(scheduler);

        log::info!("AMF initialized successfully");
        Ok(())
    }

    /// Bind the NGAP SCTP server and start accepting gNBs
    pub fn init_ngap(&mut self) -> Result<()> {
        let scheduler = self
            .scheduler
            .as_ref()
            .ok_or_else(|| anyhow!("Scheduler not initialized"))?;
        let ngap_addr = self.config.ngap_addr()?;
        log::info!("Initializing NGAP server on {}...", ngap_addr);

        let server = SctpServer::bind(ngap_addr, &self.config.sctp_config())
            .with_context(|| format!("Failed to bind NGAP server on {}", ngap_addr))?;
        let dispatcher = NgapDispatcher::new(
            Arc::clone(scheduler),
            Arc::clone(&self.context),
            Arc::clone(&self.metrics),
        );
        server.start(Arc::new(dispatcher))?;

        log::info!("NGAP server initialized on {}", server.local_addr());
        self.server = Some(server);
        Ok(())
    }

    /// Run the AMF main loop until [`AmfApp::stop`]
    pub async fn run_async(&mut self) -> Result<()> {
        log::info!("AMF running...");

        let mut interval = tokio::time::interval(POLL_INTERVAL);
        let mut ticks: u64 = 0;
        while self.running.load(Ordering::SeqCst) {
            interval.tick().await;
            ticks += 1;

            self.update_gauges();
            if ticks % SUMMARY_TICKS == 0 {
                log::info!("{}", self.metrics.get_summary());
            }
        }

        log::info!("AMF main loop exited");
        Ok(())
    }

    fn update_gauges(&self) {
        if let Some(scheduler) = &self.scheduler {
            self.metrics.set(DispatchMetric::Queued, scheduler.queued() as u64);
            self.metrics.set(DispatchMetric::HandlerPanics, scheduler.panic_count());
        }
        self.metrics.set(DispatchMetric::Gnb, self.context.gnb_count() as u64);
        self.metrics.set(DispatchMetric::RanUe, self.context.ue_count() as u64);
    }

    /// Stop accepting, then drain the worker queues
    pub async fn shutdown_async(&mut self) {
        log::info!("Shutting down AMF...");

        let server = self.server.take();
        let closed = tokio::task::spawn_blocking(move || {
            if let Some(server) = server {
                server.close();
            }
            scheduler::amf_scheduler_shutdown();
        })
        .await;
        if let Err(e) = closed {
            log::error!("Shutdown task failed: {}", e);
        }

        self.update_gauges();
        log::info!("{}", self.metrics.get_summary());
        log::info!("AMF shutdown complete");
    }

    /// Signal the application to stop
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Get the running flag for signal handlers
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Get metrics reference
    pub fn metrics(&self) -> &AmfMetrics {
        &self.metrics
    }

    /// Get AMF context reference
    pub fn amf_context(&self) -> Arc<AmfContext> {
        Arc::clone(&self.context)
    }
}

impl Default for AmfApp {
    fn default() -> Self {
        Self::new()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();

    log::info!("NextGCore AMF v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Configuration: {}", args.config);

    let mut app = AmfApp::new();

    // Setup signal handlers
    let running = app.running_flag();
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    let Args { config, ngap_addr, workers, queue_capacity, .. } = args;
    app.load_config(&config, |amf| amf.apply_overrides(ngap_addr, workers, queue_capacity))?;
    app.init()?;

    if let Err(e) = app.init_ngap() {
        app.shutdown_async().await;
        return Err(e);
    }

    app.run_async().await?;
    app.shutdown_async().await;

    log::info!("NextGCore AMF terminated");
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_amf_app_creation() {
        let app = AmfApp::new();
        assert!(app.running.load(Ordering::SeqCst));
        assert!(app.scheduler.is_none());
        assert!(app.server.is_none());
    }

    #[test]
    fn test_amf_app_stop() {
        let app = AmfApp::new();
        assert!(app.running.load(Ordering::SeqCst));
        app.stop();
        assert!(!app.running.load(Ordering::SeqCst));
    }

    #[test]
    fn test_amf_app_running_flag() {
        let app = AmfApp::new();
        let flag = app.running_flag();
        assert!(flag.load(Ordering::SeqCst));
        app.stop();
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_amf_app_metrics() {
        let app = AmfApp::new();
        app.metrics().inc(DispatchMetric::Received);
        assert_eq!(app.metrics().get(DispatchMetric::Received), 1);
    }

    #[test]
    fn test_amf_app_load_config() {
        let mut file = tempfile_path("amf_app_load_config.yaml");
        writeln!(file.1, "amf:\n  security:\n    integrity_order: [NIA1]\n    ciphering_order: [NEA2]").unwrap();

        let mut app = AmfApp::new();
        app.load_config(file.0.to_str().unwrap(), |amf| {
            amf.apply_overrides(Some("127.0.0.1".to_string()), Some(3), None)
        })
        .unwrap();

        assert_eq!(app.amf_context().security_order.integrity_order, vec![1]);
        assert_eq!(app.config.worker_count(), 3);
        assert_eq!(app.config.ngap_addr().unwrap(), "127.0.0.1:38412".parse().unwrap());
        let _ = std::fs::remove_file(&file.0);
    }

    #[test]
    fn test_amf_app_rejects_bad_algorithm() {
        let mut file = tempfile_path("amf_app_bad_algorithm.yaml");
        writeln!(file.1, "amf:\n  security:\n    ciphering_order: [NEA5]").unwrap();

        let mut app = AmfApp::new();
        assert!(app.load_config(file.0.to_str().unwrap(), |_| {}).is_err());
        let _ = std::fs::remove_file(&file.0);
    }

    #[test]
    fn test_init_ngap_requires_scheduler() {
        let mut app = AmfApp::new();
        assert!(app.init_ngap().is_err());
    }

    fn tempfile_path(name: &str) -> (std::path::PathBuf, std::fs::File) {
        let path = std::env::temp_dir().join(format!("{}-{}", std::process::id(), name));
        let file = std::fs::File::create(&path).unwrap();
        (path, file)
    }
}
