//! AMF Configuration
//!
//! The `amf:` section of the YAML configuration file:
//!
//! ```yaml
//! amf:
//!   ngap:
//!     addr: 0.0.0.0
//!     port: 38412
//!   scheduler:
//!     workers: 8
//!     queue_capacity: 4096
//!   security:
//!     integrity_order: [NIA2, NIA1, NIA0]
//!     ciphering_order: [NEA0, NEA1, NEA2]
//!     ciphering_policy: reject_null_integrity
//!   sctp:
//!     max_instreams: 2
//!     max_outstreams: 2
//!     max_attempts: 4
//! ```

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use anyhow::{Context, Result};
use ogs_sctp::{SctpConfig, OGS_NGAP_SCTP_PORT};
use serde::Deserialize;

use crate::nas_security::{NasCipheringPolicy, SecurityOrder};

/// Whole configuration file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub amf: AmfConfig,
}

/// `amf:` section
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AmfConfig {
    pub ngap: NgapConfig,
    pub scheduler: SchedulerConfig,
    pub security: SecurityConfig,
    pub sctp: SctpSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NgapConfig {
    /// IP address or full `ip:port`
    pub addr: Option<String>,
    pub port: Option<u16>,
}

/// Non-positive values select the built-in defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub workers: i64,
    pub queue_capacity: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub integrity_order: Vec<String>,
    pub ciphering_order: Vec<String>,
    pub ciphering_policy: NasCipheringPolicy,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            integrity_order: vec!["NIA2".into(), "NIA1".into(), "NIA0".into()],
            ciphering_order: vec!["NEA0".into(), "NEA1".into(), "NEA2".into()],
            ciphering_policy: NasCipheringPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SctpSection {
    pub max_instreams: Option<u16>,
    pub max_outstreams: Option<u16>,
    pub max_attempts: Option<u16>,
}

impl Config {
    /// Load from `path`. A missing or unreadable file leaves every default
    /// in place; a file that does not parse is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading configuration from: {}", path.display());

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!("Config file '{}' not found. Using defaults.", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                log::warn!("Could not read config file '{}': {}. Using defaults.", path.display(), e);
                return Ok(Self::default());
            }
        };

        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)?;
        Ok(config)
    }
}

impl AmfConfig {
    /// Command-line values win over the file
    pub fn apply_overrides(
        &mut self,
        ngap_addr: Option<String>,
        workers: Option<i64>,
        queue_capacity: Option<i64>,
    ) {
        if let Some(addr) = ngap_addr {
            self.ngap.addr = Some(addr);
        }
        if let Some(workers) = workers {
            self.scheduler.workers = workers;
        }
        if let Some(queue_capacity) = queue_capacity {
            self.scheduler.queue_capacity = queue_capacity;
        }
    }

    /// NGAP listen address; defaults to `0.0.0.0:38412`
    pub fn ngap_addr(&self) -> Result<SocketAddr> {
        let port = self.ngap.port.unwrap_or(OGS_NGAP_SCTP_PORT);
        let addr = match self.ngap.addr.as_deref() {
            None => return Ok(SocketAddr::from(([0, 0, 0, 0], port))),
            Some(addr) => addr,
        };
        if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
            return Ok(socket_addr);
        }
        let ip: IpAddr = addr
            .parse()
            .with_context(|| format!("Invalid NGAP address '{}'", addr))?;
        Ok(SocketAddr::new(ip, port))
    }

    /// Worker count for the scheduler, 0 meaning one per CPU
    pub fn worker_count(&self) -> usize {
        usize::try_from(self.scheduler.workers).unwrap_or(0)
    }

    /// Queue depth per worker, 0 meaning the scheduler default
    pub fn queue_capacity(&self) -> usize {
        usize::try_from(self.scheduler.queue_capacity).unwrap_or(0)
    }

    /// Algorithm preference; an empty list keeps the built-in order
    pub fn security_order(&self) -> Result<SecurityOrder> {
        let mut order = SecurityOrder::from_names(
            &self.security.integrity_order,
            &self.security.ciphering_order,
            self.security.ciphering_policy,
        )?;
        let defaults = SecurityOrder::default();
        if order.integrity_order.is_empty() {
            order.integrity_order = defaults.integrity_order;
        }
        if order.ciphering_order.is_empty() {
            order.ciphering_order = defaults.ciphering_order;
        }
        Ok(order)
    }

    pub fn sctp_config(&self) -> SctpConfig {
        let defaults = SctpConfig::default();
        SctpConfig {
            max_instreams: self.sctp.max_instreams.unwrap_or(defaults.max_instreams),
            max_outstreams: self.sctp.max_outstreams.unwrap_or(defaults.max_outstreams),
            max_attempts: self.sctp.max_attempts.unwrap_or(defaults.max_attempts),
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
amf:
  ngap:
    addr: 127.0.0.5
  scheduler:
    workers: 8
    queue_capacity: -1
  security:
    integrity_order: [NIA1, NIA2]
    ciphering_order: [NEA2]
    ciphering_policy: reject_all_null
  sctp:
    max_instreams: 30
"#;

    #[test]
    fn test_parse_sample() {
        let config = Config::parse(SAMPLE).unwrap();
        let amf = &config.amf;
        assert_eq!(amf.ngap_addr().unwrap(), "127.0.0.5:38412".parse().unwrap());
        assert_eq!(amf.worker_count(), 8);
        assert_eq!(amf.queue_capacity(), 0);

        let order = amf.security_order().unwrap();
        assert_eq!(order.integrity_order, vec![1, 2]);
        assert_eq!(order.ciphering_order, vec![2]);
        assert_eq!(order.policy, NasCipheringPolicy::RejectAllNull);

        let sctp = amf.sctp_config();
        assert_eq!(sctp.max_instreams, 30);
        assert_eq!(sctp.max_outstreams, 2);
    }

    #[test]
    fn test_defaults() {
        let config = Config::parse("").unwrap();
        let amf = &config.amf;
        assert_eq!(amf.ngap_addr().unwrap(), "0.0.0.0:38412".parse().unwrap());
        assert_eq!(amf.worker_count(), 0);
        assert_eq!(amf.security_order().unwrap(), SecurityOrder::default());
        assert_eq!(amf.sctp_config(), SctpConfig::default());
    }

    #[test]
    fn test_empty_algorithm_lists_keep_defaults() {
        let amf = Config::parse("amf:\n  security:\n    integrity_order: []\n    ciphering_order: []\n")
            .unwrap()
            .amf;
        assert_eq!(amf.security_order().unwrap(), SecurityOrder::default());
    }

    #[test]
    fn test_other_sections_ignored() {
        let config = Config::parse("logger:\n  level: info\namf:\n  ngap:\n    port: 38413\n").unwrap();
        assert_eq!(config.amf.ngap_addr().unwrap().port(), 38413);
    }

    #[test]
    fn test_overrides() {
        let mut amf = Config::parse(SAMPLE).unwrap().amf;
        amf.apply_overrides(Some("10.0.0.1:9999".to_string()), Some(2), Some(64));
        assert_eq!(amf.ngap_addr().unwrap(), "10.0.0.1:9999".parse().unwrap());
        assert_eq!(amf.worker_count(), 2);
        assert_eq!(amf.queue_capacity(), 64);

        amf.apply_overrides(None, None, None);
        assert_eq!(amf.worker_count(), 2);
    }

    #[test]
    fn test_invalid_values() {
        assert!(Config::parse("amf:\n  scheduler:\n    workers: many\n").is_err());

        let amf = Config::parse("amf:\n  ngap:\n    addr: not-an-ip\n").unwrap().amf;
        assert!(amf.ngap_addr().is_err());

        let amf = Config::parse("amf:\n  security:\n    integrity_order: [NIA9]\n").unwrap().amf;
        assert!(amf.security_order().is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load("/nonexistent/nextgcore/amf.yaml").unwrap();
        assert_eq!(config.amf.worker_count(), 0);
    }
}
