//! NAS Security Algorithm Selection
//!
//! Picks the NIA/NEA pair for a UE from its advertised 5GS security
//! capability and the AMF's configured preference lists, then checks the
//! result against the ciphering policy.

use serde::Deserialize;
use thiserror::Error;

use ogs_nas::common::types::{SecurityAlgorithms, UeSecurityCapability};

/// Algorithm selection failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlgorithmError {
    #[error("Unknown integrity algorithm '{0}'")]
    UnknownIntegrityName(String),

    #[error("Unknown ciphering algorithm '{0}'")]
    UnknownCipheringName(String),

    #[error("No integrity algorithm in common with the UE")]
    NoCommonIntegrity,

    #[error("No ciphering algorithm in common with the UE")]
    NoCommonCiphering,

    #[error("{0} rejected by security policy")]
    PolicyViolation(&'static str),
}

/// NAS ciphering enforcement policy
///
/// TS 33.501 §6.7.2: NIA0 shall not be used for NAS signalling outside
/// unauthenticated emergency sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NasCipheringPolicy {
    /// Accept null algorithms (lab use)
    AllowNull,
    /// Reject NIA0, accept NEA0
    #[default]
    RejectNullIntegrity,
    /// Reject NIA0 and NEA0
    RejectAllNull,
}

/// Configured preference lists and policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityOrder {
    pub integrity_order: Vec<u8>,
    pub ciphering_order: Vec<u8>,
    pub policy: NasCipheringPolicy,
}

impl Default for SecurityOrder {
    fn default() -> Self {
        Self {
            integrity_order: vec![
                SecurityAlgorithms::INTEGRITY_128_NIA2,
                SecurityAlgorithms::INTEGRITY_128_NIA1,
                SecurityAlgorithms::INTEGRITY_NONE,
            ],
            ciphering_order: vec![
                SecurityAlgorithms::CIPHERING_NONE,
                SecurityAlgorithms::CIPHERING_128_NEA1,
                SecurityAlgorithms::CIPHERING_128_NEA2,
            ],
            policy: NasCipheringPolicy::default(),
        }
    }
}

impl SecurityOrder {
    /// Build from configuration names such as `NIA2` or `128-NEA1`
    pub fn from_names<S: AsRef<str>>(
        integrity: &[S],
        ciphering: &[S],
        policy: NasCipheringPolicy,
    ) -> Result<Self, AlgorithmError> {
        let integrity_order = integrity
            .iter()
            .map(|name| parse_integrity_algorithm(name.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        let ciphering_order = ciphering
            .iter()
            .map(|name| parse_ciphering_algorithm(name.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { integrity_order, ciphering_order, policy })
    }
}

/// Parse integrity algorithm name to ID
pub fn parse_integrity_algorithm(name: &str) -> Result<u8, AlgorithmError> {
    match name.to_uppercase().as_str() {
        "NIA0" => Ok(SecurityAlgorithms::INTEGRITY_NONE),
        "NIA1" | "128-NIA1" => Ok(SecurityAlgorithms::INTEGRITY_128_NIA1),
        "NIA2" | "128-NIA2" => Ok(SecurityAlgorithms::INTEGRITY_128_NIA2),
        "NIA3" | "128-NIA3" => Ok(SecurityAlgorithms::INTEGRITY_128_NIA3),
        _ => Err(AlgorithmError::UnknownIntegrityName(name.to_string())),
    }
}

/// Parse ciphering algorithm name to ID
pub fn parse_ciphering_algorithm(name: &str) -> Result<u8, AlgorithmError> {
    match name.to_uppercase().as_str() {
        "NEA0" => Ok(SecurityAlgorithms::CIPHERING_NONE),
        "NEA1" | "128-NEA1" => Ok(SecurityAlgorithms::CIPHERING_128_NEA1),
        "NEA2" | "128-NEA2" => Ok(SecurityAlgorithms::CIPHERING_128_NEA2),
        "NEA3" | "128-NEA3" => Ok(SecurityAlgorithms::CIPHERING_128_NEA3),
        _ => Err(AlgorithmError::UnknownCipheringName(name.to_string())),
    }
}

/// Get algorithm name for logging
pub fn ciphering_algorithm_name(algo: u8) -> &'static str {
    match algo {
        0 => "NEA0",
        1 => "128-NEA1",
        2 => "128-NEA2",
        3 => "128-NEA3",
        _ => "Unknown",
    }
}

/// Get algorithm name for logging
pub fn integrity_algorithm_name(algo: u8) -> &'static str {
    match algo {
        0 => "NIA0",
        1 => "128-NIA1",
        2 => "128-NIA2",
        3 => "128-NIA3",
        _ => "Unknown",
    }
}

/// Check a selected pair against the policy
pub fn validate_algorithm_policy(
    ciphering: u8,
    integrity: u8,
    policy: NasCipheringPolicy,
) -> Result<(), AlgorithmError> {
    let null_integrity = integrity == SecurityAlgorithms::INTEGRITY_NONE;
    let null_ciphering = ciphering == SecurityAlgorithms::CIPHERING_NONE;
    match policy {
        NasCipheringPolicy::AllowNull => Ok(()),
        NasCipheringPolicy::RejectNullIntegrity if null_integrity => {
            Err(AlgorithmError::PolicyViolation("NIA0 (null integrity)"))
        }
        NasCipheringPolicy::RejectNullIntegrity => Ok(()),
        NasCipheringPolicy::RejectAllNull if null_integrity => {
            Err(AlgorithmError::PolicyViolation("NIA0 (null integrity)"))
        }
        NasCipheringPolicy::RejectAllNull if null_ciphering => {
            Err(AlgorithmError::PolicyViolation("NEA0 (null ciphering)"))
        }
        NasCipheringPolicy::RejectAllNull => Ok(()),
    }
}

/// Select `(integrity, ciphering)` for a UE.
///
/// The first entry of each configured order that the UE supports wins.
/// When NIA0 is selected, ciphering is forced to NEA0: the NAS codec
/// refuses a real cipher without integrity.
#[cfg_attr(not(test), allow(dead_code))]
pub fn select_security_algorithms(
    capability: &UeSecurityCapability,
    order: &SecurityOrder,
) -> Result<(u8, u8), AlgorithmError> {
    let integrity = order
        .integrity_order
        .iter()
        .copied()
        .find(|alg| capability.supports_nia(*alg))
        .ok_or(AlgorithmError::NoCommonIntegrity)?;

    let ciphering = if integrity == SecurityAlgorithms::INTEGRITY_NONE {
        SecurityAlgorithms::CIPHERING_NONE
    } else {
        order
            .ciphering_order
            .iter()
            .copied()
            .find(|alg| capability.supports_nea(*alg))
            .ok_or(AlgorithmError::NoCommonCiphering)?
    };

    validate_algorithm_policy(ciphering, integrity, order.policy)?;

    log::debug!(
        "Selected security algorithms: {} / {}",
        integrity_algorithm_name(integrity),
        ciphering_algorithm_name(ciphering)
    );
    Ok((integrity, ciphering))
}
