//! NGAP Error Types

use ogs_asn1c::PerError;
use thiserror::Error;

/// Errors that can occur during NGAP message processing
#[derive(Error, Debug)]
pub enum NgapError {
    /// ASN.1 encoding/decoding error
    #[error("ASN.1 codec error: {0}")]
    Asn1(#[from] PerError),

    /// Missing mandatory IE
    #[error("Missing mandatory IE: {ie_name} (id={ie_id})")]
    MissingMandatoryIe { ie_name: &'static str, ie_id: u16 },

    /// Procedure carries no UE identifier
    #[error("Procedure {procedure} is not UE-associated")]
    NotUeAssociated { procedure: String },
}

pub type NgapResult<T> = Result<T, NgapError>;
