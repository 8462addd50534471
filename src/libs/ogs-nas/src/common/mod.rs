//! Common NAS types and NAS security

pub mod types;
pub mod security;

pub use types::*;
pub use security::*;
