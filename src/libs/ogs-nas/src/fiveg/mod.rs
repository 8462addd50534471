//! 5GS NAS message envelope (3GPP TS 24.501)

pub mod header;
pub mod message;

pub use header::*;
pub use message::*;
