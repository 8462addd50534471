//! NextGCore NAS Protocol Library
//!
//! 5GS NAS (3GPP TS 24.501) as seen by the AMF:
//!
//! - the plain 5GMM / 5GSM message envelope ([`fiveg::NasMessage`])
//! - the 7-octet security protected header
//! - NAS security: NAS COUNT bookkeeping, integrity protection and
//!   ciphering with NIA/NEA 0-3 ([`common::security`])
//!
//! # Example
//!
//! ```rust
//! use ogs_nas::common::security::{self, SecurityContext};
//! use ogs_nas::fiveg::{FiveGmmMessageType, NasMessage};
//!
//! let mut ctx = SecurityContext::new(2, 2, [0x11; 16], [0x22; 16]);
//! let msg = NasMessage::gmm(FiveGmmMessageType::RegistrationAccept, vec![0x01, 0x09]);
//!
//! let protected = security::encode(&mut ctx, &msg, false).unwrap();
//! assert_eq!(protected.len(), 7 + msg.encoded_len());
//! assert_eq!(ctx.dl_count.value(), 1);
//! ```

pub mod error;
pub mod common;
pub mod fiveg;


pub use error::{NasError, NasResult};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{NasError, NasResult};
    pub use crate::common::types::{
        ProtocolDiscriminator,
        SecurityAlgorithms,
        SecurityHeaderType,
        UeSecurityCapability,
    };
    pub use crate::common::security::{
        DecodedMessage,
        Direction,
        NasCount,
        Role,
        SecurityContext,
        protect,
        unprotect,
    };
    pub use crate::fiveg::{
        FiveGmmMessageType,
        FiveGsmMessageType,
        NasMessage,
    };
}
