//! NextGCore Cryptographic Library
//!
//! The 128-bit NAS security algorithms used by the AMF:
//!
//! | id | ciphering | integrity |
//! |----|-----------|-----------|
//! | 1  | NEA1 (SNOW 3G f8) | NIA1 (SNOW 3G f9) |
//! | 2  | NEA2 (AES-CTR)    | NIA2 (AES-CMAC)   |
//! | 3  | NEA3 (ZUC)        | NIA3 (ZUC)        |

pub mod aes;        // AES-128 CTR
pub mod aes_cmac;   // AES-CMAC
pub mod nea;        // 128-NEA1/2/3
pub mod nia;        // 128-NIA1/2/3
pub mod snow3g;     // SNOW 3G stream cipher
pub mod zuc;        // ZUC EEA3/EIA3


pub use nea::{nea1, nea2, nea3};
pub use nia::{nia1, nia2, nia3, MAC_SIZE};
