//! AES-CMAC
//!
//! RFC 4493 AES-CMAC over the `cmac` crate. 128-NIA2 truncates this to
//! its first 32 bits.

use aes::cipher::{generic_array::GenericArray, KeyInit};
use aes::Aes128;
use cmac::{Cmac, Mac};

/// CMAC output size in bytes
pub const CMAC_SIZE: usize = 16;

/// Calculate AES-CMAC for a message
pub fn aes_cmac_calculate(key: &[u8; 16], msg: &[u8]) -> [u8; CMAC_SIZE] {
    let mut mac = <Cmac<Aes128> as KeyInit>::new(GenericArray::from_slice(key));
    mac.update(msg);
    let mut cmac = [0u8; CMAC_SIZE];
    cmac.copy_from_slice(&mac.finalize().into_bytes());
    cmac
}
