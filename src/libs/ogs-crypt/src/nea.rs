//! 128-bit NAS/AS confidentiality algorithms (3GPP TS 33.501 Annex D.2)
//!
//! All three are keystream ciphers: the same call encrypts and decrypts,
//! in place.

use crate::aes::aes_ctr128_apply;
use crate::snow3g::snow_3g_f8;
use crate::zuc::zuc_eea3;

/// 128-NEA1 (SNOW 3G f8)
pub fn nea1(key: &[u8; 16], count: u32, bearer: u8, direction: u8, data: &mut [u8]) {
    let length = (data.len() * 8) as u32;
    snow_3g_f8(
        key,
        count,
        (bearer & 0x1f) as u32,
        (direction & 0x01) as u32,
        data,
        length,
    );
}

/// 128-NEA2 (AES-128 in CTR mode)
///
/// Initial counter block: COUNT (32) || BEARER (5) || DIRECTION (1) || 0 (90)
pub fn nea2(key: &[u8; 16], count: u32, bearer: u8, direction: u8, data: &mut [u8]) {
    let mut ivec = [0u8; 16];
    ivec[0..4].copy_from_slice(&count.to_be_bytes());
    ivec[4] = ((bearer & 0x1f) << 3) | ((direction & 0x01) << 2);
    aes_ctr128_apply(key, &mut ivec, data);
}

/// 128-NEA3 (ZUC)
pub fn nea3(key: &[u8; 16], count: u32, bearer: u8, direction: u8, data: &mut [u8]) {
    zuc_eea3(key, count, bearer, direction, data);
}
