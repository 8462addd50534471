//! ZUC-based 128-EEA3 / 128-EIA3
//!
//! Keystream generation is delegated to the `zuc` crate; this module builds
//! the EEA3/EIA3 IVs and applies the confidentiality and integrity
//! constructions of 3GPP TS 35.222 / TS 35.223 over whole octets.

use zuc::ZUC128;

/// 128-bit IV: COUNT || BEARER | DIRECTION || 0 repeated twice
fn build_iv(count: u32, bearer: u8, direction: u8) -> [u8; 16] {
    let mut iv = [0u8; 16];
    let count = count.to_be_bytes();
    let bd = ((bearer & 0x1f) << 3) | ((direction & 0x01) << 2);

    iv[0..4].copy_from_slice(&count);
    iv[4] = bd;
    iv[8..12].copy_from_slice(&count);
    iv[12] = bd;
    iv
}

/// 128-EEA3: XOR `data` in place with the ZUC keystream.
pub fn zuc_eea3(key: &[u8; 16], count: u32, bearer: u8, direction: u8, data: &mut [u8]) {
    let iv = build_iv(count, bearer, direction);
    let mut zuc = ZUC128::new(key, &iv);

    for chunk in data.chunks_mut(4) {
        let ks = zuc.generate().to_be_bytes();
        for (byte, k) in chunk.iter_mut().zip(ks) {
            *byte ^= k;
        }
    }
}

/// 32 keystream bits starting at bit `pos`
fn keystream_word(keystream: &[u32], pos: usize) -> u32 {
    let idx = pos / 32;
    let offset = pos % 32;
    if offset == 0 {
        keystream[idx]
    } else {
        (keystream[idx] << offset) | (keystream[idx + 1] >> (32 - offset))
    }
}

/// 128-EIA3 MAC over the whole octets of `data`.
pub fn zuc_eia3(key: &[u8; 16], count: u32, bearer: u8, direction: u8, data: &[u8]) -> [u8; 4] {
    let iv = build_iv(count, bearer, direction);
    let mut zuc = ZUC128::new(key, &iv);

    let length = data.len() * 8;
    let l = length.div_ceil(32);
    let keystream: Vec<u32> = (0..l + 2).map(|_| zuc.generate()).collect();

    let mut t: u32 = 0;
    for i in 0..length {
        if (data[i / 8] >> (7 - (i % 8))) & 1 == 1 {
            t ^= keystream_word(&keystream, i);
        }
    }
    t ^= keystream_word(&keystream, length);

    (t ^ keystream[l + 1]).to_be_bytes()
}
