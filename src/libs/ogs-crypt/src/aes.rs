//! AES-128 counter mode
//!
//! Block encryption comes from the `aes` crate; the counter handling is done
//! here so the 128-bit big-endian increment matches 128-NEA2
//! (3GPP TS 33.401 Annex B.1.3).

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;

/// AES block size in bytes
pub const AES_BLOCK_SIZE: usize = 16;

/// Increment a 128-bit counter (big-endian)
#[inline]
fn ctr128_inc(counter: &mut [u8; 16]) {
    let mut c: u16 = 1;
    for byte in counter.iter_mut().rev() {
        c += *byte as u16;
        *byte = c as u8;
        c >>= 8;
        if c == 0 {
            break;
        }
    }
}

/// XOR `data` in place with the AES-128-CTR keystream starting at `ivec`.
///
/// CTR is symmetric, so the same call encrypts and decrypts. `ivec` is
/// advanced past every block consumed.
pub fn aes_ctr128_apply(key: &[u8; 16], ivec: &mut [u8; 16], data: &mut [u8]) {
    if data.is_empty() {
        return;
    }

    let cipher = Aes128::new(GenericArray::from_slice(key));

    for chunk in data.chunks_mut(AES_BLOCK_SIZE) {
        let mut block = GenericArray::clone_from_slice(ivec);
        cipher.encrypt_block(&mut block);
        ctr128_inc(ivec);

        for (byte, ks) in chunk.iter_mut().zip(block.iter()) {
            *byte ^= ks;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aes_ctr128_nist_sp800_38a() {
        // NIST SP 800-38A F.5.1 CTR-AES128.Encrypt, first two blocks
        let key = [
            0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6,
            0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf, 0x4f, 0x3c,
        ];
        let mut ivec = [
            0xf0, 0xf1, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7,
            0xf8, 0xf9, 0xfa, 0xfb, 0xfc, 0xfd, 0xfe, 0xff,
        ];
        let mut data = [
            0x6b, 0xc1, 0xbe, 0xe2, 0x2e, 0x40, 0x9f, 0x96,
            0xe9, 0x3d, 0x7e, 0x11, 0x73, 0x93, 0x17, 0x2a,
            0xae, 0x2d, 0x8a, 0x57, 0x1e, 0x03, 0xac, 0x9c,
            0x9e, 0xb7, 0x6f, 0xac, 0x45, 0xaf, 0x8e, 0x51,
        ];
        let expected = [
            0x87, 0x4d, 0x61, 0x91, 0xb6, 0x20, 0xe3, 0x26,
            0x1b, 0xef, 0x68, 0x64, 0x99, 0x0d, 0xb6, 0xce,
            0x98, 0x06, 0xf6, 0x6b, 0x79, 0x70, 0xfd, 0xff,
            0x86, 0x17, 0x10, 0x2b, 0x41, 0x17, 0x94, 0xef,
        ];

        aes_ctr128_apply(&key, &mut ivec, &mut data);
        assert_eq!(data, expected);
        // counter advanced by two blocks
        assert_eq!(ivec[15], 0x01);
        assert_eq!(ivec[14], 0x00);
    }

    #[test]
    fn test_aes_ctr128_partial_block_roundtrip() {
        let key = [0x11u8; 16];
        let iv = [0x22u8; 16];
        let plaintext = b"Hello, World! This is a test of AES-CTR mode.";

        let mut data = plaintext.to_vec();
        aes_ctr128_apply(&key, &mut iv.clone(), &mut data);
        assert_ne!(&data[..], &plaintext[..]);

        aes_ctr128_apply(&key, &mut iv.clone(), &mut data);
        assert_eq!(&data[..], &plaintext[..]);
    }

    #[test]
    fn test_ctr128_inc() {
        let mut counter = [0u8; 16];
        counter[15] = 0xff;
        ctr128_inc(&mut counter);
        assert_eq!(counter[15], 0x00);
        assert_eq!(counter[14], 0x01);

        let mut counter2 = [0xffu8; 16];
        ctr128_inc(&mut counter2);
        assert_eq!(counter2, [0u8; 16]);
    }
}
