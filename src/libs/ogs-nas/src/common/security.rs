//! NAS security (3GPP TS 33.501 / TS 24.501 clause 4.4)
//!
//! Integrity protection and ciphering of 5GMM messages with a per-UE
//! [`SecurityContext`]. The building blocks [`protect`] and [`unprotect`]
//! work for either end of the link; [`encode`] and [`decode`] are the
//! AMF-side entry points (downlink out, uplink in).
//!
//! The protected form is the 7-octet security header followed by the
//! (possibly ciphered) plain message:
//!
//! ```text
//! +-----+-----+-----------------+-----+----------------------+
//! | EPD | SHT |   MAC (4 oct)   | SQN | plain NAS message    |
//! +-----+-----+-----------------+-----+----------------------+
//!                                 \____ MAC input ___________/
//! ```

use bytes::{Buf, Bytes, BytesMut};
use ogs_crypt::{nea1, nea2, nea3, nia1, nia2, nia3, MAC_SIZE};

use crate::common::types::{ProtocolDiscriminator, SecurityAlgorithms, SecurityHeaderType};
use crate::error::{NasError, NasResult};
use crate::fiveg::header::{FiveGsNasSecurityHeader, FIVEG_NAS_SECURITY_HEADER_LEN};
use crate::fiveg::message::NasMessage;

/// BEARER input of the NAS algorithms (3GPP access)
pub const NAS_BEARER: u8 = 1;

/// Offset of the sequence number inside a protected message
const SQN_OFFSET: usize = FIVEG_NAS_SECURITY_HEADER_LEN - 1;

/// DIRECTION input of the NAS algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    Uplink = 0,
    Downlink = 1,
}

/// Which end of the NAS link a context belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// AMF: sends downlink, receives uplink
    Network,
    /// UE: sends uplink, receives downlink
    Ue,
}

impl Role {
    fn tx_direction(self) -> Direction {
        match self {
            Role::Network => Direction::Downlink,
            Role::Ue => Direction::Uplink,
        }
    }

    fn rx_direction(self) -> Direction {
        match self {
            Role::Network => Direction::Uplink,
            Role::Ue => Direction::Downlink,
        }
    }
}

// ============================================================================
// NAS COUNT
// ============================================================================

/// 24-bit NAS COUNT: 16-bit overflow counter and 8-bit sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NasCount {
    pub overflow: u16,
    pub sqn: u8,
}

impl NasCount {
    pub const MASK: u32 = 0x00ff_ffff;

    pub fn new(overflow: u16, sqn: u8) -> Self {
        Self { overflow, sqn }
    }

    /// Build from a COUNT value, keeping the low 24 bits
    pub fn from_value(value: u32) -> Self {
        let value = value & Self::MASK;
        Self {
            overflow: (value >> 8) as u16,
            sqn: value as u8,
        }
    }

    /// `(overflow << 8) | sqn`
    pub fn value(&self) -> u32 {
        ((self.overflow as u32) << 8) | self.sqn as u32
    }

    /// Advance by one, wrapping at 2^24
    pub fn increment(&mut self) {
        *self = Self::from_value(self.value().wrapping_add(1));
    }

    /// Record a received sequence number.
    ///
    /// A number lower than the last one seen means the sender's SQN
    /// wrapped, so the overflow counter moves up by one. Returns `true`
    /// when that happened.
    pub fn update_sqn(&mut self, sqn: u8) -> bool {
        let wrapped = sqn < self.sqn;
        if wrapped {
            self.overflow = self.overflow.wrapping_add(1);
        }
        self.sqn = sqn;
        wrapped
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// Security context
// ============================================================================

/// Per-UE NAS security state
///
/// Not synchronized. Every message of one UE is routed to the same
/// scheduler worker, so the counters here are only ever touched from that
/// worker, one message at a time. Sharing a context across workers breaks
/// the counter bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct SecurityContext {
    pub security_context_available: bool,
    /// Selected NIA (0..=3)
    pub integrity_algorithm: u8,
    /// Selected NEA (0..=3)
    pub ciphering_algorithm: u8,
    pub knas_int: [u8; 16],
    pub knas_enc: [u8; 16],
    pub dl_count: NasCount,
    pub ul_count: NasCount,
    /// Sticky: set by the first failed uplink MAC check
    pub mac_failed: bool,
}

impl SecurityContext {
    /// A freshly established context with zeroed counters
    pub fn new(
        integrity_algorithm: u8,
        ciphering_algorithm: u8,
        knas_int: [u8; 16],
        knas_enc: [u8; 16],
    ) -> Self {
        Self {
            security_context_available: true,
            integrity_algorithm,
            ciphering_algorithm,
            knas_int,
            knas_enc,
            ..Default::default()
        }
    }

    pub fn reset_counts(&mut self) {
        self.dl_count.reset();
        self.ul_count.reset();
    }

    /// Reject unknown identifiers and NIA0 combined with a real cipher
    pub fn check_algorithms(&self) -> NasResult<()> {
        if self.integrity_algorithm > SecurityAlgorithms::INTEGRITY_128_NIA3 {
            return Err(NasError::UnsupportedIntegrityAlgorithm(self.integrity_algorithm));
        }
        if self.ciphering_algorithm > SecurityAlgorithms::CIPHERING_128_NEA3 {
            return Err(NasError::UnsupportedCipheringAlgorithm(self.ciphering_algorithm));
        }
        if self.integrity_algorithm == SecurityAlgorithms::INTEGRITY_NONE
            && self.ciphering_algorithm != SecurityAlgorithms::CIPHERING_NONE
        {
            return Err(NasError::NullIntegrityWithCiphering {
                ciphering: self.ciphering_algorithm,
            });
        }
        Ok(())
    }

    fn tx_count(&mut self, role: Role) -> &mut NasCount {
        match role {
            Role::Network => &mut self.dl_count,
            Role::Ue => &mut self.ul_count,
        }
    }

    fn rx_count(&mut self, role: Role) -> &mut NasCount {
        match role {
            Role::Network => &mut self.ul_count,
            Role::Ue => &mut self.dl_count,
        }
    }
}

// ============================================================================
// Algorithm dispatch
// ============================================================================

type MacFn = fn(&[u8; 16], u32, u8, u8, &[u8]) -> [u8; MAC_SIZE];
type CipherFn = fn(&[u8; 16], u32, u8, u8, &mut [u8]);

/// NAS-MAC over `data` with the given NIA. NIA0 yields an all-zero MAC.
pub fn calculate_mac(
    algorithm: u8,
    key: &[u8; 16],
    count: u32,
    direction: Direction,
    data: &[u8],
) -> NasResult<[u8; MAC_SIZE]> {
    let mac: MacFn = match algorithm {
        SecurityAlgorithms::INTEGRITY_NONE => return Ok([0u8; MAC_SIZE]),
        SecurityAlgorithms::INTEGRITY_128_NIA1 => nia1,
        SecurityAlgorithms::INTEGRITY_128_NIA2 => nia2,
        SecurityAlgorithms::INTEGRITY_128_NIA3 => nia3,
        other => return Err(NasError::UnsupportedIntegrityAlgorithm(other)),
    };
    Ok(mac(key, count, NAS_BEARER, direction as u8, data))
}

/// Cipher or decipher `data` in place with the given NEA. NEA0 is a no-op.
pub fn apply_cipher(
    algorithm: u8,
    key: &[u8; 16],
    count: u32,
    direction: Direction,
    data: &mut [u8],
) -> NasResult<()> {
    let cipher: CipherFn = match algorithm {
        SecurityAlgorithms::CIPHERING_NONE => return Ok(()),
        SecurityAlgorithms::CIPHERING_128_NEA1 => nea1,
        SecurityAlgorithms::CIPHERING_128_NEA2 => nea2,
        SecurityAlgorithms::CIPHERING_128_NEA3 => nea3,
        other => return Err(NasError::UnsupportedCipheringAlgorithm(other)),
    };
    cipher(key, count, NAS_BEARER, direction as u8, data);
    Ok(())
}

// ============================================================================
// Protect / unprotect
// ============================================================================

/// Result of removing NAS security from a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unprotected {
    pub security_header_type: SecurityHeaderType,
    /// Deciphered plain NAS message
    pub plain: Bytes,
    pub integrity_verified: bool,
}

/// Wrap a plain NAS message in a security header using the sender's count.
///
/// Ciphering is applied only when `sht` says so. The sender's count
/// advances by one afterwards.
pub fn protect(
    ctx: &mut SecurityContext,
    role: Role,
    sht: SecurityHeaderType,
    plain: &[u8],
) -> NasResult<Bytes> {
    ctx.check_algorithms()?;
    if !sht.is_protected() {
        return Ok(Bytes::copy_from_slice(plain));
    }

    let direction = role.tx_direction();
    let count = *ctx.tx_count(role);

    let mut buf = BytesMut::with_capacity(FIVEG_NAS_SECURITY_HEADER_LEN + plain.len());
    FiveGsNasSecurityHeader {
        security_header_type: sht,
        message_authentication_code: [0u8; MAC_SIZE],
        sequence_number: count.sqn,
    }
    .encode(&mut buf);
    buf.extend_from_slice(plain);

    if sht.is_ciphered() {
        apply_cipher(
            ctx.ciphering_algorithm,
            &ctx.knas_enc,
            count.value(),
            direction,
            &mut buf[FIVEG_NAS_SECURITY_HEADER_LEN..],
        )?;
    }

    let mac = calculate_mac(
        ctx.integrity_algorithm,
        &ctx.knas_int,
        count.value(),
        direction,
        &buf[SQN_OFFSET..],
    )?;
    buf[2..SQN_OFFSET].copy_from_slice(&mac);

    ctx.tx_count(role).increment();
    Ok(buf.freeze())
}

/// Verify and decipher a security protected message using the receiver's
/// count.
///
/// A MAC mismatch is not an error: it clears `integrity_verified`, sets the
/// context's `mac_failed` flag and the message is still deciphered. The
/// receive count is left as it was.
pub fn unprotect(ctx: &mut SecurityContext, role: Role, payload: Bytes) -> NasResult<Unprotected> {
    ctx.check_algorithms()?;

    let mut body = payload.clone();
    let header = FiveGsNasSecurityHeader::decode(&mut body)?;
    let sht = header.security_header_type;

    // The header type is not covered by the MAC, so a new-context header
    // never resets the count here; see `encode` and `reset_counts`. The
    // estimated count is only stored once the MAC checks out.
    let mut estimate = *ctx.rx_count(role);
    let wrapped = estimate.update_sqn(header.sequence_number);
    let count = estimate.value();
    let direction = role.rx_direction();

    // check_algorithms() guarantees NIA0 only ever pairs with NEA0
    let integrity_verified = if ctx.integrity_algorithm == SecurityAlgorithms::INTEGRITY_NONE {
        true
    } else {
        let expected = calculate_mac(
            ctx.integrity_algorithm,
            &ctx.knas_int,
            count,
            direction,
            &payload[SQN_OFFSET..],
        )?;
        if expected != header.message_authentication_code {
            log::warn!(
                "NAS MAC verification failed: expected {:02x?}, got {:02x?} (count 0x{:06x})",
                expected,
                header.message_authentication_code,
                count
            );
            ctx.mac_failed = true;
            false
        } else {
            true
        }
    };
    if integrity_verified {
        if wrapped {
            log::debug!("NAS COUNT overflow now {}", estimate.overflow);
        }
        *ctx.rx_count(role) = estimate;
    }

    let plain = if sht.is_ciphered()
        && ctx.ciphering_algorithm != SecurityAlgorithms::CIPHERING_NONE
    {
        if body.is_empty() {
            return Err(NasError::EmptyPayload);
        }
        let mut buf = BytesMut::from(body.as_ref());
        apply_cipher(ctx.ciphering_algorithm, &ctx.knas_enc, count, direction, &mut buf)?;
        buf.freeze()
    } else {
        body
    };

    Ok(Unprotected {
        security_header_type: sht,
        plain,
        integrity_verified,
    })
}

// ============================================================================
// AMF codec
// ============================================================================

/// A decoded uplink message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    pub message: NasMessage,
    pub security_header_type: SecurityHeaderType,
    pub integrity_verified: bool,
}

/// Security header type of a raw NAS payload. 5GSM messages and anything
/// too short to tell are reported as plain.
pub fn security_header_type_of(payload: &[u8]) -> NasResult<SecurityHeaderType> {
    match payload {
        [epd, sht, ..] if *epd == ProtocolDiscriminator::FiveGsMobilityManagement as u8 => {
            SecurityHeaderType::try_from(*sht)
        }
        _ => Ok(SecurityHeaderType::PlainNas),
    }
}

/// Encode a downlink NAS message.
///
/// Without an established context the plain encoding is returned. With
/// `reset_security_context` both counts restart at zero and the message is
/// sent integrity protected with the new context (not ciphered, as for
/// Security Mode Command); otherwise it is integrity protected and
/// ciphered.
pub fn encode(
    ctx: &mut SecurityContext,
    message: &NasMessage,
    reset_security_context: bool,
) -> NasResult<Bytes> {
    if !ctx.security_context_available {
        return Ok(message.to_bytes());
    }

    if reset_security_context {
        ctx.reset_counts();
    }
    let sht = if reset_security_context {
        SecurityHeaderType::IntegrityProtectedWithNew5gNasSecurityContext
    } else {
        SecurityHeaderType::IntegrityProtectedAndCiphered
    };

    protect(ctx, Role::Network, sht, &message.to_bytes())
}

/// Decode an uplink NAS message.
///
/// `is_initial` marks a message carried in an Initial UE Message; those
/// are never ciphered, so a ciphered security header type there is a
/// decode error.
pub fn decode(
    ctx: &mut SecurityContext,
    payload: Bytes,
    is_initial: bool,
) -> NasResult<DecodedMessage> {
    let sht = security_header_type_of(&payload)?;

    if !sht.is_protected() {
        return Ok(DecodedMessage {
            message: NasMessage::decode(payload)?,
            security_header_type: sht,
            integrity_verified: false,
        });
    }

    if !ctx.security_context_available {
        return decode_without_context(payload, sht);
    }

    if is_initial && sht.is_ciphered() {
        return Err(NasError::DecodingError(
            "ciphered security header in initial NAS message".to_string(),
        ));
    }

    let unprotected = unprotect(ctx, Role::Network, payload)?;
    Ok(DecodedMessage {
        message: NasMessage::decode(unprotected.plain)?,
        security_header_type: unprotected.security_header_type,
        integrity_verified: unprotected.integrity_verified,
    })
}

/// A protected message arrived before any context exists. Integrity cannot
/// be checked; the inner message is readable only if it was not ciphered.
fn decode_without_context(mut payload: Bytes, sht: SecurityHeaderType) -> NasResult<DecodedMessage> {
    if sht.is_ciphered() {
        return Err(NasError::DecodingError(
            "ciphered NAS message without security context".to_string(),
        ));
    }
    FiveGsNasSecurityHeader::decode(&mut payload)?;
    if !payload.has_remaining() {
        return Err(NasError::EmptyPayload);
    }
    Ok(DecodedMessage {
        message: NasMessage::decode(payload)?,
        security_header_type: sht,
        integrity_verified: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiveg::header::FiveGmmMessageType;

    const KNAS_INT: [u8; 16] = [
        0x2b, 0xd6, 0x45, 0x9f, 0x82, 0xc5, 0xb3, 0x00,
        0x95, 0x2c, 0x49, 0x10, 0x48, 0x81, 0xff, 0x48,
    ];
    const KNAS_ENC: [u8; 16] = [
        0xd3, 0xc5, 0xd5, 0x92, 0x32, 0x7f, 0xb1, 0x1c,
        0x40, 0x35, 0xc6, 0x68, 0x0a, 0xf8, 0xc6, 0xd1,
    ];

    fn pair(integrity: u8, ciphering: u8) -> (SecurityContext, SecurityContext) {
        let ctx = SecurityContext::new(integrity, ciphering, KNAS_INT, KNAS_ENC);
        (ctx.clone(), ctx)
    }

    fn registration_complete() -> NasMessage {
        NasMessage::gmm(
            FiveGmmMessageType::RegistrationComplete,
            Bytes::from_static(&[0x73, 0x00, 0x04, 0xde, 0xad, 0xbe, 0xef]),
        )
    }

    fn ue_send(ue: &mut SecurityContext, msg: &NasMessage) -> Bytes {
        protect(ue, Role::Ue, SecurityHeaderType::IntegrityProtectedAndCiphered, &msg.to_bytes())
            .unwrap()
    }

    #[test]
    fn test_nas_count_value_and_increment() {
        let mut count = NasCount::new(0x0102, 0xff);
        assert_eq!(count.value(), 0x0102ff);
        count.increment();
        assert_eq!(count, NasCount::new(0x0103, 0x00));

        let mut max = NasCount::from_value(0x00ff_ffff);
        max.increment();
        assert_eq!(max.value(), 0);
        assert_eq!(NasCount::from_value(0x1234_5678).value(), 0x34_5678);
    }

    #[test]
    fn test_nas_count_update_sqn() {
        let mut count = NasCount::new(0, 10);
        assert!(!count.update_sqn(10));
        assert!(!count.update_sqn(11));
        assert_eq!(count, NasCount::new(0, 11));
        assert!(count.update_sqn(3));
        assert_eq!(count, NasCount::new(1, 3));
    }

    #[test]
    fn test_downlink_roundtrip_all_algorithms() {
        for integrity in 1..=3u8 {
            for ciphering in 0..=3u8 {
                let (mut amf, mut ue) = pair(integrity, ciphering);
                let msg = registration_complete();

                for _ in 0..3 {
                    let protected = encode(&mut amf, &msg, false).unwrap();
                    let out = unprotect(&mut ue, Role::Ue, protected).unwrap();
                    assert!(out.integrity_verified, "NIA{} NEA{}", integrity, ciphering);
                    assert_eq!(NasMessage::decode(out.plain).unwrap(), msg);
                }
                assert_eq!(amf.dl_count.value(), 3);
                assert_eq!(ue.dl_count.sqn, 2);
            }
        }
    }

    #[test]
    fn test_uplink_roundtrip_all_algorithms() {
        for integrity in 1..=3u8 {
            for ciphering in 0..=3u8 {
                let (mut amf, mut ue) = pair(integrity, ciphering);
                let msg = registration_complete();

                for _ in 0..3 {
                    let decoded = decode(&mut amf, ue_send(&mut ue, &msg), false).unwrap();
                    assert!(decoded.integrity_verified);
                    assert_eq!(decoded.message, msg);
                }
                assert!(!amf.mac_failed);
                assert_eq!(amf.ul_count, NasCount::new(0, 2));
            }
        }
    }

    #[test]
    fn test_protected_wire_layout() {
        let (mut amf, _) = pair(2, 2);
        amf.dl_count = NasCount::new(0, 0x21);
        let msg = registration_complete();
        let bytes = encode(&mut amf, &msg, false).unwrap();

        assert_eq!(bytes.len(), FIVEG_NAS_SECURITY_HEADER_LEN + msg.encoded_len());
        assert_eq!(bytes[0], 0x7e);
        assert_eq!(bytes[1], SecurityHeaderType::IntegrityProtectedAndCiphered as u8);
        assert_eq!(bytes[6], 0x21);
        // ciphered
        assert_ne!(&bytes[7..], msg.to_bytes().as_ref());

        let mac = nia2(&KNAS_INT, 0x21, NAS_BEARER, Direction::Downlink as u8, &bytes[6..]);
        assert_eq!(&bytes[2..6], &mac);
    }

    #[test]
    fn test_reset_zeroes_counts_and_skips_ciphering() {
        let (mut amf, _) = pair(2, 2);
        amf.dl_count = NasCount::new(7, 7);
        amf.ul_count = NasCount::new(3, 3);
        let msg = NasMessage::gmm(FiveGmmMessageType::SecurityModeCommand, vec![0x22, 0x01]);

        let bytes = encode(&mut amf, &msg, true).unwrap();
        assert_eq!(
            bytes[1],
            SecurityHeaderType::IntegrityProtectedWithNew5gNasSecurityContext as u8
        );
        assert_eq!(bytes[6], 0);
        assert_eq!(&bytes[7..], msg.to_bytes().as_ref());
        assert_eq!(amf.dl_count.value(), 1);
        assert_eq!(amf.ul_count, NasCount::default());
    }

    #[test]
    fn test_uplink_sqn_wrap_increments_overflow_once() {
        let (mut amf, mut ue) = pair(2, 2);
        amf.ul_count = NasCount::new(0, 0xff);
        ue.ul_count = NasCount::new(1, 0x00);

        let decoded = decode(&mut amf, ue_send(&mut ue, &registration_complete()), false).unwrap();
        assert_eq!(amf.ul_count, NasCount::new(1, 0x00));
        // MAC was computed over COUNT 0x000100
        assert!(decoded.integrity_verified);
        assert_eq!(decoded.message, registration_complete());

        // next message does not wrap again
        decode(&mut amf, ue_send(&mut ue, &registration_complete()), false).unwrap();
        assert_eq!(amf.ul_count, NasCount::new(1, 0x01));
    }

    #[test]
    fn test_missed_wrap_fails_integrity() {
        let (mut amf, mut ue) = pair(2, 0);
        // the UE is a full overflow period ahead of what the AMF can detect
        ue.ul_count = NasCount::new(1, 5);
        let decoded = decode(&mut amf, ue_send(&mut ue, &registration_complete()), false).unwrap();
        assert!(!decoded.integrity_verified);
        assert!(amf.mac_failed);
    }

    #[test]
    fn test_mac_tamper_sets_flag_but_decodes() {
        for integrity in 1..=3u8 {
            let (mut amf, mut ue) = pair(integrity, 2);
            let mut bytes = BytesMut::from(ue_send(&mut ue, &registration_complete()).as_ref());
            bytes[3] ^= 0x10;

            let decoded = decode(&mut amf, bytes.freeze(), false).unwrap();
            assert!(!decoded.integrity_verified);
            assert!(amf.mac_failed);
            assert_eq!(decoded.message, registration_complete());
        }
    }

    #[test]
    fn test_new_context_header_does_not_reset_uplink_count() {
        for sht in [
            SecurityHeaderType::IntegrityProtectedWithNew5gNasSecurityContext,
            SecurityHeaderType::IntegrityProtectedAndCipheredWithNew5gNasSecurityContext,
        ] {
            let (mut amf, mut ue) = pair(2, 2);
            amf.ul_count = NasCount::new(1, 5);
            ue.ul_count = NasCount::new(1, 6);

            // SQN 0 would also look like a wrap to the receiver
            let mut forged = vec![0x7e, sht as u8, 0xde, 0xad, 0xbe, 0xef, 0x00];
            forged.extend_from_slice(&registration_complete().to_bytes());
            let out = unprotect(&mut amf, Role::Network, Bytes::from(forged)).unwrap();
            assert!(!out.integrity_verified);
            assert!(amf.mac_failed);
            assert_eq!(amf.ul_count, NasCount::new(1, 5));

            let next = decode(&mut amf, ue_send(&mut ue, &registration_complete()), false).unwrap();
            assert!(next.integrity_verified);
            assert_eq!(next.message, registration_complete());
            assert_eq!(amf.ul_count, NasCount::new(1, 6));
        }
    }

    #[test]
    fn test_bad_mac_does_not_advance_count() {
        let (mut amf, mut ue) = pair(1, 0);
        let mut bad = BytesMut::from(ue_send(&mut ue, &registration_complete()).as_ref());
        bad[5] ^= 0x80;
        let decoded = decode(&mut amf, bad.freeze(), false).unwrap();
        assert!(!decoded.integrity_verified);
        assert_eq!(amf.ul_count, NasCount::default());

        decode(&mut amf, ue_send(&mut ue, &registration_complete()), false).unwrap();
        assert_eq!(amf.ul_count, NasCount::new(0, 1));
    }

    #[test]
    fn test_mac_failed_is_sticky() {
        let (mut amf, mut ue) = pair(2, 2);
        let mut bad = BytesMut::from(ue_send(&mut ue, &registration_complete()).as_ref());
        bad[2] ^= 1;
        decode(&mut amf, bad.freeze(), false).unwrap();

        let good = decode(&mut amf, ue_send(&mut ue, &registration_complete()), false).unwrap();
        assert!(good.integrity_verified);
        assert!(amf.mac_failed);
    }

    #[test]
    fn test_null_algorithms_trivially_verified() {
        let (mut amf, mut ue) = pair(0, 0);
        let msg = registration_complete();

        let down = encode(&mut amf, &msg, false).unwrap();
        assert_eq!(&down[2..6], &[0, 0, 0, 0]);
        assert_eq!(&down[7..], msg.to_bytes().as_ref());

        let decoded = decode(&mut amf, ue_send(&mut ue, &msg), false).unwrap();
        assert!(decoded.integrity_verified);
        assert!(!amf.mac_failed);
    }

    #[test]
    fn test_null_integrity_with_ciphering_is_error() {
        let (mut amf, mut ue) = pair(0, 2);
        assert_eq!(
            encode(&mut amf, &registration_complete(), false),
            Err(NasError::NullIntegrityWithCiphering { ciphering: 2 })
        );
        let payload = Bytes::from_static(&[0x7e, 0x02, 0, 0, 0, 0, 0, 0x7e, 0x00, 0x43]);
        assert!(matches!(
            decode(&mut amf, payload, false),
            Err(NasError::NullIntegrityWithCiphering { .. })
        ));
        assert!(protect(
            &mut ue,
            Role::Ue,
            SecurityHeaderType::IntegrityProtected,
            &[0x7e, 0x00, 0x43]
        )
        .is_err());
    }

    #[test]
    fn test_unknown_algorithm_is_error() {
        let (mut amf, _) = pair(5, 0);
        assert_eq!(
            encode(&mut amf, &registration_complete(), false),
            Err(NasError::UnsupportedIntegrityAlgorithm(5))
        );

        let (mut amf, _) = pair(2, 9);
        assert_eq!(
            encode(&mut amf, &registration_complete(), false),
            Err(NasError::UnsupportedCipheringAlgorithm(9))
        );
        assert!(calculate_mac(4, &KNAS_INT, 0, Direction::Uplink, &[]).is_err());
        assert!(apply_cipher(4, &KNAS_ENC, 0, Direction::Uplink, &mut []).is_err());
    }

    #[test]
    fn test_direction_matters() {
        let (mut amf, _) = pair(2, 0);
        // a downlink message fed back as uplink must not verify
        let down = encode(&mut amf, &registration_complete(), false).unwrap();
        let decoded = decode(&mut amf, down, false).unwrap();
        assert!(!decoded.integrity_verified);
    }

    #[test]
    fn test_no_context_plain_passthrough() {
        let mut ctx = SecurityContext::default();
        let msg = registration_complete();

        assert_eq!(encode(&mut ctx, &msg, true).unwrap(), msg.to_bytes());
        let decoded = decode(&mut ctx, msg.to_bytes(), true).unwrap();
        assert_eq!(decoded.message, msg);
        assert!(!decoded.integrity_verified);
        assert_eq!(ctx.ul_count, NasCount::default());
    }

    #[test]
    fn test_no_context_integrity_only_is_unwrapped() {
        let (_, mut ue) = pair(2, 2);
        let msg = registration_complete();
        let bytes = protect(
            &mut ue,
            Role::Ue,
            SecurityHeaderType::IntegrityProtected,
            &msg.to_bytes(),
        )
        .unwrap();

        let mut amf = SecurityContext::default();
        let decoded = decode(&mut amf, bytes, true).unwrap();
        assert_eq!(decoded.message, msg);
        assert!(!decoded.integrity_verified);
        assert_eq!(decoded.security_header_type, SecurityHeaderType::IntegrityProtected);
    }

    #[test]
    fn test_no_context_ciphered_is_error() {
        let (_, mut ue) = pair(2, 2);
        let bytes = ue_send(&mut ue, &registration_complete());
        let mut amf = SecurityContext::default();
        assert!(matches!(
            decode(&mut amf, bytes, false),
            Err(NasError::DecodingError(_))
        ));
    }

    #[test]
    fn test_initial_message_must_not_be_ciphered() {
        let (mut amf, mut ue) = pair(2, 2);
        let bytes = ue_send(&mut ue, &registration_complete());
        assert!(decode(&mut amf, bytes, true).is_err());

        let integrity_only = protect(
            &mut ue,
            Role::Ue,
            SecurityHeaderType::IntegrityProtected,
            &registration_complete().to_bytes(),
        )
        .unwrap();
        // UE count 1, AMF has seen nothing yet
        let decoded = decode(&mut amf, integrity_only, true).unwrap();
        assert!(decoded.integrity_verified);
    }

    #[test]
    fn test_plain_message_with_context() {
        let (mut amf, _) = pair(2, 2);
        let sm = NasMessage::gsm(
            1,
            1,
            crate::fiveg::header::FiveGsmMessageType::PduSessionReleaseRequest,
            vec![0x59],
        );
        let decoded = decode(&mut amf, sm.to_bytes(), false).unwrap();
        assert_eq!(decoded.message, sm);
        assert!(!decoded.integrity_verified);
    }

    #[test]
    fn test_downlink_count_wraps_at_24_bits() {
        let (mut amf, mut ue) = pair(3, 3);
        amf.dl_count = NasCount::from_value(0x00ff_ffff);
        ue.dl_count = NasCount::new(0xffff, 0xfe);

        let bytes = encode(&mut amf, &registration_complete(), false).unwrap();
        assert_eq!(bytes[6], 0xff);
        assert_eq!(amf.dl_count.value(), 0);
        assert!(unprotect(&mut ue, Role::Ue, bytes).unwrap().integrity_verified);
    }

    #[test]
    fn test_short_protected_payload() {
        let (mut amf, _) = pair(2, 2);
        let payload = Bytes::from_static(&[0x7e, 0x02, 0, 0]);
        assert!(matches!(
            decode(&mut amf, payload, false),
            Err(NasError::BufferTooShort { .. })
        ));

        let header_only = Bytes::from_static(&[0x7e, 0x02, 0, 0, 0, 0, 0]);
        assert_eq!(decode(&mut amf, header_only, false), Err(NasError::EmptyPayload));
    }
}
