//! Common NAS types
//!
//! Based on 3GPP TS 24.501

use bytes::{Buf, BufMut, Bytes, BytesMut};
use crate::error::{NasError, NasResult};

/// Extended protocol discriminator values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProtocolDiscriminator {
    /// 5GS Mobility Management (5GMM)
    FiveGsMobilityManagement = 0x7e,
    /// 5GS Session Management (5GSM)
    FiveGsSessionManagement = 0x2e,
}

impl TryFrom<u8> for ProtocolDiscriminator {
    type Error = NasError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x7e => Ok(Self::FiveGsMobilityManagement),
            0x2e => Ok(Self::FiveGsSessionManagement),
            _ => Err(NasError::InvalidProtocolDiscriminator(value)),
        }
    }
}

/// Security header type (half octet)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SecurityHeaderType {
    /// Plain NAS message, not security protected
    #[default]
    PlainNas = 0,
    /// Integrity protected
    IntegrityProtected = 1,
    /// Integrity protected and ciphered
    IntegrityProtectedAndCiphered = 2,
    /// Integrity protected with new 5G NAS security context
    IntegrityProtectedWithNew5gNasSecurityContext = 3,
    /// Integrity protected and ciphered with new 5G NAS security context
    IntegrityProtectedAndCipheredWithNew5gNasSecurityContext = 4,
}

impl SecurityHeaderType {
    pub fn is_protected(self) -> bool {
        self != SecurityHeaderType::PlainNas
    }

    pub fn is_ciphered(self) -> bool {
        matches!(
            self,
            SecurityHeaderType::IntegrityProtectedAndCiphered
                | SecurityHeaderType::IntegrityProtectedAndCipheredWithNew5gNasSecurityContext
        )
    }

    /// Header types that activate a new security context (counters restart at zero)
    pub fn is_new_context(self) -> bool {
        matches!(
            self,
            SecurityHeaderType::IntegrityProtectedWithNew5gNasSecurityContext
                | SecurityHeaderType::IntegrityProtectedAndCipheredWithNew5gNasSecurityContext
        )
    }
}

impl TryFrom<u8> for SecurityHeaderType {
    type Error = NasError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value & 0x0f {
            0 => Ok(Self::PlainNas),
            1 => Ok(Self::IntegrityProtected),
            2 => Ok(Self::IntegrityProtectedAndCiphered),
            3 => Ok(Self::IntegrityProtectedWithNew5gNasSecurityContext),
            4 => Ok(Self::IntegrityProtectedAndCipheredWithNew5gNasSecurityContext),
            other => Err(NasError::InvalidSecurityHeaderType(other)),
        }
    }
}

/// NAS security algorithms IE (selected ciphering / integrity pair)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SecurityAlgorithms {
    /// Ciphering algorithm (NEA)
    pub ciphering: u8,
    /// Integrity algorithm (NIA)
    pub integrity: u8,
}

impl SecurityAlgorithms {
    /// NEA0
    pub const CIPHERING_NONE: u8 = 0;
    /// 128-NEA1 (SNOW 3G)
    pub const CIPHERING_128_NEA1: u8 = 1;
    /// 128-NEA2 (AES)
    pub const CIPHERING_128_NEA2: u8 = 2;
    /// 128-NEA3 (ZUC)
    pub const CIPHERING_128_NEA3: u8 = 3;

    /// NIA0
    pub const INTEGRITY_NONE: u8 = 0;
    /// 128-NIA1 (SNOW 3G)
    pub const INTEGRITY_128_NIA1: u8 = 1;
    /// 128-NIA2 (AES)
    pub const INTEGRITY_128_NIA2: u8 = 2;
    /// 128-NIA3 (ZUC)
    pub const INTEGRITY_128_NIA3: u8 = 3;

    pub fn new(ciphering: u8, integrity: u8) -> Self {
        Self {
            ciphering: ciphering & 0x0f,
            integrity: integrity & 0x0f,
        }
    }

    /// Encode to a single byte (ciphering in the high nibble)
    pub fn encode(&self) -> u8 {
        ((self.ciphering & 0x0f) << 4) | (self.integrity & 0x0f)
    }

    pub fn decode(byte: u8) -> Self {
        Self {
            ciphering: (byte >> 4) & 0x0f,
            integrity: byte & 0x0f,
        }
    }
}

/// UE security capability IE, 5GS part
///
/// Bit 8 of each octet is algorithm 0 (NEA0 / NIA0), bit 1 is algorithm 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UeSecurityCapability {
    /// 5GS encryption algorithms (NEA0-NEA7)
    pub ea: u8,
    /// 5GS integrity algorithms (NIA0-NIA7)
    pub ia: u8,
}

impl UeSecurityCapability {
    pub fn new(ea: u8, ia: u8) -> Self {
        Self { ea, ia }
    }

    fn bit(algorithm: u8) -> u8 {
        if algorithm > 7 {
            0
        } else {
            0x80 >> algorithm
        }
    }

    pub fn supports_nea(&self, algorithm: u8) -> bool {
        self.ea & Self::bit(algorithm) != 0
    }

    pub fn supports_nia(&self, algorithm: u8) -> bool {
        self.ia & Self::bit(algorithm) != 0
    }

    /// Encode as LV
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(2);
        buf.put_u8(self.ea);
        buf.put_u8(self.ia);
    }

    /// Decode from LV; EPS octets after the first two are skipped
    pub fn decode(buf: &mut Bytes) -> NasResult<Self> {
        if buf.remaining() < 3 {
            return Err(NasError::BufferTooShort { expected: 3, actual: buf.remaining() });
        }
        let length = buf.get_u8() as usize;
        if length < 2 || buf.remaining() < length {
            return Err(NasError::BufferTooShort {
                expected: length.max(2),
                actual: buf.remaining(),
            });
        }
        let ea = buf.get_u8();
        let ia = buf.get_u8();
        buf.advance(length - 2);
        Ok(Self { ea, ia })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_discriminator() {
        assert_eq!(
            ProtocolDiscriminator::try_from(0x7e).unwrap(),
            ProtocolDiscriminator::FiveGsMobilityManagement
        );
        assert_eq!(
            ProtocolDiscriminator::try_from(0x2e).unwrap(),
            ProtocolDiscriminator::FiveGsSessionManagement
        );
        assert!(ProtocolDiscriminator::try_from(0x07).is_err());
    }

    #[test]
    fn test_security_header_type_flags() {
        use SecurityHeaderType::*;
        assert!(!PlainNas.is_protected());
        assert!(IntegrityProtected.is_protected());
        assert!(!IntegrityProtected.is_ciphered());
        assert!(IntegrityProtectedAndCiphered.is_ciphered());
        assert!(IntegrityProtectedWithNew5gNasSecurityContext.is_new_context());
        assert!(!IntegrityProtectedWithNew5gNasSecurityContext.is_ciphered());
        assert!(IntegrityProtectedAndCipheredWithNew5gNasSecurityContext.is_ciphered());
        assert!(IntegrityProtectedAndCipheredWithNew5gNasSecurityContext.is_new_context());
    }

    #[test]
    fn test_security_header_type_ignores_spare_half() {
        assert_eq!(
            SecurityHeaderType::try_from(0xf2).unwrap(),
            SecurityHeaderType::IntegrityProtectedAndCiphered
        );
        assert!(matches!(
            SecurityHeaderType::try_from(5),
            Err(NasError::InvalidSecurityHeaderType(5))
        ));
    }

    #[test]
    fn test_security_algorithms_byte() {
        let algs = SecurityAlgorithms::new(
            SecurityAlgorithms::CIPHERING_128_NEA2,
            SecurityAlgorithms::INTEGRITY_128_NIA1,
        );
        assert_eq!(algs.encode(), 0x21);
        assert_eq!(SecurityAlgorithms::decode(0x21), algs);
    }

    #[test]
    fn test_ue_security_capability_bits() {
        // NEA0, NEA1, NEA2 and NIA1, NIA2
        let cap = UeSecurityCapability::new(0xe0, 0x60);
        assert!(cap.supports_nea(0));
        assert!(cap.supports_nea(2));
        assert!(!cap.supports_nea(3));
        assert!(!cap.supports_nia(0));
        assert!(cap.supports_nia(1));
        assert!(!cap.supports_nia(9));
    }

    #[test]
    fn test_ue_security_capability_decode_skips_eps() {
        let mut buf = Bytes::from_static(&[4, 0xf0, 0x70, 0xf0, 0x70, 0xaa]);
        let cap = UeSecurityCapability::decode(&mut buf).unwrap();
        assert_eq!(cap, UeSecurityCapability::new(0xf0, 0x70));
        assert_eq!(buf.as_ref(), &[0xaa]);

        let mut out = BytesMut::new();
        cap.encode(&mut out);
        assert_eq!(out.as_ref(), &[2, 0xf0, 0x70]);
    }

    #[test]
    fn test_ue_security_capability_truncated() {
        let mut buf = Bytes::from_static(&[4, 0xf0, 0x70]);
        assert!(UeSecurityCapability::decode(&mut buf).is_err());
    }
}
