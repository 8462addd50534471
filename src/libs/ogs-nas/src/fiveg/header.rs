//! 5GS NAS message headers
//!
//! Based on 3GPP TS 24.501 clause 9.1

use bytes::{Buf, BufMut, Bytes, BytesMut};
use crate::error::{NasError, NasResult};
use crate::common::types::{ProtocolDiscriminator, SecurityHeaderType};

/// Plain 5GMM header length (EPD, security header type, message type)
pub const FIVEG_MM_HEADER_LEN: usize = 3;

/// Plain 5GSM header length (EPD, PDU session id, PTI, message type)
pub const FIVEG_SM_HEADER_LEN: usize = 4;

/// Security protected 5GMM header length (EPD, SHT, MAC, SQN)
pub const FIVEG_NAS_SECURITY_HEADER_LEN: usize = 7;

fn ensure_len(buf: &Bytes, expected: usize) -> NasResult<()> {
    if buf.remaining() < expected {
        return Err(NasError::BufferTooShort { expected, actual: buf.remaining() });
    }
    Ok(())
}

macro_rules! message_types {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident = $value:literal,)+ }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum $name {
            $($variant = $value,)+
        }

        impl $name {
            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant),)+
                }
            }
        }

        impl TryFrom<u8> for $name {
            type Error = NasError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok(Self::$variant),)+
                    _ => Err(NasError::InvalidMessageType(value)),
                }
            }
        }
    };
}

message_types! {
    /// 5GMM message types
    FiveGmmMessageType {
        RegistrationRequest = 0x41,
        RegistrationAccept = 0x42,
        RegistrationComplete = 0x43,
        RegistrationReject = 0x44,
        DeregistrationRequestFromUe = 0x45,
        DeregistrationAcceptFromUe = 0x46,
        DeregistrationRequestToUe = 0x47,
        DeregistrationAcceptToUe = 0x48,
        ServiceRequest = 0x4c,
        ServiceReject = 0x4d,
        ServiceAccept = 0x4e,
        ControlPlaneServiceRequest = 0x4f,
        ConfigurationUpdateCommand = 0x54,
        ConfigurationUpdateComplete = 0x55,
        AuthenticationRequest = 0x56,
        AuthenticationResponse = 0x57,
        AuthenticationReject = 0x58,
        AuthenticationFailure = 0x59,
        AuthenticationResult = 0x5a,
        IdentityRequest = 0x5b,
        IdentityResponse = 0x5c,
        SecurityModeCommand = 0x5d,
        SecurityModeComplete = 0x5e,
        SecurityModeReject = 0x5f,
        FiveGmmStatus = 0x64,
        Notification = 0x65,
        NotificationResponse = 0x66,
        UlNasTransport = 0x67,
        DlNasTransport = 0x68,
    }
}

message_types! {
    /// 5GSM message types
    FiveGsmMessageType {
        PduSessionEstablishmentRequest = 0xc1,
        PduSessionEstablishmentAccept = 0xc2,
        PduSessionEstablishmentReject = 0xc3,
        PduSessionAuthenticationCommand = 0xc5,
        PduSessionAuthenticationComplete = 0xc6,
        PduSessionAuthenticationResult = 0xc7,
        PduSessionModificationRequest = 0xc9,
        PduSessionModificationReject = 0xca,
        PduSessionModificationCommand = 0xcb,
        PduSessionModificationComplete = 0xcc,
        PduSessionModificationCommandReject = 0xcd,
        PduSessionReleaseRequest = 0xd1,
        PduSessionReleaseReject = 0xd2,
        PduSessionReleaseCommand = 0xd3,
        PduSessionReleaseComplete = 0xd4,
        FiveGsmStatus = 0xd6,
    }
}

/// Plain 5GMM header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiveGmmHeader {
    pub security_header_type: SecurityHeaderType,
    pub message_type: u8,
}

impl FiveGmmHeader {
    pub fn new(message_type: FiveGmmMessageType) -> Self {
        Self {
            security_header_type: SecurityHeaderType::PlainNas,
            message_type: message_type as u8,
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(ProtocolDiscriminator::FiveGsMobilityManagement as u8);
        buf.put_u8(self.security_header_type as u8);
        buf.put_u8(self.message_type);
    }

    /// Decode after the EPD octet has been consumed
    pub(crate) fn decode_after_epd(buf: &mut Bytes) -> NasResult<Self> {
        ensure_len(buf, FIVEG_MM_HEADER_LEN - 1)?;
        let security_header_type = SecurityHeaderType::try_from(buf.get_u8())?;
        let message_type = buf.get_u8();
        Ok(Self { security_header_type, message_type })
    }
}

/// Plain 5GSM header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiveGsmHeader {
    pub pdu_session_id: u8,
    pub procedure_transaction_identity: u8,
    pub message_type: u8,
}

impl FiveGsmHeader {
    pub fn new(pdu_session_id: u8, pti: u8, message_type: FiveGsmMessageType) -> Self {
        Self {
            pdu_session_id,
            procedure_transaction_identity: pti,
            message_type: message_type as u8,
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(ProtocolDiscriminator::FiveGsSessionManagement as u8);
        buf.put_u8(self.pdu_session_id);
        buf.put_u8(self.procedure_transaction_identity);
        buf.put_u8(self.message_type);
    }

    pub(crate) fn decode_after_epd(buf: &mut Bytes) -> NasResult<Self> {
        ensure_len(buf, FIVEG_SM_HEADER_LEN - 1)?;
        Ok(Self {
            pdu_session_id: buf.get_u8(),
            procedure_transaction_identity: buf.get_u8(),
            message_type: buf.get_u8(),
        })
    }
}

/// 5GS NAS security protected header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FiveGsNasSecurityHeader {
    pub security_header_type: SecurityHeaderType,
    pub message_authentication_code: [u8; 4],
    pub sequence_number: u8,
}

impl FiveGsNasSecurityHeader {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(ProtocolDiscriminator::FiveGsMobilityManagement as u8);
        buf.put_u8(self.security_header_type as u8);
        buf.put_slice(&self.message_authentication_code);
        buf.put_u8(self.sequence_number);
    }

    /// Decode a security protected header. Only 5GMM messages carry one.
    pub fn decode(buf: &mut Bytes) -> NasResult<Self> {
        ensure_len(buf, FIVEG_NAS_SECURITY_HEADER_LEN)?;

        let epd = buf.get_u8();
        if ProtocolDiscriminator::try_from(epd)? != ProtocolDiscriminator::FiveGsMobilityManagement {
            return Err(NasError::InvalidProtocolDiscriminator(epd));
        }
        let security_header_type = SecurityHeaderType::try_from(buf.get_u8())?;
        if !security_header_type.is_protected() {
            return Err(NasError::InvalidSecurityHeaderType(security_header_type as u8));
        }
        let mut message_authentication_code = [0u8; 4];
        buf.copy_to_slice(&mut message_authentication_code);
        let sequence_number = buf.get_u8();

        Ok(Self {
            security_header_type,
            message_authentication_code,
            sequence_number,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_lookup() {
        assert_eq!(
            FiveGmmMessageType::try_from(0x5d).unwrap(),
            FiveGmmMessageType::SecurityModeCommand
        );
        assert_eq!(FiveGmmMessageType::RegistrationRequest.name(), "RegistrationRequest");
        assert_eq!(
            FiveGsmMessageType::try_from(0xd3).unwrap(),
            FiveGsmMessageType::PduSessionReleaseCommand
        );
        assert!(matches!(
            FiveGmmMessageType::try_from(0x00),
            Err(NasError::InvalidMessageType(0))
        ));
    }

    #[test]
    fn test_security_header_wire_form() {
        let header = FiveGsNasSecurityHeader {
            security_header_type: SecurityHeaderType::IntegrityProtectedAndCiphered,
            message_authentication_code: [0xde, 0xad, 0xbe, 0xef],
            sequence_number: 9,
        };
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf.as_ref(), &[0x7e, 0x02, 0xde, 0xad, 0xbe, 0xef, 0x09]);

        let mut bytes = buf.freeze();
        assert_eq!(FiveGsNasSecurityHeader::decode(&mut bytes).unwrap(), header);
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_security_header_rejects_plain_and_5gsm() {
        let mut plain = Bytes::from_static(&[0x7e, 0x00, 0, 0, 0, 0, 0]);
        assert!(FiveGsNasSecurityHeader::decode(&mut plain).is_err());

        let mut sm = Bytes::from_static(&[0x2e, 0x02, 0, 0, 0, 0, 0]);
        assert!(matches!(
            FiveGsNasSecurityHeader::decode(&mut sm),
            Err(NasError::InvalidProtocolDiscriminator(0x2e))
        ));
    }

    #[test]
    fn test_security_header_too_short() {
        let mut short = Bytes::from_static(&[0x7e, 0x02, 0, 0, 0, 0]);
        assert_eq!(
            FiveGsNasSecurityHeader::decode(&mut short),
            Err(NasError::BufferTooShort { expected: 7, actual: 6 })
        );
    }
}
