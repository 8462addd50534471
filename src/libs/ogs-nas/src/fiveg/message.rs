//! Structural 5GS NAS message
//!
//! The envelope of a plain NAS message: the 5GMM or 5GSM header followed by
//! the message body. Information elements inside the body are kept as
//! opaque octets.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use crate::common::types::ProtocolDiscriminator;
use crate::error::{NasError, NasResult};
use super::header::{
    FiveGmmHeader, FiveGmmMessageType, FiveGsmHeader, FiveGsmMessageType, FIVEG_MM_HEADER_LEN,
    FIVEG_SM_HEADER_LEN,
};

/// Plain 5GS NAS message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NasMessage {
    /// 5GS mobility management
    Gmm { header: FiveGmmHeader, body: Bytes },
    /// 5GS session management
    Gsm { header: FiveGsmHeader, body: Bytes },
}

impl NasMessage {
    pub fn gmm(message_type: FiveGmmMessageType, body: impl Into<Bytes>) -> Self {
        NasMessage::Gmm {
            header: FiveGmmHeader::new(message_type),
            body: body.into(),
        }
    }

    pub fn gsm(
        pdu_session_id: u8,
        pti: u8,
        message_type: FiveGsmMessageType,
        body: impl Into<Bytes>,
    ) -> Self {
        NasMessage::Gsm {
            header: FiveGsmHeader::new(pdu_session_id, pti, message_type),
            body: body.into(),
        }
    }

    pub fn protocol_discriminator(&self) -> ProtocolDiscriminator {
        match self {
            NasMessage::Gmm { .. } => ProtocolDiscriminator::FiveGsMobilityManagement,
            NasMessage::Gsm { .. } => ProtocolDiscriminator::FiveGsSessionManagement,
        }
    }

    pub fn message_type(&self) -> u8 {
        match self {
            NasMessage::Gmm { header, .. } => header.message_type,
            NasMessage::Gsm { header, .. } => header.message_type,
        }
    }

    pub fn body(&self) -> &Bytes {
        match self {
            NasMessage::Gmm { body, .. } | NasMessage::Gsm { body, .. } => body,
        }
    }

    /// Printable message type, or `"Unknown"` outside the known range
    pub fn name(&self) -> &'static str {
        let ty = self.message_type();
        match self {
            NasMessage::Gmm { .. } => FiveGmmMessageType::try_from(ty).map(|t| t.name()),
            NasMessage::Gsm { .. } => FiveGsmMessageType::try_from(ty).map(|t| t.name()),
        }
        .unwrap_or("Unknown")
    }

    pub fn encoded_len(&self) -> usize {
        let header = match self {
            NasMessage::Gmm { .. } => FIVEG_MM_HEADER_LEN,
            NasMessage::Gsm { .. } => FIVEG_SM_HEADER_LEN,
        };
        header + self.body().len()
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            NasMessage::Gmm { header, body } => {
                header.encode(buf);
                buf.put_slice(body);
            }
            NasMessage::Gsm { header, body } => {
                header.encode(buf);
                buf.put_slice(body);
            }
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode a plain message; the body is everything after the header.
    pub fn decode(mut buf: Bytes) -> NasResult<Self> {
        if !buf.has_remaining() {
            return Err(NasError::BufferTooShort { expected: 1, actual: 0 });
        }
        match ProtocolDiscriminator::try_from(buf.get_u8())? {
            ProtocolDiscriminator::FiveGsMobilityManagement => {
                let header = FiveGmmHeader::decode_after_epd(&mut buf)?;
                Ok(NasMessage::Gmm { header, body: buf })
            }
            ProtocolDiscriminator::FiveGsSessionManagement => {
                let header = FiveGsmHeader::decode_after_epd(&mut buf)?;
                Ok(NasMessage::Gsm { header, body: buf })
            }
        }
    }
}
