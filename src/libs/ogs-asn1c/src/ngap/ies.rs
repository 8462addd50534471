//! NGAP Information Elements
//!
//! Protocol IE containers and the UE NGAP identifier IEs (3GPP TS 38.413).
//! Decoding borrows from the input: IE values stay as open-type slices
//! until a caller asks for one.

use crate::per::{AperDecode, AperDecoder, AperEncode, AperEncoder, Constraint, PerResult};
use super::types::{Criticality, ProtocolIeId};

/// ProtocolIE-Field - Single IE with ID, criticality, and value
/// ASN.1: ProtocolIE-Field ::= SEQUENCE { id, criticality, value }
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProtocolIeField<'a> {
    pub id: ProtocolIeId,
    pub criticality: Criticality,
    /// Raw APER encoding of the IE value (open type contents)
    pub value: &'a [u8],
}

impl<'a> ProtocolIeField<'a> {
    pub fn decode(decoder: &mut AperDecoder<'a>) -> PerResult<Self> {
        let id = ProtocolIeId::decode_aper(decoder)?;
        let criticality = Criticality::decode_aper(decoder)?;
        let value = decoder.decode_open_type()?;
        Ok(ProtocolIeField { id, criticality, value })
    }

    /// Decode the value as a typed IE
    pub fn value_as<T: AperDecode>(&self) -> PerResult<T> {
        let mut decoder = AperDecoder::new(self.value);
        T::decode_aper(&mut decoder)
    }
}

impl AperEncode for ProtocolIeField<'_> {
    fn encode_aper(&self, encoder: &mut AperEncoder) -> PerResult<()> {
        self.id.encode_aper(encoder)?;
        self.criticality.encode_aper(encoder)?;
        encoder.encode_open_type(self.value)
    }
}

/// ProtocolIE-Container - Sequence of IEs
/// ASN.1: ProtocolIE-Container ::= SEQUENCE (SIZE (0..maxProtocolIEs)) OF ProtocolIE-Field
///
/// Holds only the IE count and a decoder positioned at the first field;
/// fields are produced on demand by [`ProtocolIeContainer::iter`].
#[derive(Debug, Clone, Copy)]
pub struct ProtocolIeContainer<'a> {
    count: usize,
    fields: &'a [u8],
    bit_offset: usize,
}

impl<'a> ProtocolIeContainer<'a> {
    pub const MAX_PROTOCOL_IES: usize = 65535;

    /// Decode the container header from the message value: the SEQUENCE
    /// extension bit, then the 16-bit aligned IE count.
    pub fn decode_message_value(value: &'a [u8]) -> PerResult<Self> {
        let mut decoder = AperDecoder::new(value);
        let _extended = decoder.read_bit()?;
        let count = decoder.decode_constrained_length(0, Self::MAX_PROTOCOL_IES)?;
        Ok(Self {
            count,
            fields: value,
            bit_offset: decoder.bit_position(),
        })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn iter(&self) -> IeIter<'a> {
        let mut decoder = AperDecoder::new(self.fields);
        // bit_offset is always a whole octet after the aligned count
        let _ = decoder.read_slice(self.bit_offset / 8);
        IeIter {
            decoder,
            remaining: self.count,
        }
    }

    /// Find an IE by ID. Fields before it must decode cleanly.
    pub fn find(&self, id: ProtocolIeId) -> PerResult<Option<ProtocolIeField<'a>>> {
        for field in self.iter() {
            let field = field?;
            if field.id == id {
                return Ok(Some(field));
            }
        }
        Ok(None)
    }
}

/// Lazy walker over the fields of a [`ProtocolIeContainer`]
pub struct IeIter<'a> {
    decoder: AperDecoder<'a>,
    remaining: usize,
}

impl<'a> Iterator for IeIter<'a> {
    type Item = PerResult<ProtocolIeField<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        match ProtocolIeField::decode(&mut self.decoder) {
            Ok(field) => {
                self.remaining -= 1;
                Some(Ok(field))
            }
            Err(e) => {
                self.remaining = 0;
                Some(Err(e))
            }
        }
    }
}

/// Encode a message value (extension bit + IE container) from owned IEs.
pub fn encode_message_value(ies: &[(ProtocolIeId, Criticality, Vec<u8>)]) -> PerResult<Vec<u8>> {
    let mut encoder = AperEncoder::new();
    encoder.write_bit(false);
    encoder.encode_constrained_length(ies.len(), 0, ProtocolIeContainer::MAX_PROTOCOL_IES)?;
    for (id, criticality, value) in ies {
        ProtocolIeField {
            id: *id,
            criticality: *criticality,
            value,
        }
        .encode_aper(&mut encoder)?;
    }
    Ok(encoder.into_bytes().to_vec())
}

/// Encode a single typed IE value as its open-type contents
pub fn encode_ie_value<T: AperEncode>(value: &T) -> PerResult<Vec<u8>> {
    let mut encoder = AperEncoder::new();
    value.encode_aper(&mut encoder)?;
    Ok(encoder.into_bytes().to_vec())
}

/// AMF-UE-NGAP-ID - Unique identifier for UE in AMF
/// ASN.1: AMF-UE-NGAP-ID ::= INTEGER (0..1099511627775)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AmfUeNgapId(pub u64);

impl AmfUeNgapId {
    pub const CONSTRAINT: Constraint = Constraint::new(0, 1099511627775);
}

impl AperEncode for AmfUeNgapId {
    fn encode_aper(&self, encoder: &mut AperEncoder) -> PerResult<()> {
        encoder.encode_constrained_whole_number(self.0 as i64, &Self::CONSTRAINT)
    }
}

impl AperDecode for AmfUeNgapId {
    fn decode_aper(decoder: &mut AperDecoder) -> PerResult<Self> {
        let value = decoder.decode_constrained_whole_number(&Self::CONSTRAINT)?;
        Ok(AmfUeNgapId(value as u64))
    }
}

/// RAN-UE-NGAP-ID - Unique identifier for UE in RAN
/// ASN.1: RAN-UE-NGAP-ID ::= INTEGER (0..4294967295)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RanUeNgapId(pub u32);

impl RanUeNgapId {
    pub const CONSTRAINT: Constraint = Constraint::new(0, 4294967295);
}

impl AperEncode for RanUeNgapId {
    fn encode_aper(&self, encoder: &mut AperEncoder) -> PerResult<()> {
        encoder.encode_constrained_whole_number(self.0 as i64, &Self::CONSTRAINT)
    }
}

impl AperDecode for RanUeNgapId {
    fn decode_aper(decoder: &mut AperDecoder) -> PerResult<Self> {
        let value = decoder.decode_constrained_whole_number(&Self::CONSTRAINT)?;
        Ok(RanUeNgapId(value as u32))
    }
}

/// NAS-PDU ::= OCTET STRING
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NasPdu(pub Vec<u8>);

impl AperEncode for NasPdu {
    fn encode_aper(&self, encoder: &mut AperEncoder) -> PerResult<()> {
        encoder.encode_octet_string(&self.0)
    }
}

impl AperDecode for NasPdu {
    fn decode_aper(decoder: &mut AperDecoder) -> PerResult<Self> {
        Ok(NasPdu(decoder.decode_octet_string()?.to_vec()))
    }
}
