//! SML TLV encoding (§4.3). Each field is `(type, length, value)`: the
//! first header byte packs a continuation flag, a 3-bit type tag and a
//! 4-bit length nibble; when the value is too long for four bits, extra
//! header bytes chain in, each contributing four more length bits and
//! carrying the continuation flag in its own top bit. `total_len` always
//! counts the header bytes themselves, matching the wire convention so a
//! reader never has to look ahead to know how many header bytes preceded
//! the value.
use std::io::{self, Read};

use smf_common::codec::{read_u8, Decode, Encode};
use smf_types::{SmlValue, TimeValue};

const TYPE_END_OF_MESSAGE: u8 = 0x0;
const TYPE_OCTET_STRING: u8 = 0x1;
const TYPE_BOOLEAN: u8 = 0x4;
const TYPE_SIGNED_INT: u8 = 0x5;
const TYPE_UNSIGNED_INT: u8 = 0x6;
const TYPE_LIST: u8 = 0x7;

const CONTINUATION_BIT: u8 = 0x80;

#[derive(Debug, Clone, PartialEq)]
pub enum TlvValue {
    EndOfMessage,
    OctetString(Vec<u8>),
    Boolean(bool),
    SignedInt(i64),
    UnsignedInt(u64),
    List(Vec<TlvValue>),
}

impl TlvValue {
    pub fn as_octet_string(&self) -> Option<&[u8]> {
        match self {
            TlvValue::OctetString(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_unsigned(&self) -> Option<u64> {
        match self {
            TlvValue::UnsignedInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_signed(&self) -> Option<i64> {
        match self {
            TlvValue::SignedInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[TlvValue]> {
        match self {
            TlvValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Encodes a typed SML value onto the wire's untyped TLV lattice. A
    /// `Time` value has no TLV type tag of its own, so it rides the same
    /// `(choice, value)` two-element list the dialect uses for every SML
    /// choice field: `1` tags a second-index, `2` tags a UNIX timestamp.
    pub fn from_sml(value: &SmlValue) -> TlvValue {
        match value {
            SmlValue::Bool(b) => TlvValue::Boolean(*b),
            SmlValue::I8(v) => TlvValue::SignedInt(*v as i64),
            SmlValue::I16(v) => TlvValue::SignedInt(*v as i64),
            SmlValue::I32(v) => TlvValue::SignedInt(*v as i64),
            SmlValue::I64(v) => TlvValue::SignedInt(*v),
            SmlValue::U8(v) => TlvValue::UnsignedInt(*v as u64),
            SmlValue::U16(v) => TlvValue::UnsignedInt(*v as u64),
            SmlValue::U32(v) => TlvValue::UnsignedInt(*v as u64),
            SmlValue::U64(v) => TlvValue::UnsignedInt(*v),
            SmlValue::OctetString(bytes) => TlvValue::OctetString(bytes.clone()),
            SmlValue::Time(TimeValue::SecIndex(t)) => {
                TlvValue::List(vec![TlvValue::UnsignedInt(TIME_TAG_SEC_INDEX), TlvValue::UnsignedInt(*t as u64)])
            }
            SmlValue::Time(TimeValue::Timestamp(t)) => {
                TlvValue::List(vec![TlvValue::UnsignedInt(TIME_TAG_TIMESTAMP), TlvValue::UnsignedInt(*t as u64)])
            }
            SmlValue::List(items) => TlvValue::List(items.iter().map(TlvValue::from_sml).collect()),
        }
    }

    /// Reverses [`TlvValue::from_sml`]. Every integer width collapses onto
    /// the widest signed/unsigned variant on the way back: the TLV wire
    /// format itself never records which typed width an encoder started
    /// from, so there is nothing to recover it from.
    pub fn to_sml(&self) -> io::Result<SmlValue> {
        match self {
            TlvValue::Boolean(b) => Ok(SmlValue::Bool(*b)),
            TlvValue::SignedInt(v) => Ok(SmlValue::I64(*v)),
            TlvValue::UnsignedInt(v) => Ok(SmlValue::U64(*v)),
            TlvValue::OctetString(bytes) => Ok(SmlValue::OctetString(bytes.clone())),
            TlvValue::List(items) => match items.as_slice() {
                [TlvValue::UnsignedInt(TIME_TAG_SEC_INDEX), TlvValue::UnsignedInt(t)] => {
                    Ok(SmlValue::Time(TimeValue::SecIndex(*t as u32)))
                }
                [TlvValue::UnsignedInt(TIME_TAG_TIMESTAMP), TlvValue::UnsignedInt(t)] => {
                    Ok(SmlValue::Time(TimeValue::Timestamp(*t as u32)))
                }
                _ => Ok(SmlValue::List(
                    items.iter().map(TlvValue::to_sml).collect::<io::Result<Vec<_>>>()?,
                )),
            },
            TlvValue::EndOfMessage => Err(io::Error::new(io::ErrorKind::InvalidData, "expected an sml value, found end-of-message")),
        }
    }
}

const TIME_TAG_SEC_INDEX: u64 = 1;
const TIME_TAG_TIMESTAMP: u64 = 2;

fn header_bytes(total_len: usize) -> Vec<u8> {
    // Smallest nibble count that can hold total_len once the header's own
    // contribution is accounted for; solved by growing a guess until it's
    // self-consistent, since the header's length depends on itself.
    let mut n = 1usize;
    loop {
        let bits = 4 * n;
        if total_len < (1usize << bits) {
            break;
        }
        n += 1;
    }
    let mut nibbles = Vec::with_capacity(n);
    let mut remaining = total_len;
    for _ in 0..n {
        nibbles.push((remaining & 0x0F) as u8);
        remaining >>= 4;
    }
    nibbles.reverse();
    nibbles
}

fn encode_header(out: &mut Vec<u8>, type_tag: u8, value_len: usize) {
    // total_len is fixed-point: grow the header until total_len (= header
    // bytes + value_len) fits in that many header bytes.
    let mut header_len = 1usize;
    loop {
        let total = header_len + value_len;
        let needed = header_bytes(total).len();
        if needed == header_len {
            let nibbles = header_bytes(total);
            out.push((type_tag << 4) | nibbles[0] | if nibbles.len() > 1 { CONTINUATION_BIT } else { 0 });
            for (i, nibble) in nibbles.iter().enumerate().skip(1) {
                let more = i + 1 < nibbles.len();
                out.push(nibble | if more { CONTINUATION_BIT } else { 0 });
            }
            return;
        }
        header_len = needed;
    }
}

fn decode_header<R: Read>(input: &mut R) -> io::Result<(u8, usize)> {
    let first = read_u8(input)?;
    let type_tag = (first >> 4) & 0x7;
    let mut total_len = (first & 0x0F) as usize;
    let mut more = first & CONTINUATION_BIT != 0;
    let mut header_bytes_read = 1;
    while more {
        let next = read_u8(input)?;
        total_len = (total_len << 4) | (next & 0x0F) as usize;
        more = next & CONTINUATION_BIT != 0;
        header_bytes_read += 1;
    }
    let value_len = total_len
        .checked_sub(header_bytes_read)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "tlv length shorter than its own header"))?;
    Ok((type_tag, value_len))
}

impl Encode for TlvValue {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            TlvValue::EndOfMessage => encode_header(out, TYPE_END_OF_MESSAGE, 0),
            TlvValue::OctetString(bytes) => {
                encode_header(out, TYPE_OCTET_STRING, bytes.len());
                out.extend_from_slice(bytes);
            }
            TlvValue::Boolean(b) => {
                encode_header(out, TYPE_BOOLEAN, 1);
                out.push(if *b { 1 } else { 0 });
            }
            TlvValue::SignedInt(v) => {
                let bytes = minimal_signed_bytes(*v);
                encode_header(out, TYPE_SIGNED_INT, bytes.len());
                out.extend_from_slice(&bytes);
            }
            TlvValue::UnsignedInt(v) => {
                let bytes = minimal_unsigned_bytes(*v);
                encode_header(out, TYPE_UNSIGNED_INT, bytes.len());
                out.extend_from_slice(&bytes);
            }
            TlvValue::List(items) => {
                let mut body = Vec::new();
                for item in items {
                    item.encode(&mut body);
                }
                encode_header(out, TYPE_LIST, items.len());
                // A list's "length" counts elements, not bytes; the element
                // count is already folded into the header above, so only
                // the encoded elements themselves follow.
                out.extend_from_slice(&body);
            }
        }
    }
}

fn minimal_signed_bytes(v: i64) -> Vec<u8> {
    for width in [1usize, 2, 4, 8] {
        let bits = width * 8;
        let min = if bits == 64 { i64::MIN } else { -(1i64 << (bits - 1)) };
        let max = if bits == 64 { i64::MAX } else { (1i64 << (bits - 1)) - 1 };
        if v >= min && v <= max {
            return v.to_be_bytes()[8 - width..].to_vec();
        }
    }
    v.to_be_bytes().to_vec()
}

fn minimal_unsigned_bytes(v: u64) -> Vec<u8> {
    for width in [1usize, 2, 4, 8] {
        let bits = width * 8;
        let max = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
        if v <= max {
            return v.to_be_bytes()[8 - width..].to_vec();
        }
    }
    v.to_be_bytes().to_vec()
}

impl Decode for TlvValue {
    fn decode<R: Read>(input: &mut R) -> io::Result<Self> {
        // `count` is a byte count for every type except List, where the
        // same field instead counts elements.
        let (type_tag, count) = decode_header(input)?;

        match type_tag {
            TYPE_END_OF_MESSAGE => Ok(TlvValue::EndOfMessage),
            TYPE_OCTET_STRING => {
                let mut buf = vec![0u8; count];
                input.read_exact(&mut buf)?;
                Ok(TlvValue::OctetString(buf))
            }
            TYPE_BOOLEAN => {
                let mut buf = vec![0u8; count];
                input.read_exact(&mut buf)?;
                Ok(TlvValue::Boolean(buf.first().copied().unwrap_or(0) != 0))
            }
            TYPE_SIGNED_INT => {
                let mut buf = vec![0u8; count];
                input.read_exact(&mut buf)?;
                Ok(TlvValue::SignedInt(sign_extend(&buf)))
            }
            TYPE_UNSIGNED_INT => {
                let mut buf = vec![0u8; count];
                input.read_exact(&mut buf)?;
                Ok(TlvValue::UnsignedInt(zero_extend(&buf)))
            }
            TYPE_LIST => {
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(TlvValue::decode(input)?);
                }
                Ok(TlvValue::List(items))
            }
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown sml tlv type tag {other}"),
            )),
        }
    }
}

fn sign_extend(bytes: &[u8]) -> i64 {
    if bytes.is_empty() {
        return 0;
    }
    let negative = bytes[0] & 0x80 != 0;
    let mut buf = [if negative { 0xFFu8 } else { 0 }; 8];
    let start = 8 - bytes.len();
    buf[start..].copy_from_slice(bytes);
    i64::from_be_bytes(buf)
}

fn zero_extend(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    let start = 8 - bytes.len();
    buf[start..].copy_from_slice(bytes);
    u64::from_be_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn round_trip(v: TlvValue) -> TlvValue {
        let bytes = v.encode_to_vec();
        let mut cursor = Cursor::new(bytes);
        TlvValue::decode(&mut cursor).unwrap()
    }

    #[test]
    fn end_of_message_round_trips() {
        assert_eq!(round_trip(TlvValue::EndOfMessage), TlvValue::EndOfMessage);
    }

    #[test]
    fn short_octet_string_round_trips() {
        let v = TlvValue::OctetString(vec![1, 2, 3]);
        assert_eq!(round_trip(v.clone()), v);
    }

    #[test]
    fn long_octet_string_exercises_length_extension() {
        let data: Vec<u8> = (0..300).map(|i| (i % 256) as u8).collect();
        let v = TlvValue::OctetString(data);
        assert_eq!(round_trip(v.clone()), v);
    }

    #[test]
    fn boolean_round_trips() {
        assert_eq!(round_trip(TlvValue::Boolean(true)), TlvValue::Boolean(true));
        assert_eq!(round_trip(TlvValue::Boolean(false)), TlvValue::Boolean(false));
    }

    #[test]
    fn signed_int_uses_minimal_width_and_round_trips_negatives() {
        assert_eq!(round_trip(TlvValue::SignedInt(-1)), TlvValue::SignedInt(-1));
        assert_eq!(round_trip(TlvValue::SignedInt(i64::MIN)), TlvValue::SignedInt(i64::MIN));
        assert_eq!(round_trip(TlvValue::SignedInt(127)), TlvValue::SignedInt(127));
    }

    #[test]
    fn unsigned_int_round_trips_across_widths() {
        for v in [0u64, 255, 256, 70000, u64::MAX] {
            assert_eq!(round_trip(TlvValue::UnsignedInt(v)), TlvValue::UnsignedInt(v));
        }
    }

    #[test]
    fn nested_list_round_trips() {
        let v = TlvValue::List(vec![
            TlvValue::OctetString(b"obis".to_vec()),
            TlvValue::List(vec![TlvValue::UnsignedInt(42), TlvValue::Boolean(true)]),
            TlvValue::EndOfMessage,
        ]);
        assert_eq!(round_trip(v.clone()), v);
    }

    fn sml_round_trip(v: SmlValue) -> SmlValue {
        let tlv = round_trip(TlvValue::from_sml(&v));
        tlv.to_sml().unwrap()
    }

    #[test]
    fn sml_timestamp_round_trips_at_the_epoch_and_its_wrap_boundary() {
        for t in [0u32, 1, 1u32 << 31] {
            assert_eq!(sml_round_trip(SmlValue::Time(TimeValue::Timestamp(t))), SmlValue::Time(TimeValue::Timestamp(t)));
        }
    }

    #[test]
    fn sml_sec_index_round_trips_distinctly_from_a_timestamp() {
        let v = SmlValue::Time(TimeValue::SecIndex(1));
        assert_eq!(sml_round_trip(v.clone()), v);
        assert_ne!(TlvValue::from_sml(&v), TlvValue::from_sml(&SmlValue::Time(TimeValue::Timestamp(1))));
    }

    #[test]
    fn sml_integers_widen_to_their_canonical_variant_on_the_way_back() {
        assert_eq!(sml_round_trip(SmlValue::I8(-5)), SmlValue::I64(-5));
        assert_eq!(sml_round_trip(SmlValue::U32(42)), SmlValue::U64(42));
    }

    #[test]
    fn sml_octet_string_and_bool_round_trip() {
        assert_eq!(sml_round_trip(SmlValue::OctetString(vec![1, 2, 3])), SmlValue::OctetString(vec![1, 2, 3]));
        assert_eq!(sml_round_trip(SmlValue::Bool(true)), SmlValue::Bool(true));
    }
}
