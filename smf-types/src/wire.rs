//! The cluster bus value lattice: a closed tagged union over every type a
//! table cell, a command argument, or a push payload can hold, in the manner
//! of the teacher's `DatoRedis` (one enum, one variant per concrete type,
//! dispatch by tag rather than `Any`/trait objects). Where `DatoRedis` tags
//! itself with a leading ASCII symbol and renders to RESP text, `WireValue`
//! tags itself with a leading byte and renders to a compact binary form,
//! since the cluster bus is not text-protocol compatible with anything
//! external.
use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Read};
use std::net::SocketAddr;

use smf_common::codec::{read_exact, read_u16_be, read_u32_be, read_u64_be, read_u8, Decode, Encode};

use crate::uuid::Uuid;

const TAG_NIL: u8 = 0x00;
const TAG_BOOL: u8 = 0x01;
const TAG_I64: u8 = 0x02;
const TAG_U64: u8 = 0x03;
const TAG_F64: u8 = 0x04;
const TAG_STR: u8 = 0x05;
const TAG_BUFFER: u8 = 0x06;
const TAG_UUID: u8 = 0x07;
const TAG_TIME_POINT: u8 = 0x08;
const TAG_DURATION: u8 = 0x09;
const TAG_ENDPOINT: u8 = 0x0A;
const TAG_VERSION: u8 = 0x0B;
const TAG_MAC48: u8 = 0x0C;
const TAG_MAC64: u8 = 0x0D;
const TAG_TUPLE: u8 = 0x0E;
const TAG_VECTOR: u8 = 0x0F;
const TAG_PARAM_MAP: u8 = 0x10;

#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Nil,
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Str(String),
    Buffer(Vec<u8>),
    Uuid(Uuid),
    /// Seconds since the UNIX epoch.
    TimePoint(u64),
    /// Milliseconds.
    Duration(u64),
    Endpoint(SocketAddr),
    /// `(major, minor, patch)`.
    Version(u16, u16, u16),
    Mac48([u8; 6]),
    Mac64([u8; 8]),
    /// Fixed-arity heterogeneous group — a command's argument list.
    Tuple(Vec<WireValue>),
    /// Variable-length homogeneous-in-practice group — a table's row set.
    Vector(Vec<WireValue>),
    /// A parameter tree node or a table row, keyed by name.
    ParamMap(BTreeMap<String, WireValue>),
}

#[derive(Debug)]
pub enum WireError {
    Io(io::Error),
    UnknownTag(u8),
    Utf8,
    TooLong(usize),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::Io(e) => write!(f, "i/o error decoding wire value: {e}"),
            WireError::UnknownTag(t) => write!(f, "unknown wire value tag 0x{t:02x}"),
            WireError::Utf8 => write!(f, "wire string is not valid utf-8"),
            WireError::TooLong(n) => write!(f, "wire collection length {n} exceeds the frame limit"),
        }
    }
}

impl std::error::Error for WireError {}

impl From<io::Error> for WireError {
    fn from(e: io::Error) -> Self {
        WireError::Io(e)
    }
}

impl From<WireError> for io::Error {
    fn from(e: WireError) -> Self {
        match e {
            WireError::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
        }
    }
}

/// Collections longer than this are rejected on decode rather than trusted
/// to allocate — a corrupt or hostile length prefix must not drive an
/// unbounded `Vec::with_capacity`.
const MAX_COLLECTION_LEN: u32 = 1 << 20;

impl WireValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            WireValue::Nil => "nil",
            WireValue::Bool(_) => "bool",
            WireValue::I64(_) => "i64",
            WireValue::U64(_) => "u64",
            WireValue::F64(_) => "f64",
            WireValue::Str(_) => "str",
            WireValue::Buffer(_) => "buffer",
            WireValue::Uuid(_) => "uuid",
            WireValue::TimePoint(_) => "time_point",
            WireValue::Duration(_) => "duration",
            WireValue::Endpoint(_) => "endpoint",
            WireValue::Version(..) => "version",
            WireValue::Mac48(_) => "mac48",
            WireValue::Mac64(_) => "mac64",
            WireValue::Tuple(_) => "tuple",
            WireValue::Vector(_) => "vector",
            WireValue::ParamMap(_) => "param_map",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            WireValue::I64(v) => Some(*v),
            WireValue::U64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            WireValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

fn encode_len(out: &mut Vec<u8>, len: usize) {
    out.extend_from_slice(&(len as u32).to_be_bytes());
}

fn decode_len<R: Read>(input: &mut R) -> Result<usize, WireError> {
    let len = read_u32_be(input)?;
    if len > MAX_COLLECTION_LEN {
        return Err(WireError::TooLong(len as usize));
    }
    Ok(len as usize)
}

impl Encode for WireValue {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            WireValue::Nil => out.push(TAG_NIL),
            WireValue::Bool(b) => {
                out.push(TAG_BOOL);
                out.push(*b as u8);
            }
            WireValue::I64(v) => {
                out.push(TAG_I64);
                out.extend_from_slice(&v.to_be_bytes());
            }
            WireValue::U64(v) => {
                out.push(TAG_U64);
                out.extend_from_slice(&v.to_be_bytes());
            }
            WireValue::F64(v) => {
                out.push(TAG_F64);
                out.extend_from_slice(&v.to_be_bytes());
            }
            WireValue::Str(s) => {
                out.push(TAG_STR);
                encode_len(out, s.len());
                out.extend_from_slice(s.as_bytes());
            }
            WireValue::Buffer(b) => {
                out.push(TAG_BUFFER);
                encode_len(out, b.len());
                out.extend_from_slice(b);
            }
            WireValue::Uuid(u) => {
                out.push(TAG_UUID);
                out.extend_from_slice(&u.as_bytes());
            }
            WireValue::TimePoint(t) => {
                out.push(TAG_TIME_POINT);
                out.extend_from_slice(&t.to_be_bytes());
            }
            WireValue::Duration(d) => {
                out.push(TAG_DURATION);
                out.extend_from_slice(&d.to_be_bytes());
            }
            WireValue::Endpoint(addr) => {
                out.push(TAG_ENDPOINT);
                addr.encode(out);
            }
            WireValue::Version(maj, min, patch) => {
                out.push(TAG_VERSION);
                out.extend_from_slice(&maj.to_be_bytes());
                out.extend_from_slice(&min.to_be_bytes());
                out.extend_from_slice(&patch.to_be_bytes());
            }
            WireValue::Mac48(m) => {
                out.push(TAG_MAC48);
                out.extend_from_slice(m);
            }
            WireValue::Mac64(m) => {
                out.push(TAG_MAC64);
                out.extend_from_slice(m);
            }
            WireValue::Tuple(items) => {
                out.push(TAG_TUPLE);
                encode_len(out, items.len());
                for item in items {
                    item.encode(out);
                }
            }
            WireValue::Vector(items) => {
                out.push(TAG_VECTOR);
                encode_len(out, items.len());
                for item in items {
                    item.encode(out);
                }
            }
            WireValue::ParamMap(map) => {
                out.push(TAG_PARAM_MAP);
                encode_len(out, map.len());
                for (k, v) in map {
                    encode_len(out, k.len());
                    out.extend_from_slice(k.as_bytes());
                    v.encode(out);
                }
            }
        }
    }
}

impl Decode for WireValue {
    fn decode<R: Read>(input: &mut R) -> io::Result<Self> {
        Ok(Self::decode_checked(input)?)
    }
}

impl WireValue {
    fn decode_checked<R: Read>(input: &mut R) -> Result<Self, WireError> {
        let tag = read_u8(input)?;
        Ok(match tag {
            TAG_NIL => WireValue::Nil,
            TAG_BOOL => WireValue::Bool(read_u8(input)? != 0),
            TAG_I64 => WireValue::I64(i64::from_be_bytes(read_exact(input)?)),
            TAG_U64 => WireValue::U64(read_u64_be(input)?),
            TAG_F64 => WireValue::F64(f64::from_be_bytes(read_exact(input)?)),
            TAG_STR => {
                let len = decode_len(input)?;
                let mut buf = vec![0u8; len];
                input.read_exact(&mut buf)?;
                WireValue::Str(String::from_utf8(buf).map_err(|_| WireError::Utf8)?)
            }
            TAG_BUFFER => {
                let len = decode_len(input)?;
                let mut buf = vec![0u8; len];
                input.read_exact(&mut buf)?;
                WireValue::Buffer(buf)
            }
            TAG_UUID => WireValue::Uuid(Uuid::from_bytes(read_exact(input)?)),
            TAG_TIME_POINT => WireValue::TimePoint(read_u64_be(input)?),
            TAG_DURATION => WireValue::Duration(read_u64_be(input)?),
            TAG_ENDPOINT => WireValue::Endpoint(SocketAddr::decode(input)?),
            TAG_VERSION => {
                let maj = read_u16_be(input)?;
                let min = read_u16_be(input)?;
                let patch = read_u16_be(input)?;
                WireValue::Version(maj, min, patch)
            }
            TAG_MAC48 => WireValue::Mac48(read_exact(input)?),
            TAG_MAC64 => WireValue::Mac64(read_exact(input)?),
            TAG_TUPLE => {
                let len = decode_len(input)?;
                let mut items = Vec::with_capacity(len.min(64));
                for _ in 0..len {
                    items.push(WireValue::decode_checked(input)?);
                }
                WireValue::Tuple(items)
            }
            TAG_VECTOR => {
                let len = decode_len(input)?;
                let mut items = Vec::with_capacity(len.min(64));
                for _ in 0..len {
                    items.push(WireValue::decode_checked(input)?);
                }
                WireValue::Vector(items)
            }
            TAG_PARAM_MAP => {
                let len = decode_len(input)?;
                let mut map = BTreeMap::new();
                for _ in 0..len {
                    let klen = decode_len(input)?;
                    let mut kbuf = vec![0u8; klen];
                    input.read_exact(&mut kbuf)?;
                    let key = String::from_utf8(kbuf).map_err(|_| WireError::Utf8)?;
                    let value = WireValue::decode_checked(input)?;
                    map.insert(key, value);
                }
                WireValue::ParamMap(map)
            }
            other => return Err(WireError::UnknownTag(other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn round_trip(v: WireValue) {
        let bytes = v.encode_to_vec();
        let mut cursor = Cursor::new(bytes);
        let decoded = WireValue::decode(&mut cursor).unwrap();
        assert_eq!(decoded, v);
    }

    #[test]
    fn round_trips_every_scalar_variant() {
        round_trip(WireValue::Nil);
        round_trip(WireValue::Bool(true));
        round_trip(WireValue::I64(-9001));
        round_trip(WireValue::U64(u64::MAX));
        round_trip(WireValue::F64(3.25));
        round_trip(WireValue::Str("L1 voltage".into()));
        round_trip(WireValue::Buffer(vec![1, 2, 3, 4]));
        round_trip(WireValue::Uuid(Uuid::new_random()));
        round_trip(WireValue::TimePoint(1_700_000_000));
        round_trip(WireValue::Duration(30_000));
        round_trip(WireValue::Endpoint("10.0.0.1:7000".parse().unwrap()));
        round_trip(WireValue::Version(1, 4, 0));
        round_trip(WireValue::Mac48([0, 1, 2, 3, 4, 5]));
        round_trip(WireValue::Mac64([0, 1, 2, 3, 4, 5, 6, 7]));
    }

    #[test]
    fn round_trips_nested_containers() {
        let mut map = BTreeMap::new();
        map.insert("device".to_string(), WireValue::Str("meter-01".into()));
        map.insert(
            "readings".to_string(),
            WireValue::Vector(vec![WireValue::I64(1), WireValue::I64(2)]),
        );
        round_trip(WireValue::ParamMap(map));
        round_trip(WireValue::Tuple(vec![
            WireValue::Str("SET".into()),
            WireValue::I64(42),
        ]));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let bytes = vec![0xEE];
        let mut cursor = Cursor::new(bytes);
        let err = WireValue::decode(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn oversized_length_prefix_is_rejected_without_allocating() {
        let mut bytes = vec![TAG_VECTOR];
        bytes.extend_from_slice(&u32::MAX.to_be_bytes());
        let mut cursor = Cursor::new(bytes);
        let err = WireValue::decode(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
