//! SML value: a tagged union over the small set of primitive types the SML
//! dialect spoken by these meters actually uses, plus a scaler and a unit
//! code for scaled measurements.
use crate::unit::UnitCode;

#[derive(Debug, Clone, PartialEq)]
pub enum SmlValue {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    OctetString(Vec<u8>),
    /// Absolute UNIX timestamp (seconds) or a monotonic second-index,
    /// distinguished the way the wire format distinguishes them.
    Time(TimeValue),
    List(Vec<SmlValue>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeValue {
    Timestamp(u32),
    SecIndex(u32),
}

impl SmlValue {
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            SmlValue::I8(v) => Some(v as i64),
            SmlValue::I16(v) => Some(v as i64),
            SmlValue::I32(v) => Some(v as i64),
            SmlValue::I64(v) => Some(v),
            SmlValue::U8(v) => Some(v as i64),
            SmlValue::U16(v) => Some(v as i64),
            SmlValue::U32(v) => Some(v as i64),
            SmlValue::U64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_unsigned(&self) -> Option<u64> {
        match *self {
            SmlValue::U8(v) => Some(v as u64),
            SmlValue::U16(v) => Some(v as u64),
            SmlValue::U32(v) => Some(v as u64),
            SmlValue::U64(v) => Some(v),
            SmlValue::I8(v) => u64::try_from(v).ok(),
            SmlValue::I16(v) => u64::try_from(v).ok(),
            SmlValue::I32(v) => u64::try_from(v).ok(),
            SmlValue::I64(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_octet_string(&self) -> Option<&[u8]> {
        match self {
            SmlValue::OctetString(b) => Some(b),
            _ => None,
        }
    }
}

/// A measurement with its scaling applied lazily: `reading() = raw *
/// 10^scaler` in `unit`. Kept unevaluated so the raw integer and
/// the scaler both survive a round trip through the replicated store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledValue {
    pub raw: i64,
    pub scaler: i8,
    pub unit: UnitCode,
}

impl ScaledValue {
    pub fn new(raw: i64, scaler: i8, unit: UnitCode) -> Self {
        ScaledValue { raw, scaler, unit }
    }

    /// `raw * 10^scaler`, as an f64 — display/export use only; internal
    /// comparisons and storage always use `raw`/`scaler` directly so
    /// repeated conversions cannot accumulate floating-point drift.
    pub fn reading(&self) -> f64 {
        self.raw as f64 * 10f64.powi(self.scaler as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::UNIT_WATT_HOUR;

    #[test]
    fn scaled_value_applies_negative_scaler() {
        let v = ScaledValue::new(1234, -1, UNIT_WATT_HOUR);
        assert!((v.reading() - 123.4).abs() < 1e-9);
    }

    #[test]
    fn as_i64_widens_every_integer_variant() {
        assert_eq!(SmlValue::I8(-5).as_i64(), Some(-5));
        assert_eq!(SmlValue::U64(u64::MAX).as_i64(), None);
        assert_eq!(SmlValue::U32(42).as_i64(), Some(42));
    }

    #[test]
    fn as_unsigned_rejects_negative_signed_values() {
        assert_eq!(SmlValue::U32(42).as_unsigned(), Some(42));
        assert_eq!(SmlValue::I8(-5).as_unsigned(), None);
        assert_eq!(SmlValue::I32(5).as_unsigned(), Some(5));
    }

    #[test]
    fn as_octet_string_only_matches_its_own_variant() {
        assert_eq!(SmlValue::OctetString(vec![1, 2]).as_octet_string(), Some([1, 2].as_slice()));
        assert_eq!(SmlValue::Bool(true).as_octet_string(), None);
    }
}
