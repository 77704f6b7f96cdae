//! OBIS code: a six-octet identifier `(A, B, C, D, E, F)` naming a
//! measurement, a configuration object, or a path segment in the SML
//! parameter tree.
//!
//! Two notions of equality coexist by design: `Obis::matches` is
//! prefix-match with `F = 0xFF` as a wildcard, used when walking the
//! parameter tree; `PartialEq`/`Eq`/`Hash` are plain bytewise equality, used
//! when an `Obis` is a table key — a wildcard byte must never silently
//! collide with a concrete one there.
use std::fmt;

pub const WILDCARD_F: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Obis([u8; 6]);

#[derive(Debug, PartialEq, Eq)]
pub enum ObisParseError {
    WrongGroupCount(usize),
    NotANumber(String),
    OutOfRange(u32),
}

impl fmt::Display for ObisParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObisParseError::WrongGroupCount(n) => {
                write!(f, "expected 6 dot/colon/star separated groups, got {n}")
            }
            ObisParseError::NotANumber(s) => write!(f, "not a number: {s}"),
            ObisParseError::OutOfRange(v) => write!(f, "value out of range for a byte: {v}"),
        }
    }
}

impl std::error::Error for ObisParseError {}

impl Obis {
    pub const fn new(a: u8, b: u8, c: u8, d: u8, e: u8, f: u8) -> Self {
        Obis([a, b, c, d, e, f])
    }

    pub const fn from_bytes(bytes: [u8; 6]) -> Self {
        Obis(bytes)
    }

    pub fn as_bytes(&self) -> [u8; 6] {
        self.0
    }

    pub fn a(&self) -> u8 {
        self.0[0]
    }
    pub fn b(&self) -> u8 {
        self.0[1]
    }
    pub fn c(&self) -> u8 {
        self.0[2]
    }
    pub fn d(&self) -> u8 {
        self.0[3]
    }
    pub fn e(&self) -> u8 {
        self.0[4]
    }
    pub fn f(&self) -> u8 {
        self.0[5]
    }

    /// Canonical `A-B:C.D.E*F` rendering (IEC 62056-61 notation).
    pub fn format(&self) -> String {
        format!(
            "{}-{}:{}.{}.{}*{}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }

    /// Parses the canonical rendering. `parse(format(c)) == c` for all codes.
    pub fn parse(s: &str) -> Result<Obis, ObisParseError> {
        let s = s.replace(['-', ':', '.', '*'], " ");
        let groups: Vec<&str> = s.split_whitespace().collect();
        if groups.len() != 6 {
            return Err(ObisParseError::WrongGroupCount(groups.len()));
        }
        let mut out = [0u8; 6];
        for (i, g) in groups.iter().enumerate() {
            let v: u32 = g.parse().map_err(|_| ObisParseError::NotANumber(g.to_string()))?;
            if v > u8::MAX as u32 {
                return Err(ObisParseError::OutOfRange(v));
            }
            out[i] = v as u8;
        }
        Ok(Obis(out))
    }

    /// Prefix-match used for parameter-tree navigation: every byte of
    /// `self` before a wildcard must equal the matching byte of `other`;
    /// `F = 0xFF` in `self` matches any `F` in `other`.
    pub fn matches(&self, other: &Obis) -> bool {
        for i in 0..6 {
            if i == 5 && self.0[5] == WILDCARD_F {
                continue;
            }
            if self.0[i] != other.0[i] {
                return false;
            }
        }
        true
    }
}

impl fmt::Display for Obis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

/// A handful of well-known OBIS codes used by the SML proxy's parameter-tree
/// readers, recovered from the original `obis_db` dictionary.
/// Data, not logic: the full OBIS-to-unit standards table stays out of scope.
pub mod dictionary {
    use super::Obis;

    pub const ACTIVE_ENERGY_TOTAL: Obis = Obis::new(1, 0, 1, 8, 0, 0xFF);
    pub const ACTIVE_ENERGY_TARIFF_1: Obis = Obis::new(1, 0, 1, 8, 1, 0xFF);
    pub const ACTIVE_ENERGY_TARIFF_2: Obis = Obis::new(1, 0, 1, 8, 2, 0xFF);
    pub const VOLTAGE_L1: Obis = Obis::new(1, 0, 32, 7, 0, 0xFF);
    pub const CURRENT_L1: Obis = Obis::new(1, 0, 31, 7, 0, 0xFF);
    pub const DEVICE_CLASS: Obis = Obis::new(81, 81, 0xC7, 0x82, 2, 0xFF);
    pub const DEVICE_IDENT: Obis = Obis::new(81, 81, 0xC7, 0x82, 3, 0xFF);
    pub const FIRMWARE: Obis = Obis::new(81, 81, 0xC7, 0x82, 6, 0xFF);
    pub const SERVER_ID: Obis = Obis::new(0, 0, 96, 1, 0, 0xFF);
    pub const IPT_STATE: Obis = Obis::new(81, 49, 19, 7, 0, 0xFF);
    pub const ACTIVE_DEVICES: Obis = Obis::new(81, 81, 0x11, 6, 0xFF, 0xFF);
    pub const VISIBLE_DEVICES: Obis = Obis::new(81, 81, 0x10, 6, 0xFF, 0xFF);
    pub const MBUS_STATUS: Obis = Obis::new(0, 0, 97, 0x97, 0, 0xFF);

    pub fn label(code: Obis) -> Option<&'static str> {
        // exact-match lookup into a flattened table; wildcards are resolved
        // by the caller via `Obis::matches` before falling back here.
        const TABLE: &[(Obis, &str)] = &[
            (ACTIVE_ENERGY_TOTAL, "active energy, total"),
            (ACTIVE_ENERGY_TARIFF_1, "active energy, tariff 1"),
            (ACTIVE_ENERGY_TARIFF_2, "active energy, tariff 2"),
            (VOLTAGE_L1, "voltage L1"),
            (CURRENT_L1, "current L1"),
            (DEVICE_CLASS, "device class"),
            (DEVICE_IDENT, "device ident"),
            (FIRMWARE, "firmware version"),
            (SERVER_ID, "server id"),
            (IPT_STATE, "IP-T state"),
            (ACTIVE_DEVICES, "active devices"),
            (VISIBLE_DEVICES, "visible devices"),
            (MBUS_STATUS, "M-Bus status"),
        ];
        TABLE.iter().find(|(c, _)| *c == code).map(|(_, l)| *l)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_canonical_format_for_all_bytes() {
        for seed in 0u32..2000 {
            let bytes = [
                (seed % 256) as u8,
                ((seed / 7) % 256) as u8,
                ((seed / 13) % 256) as u8,
                ((seed / 19) % 256) as u8,
                ((seed / 23) % 256) as u8,
                ((seed / 29) % 256) as u8,
            ];
            let code = Obis::from_bytes(bytes);
            let parsed = Obis::parse(&code.format()).unwrap();
            assert_eq!(code, parsed);
        }
    }

    #[test]
    fn wildcard_matches_any_f_byte_in_prefix_mode() {
        let pattern = Obis::new(1, 0, 1, 8, 0, WILDCARD_F);
        let concrete = Obis::new(1, 0, 1, 8, 0, 0x03);
        assert!(pattern.matches(&concrete));
    }

    #[test]
    fn wildcard_does_not_affect_bytewise_equality() {
        let pattern = Obis::new(1, 0, 1, 8, 0, WILDCARD_F);
        let concrete = Obis::new(1, 0, 1, 8, 0, 0x03);
        assert_ne!(pattern, concrete);
    }

    #[test]
    fn non_wildcard_byte_must_match_exactly_even_in_prefix_mode() {
        let pattern = Obis::new(1, 0, 1, 8, 0, 0x01);
        let concrete = Obis::new(1, 0, 1, 8, 0, 0x02);
        assert!(!pattern.matches(&concrete));
    }

    #[test]
    fn dictionary_label_is_exact_match_only() {
        assert_eq!(
            dictionary::label(dictionary::FIRMWARE),
            Some("firmware version")
        );
        let unrelated = Obis::new(9, 9, 9, 9, 9, 9);
        assert_eq!(dictionary::label(unrelated), None);
    }
}
