//! A handful of named DLMS unit codes. The full OBIS-to-unit standards table
//! is out of scope; these are just the units the worked examples need to be
//! nameable in tests and logs.
pub type UnitCode = u8;

pub const UNIT_UNDEFINED: UnitCode = 0;
pub const UNIT_WATT_HOUR: UnitCode = 30;
pub const UNIT_WATT: UnitCode = 27;
pub const UNIT_VOLT: UnitCode = 35;
pub const UNIT_AMPERE: UnitCode = 33;
pub const UNIT_HERTZ: UnitCode = 44;

pub fn name(code: UnitCode) -> &'static str {
    match code {
        UNIT_WATT_HOUR => "Wh",
        UNIT_WATT => "W",
        UNIT_VOLT => "V",
        UNIT_AMPERE => "A",
        UNIT_HERTZ => "Hz",
        _ => "?",
    }
}
