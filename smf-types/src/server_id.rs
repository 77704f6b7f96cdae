//! Server ID: a 7-10 byte binary identifier for a meter or
//! gateway. The low nibble of the first byte discriminates the wire form;
//! printable rendering depends on that form.
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerIdForm {
    /// Wireless M-Bus device: `01 <manufacturer:2> <device-id:4> <version:1> <medium:1>`.
    WMBus,
    /// Wired serial-interface device (1107/IEC 62056-21 style).
    Serial,
    /// This framework's own gateway / concentrator identity.
    Gateway,
    /// Recognized low nibble without a dedicated rendering rule.
    Unknown(u8),
}

impl ServerIdForm {
    fn from_low_nibble(nibble: u8) -> Self {
        match nibble {
            0x1 => ServerIdForm::WMBus,
            0x2 => ServerIdForm::Serial,
            0x5 => ServerIdForm::Gateway,
            other => ServerIdForm::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerId(Vec<u8>);

#[derive(Debug, PartialEq, Eq)]
pub enum ServerIdError {
    WrongLength(usize),
}

impl fmt::Display for ServerIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerIdError::WrongLength(n) => {
                write!(f, "server id must be 7-10 bytes, got {n}")
            }
        }
    }
}

impl std::error::Error for ServerIdError {}

impl ServerId {
    pub fn new(bytes: Vec<u8>) -> Result<Self, ServerIdError> {
        if !(7..=10).contains(&bytes.len()) {
            return Err(ServerIdError::WrongLength(bytes.len()));
        }
        Ok(ServerId(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn form(&self) -> ServerIdForm {
        ServerIdForm::from_low_nibble(self.0[0] & 0x0F)
    }

    /// Printable rendering per form: wireless M-Bus and serial devices print
    /// as colon-separated hex (the conventional smart-meter "-" notation
    /// with a leading form tag is reserved for gateway ids), gateway ids
    /// print as a hyphenated hex block.
    pub fn to_printable(&self) -> String {
        match self.form() {
            ServerIdForm::Gateway => self
                .0
                .iter()
                .map(|b| format!("{b:02X}"))
                .collect::<Vec<_>>()
                .join("-"),
            _ => self
                .0
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<Vec<_>>()
                .join(":"),
        }
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_printable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_too_short() {
        assert_eq!(
            ServerId::new(vec![1, 2, 3]).unwrap_err(),
            ServerIdError::WrongLength(3)
        );
    }

    #[test]
    fn rejects_too_long() {
        let bytes = vec![1u8; 11];
        assert_eq!(
            ServerId::new(bytes).unwrap_err(),
            ServerIdError::WrongLength(11)
        );
    }

    #[test]
    fn discriminates_wmbus_form() {
        let id = ServerId::new(vec![0x01, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66]).unwrap();
        assert_eq!(id.form(), ServerIdForm::WMBus);
    }

    #[test]
    fn discriminates_gateway_form_and_renders_hyphenated() {
        let id = ServerId::new(vec![0x05, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]).unwrap();
        assert_eq!(id.form(), ServerIdForm::Gateway);
        assert_eq!(id.to_printable(), "05-AA-BB-CC-DD-EE-FF");
    }

    #[test]
    fn serial_form_renders_lowercase_colon_hex() {
        let id = ServerId::new(vec![0x02, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06]).unwrap();
        assert_eq!(id.to_printable(), "02:01:02:03:04:05:06");
    }
}
