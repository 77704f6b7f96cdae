//! The 32-byte scramble key (SK) and the per-direction keystream cursor
//! derived from it (§4.2). XOR is its own inverse, so one `apply` function
//! serves both encoding and decoding; what differs between the two
//! directions is only which `ScrambleCursor` instance advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrambleKey(pub [u8; 32]);

impl ScrambleKey {
    /// The well-known key both sides assume before a successful scrambled
    /// login installs a fresh one.
    pub fn default_key() -> ScrambleKey {
        ScrambleKey([0x1Bu8; 32])
    }

    pub fn from_bytes(bytes: [u8; 32]) -> ScrambleKey {
        ScrambleKey(bytes)
    }

    /// Fresh key material for a rekey, generated the same way
    /// `smf_types::Uuid::new_random` fills its bytes.
    pub fn random() -> ScrambleKey {
        let mut bytes = [0u8; 32];
        rand::fill(&mut bytes);
        ScrambleKey(bytes)
    }
}

/// A stateful XOR keystream cursor over one direction of a session's
/// traffic. Rekeying (after a successful scrambled login) resets the
/// cursor to the start of the new key, matching the resolved open
/// question that rekey happens immediately after the login response's
/// final byte, never mid-frame.
#[derive(Debug, Clone)]
pub struct ScrambleCursor {
    key: ScrambleKey,
    pos: usize,
}

impl ScrambleCursor {
    pub fn new(key: ScrambleKey) -> Self {
        ScrambleCursor { key, pos: 0 }
    }

    pub fn rekey(&mut self, key: ScrambleKey) {
        self.key = key;
        self.pos = 0;
    }

    pub fn apply(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            *byte ^= self.key.0[self.pos % self.key.0.len()];
            self.pos = self.pos.wrapping_add(1);
        }
    }
}
