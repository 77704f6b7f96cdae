//! A minimal 128-bit identifier, hand-rolled in the manner of the teacher's
//! `NodeId` (a random 160-bit hex id used as the cluster node tag) rather
//! than pulling in an external uuid crate the teacher never depended on.
//! Used for session tags, device tags, and node tags throughout the
//! replicated store and the cluster bus wire lattice.
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uuid([u8; 16]);

impl Uuid {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Uuid(bytes)
    }

    pub fn as_bytes(&self) -> [u8; 16] {
        self.0
    }

    pub fn new_random() -> Self {
        let mut bytes = [0u8; 16];
        rand::fill(&mut bytes);
        Uuid(bytes)
    }

    pub fn nil() -> Self {
        Uuid([0u8; 16])
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_ids_are_distinct() {
        assert_ne!(Uuid::new_random(), Uuid::new_random());
    }

    #[test]
    fn round_trips_through_bytes() {
        let id = Uuid::new_random();
        assert_eq!(Uuid::from_bytes(id.as_bytes()), id);
    }
}
