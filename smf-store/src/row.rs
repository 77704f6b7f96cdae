//! A single replicated-table row: a key tuple, named body columns, the
//! generation at which it was last written, and the origin-tag of the
//! session or subsystem that wrote it.
use std::collections::BTreeMap;

use smf_common::Generation;
use smf_types::WireValue;

pub type Columns = BTreeMap<String, WireValue>;

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub key: Vec<WireValue>,
    pub body: Columns,
    pub generation: Generation,
    pub origin: String,
}

impl Row {
    pub fn new(key: Vec<WireValue>, body: Columns, generation: Generation, origin: impl Into<String>) -> Self {
        Row {
            key,
            body,
            generation,
            origin: origin.into(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&WireValue> {
        self.body.get(name)
    }
}
