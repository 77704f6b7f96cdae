//! Parameter-tree readers (§4.3): walk a decoded `ParamTree` by OBIS path
//! prefix and turn the handful of recognized subtrees into structured
//! events. Anything that doesn't match a known prefix is handed back
//! verbatim rather than dropped, so a caller can log or forward it without
//! this module needing to understand every possible device extension.
use smf_types::obis::dictionary;
use smf_types::{Obis, SmlValue};

use crate::body::ParamTree;

#[derive(Debug, Clone, PartialEq)]
pub enum ParamEvent {
    DeviceClass(Vec<u8>),
    DeviceIdent(Vec<u8>),
    Firmware(Vec<u8>),
    ServerId(Vec<u8>),
    IptState(Vec<u8>),
    MbusStatus(u64),
    ActiveDevices(Vec<ParamTree>),
    VisibleDevices(Vec<ParamTree>),
    /// A subtree under no recognized prefix, kept whole for later
    /// inspection rather than discarded.
    Unrecognized(ParamTree),
}

fn octet_value(tree: &ParamTree) -> Vec<u8> {
    match &tree.value {
        Some(v) => v.as_octet_string().map(|b| b.to_vec()).unwrap_or_default(),
        None => Vec::new(),
    }
}

fn unsigned_value(tree: &ParamTree) -> u64 {
    match &tree.value {
        Some(v) => v.as_unsigned().unwrap_or(0),
        None => 0,
    }
}

/// Reads a single tree node into the event it represents, recognizing the
/// path prefixes named in the corpus (device ident, IP-T state, active
/// devices, …) via `Obis::matches` so a wildcard byte in the dictionary
/// entry still matches a concrete leaf.
pub fn read_node(tree: &ParamTree) -> ParamEvent {
    if dictionary::DEVICE_CLASS.matches(&tree.name) {
        ParamEvent::DeviceClass(octet_value(tree))
    } else if dictionary::DEVICE_IDENT.matches(&tree.name) {
        ParamEvent::DeviceIdent(octet_value(tree))
    } else if dictionary::FIRMWARE.matches(&tree.name) {
        ParamEvent::Firmware(octet_value(tree))
    } else if dictionary::SERVER_ID.matches(&tree.name) {
        ParamEvent::ServerId(octet_value(tree))
    } else if dictionary::IPT_STATE.matches(&tree.name) {
        ParamEvent::IptState(octet_value(tree))
    } else if dictionary::MBUS_STATUS.matches(&tree.name) {
        ParamEvent::MbusStatus(unsigned_value(tree))
    } else if dictionary::ACTIVE_DEVICES.matches(&tree.name) {
        ParamEvent::ActiveDevices(tree.children.clone())
    } else if dictionary::VISIBLE_DEVICES.matches(&tree.name) {
        ParamEvent::VisibleDevices(tree.children.clone())
    } else {
        ParamEvent::Unrecognized(tree.clone())
    }
}

/// Walks an entire tree depth-first, reading every node (not just the
/// root) so a response carrying several sibling subtrees yields one event
/// per recognized or unrecognized node.
pub fn read_tree(tree: &ParamTree) -> Vec<ParamEvent> {
    let mut events = vec![read_node(tree)];
    if matches!(events[0], ParamEvent::Unrecognized(_)) {
        return events;
    }
    for child in &tree.children {
        events.extend(read_tree(child));
    }
    events
}

/// A human label for a recognized or registered OBIS code, falling back to
/// the dictionary's exact-match table for anything this reader doesn't
/// special-case directly.
pub fn label_for(code: Obis) -> Option<&'static str> {
    dictionary::label(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_device_class_leaf() {
        let tree = ParamTree::leaf(dictionary::DEVICE_CLASS, SmlValue::OctetString(b"electricity".to_vec()));
        assert_eq!(read_node(&tree), ParamEvent::DeviceClass(b"electricity".to_vec()));
    }

    #[test]
    fn recognizes_mbus_status_leaf_as_unsigned() {
        let tree = ParamTree::leaf(dictionary::MBUS_STATUS, SmlValue::U64(7));
        assert_eq!(read_node(&tree), ParamEvent::MbusStatus(7));
    }

    #[test]
    fn unrecognized_code_is_preserved_verbatim() {
        let odd = Obis::new(9, 9, 9, 9, 9, 9);
        let tree = ParamTree::leaf(odd, SmlValue::U64(1));
        match read_node(&tree) {
            ParamEvent::Unrecognized(preserved) => assert_eq!(preserved, tree),
            other => panic!("expected Unrecognized, got {other:?}"),
        }
    }

    #[test]
    fn active_devices_wildcard_prefix_matches_concrete_leaf() {
        let concrete = Obis::new(81, 81, 0x11, 6, 0x01, 0x01);
        let tree = ParamTree::node(concrete, vec![]);
        assert_eq!(read_node(&tree), ParamEvent::ActiveDevices(vec![]));
    }

    #[test]
    fn walking_a_recognized_subtree_yields_one_event_per_child() {
        let tree = ParamTree::node(
            dictionary::ACTIVE_DEVICES,
            vec![
                ParamTree::leaf(dictionary::SERVER_ID, SmlValue::OctetString(vec![1])),
                ParamTree::leaf(dictionary::SERVER_ID, SmlValue::OctetString(vec![2])),
            ],
        );
        let events = read_tree(&tree);
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], ParamEvent::ActiveDevices(_)));
        assert_eq!(events[1], ParamEvent::ServerId(vec![1]));
        assert_eq!(events[2], ParamEvent::ServerId(vec![2]));
    }

    #[test]
    fn walking_an_unrecognized_root_stops_at_the_root() {
        let odd = Obis::new(9, 9, 9, 9, 9, 9);
        let tree = ParamTree::node(odd, vec![ParamTree::leaf(dictionary::SERVER_ID, SmlValue::OctetString(vec![1]))]);
        let events = read_tree(&tree);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ParamEvent::Unrecognized(_)));
    }
}
