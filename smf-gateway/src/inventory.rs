//! Meter inventory (§4.5): one row per meter in `_DeviceMBUS`, carrying the
//! per-meter AES key, device class, last-known status word, and whether the
//! gateway is allowed to poll it. Discovery on the wireless M-Bus interface
//! inserts a new row the first time a server-id is heard and merges status
//! updates into existing rows thereafter.
use smf_store::{Columns, Table};
use smf_types::{ServerId, WireValue};

pub const TABLE_NAME: &str = "_DeviceMBUS";

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    pub server_id: ServerId,
    pub aes_key: Vec<u8>,
    pub class: String,
    pub status: u64,
    pub enabled: bool,
}

pub fn key(server_id: &ServerId) -> Vec<WireValue> {
    vec![WireValue::Buffer(server_id.as_bytes().to_vec())]
}

fn to_columns(record: &DeviceRecord) -> Columns {
    let mut body = Columns::new();
    body.insert("aes-key".to_string(), WireValue::Buffer(record.aes_key.clone()));
    body.insert("class".to_string(), WireValue::Str(record.class.clone()));
    body.insert("status".to_string(), WireValue::U64(record.status));
    body.insert("enabled".to_string(), WireValue::Bool(record.enabled));
    body
}

pub fn from_columns(server_id: ServerId, body: &Columns) -> Option<DeviceRecord> {
    Some(DeviceRecord {
        server_id,
        aes_key: match body.get("aes-key") {
            Some(WireValue::Buffer(b)) => b.clone(),
            _ => Vec::new(),
        },
        class: match body.get("class") {
            Some(WireValue::Str(s)) => s.clone(),
            _ => String::new(),
        },
        status: match body.get("status") {
            Some(WireValue::U64(n)) => *n,
            _ => 0,
        },
        enabled: matches!(body.get("enabled"), Some(WireValue::Bool(true))),
    })
}

/// Called for every server-id observed on the wireless M-Bus interface. A
/// previously unseen id is inserted, activated only if `auto_activate` is
/// set; a known id has its class and status refreshed without disturbing
/// whatever enablement an operator set by hand.
pub fn discover(table: &Table, server_id: &ServerId, class: &str, status: u64, auto_activate: bool, source: &str) {
    let k = key(server_id);
    match table.lookup(&k) {
        None => {
            let record = DeviceRecord {
                server_id: server_id.clone(),
                aes_key: Vec::new(),
                class: class.to_string(),
                status,
                enabled: auto_activate,
            };
            let _ = table.insert(k, to_columns(&record), 1, source);
        }
        Some(existing) => {
            let mut body = existing.body.clone();
            body.insert("class".to_string(), WireValue::Str(class.to_string()));
            body.insert("status".to_string(), WireValue::U64(status));
            table.merge(k, body, existing.generation + 1, source);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(low_nibble_tag: u8) -> ServerId {
        ServerId::new(vec![low_nibble_tag, 1, 2, 3, 4, 5, 6]).unwrap()
    }

    #[test]
    fn first_sighting_inserts_and_respects_auto_activate() {
        let table = Table::new(TABLE_NAME);
        let id = sid(0x01);
        discover(&table, &id, "electricity", 0, true, "wmbus");
        let row = table.lookup(&key(&id)).unwrap();
        let record = from_columns(id, &row.body).unwrap();
        assert!(record.enabled);
        assert_eq!(record.class, "electricity");
    }

    #[test]
    fn first_sighting_without_auto_activate_stays_disabled() {
        let table = Table::new(TABLE_NAME);
        let id = sid(0x01);
        discover(&table, &id, "gas", 0, false, "wmbus");
        let row = table.lookup(&key(&id)).unwrap();
        assert!(!from_columns(id, &row.body).unwrap().enabled);
    }

    #[test]
    fn repeat_sighting_updates_status_but_preserves_manual_enablement() {
        let table = Table::new(TABLE_NAME);
        let id = sid(0x01);
        discover(&table, &id, "electricity", 0, false, "wmbus");
        table
            .modify(&key(&id), "enabled", WireValue::Bool(true), "operator")
            .unwrap();
        discover(&table, &id, "electricity", 7, false, "wmbus");
        let row = table.lookup(&key(&id)).unwrap();
        let record = from_columns(id, &row.body).unwrap();
        assert!(record.enabled);
        assert_eq!(record.status, 7);
    }
}
