//! The table mutation protocol: `db.req.insert`/`db.req.modify.by.{attr,param}`/
//! `db.req.remove`/`db.clear`, plus the `db.res.insert` acknowledgement the
//! writer receives. Encoding a `ChangeEvent` as a record is how a
//! subscription (§4.1 "Subscription") forwards deltas to a subscriber after
//! its initial snapshot.
use smf_store::{ChangeEvent, Columns, Row};
use smf_types::WireValue;

use crate::opcode;
use crate::record::CommandRecord;

fn key_value(key: &[WireValue]) -> WireValue {
    WireValue::Tuple(key.to_vec())
}

fn body_value(body: &Columns) -> WireValue {
    WireValue::ParamMap(body.clone())
}

pub fn insert_request(table: &str, row: &Row) -> CommandRecord {
    CommandRecord::new(
        opcode::INSERT_REQ,
        vec![
            WireValue::Str(table.to_string()),
            key_value(&row.key),
            body_value(&row.body),
            WireValue::U64(row.generation),
            WireValue::Str(row.origin.clone()),
        ],
    )
}

pub fn insert_response(table: &str, row: &Row) -> CommandRecord {
    CommandRecord::new(
        opcode::INSERT_RES,
        vec![
            WireValue::Str(table.to_string()),
            key_value(&row.key),
            WireValue::U64(row.generation),
        ],
    )
}

pub fn modify_request(table: &str, row: &Row, column: &str) -> CommandRecord {
    CommandRecord::new(
        opcode::MODIFY_ATTR_REQ,
        vec![
            WireValue::Str(table.to_string()),
            key_value(&row.key),
            WireValue::Str(column.to_string()),
            row.body.get(column).cloned().unwrap_or(WireValue::Nil),
            WireValue::U64(row.generation),
            WireValue::Str(row.origin.clone()),
        ],
    )
}

pub fn remove_request(table: &str, row: &Row) -> CommandRecord {
    CommandRecord::new(
        opcode::REMOVE_REQ,
        vec![
            WireValue::Str(table.to_string()),
            key_value(&row.key),
            WireValue::Str(row.origin.clone()),
        ],
    )
}

pub fn clear_request(table: &str) -> CommandRecord {
    CommandRecord::new(opcode::CLEAR_REQ, vec![WireValue::Str(table.to_string())])
}

pub struct InsertRequest {
    pub table: String,
    pub key: Vec<WireValue>,
    pub body: Columns,
    pub gen: u64,
    pub source: String,
}

pub fn parse_insert_request(record: &CommandRecord) -> Option<InsertRequest> {
    Some(InsertRequest {
        table: record.arg(0)?.as_str()?.to_string(),
        key: match record.arg(1)? {
            WireValue::Tuple(t) => t.clone(),
            _ => return None,
        },
        body: match record.arg(2)? {
            WireValue::ParamMap(m) => m.clone(),
            _ => return None,
        },
        gen: match record.arg(3)? {
            WireValue::U64(v) => *v,
            _ => return None,
        },
        source: record.arg(4)?.as_str()?.to_string(),
    })
}

pub struct ModifyRequest {
    pub table: String,
    pub key: Vec<WireValue>,
    pub column: String,
    pub value: WireValue,
    pub source: String,
}

pub fn parse_modify_request(record: &CommandRecord) -> Option<ModifyRequest> {
    Some(ModifyRequest {
        table: record.arg(0)?.as_str()?.to_string(),
        key: match record.arg(1)? {
            WireValue::Tuple(t) => t.clone(),
            _ => return None,
        },
        column: record.arg(2)?.as_str()?.to_string(),
        value: record.arg(3)?.clone(),
        source: record.arg(5)?.as_str()?.to_string(),
    })
}

pub struct RemoveRequest {
    pub table: String,
    pub key: Vec<WireValue>,
    pub source: String,
}

pub fn parse_remove_request(record: &CommandRecord) -> Option<RemoveRequest> {
    Some(RemoveRequest {
        table: record.arg(0)?.as_str()?.to_string(),
        key: match record.arg(1)? {
            WireValue::Tuple(t) => t.clone(),
            _ => return None,
        },
        source: record.arg(2)?.as_str()?.to_string(),
    })
}

pub fn parse_clear_request(record: &CommandRecord) -> Option<String> {
    Some(record.arg(0)?.as_str()?.to_string())
}

/// Encodes a table change as the wire record a subscriber would receive.
/// `Modify` fans out to one record per changed column, matching
/// `db.req.modify.by.attr`'s single-column shape — the full row is not
/// re-sent for a one-column update.
pub fn event_to_records(table: &str, event: &ChangeEvent) -> Vec<CommandRecord> {
    match event {
        ChangeEvent::Insert(row) => vec![insert_request(table, row)],
        ChangeEvent::Modify(row) => row
            .body
            .keys()
            .map(|column| modify_request(table, row, column))
            .collect(),
        ChangeEvent::Erase(row) => vec![remove_request(table, row)],
        ChangeEvent::Clear => vec![clear_request(table)],
    }
}
