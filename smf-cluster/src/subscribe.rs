//! Subscription: `bus.req.subscribe(table, session-tag, task-id?)` causes a
//! snapshot (one `bus.res.subscribe` per current row) followed by a live
//! listener that forwards every later insert/modify/erase/clear as a
//! mutation-protocol record (§4.1). The listener never forwards a write
//! back to the session that originated it — that session already has the
//! row locally and gets its `db.res.*` acknowledgement through the normal
//! request/response path instead.
use std::sync::Arc;

use smf_store::Table;
use smf_types::WireValue;

use crate::mutation::event_to_records;
use crate::opcode;
use crate::record::CommandRecord;

pub fn subscribe_request(table: &str, session_tag: &str, task_id: Option<u64>) -> CommandRecord {
    CommandRecord::new(
        opcode::SUBSCRIBE_REQ,
        vec![
            WireValue::Str(table.to_string()),
            WireValue::Str(session_tag.to_string()),
            task_id.map(WireValue::U64).unwrap_or(WireValue::Nil),
        ],
    )
}

/// Returns `(table, session_tag, task_id)` from a decoded
/// `bus.req.subscribe` record.
pub fn subscribe_request_from_record(record: &CommandRecord) -> Option<(String, String, Option<u64>)> {
    let table = record.arg(0)?.as_str()?.to_string();
    let tag = record.arg(1)?.as_str()?.to_string();
    let task_id = match record.arg(2)? {
        WireValue::U64(v) => Some(*v),
        WireValue::Nil => None,
        _ => return None,
    };
    Some((table, tag, task_id))
}

pub fn subscribe_response(table: &str, row: &smf_store::Row) -> CommandRecord {
    CommandRecord::new(
        opcode::SUBSCRIBE_RES,
        vec![
            WireValue::Str(table.to_string()),
            WireValue::Tuple(row.key.clone()),
            WireValue::ParamMap(row.body.clone()),
            WireValue::U64(row.generation),
        ],
    )
}

/// A single subscriber's attachment to one table: the listener id needed to
/// detach it again (unsubscribe, or session teardown).
pub struct Subscription {
    table: Arc<Table>,
    listener_id: smf_store::table::ListenerId,
}

impl Subscription {
    /// Sends the initial snapshot through `sink`, then attaches a listener
    /// that forwards subsequent deltas, skipping writes whose origin is
    /// `session_tag` itself.
    pub fn attach(
        table: Arc<Table>,
        session_tag: &str,
        sink: impl Fn(CommandRecord) + Send + Sync + 'static,
    ) -> Subscription {
        let table_name = table.name().to_string();
        table.for_each(|row| {
            sink(subscribe_response(&table_name, row));
            true
        });

        let session_tag = session_tag.to_string();
        let listener_id = table.add_listener(Box::new(move |event, source| {
            if source == session_tag {
                return;
            }
            for record in event_to_records(&table_name, event) {
                sink(record);
            }
        }));

        Subscription { table, listener_id }
    }

    pub fn detach(self) {
        self.table.remove_listener(self.listener_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smf_store::Columns;
    use std::sync::Mutex;

    #[test]
    fn subscribe_request_round_trips_through_parse() {
        let record = subscribe_request("TDevice", "nodeA", Some(7));
        let (table, tag, task_id) = subscribe_request_from_record(&record).unwrap();
        assert_eq!(table, "TDevice");
        assert_eq!(tag, "nodeA");
        assert_eq!(task_id, Some(7));
    }

    #[test]
    fn attach_snapshots_existing_rows_first() {
        let table = Arc::new(Table::new("TDevice"));
        table
            .insert(vec![WireValue::U64(1)], Columns::new(), 1, "master")
            .unwrap();

        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        let sub = Subscription::attach(table.clone(), "nodeA", move |record| {
            received_clone.lock().unwrap().push(record);
        });

        let seen = received.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].opcode, opcode::SUBSCRIBE_RES);
        drop(seen);
        sub.detach();
    }

    #[test]
    fn subsequent_deltas_are_forwarded_except_own_writes() {
        let table = Arc::new(Table::new("TDevice"));
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        let sub = Subscription::attach(table.clone(), "nodeA", move |record| {
            received_clone.lock().unwrap().push(record);
        });

        table
            .insert(vec![WireValue::U64(1)], Columns::new(), 1, "nodeA")
            .unwrap();
        table
            .insert(vec![WireValue::U64(2)], Columns::new(), 1, "nodeB")
            .unwrap();

        let seen = received.lock().unwrap();
        assert_eq!(seen.len(), 1, "nodeA's own write must not echo back");
        assert_eq!(seen[0].opcode, opcode::INSERT_REQ);
        drop(seen);
        sub.detach();
    }

    #[test]
    fn detach_stops_further_forwarding() {
        let table = Arc::new(Table::new("TDevice"));
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        let sub = Subscription::attach(table.clone(), "nodeA", move |record| {
            received_clone.lock().unwrap().push(record);
        });
        sub.detach();
        table
            .insert(vec![WireValue::U64(1)], Columns::new(), 1, "nodeB")
            .unwrap();
        assert!(received.lock().unwrap().is_empty());
    }
}
