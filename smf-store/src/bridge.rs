//! The SQL-mirror bridge: a narrow adapter a persistence backend implements
//! so that any table in the registry can be mirrored to a row store without
//! the store crate knowing anything about SQL dialects (a full SQL surface
//! is explicitly out of scope; this is a four-verb interface).
use smf_common::error::CommonError;

use crate::row::{Columns, Row};
use crate::table::ChangeEvent;

pub trait Bridge: Send + Sync {
    fn create_table(&self, table: &str, columns: &[&str]) -> Result<(), CommonError>;
    fn insert(&self, table: &str, row: &Row) -> Result<(), CommonError>;
    fn update_column(&self, table: &str, key: &[smf_types::WireValue], column: &str) -> Result<(), CommonError>;
    fn remove(&self, table: &str, key: &[smf_types::WireValue]) -> Result<(), CommonError>;
    /// Streams every currently persisted row for `table` into `visitor`, in
    /// whatever order the backend finds convenient.
    fn for_each(&self, table: &str, visitor: &mut dyn FnMut(&Row)) -> Result<(), CommonError>;
}

/// A bridge that mirrors nothing, for roles and tests that run without
/// persistence — matches the teacher's `PubSubBroker::noop` pattern of a
/// zero-cost stand-in rather than an `Option<Bridge>` threaded everywhere.
pub struct NullBridge;

impl Bridge for NullBridge {
    fn create_table(&self, _table: &str, _columns: &[&str]) -> Result<(), CommonError> {
        Ok(())
    }

    fn insert(&self, _table: &str, _row: &Row) -> Result<(), CommonError> {
        Ok(())
    }

    fn update_column(
        &self,
        _table: &str,
        _key: &[smf_types::WireValue],
        _column: &str,
    ) -> Result<(), CommonError> {
        Ok(())
    }

    fn remove(&self, _table: &str, _key: &[smf_types::WireValue]) -> Result<(), CommonError> {
        Ok(())
    }

    fn for_each(&self, _table: &str, _visitor: &mut dyn FnMut(&Row)) -> Result<(), CommonError> {
        Ok(())
    }
}

/// Wires a bridge up to a table's listeners: insert/modify/erase/clear map
/// onto the four bridge verbs. `modify` only carries the changed column
/// onward since the bridge interface updates one column at a time.
pub fn mirror(table: &crate::table::Table, bridge: std::sync::Arc<dyn Bridge>) {
    let table_name = table.name().to_string();
    table.add_listener(Box::new(move |event, _source| match event {
        ChangeEvent::Insert(row) => {
            let _ = bridge.insert(&table_name, row);
        }
        ChangeEvent::Modify(row) => {
            for column in changed_columns(row) {
                let _ = bridge.update_column(&table_name, &row.key, &column);
            }
        }
        ChangeEvent::Erase(row) => {
            let _ = bridge.remove(&table_name, &row.key);
        }
        ChangeEvent::Clear => {}
    }));
}

fn changed_columns(row: &Row) -> Vec<String> {
    row.body.keys().cloned().collect()
}

#[allow(dead_code)]
fn _assert_columns_type(_c: &Columns) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Table;
    use smf_types::WireValue;
    use std::sync::{Arc, Mutex};

    struct RecordingBridge {
        inserted: Mutex<Vec<String>>,
    }

    impl Bridge for RecordingBridge {
        fn create_table(&self, _table: &str, _columns: &[&str]) -> Result<(), CommonError> {
            Ok(())
        }
        fn insert(&self, table: &str, _row: &Row) -> Result<(), CommonError> {
            self.inserted.lock().unwrap().push(table.to_string());
            Ok(())
        }
        fn update_column(
            &self,
            _table: &str,
            _key: &[WireValue],
            _column: &str,
        ) -> Result<(), CommonError> {
            Ok(())
        }
        fn remove(&self, _table: &str, _key: &[WireValue]) -> Result<(), CommonError> {
            Ok(())
        }
        fn for_each(&self, _table: &str, _visitor: &mut dyn FnMut(&Row)) -> Result<(), CommonError> {
            Ok(())
        }
    }

    #[test]
    fn mirror_forwards_inserts_to_bridge() {
        let table = Table::new("TDevice");
        let bridge = Arc::new(RecordingBridge {
            inserted: Mutex::new(Vec::new()),
        });
        mirror(&table, bridge.clone());
        table
            .insert(vec![WireValue::I64(1)], Columns::new(), 1, "master")
            .unwrap();
        assert_eq!(bridge.inserted.lock().unwrap().as_slice(), ["TDevice"]);
    }

    #[test]
    fn null_bridge_never_errors() {
        let b = NullBridge;
        assert!(b.create_table("x", &[]).is_ok());
        assert!(b.insert("x", &Row::new(vec![], Columns::new(), 1, "m")).is_ok());
    }
}
