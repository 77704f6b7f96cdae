//! A single named table: a key→row map behind one mutex, a per-table
//! listener list, and the small operation set the cluster bus and the
//! gateway pipeline both drive it through. Ordering of rows on `for_each`
//! is the key's canonical encoding order, which is stable across runs of
//! the same process but is not meaningful outside it.
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use smf_common::codec::Encode;
use smf_common::Generation;
use smf_types::WireValue;

use crate::row::{Columns, Row};

fn encode_key(key: &[WireValue]) -> String {
    let tuple = WireValue::Tuple(key.to_vec());
    hex::encode(tuple.encode_to_vec())
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Insert(Row),
    Modify(Row),
    Erase(Row),
    Clear,
}

/// A listener is invoked synchronously, under the table's lock, with the
/// event and the origin-tag of the write that produced it. It must not call
/// back into the same table for a write — it may only read or enqueue work
/// for later, since the lock it runs under is already held.
pub type Listener = Box<dyn Fn(&ChangeEvent, &str) + Send + Sync>;

/// Handle returned by `add_listener`, needed to detach a subscription (a
/// session's table subscriptions must all be removable independently of one
/// another on unsubscribe or session teardown).
pub type ListenerId = u64;

#[derive(Debug, PartialEq, Eq)]
pub enum TableError {
    KeyExists,
    NotFound,
    ColumnNotFound(String),
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::KeyExists => write!(f, "key already exists"),
            TableError::NotFound => write!(f, "key not found"),
            TableError::ColumnNotFound(c) => write!(f, "column not found: {c}"),
        }
    }
}

impl std::error::Error for TableError {}

pub struct TableState {
    rows: BTreeMap<String, Row>,
}

impl TableState {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.values()
    }

    /// Direct mutation bypassing the table's own listener notification —
    /// for use inside `Registry::access` where the caller coordinates
    /// notification itself across the whole locked set, if at all.
    pub fn insert_raw(&mut self, key: &[WireValue], row: Row) {
        self.rows.insert(encode_key(key), row);
    }

    pub fn remove_raw(&mut self, key: &[WireValue]) -> Option<Row> {
        self.rows.remove(&encode_key(key))
    }

    pub fn get_raw(&self, key: &[WireValue]) -> Option<&Row> {
        self.rows.get(&encode_key(key))
    }
}

pub struct Table {
    name: String,
    state: Mutex<TableState>,
    listeners: Mutex<BTreeMap<ListenerId, Listener>>,
    next_listener_id: std::sync::atomic::AtomicU64,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Table {
            name: name.into(),
            state: Mutex::new(TableState {
                rows: BTreeMap::new(),
            }),
            listeners: Mutex::new(BTreeMap::new()),
            next_listener_id: std::sync::atomic::AtomicU64::new(1),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a listener and returns a handle to detach it later via
    /// `remove_listener`. Subscriptions are closed on unsubscribe or on
    /// session teardown, so callers must keep the handle.
    pub fn add_listener(&self, listener: Listener) -> ListenerId {
        let id = self
            .next_listener_id
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.listeners.lock().unwrap().insert(id, listener);
        id
    }

    /// Detaches a previously registered listener. A no-op if already removed.
    pub fn remove_listener(&self, id: ListenerId) {
        self.listeners.lock().unwrap().remove(&id);
    }

    fn notify(&self, event: &ChangeEvent, source: &str) {
        for listener in self.listeners.lock().unwrap().values() {
            listener(event, source);
        }
    }

    /// Fails if the key already exists. `gen` is taken as given, matching
    /// the wire protocol's `db.req.insert(table, key, data, gen, source)` —
    /// the originator (often a replicated peer) owns generation assignment.
    pub fn insert(
        &self,
        key: Vec<WireValue>,
        body: Columns,
        gen: Generation,
        source: &str,
    ) -> Result<(), TableError> {
        let encoded = encode_key(&key);
        let mut state = self.state.lock().unwrap();
        if state.rows.contains_key(&encoded) {
            return Err(TableError::KeyExists);
        }
        let row = Row::new(key, body, gen, source);
        state.rows.insert(encoded, row.clone());
        drop(state);
        self.notify(&ChangeEvent::Insert(row), source);
        Ok(())
    }

    /// Insert-or-update. On update, the generation is taken as the maximum
    /// of the supplied value and `existing + 1`, so a replicated merge can
    /// never move a key's generation backwards.
    pub fn merge(&self, key: Vec<WireValue>, body: Columns, gen: Generation, source: &str) {
        let encoded = encode_key(&key);
        let mut state = self.state.lock().unwrap();
        let next_gen = state
            .rows
            .get(&encoded)
            .map(|r| gen.max(r.generation + 1))
            .unwrap_or(gen);
        let row = Row::new(key, body, next_gen, source);
        let existed = state.rows.insert(encoded, row.clone()).is_some();
        drop(state);
        let event = if existed {
            ChangeEvent::Modify(row)
        } else {
            ChangeEvent::Insert(row)
        };
        self.notify(&event, source);
    }

    /// Updates a single column; the generation auto-increments regardless
    /// of what the caller supplies for other columns.
    pub fn modify(
        &self,
        key: &[WireValue],
        column: &str,
        value: WireValue,
        source: &str,
    ) -> Result<Generation, TableError> {
        let encoded = encode_key(key);
        let mut state = self.state.lock().unwrap();
        let row = state.rows.get_mut(&encoded).ok_or(TableError::NotFound)?;
        row.body.insert(column.to_string(), value);
        row.generation += 1;
        row.origin = source.to_string();
        let row = row.clone();
        drop(state);
        self.notify(&ChangeEvent::Modify(row.clone()), source);
        Ok(row.generation)
    }

    pub fn erase(&self, key: &[WireValue], source: &str) -> Result<Row, TableError> {
        let encoded = encode_key(key);
        let mut state = self.state.lock().unwrap();
        let row = state.rows.remove(&encoded).ok_or(TableError::NotFound)?;
        drop(state);
        self.notify(&ChangeEvent::Erase(row.clone()), source);
        Ok(row)
    }

    pub fn clear(&self, source: &str) {
        let mut state = self.state.lock().unwrap();
        state.rows.clear();
        drop(state);
        self.notify(&ChangeEvent::Clear, source);
    }

    pub fn lookup(&self, key: &[WireValue]) -> Option<Row> {
        let encoded = encode_key(key);
        self.state.lock().unwrap().rows.get(&encoded).cloned()
    }

    pub fn find_first<P: Fn(&Row) -> bool>(&self, predicate: P) -> Option<Row> {
        self.state
            .lock()
            .unwrap()
            .rows
            .values()
            .find(|r| predicate(r))
            .cloned()
    }

    pub fn find_all<P: Fn(&Row) -> bool>(&self, predicate: P) -> Vec<Row> {
        self.state
            .lock()
            .unwrap()
            .rows
            .values()
            .filter(|r| predicate(r))
            .cloned()
            .collect()
    }

    /// Ordered iteration; `visitor` returns whether iteration should
    /// continue, matching the bridge/mirroring use case where a caller
    /// stops early once it has found what it needs.
    pub fn for_each<V: FnMut(&Row) -> bool>(&self, mut visitor: V) {
        for row in self.state.lock().unwrap().rows.values() {
            if !visitor(row) {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn key(n: i64) -> Vec<WireValue> {
        vec![WireValue::I64(n)]
    }

    fn body(name: &str) -> Columns {
        let mut b = Columns::new();
        b.insert("name".to_string(), WireValue::Str(name.to_string()));
        b
    }

    #[test]
    fn insert_then_duplicate_insert_fails() {
        let t = Table::new("TDevice");
        t.insert(key(1), body("m1"), 1, "master").unwrap();
        assert_eq!(
            t.insert(key(1), body("m1again"), 1, "master").unwrap_err(),
            TableError::KeyExists
        );
    }

    #[test]
    fn modify_increments_generation() {
        let t = Table::new("TDevice");
        t.insert(key(1), body("m1"), 1, "master").unwrap();
        let gen = t
            .modify(&key(1), "name", WireValue::Str("m1'".into()), "nodeA")
            .unwrap();
        assert_eq!(gen, 2);
        let row = t.lookup(&key(1)).unwrap();
        assert_eq!(row.column("name"), Some(&WireValue::Str("m1'".into())));
        assert_eq!(row.origin, "nodeA");
    }

    #[test]
    fn erase_removes_row_and_notifies() {
        let t = Table::new("TDevice");
        let events: Arc<Mutex<Vec<ChangeEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        t.add_listener(Box::new(move |event, _source| {
            events_clone.lock().unwrap().push(event.clone());
        }));
        t.insert(key(1), body("m1"), 1, "master").unwrap();
        t.erase(&key(1), "master").unwrap();
        assert!(t.lookup(&key(1)).is_none());
        let events = events.lock().unwrap();
        assert!(matches!(events[0], ChangeEvent::Insert(_)));
        assert!(matches!(events[1], ChangeEvent::Erase(_)));
    }

    #[test]
    fn listeners_observe_monotonically_increasing_generations() {
        let t = Table::new("TDevice");
        let seen: Arc<Mutex<Vec<Generation>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        t.add_listener(Box::new(move |event, _source| {
            let gen = match event {
                ChangeEvent::Insert(r) | ChangeEvent::Modify(r) | ChangeEvent::Erase(r) => {
                    Some(r.generation)
                }
                ChangeEvent::Clear => None,
            };
            if let Some(g) = gen {
                seen_clone.lock().unwrap().push(g);
            }
        }));
        t.insert(key(1), body("m1"), 1, "master").unwrap();
        for _ in 0..5 {
            t.modify(&key(1), "name", WireValue::Str("x".into()), "nodeA")
                .unwrap();
        }
        let seen = seen.lock().unwrap();
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn find_all_filters_by_predicate() {
        let t = Table::new("TDevice");
        t.insert(key(1), body("m1"), 1, "master").unwrap();
        t.insert(key(2), body("m2"), 1, "master").unwrap();
        let found = t.find_all(|r| r.column("name") == Some(&WireValue::Str("m2".into())));
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn removed_listener_stops_observing_events() {
        let t = Table::new("TDevice");
        let seen = Arc::new(Mutex::new(0usize));
        let seen_clone = seen.clone();
        let id = t.add_listener(Box::new(move |_event, _source| {
            *seen_clone.lock().unwrap() += 1;
        }));
        t.insert(key(1), body("m1"), 1, "master").unwrap();
        t.remove_listener(id);
        t.modify(&key(1), "name", WireValue::Str("m1'".into()), "master")
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[test]
    fn for_each_can_stop_early() {
        let t = Table::new("TDevice");
        for i in 0..10 {
            t.insert(key(i), body("m"), 1, "master").unwrap();
        }
        let visited = AtomicUsize::new(0);
        t.for_each(|_row| {
            visited.fetch_add(1, Ordering::SeqCst);
            visited.load(Ordering::SeqCst) < 3
        });
        assert_eq!(visited.load(Ordering::SeqCst), 3);
    }
}
