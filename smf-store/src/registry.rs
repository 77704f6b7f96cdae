//! The node-wide table registry: declares the named tables a role needs and
//! provides `access`, the one operation that crosses table boundaries.
use std::collections::BTreeMap;
use std::sync::{Arc, MutexGuard};

use crate::table::{Table, TableState};

pub struct Registry {
    tables: BTreeMap<String, Arc<Table>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            tables: BTreeMap::new(),
        }
    }

    pub fn declare(&mut self, name: &str) -> Arc<Table> {
        self.tables
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Table::new(name)))
            .clone()
    }

    pub fn table(&self, name: &str) -> Option<Arc<Table>> {
        self.tables.get(name).cloned()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(|s| s.as_str())
    }

    /// Acquires every table named in `names` and invokes `f` with one guard
    /// per table, in the same order as `names` was given. Locks are taken
    /// in table-name order regardless of the order `names` lists them, so
    /// two callers requesting overlapping sets can never deadlock against
    /// each other.
    pub fn access<R>(
        &self,
        names: &[&str],
        f: impl FnOnce(&mut [MutexGuard<'_, TableState>]) -> R,
    ) -> Option<R> {
        let tables: Vec<Arc<Table>> = names
            .iter()
            .map(|n| self.table(n))
            .collect::<Option<_>>()?;

        let mut lock_order: Vec<usize> = (0..tables.len()).collect();
        lock_order.sort_by(|&a, &b| tables[a].name().cmp(tables[b].name()));

        let mut guards_by_position: Vec<Option<MutexGuard<'_, TableState>>> =
            (0..tables.len()).map(|_| None).collect();
        for idx in lock_order {
            guards_by_position[idx] = Some(tables[idx].lock_state());
        }

        let mut ordered_guards: Vec<MutexGuard<'_, TableState>> = guards_by_position
            .into_iter()
            .map(|g| g.expect("every table was locked exactly once"))
            .collect();

        Some(f(&mut ordered_guards))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
