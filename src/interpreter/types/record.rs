//! Records: ordered name -> variable namespaces
//!
//! Every record a process uses lives in its [`RecordStore`] and is addressed
//! by [`RecordId`]. Ids come from a counter owned by the store, so processes
//! never share identity state and the whole store serializes verbatim.
//!
//! A frame's record is dropped when the frame returns unless it was pinned.
//! Pinned records are reclaimed by [`RecordStore::collect`] once nothing
//! live reaches them.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::values::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub u64);

/// A named, mutable value slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub value: Value,
}

/// One namespace (module scope, function locals)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    /// Enclosing namespace consulted when a name is not found here
    pub parent: Option<RecordId>,
    variables: Vec<Variable>,
    /// Captured by a closure or aliased by a reference; outlives its frame
    pinned: bool,
}

impl Record {
    pub fn new(parent: Option<RecordId>) -> Self {
        Self {
            parent,
            variables: Vec::new(),
            pinned: false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables
            .iter()
            .find(|var| var.name == name)
            .map(|var| &var.value)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.variables
            .iter_mut()
            .find(|var| var.name == name)
            .map(|var| &mut var.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Create or overwrite `name` in this record
    pub fn define(&mut self, name: &str, value: Value) {
        match self.get_mut(name) {
            Some(slot) => *slot = value,
            None => self.variables.push(Variable {
                name: name.to_string(),
                value,
            }),
        }
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }
}

/* ===================== Record Store ===================== */

/// Store size below which no collection runs
const MIN_COLLECT_THRESHOLD: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordStore {
    next_id: u64,
    records: BTreeMap<RecordId, Record>,
    /// Size that triggers the next collection
    collect_at: usize,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self {
            next_id: 0,
            records: BTreeMap::new(),
            collect_at: MIN_COLLECT_THRESHOLD,
        }
    }
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, parent: Option<RecordId>) -> RecordId {
        let id = RecordId(self.next_id);
        self.next_id += 1;
        self.records.insert(id, Record::new(parent));
        id
    }

    /// Id the next allocation will use; every stored id is below it
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.get(&id)
    }

    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut Record> {
        self.records.get_mut(&id)
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn pin(&mut self, id: RecordId) {
        if let Some(record) = self.records.get_mut(&id) {
            record.pinned = true;
        }
    }

    /// Drop a frame's record unless something still points into it
    pub fn release(&mut self, id: RecordId) {
        if self.records.get(&id).is_some_and(|r| !r.pinned) {
            self.records.remove(&id);
        }
    }

    /// First record on the parent chain starting at `start` that defines `name`
    pub fn resolve(&self, start: RecordId, name: &str) -> Option<RecordId> {
        let mut cursor = Some(start);
        while let Some(id) = cursor {
            let record = self.records.get(&id)?;
            if record.contains(name) {
                return Some(id);
            }
            cursor = record.parent;
        }
        None
    }

    /// The store has grown enough since the last collection to run another
    pub fn should_collect(&self) -> bool {
        self.records.len() >= self.collect_at
    }

    /// Drop every record not reachable from `roots` or the records `values` point at
    ///
    /// Reachability follows parents, references and closure scopes. Returns
    /// the number of records freed.
    pub fn collect<'v>(
        &mut self,
        roots: impl IntoIterator<Item = RecordId>,
        values: impl IntoIterator<Item = &'v Value>,
    ) -> usize {
        let mut pending: Vec<RecordId> = roots.into_iter().collect();
        for value in values {
            value.record_ids(&mut pending);
        }

        let mut live = BTreeSet::new();
        while let Some(id) = pending.pop() {
            if !live.insert(id) {
                continue;
            }
            let Some(record) = self.records.get(&id) else {
                continue;
            };
            pending.extend(record.parent);
            for var in &record.variables {
                var.value.record_ids(&mut pending);
            }
        }

        let before = self.records.len();
        self.records.retain(|id, _| live.contains(id));
        self.collect_at = (self.records.len() * 2).max(MIN_COLLECT_THRESHOLD);
        before - self.records.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecordId, &Record)> {
        self.records.iter().map(|(id, record)| (*id, record))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::types::{FuncId, Function, Reference};

    #[test]
    fn test_record_keeps_definition_order() {
        let mut record = Record::new(None);
        record.define("b", Value::Number(1.0));
        record.define("a", Value::Number(2.0));
        record.define("b", Value::Number(3.0));

        let names: Vec<&str> = record.variables().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(record.get("b"), Some(&Value::Number(3.0)));
    }

    #[test]
    fn test_resolve_walks_parent_chain() {
        let mut store = RecordStore::new();
        let global = store.allocate(None);
        let local = store.allocate(Some(global));
        store.get_mut(global).unwrap().define("g", Value::None);
        store.get_mut(local).unwrap().define("l", Value::None);

        assert_eq!(store.resolve(local, "g"), Some(global));
        assert_eq!(store.resolve(local, "l"), Some(local));
        assert_eq!(store.resolve(global, "l"), None);
    }

    #[test]
    fn test_collect_keeps_reachable_records() {
        let mut store = RecordStore::new();
        let global = store.allocate(None);
        let scope = store.allocate(Some(global));
        let aliased = store.allocate(None);
        let garbage = store.allocate(Some(global));
        let only_held = store.allocate(None);

        store.get_mut(global).unwrap().define(
            "f",
            Value::Array(vec![Value::Function(Function::Script {
                def: FuncId(0),
                scope,
                name: "f".to_string(),
            })]),
        );
        store.get_mut(scope).unwrap().define(
            "r",
            Value::Reference(Reference {
                record: aliased,
                name: "x".to_string(),
            }),
        );
        let held = Value::Reference(Reference {
            record: only_held,
            name: "y".to_string(),
        });

        let freed = store.collect([global], [&held]);
        assert_eq!(freed, 1);
        assert!(!store.contains(garbage));
        for id in [global, scope, aliased, only_held] {
            assert!(store.contains(id), "{:?} should survive", id);
        }
    }

    #[test]
    fn test_collect_threshold_tracks_live_size() {
        let mut store = RecordStore::new();
        let global = store.allocate(None);
        assert!(!store.should_collect());

        for _ in 0..MIN_COLLECT_THRESHOLD {
            let id = store.allocate(Some(global));
            store.pin(id);
        }
        assert!(store.should_collect());

        store.collect([global], std::iter::empty());
        assert_eq!(store.len(), 1);
        assert!(!store.should_collect());
    }

    #[test]
    fn test_release_keeps_pinned_records() {
        let mut store = RecordStore::new();
        let a = store.allocate(None);
        let b = store.allocate(None);
        store.pin(b);
        store.release(a);
        store.release(b);

        assert!(!store.contains(a));
        assert!(store.contains(b));
        // Ids are never reused
        assert_eq!(store.allocate(None), RecordId(2));
    }
}
