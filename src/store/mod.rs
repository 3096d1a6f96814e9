//! The flat, identity-addressed record store normalization writes into.
//!
//! The store itself is the only shared mutable resource of the system. A
//! normalization pass never mutates it directly: writes are staged in a
//! [`MutationBuffer`] and committed record by record only when the pass
//! succeeds, so an aborted pass leaves no partial mutation behind.

mod record;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;

pub use record::{
    generate_client_id, DataId, Record, StoreValue, ACTOR_IDENTIFIER_KEY, ID_KEY,
    INVALIDATED_AT_KEY, ROOT_ID, ROOT_TYPE, TYPENAME_KEY,
};
pub(crate) use record::{discriminator_key, linked_record_id};

use crate::error::{NormalizeError, PayloadShape};

/// An in-memory record store.
///
/// Records are sharded by identifier; concurrent passes committing unrelated
/// records do not contend, and the merge of a single record is atomic with
/// respect to other writers.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<DataId, Record>,
    invalidation_epoch: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of one record, if it exists.
    pub fn record(&self, id: &DataId) -> Option<Record> {
        self.records.get(id).map(|r| r.clone())
    }

    pub fn contains(&self, id: &DataId) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Mark a record as invalidated at the next invalidation epoch. The
    /// store's retention policy is an external collaborator; this only
    /// records the fact.
    pub fn mark_invalidated(&self, id: &DataId) {
        let epoch = self.invalidation_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.records
            .entry(id.clone())
            .or_default()
            .set(INVALIDATED_AT_KEY, StoreValue::scalar(epoch));
    }

    fn merge(&self, id: DataId, staged: Record) {
        // the entry guard keeps the record locked for the whole merge
        match self.records.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(mut entry) => {
                entry.get_mut().merge_from(staged)
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(staged);
            }
        }
    }
}

/// Staged writes for one normalization pass.
///
/// Reads go through to the committed store so merges see prior data, but
/// nothing is visible to other readers until [`MutationBuffer::commit`].
pub struct MutationBuffer {
    store: Arc<MemoryStore>,
    staged: IndexMap<DataId, Record>,
}

impl MutationBuffer {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            staged: IndexMap::new(),
        }
    }

    fn record_mut(&mut self, id: &DataId) -> &mut Record {
        if !self.staged.contains_key(id) {
            let seed = self.store.record(id).unwrap_or_default();
            self.staged.insert(id.clone(), seed);
        }
        self.staged
            .get_mut(id)
            .expect("the record was staged just above")
    }

    /// The staged value for a field, falling back to the committed store.
    pub(crate) fn field(&self, id: &DataId, storage_key: &str) -> Option<StoreValue> {
        if let Some(record) = self.staged.get(id) {
            if let Some(value) = record.get(storage_key) {
                return Some(value.clone());
            }
        }
        self.store.record(id)?.get(storage_key).cloned()
    }

    pub fn write_field(&mut self, id: &DataId, storage_key: impl Into<String>, value: StoreValue) {
        self.record_mut(id).set(storage_key, value);
    }

    /// Record that a linked field was absent from the payload, unless a
    /// value (even an explicit null) is already known for it.
    pub fn write_missing(&mut self, id: &DataId, storage_key: &str) {
        if self.field(id, storage_key).is_none() {
            self.record_mut(id)
                .set_if_absent(storage_key, StoreValue::Missing);
        }
    }

    pub fn write_link(&mut self, id: &DataId, storage_key: impl Into<String>, target: Option<DataId>) {
        let value = match target {
            Some(target) => StoreValue::Ref { id: target },
            None => StoreValue::Null,
        };
        self.record_mut(id).set(storage_key, value);
    }

    /// Replace a plural reference list wholesale. Prior lists of a different
    /// length are truncated or extended to the new one.
    pub fn write_link_list(
        &mut self,
        id: &DataId,
        storage_key: impl Into<String>,
        targets: Vec<Option<DataId>>,
    ) {
        self.record_mut(id)
            .set(storage_key, StoreValue::RefList { ids: targets });
    }

    /// Place one reference at `index` of a plural field, extending the list
    /// with null references as needed and leaving earlier indices untouched.
    pub fn set_link_at(
        &mut self,
        id: &DataId,
        storage_key: &str,
        index: usize,
        target: Option<DataId>,
    ) -> Result<(), NormalizeError> {
        let mut ids = match self.field(id, storage_key) {
            Some(StoreValue::RefList { ids }) => ids,
            None | Some(StoreValue::Missing) | Some(StoreValue::Null) => Vec::new(),
            Some(_) => {
                return Err(NormalizeError::ShapeMismatch {
                    storage_key: storage_key.to_string(),
                    expected: PayloadShape::List,
                    actual: PayloadShape::Scalar,
                })
            }
        };
        if ids.len() <= index {
            ids.resize(index + 1, None);
        }
        ids[index] = target;
        self.record_mut(id).set(storage_key, StoreValue::RefList { ids });
        Ok(())
    }

    /// The identifiers staged so far, in first-touch order.
    pub fn touched(&self) -> Vec<DataId> {
        self.staged.keys().cloned().collect()
    }

    /// Apply every staged record to the store, one record at a time.
    pub fn commit(self) -> Vec<DataId> {
        let touched: Vec<DataId> = self.staged.keys().cloned().collect();
        for (id, record) in self.staged {
            self.store.merge(id, record);
        }
        touched
    }
}
