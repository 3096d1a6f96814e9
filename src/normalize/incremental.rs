//! Deferred and streamed fulfillment.
//!
//! A defer or stream selection reached during a pass registers a pending
//! entry keyed by label and response path. Incremental payloads arriving
//! later resume normalization from that entry, against the record it was
//! registered for, so the converged store is the one a non-incremental
//! delivery of the same data would have produced.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;

use crate::error::{NormalizeError, NormalizeFailure, PayloadShape};
use crate::json_ext::{Object, Path, PathElement};
use crate::payload::IncrementalPayload;
use crate::spec::{self, Selection};
use crate::store::DataId;

use super::{shape_of, Ctx, Normalized, Normalizer, Pass};

/// Pending registrations are addressed by label plus the response path the
/// registering selection was reached at, so the same labeled fragment on two
/// sibling objects stays distinct.
pub(crate) type IncrementalKey = (String, Path);

pub(crate) enum PendingKind {
    /// Awaits exactly one payload carrying the deferred object fields.
    Defer,

    /// Awaits any number of item payloads; `applied` holds the indices
    /// already placed, so replayed items are ignored.
    Stream { applied: HashSet<usize> },
}

pub(crate) struct PendingIncremental {
    pub(crate) kind: PendingKind,
    pub(crate) selections: Vec<Selection>,
    pub(crate) variables: Object,
    pub(crate) client_abstract_types: IndexMap<String, Vec<String>>,
    pub(crate) record: DataId,
    pub(crate) typename: Option<String>,
    pub(crate) actor: Option<String>,
}

#[derive(Default)]
pub(crate) struct IncrementalState {
    pending: Mutex<HashMap<IncrementalKey, PendingIncremental>>,
}

impl IncrementalState {
    fn lock(&self) -> MutexGuard<'_, HashMap<IncrementalKey, PendingIncremental>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn register(&self, entries: Vec<(IncrementalKey, PendingIncremental)>) {
        if entries.is_empty() {
            return;
        }
        let mut pending = self.lock();
        for (key, entry) in entries {
            if pending.contains_key(&key) {
                tracing::warn!(
                    label = key.0.as_str(),
                    path = %key.1,
                    "label already registered at this path; keeping the first registration"
                );
                continue;
            }
            pending.insert(key, entry);
        }
    }

    fn take(&self, key: &IncrementalKey) -> Option<PendingIncremental> {
        self.lock().remove(key)
    }

    fn put_back(&self, key: IncrementalKey, entry: PendingIncremental) {
        self.lock().insert(key, entry);
    }

    fn remove(&self, key: &IncrementalKey) -> bool {
        self.lock().remove(key).is_some()
    }

    fn labels(&self) -> Vec<(String, Path)> {
        let mut labels: Vec<_> = self.lock().keys().cloned().collect();
        labels.sort();
        labels
    }
}

impl Normalizer {
    /// Normalize one incremental payload against its pending registration.
    ///
    /// Returns `Ok(None)` for payloads with no matching registration
    /// (late or replayed deliveries), which are logged and ignored. A
    /// failing payload leaves its registration in place, so the transport
    /// may redeliver it.
    #[tracing::instrument(skip_all, level = "trace")]
    pub fn normalize_incremental(
        &self,
        payload: &IncrementalPayload,
    ) -> Result<Option<Normalized>, NormalizeFailure> {
        let key = (payload.label.clone(), payload.path.clone());
        let entry = match self.incremental.take(&key) {
            Some(entry) => entry,
            None => {
                tracing::warn!(
                    label = payload.label.as_str(),
                    path = %payload.path,
                    "no pending selection for incremental payload, ignoring it"
                );
                return Ok(None);
            }
        };
        match &entry.kind {
            PendingKind::Defer => self.fulfill_defer(key, entry, payload),
            PendingKind::Stream { .. } => self.fulfill_stream_item(key, entry, payload),
        }
    }

    fn fulfill_defer(
        &self,
        key: IncrementalKey,
        entry: PendingIncremental,
        payload: &IncrementalPayload,
    ) -> Result<Option<Normalized>, NormalizeFailure> {
        let object = match payload.data.as_object() {
            Some(object) => object,
            None => {
                let shape = shape_of(Some(&payload.data));
                self.incremental.put_back(key, entry);
                return Err(NormalizeError::ShapeMismatch {
                    storage_key: payload.label.clone(),
                    expected: PayloadShape::Object,
                    actual: shape,
                }
                .into());
            }
        };
        let result = self.resume_pass(
            &entry.selections,
            &entry.variables,
            &entry.client_abstract_types,
            &entry.record,
            entry.typename.as_deref(),
            entry.actor.as_deref(),
            &payload.path,
            object,
        );
        match result {
            // a fulfilled defer is done; later payloads for it are replays
            Ok(normalized) => Ok(Some(normalized)),
            Err(failure) => {
                self.incremental.put_back(key, entry);
                Err(failure)
            }
        }
    }

    fn fulfill_stream_item(
        &self,
        key: IncrementalKey,
        mut entry: PendingIncremental,
        payload: &IncrementalPayload,
    ) -> Result<Option<Normalized>, NormalizeFailure> {
        let index = match payload.index {
            Some(index) => index,
            None => {
                self.incremental.put_back(key, entry);
                return Err(NormalizeError::ShapeMismatch {
                    storage_key: payload.label.clone(),
                    expected: PayloadShape::Scalar,
                    actual: PayloadShape::Missing,
                }
                .into());
            }
        };
        if let PendingKind::Stream { applied } = &entry.kind {
            if applied.contains(&index) {
                tracing::warn!(
                    label = payload.label.as_str(),
                    index,
                    "streamed item was already applied, ignoring the replay"
                );
                self.incremental.put_back(key, entry);
                return Ok(None);
            }
        }

        let field = entry.selections.iter().find_map(|selection| match selection {
            Selection::LinkedField(field) if field.plural => Some(field),
            _ => None,
        });
        let field = match field {
            Some(field) => field.clone(),
            None => {
                self.incremental.put_back(key, entry);
                return Err(NormalizeError::InvalidDocument {
                    reason: "stream selection has no plural linked field to place items into"
                        .to_string(),
                }
                .into());
            }
        };

        let store = match entry.actor.as_deref() {
            Some(actor) => self.registry.store_for(actor),
            None => self.store.clone(),
        };
        let mut pass = Pass::new(
            store,
            entry.actor.clone(),
            self.registry.clone(),
            entry.client_abstract_types.clone(),
        );
        let ctx = Ctx {
            buffer: 0,
            record: entry.record.clone(),
            typename: entry.typename.clone(),
            lenient: false,
        };
        let mut path = payload.path.clone();
        path.push(PathElement::Key(field.response_key().to_string()));
        path.push(PathElement::Index(index));

        let result = (|| {
            let object = payload
                .data
                .as_object()
                .ok_or_else(|| NormalizeError::ShapeMismatch {
                    storage_key: payload.label.clone(),
                    expected: PayloadShape::Object,
                    actual: shape_of(Some(&payload.data)),
                })?;
            let storage_key = spec::field_storage_key(
                &field.name,
                field.storage_key.as_deref(),
                &field.args,
                &entry.variables,
            )?;
            let id = pass.normalize_linked_object(
                &field,
                &storage_key,
                &entry.variables,
                &ctx,
                object,
                Some(index),
                &mut path,
            )?;
            pass.buffer(0)
                .set_link_at(&entry.record, &storage_key, index, Some(id))
        })();

        match result {
            Ok(()) => {
                if let PendingKind::Stream { applied } = &mut entry.kind {
                    applied.insert(index);
                }
                // the stream stays registered; more items may follow
                self.incremental.put_back(key, entry);
                self.finish_pass(pass, Ok(())).map(Some)
            }
            Err(error) => {
                let touched = pass.touched_staged();
                self.incremental.put_back(key, entry);
                Err(NormalizeFailure { error, touched })
            }
        }
    }

    /// The labels still awaiting incremental payloads, with the paths they
    /// were registered at.
    pub fn pending_incremental(&self) -> Vec<(String, Path)> {
        self.incremental.labels()
    }

    /// Drop the registration for `label` at `path`, e.g. when the transport
    /// signals the server will not deliver it. Returns whether a
    /// registration existed.
    pub fn abandon(&self, label: &str, path: &Path) -> bool {
        self.incremental.remove(&(label.to_string(), path.clone()))
    }
}
