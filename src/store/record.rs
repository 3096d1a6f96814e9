use std::fmt;

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::Value;

use crate::json_ext::Object;

/// The data identifier of the root record of a store.
pub const ROOT_ID: &str = "client:root";

/// The concrete type recorded for root records.
pub const ROOT_TYPE: &str = "__Root";

/// The storage key a record's concrete type is kept under.
pub const TYPENAME_KEY: &str = "__typename";

/// The payload field carrying an object's identifying value.
pub const ID_KEY: &str = "id";

/// The payload field naming the actor a subtree belongs to.
pub const ACTOR_IDENTIFIER_KEY: &str = "actor_key";

/// The storage key invalidation epochs are kept under.
pub const INVALIDATED_AT_KEY: &str = "__invalidated_at";

const CLIENT_ID_PREFIX: &str = "client:";
const DISCRIMINATOR_PREFIX: &str = "__is";

/// The store-global identifier of one logical entity's record.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataId(String);

impl DataId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for identifiers derived from a response path rather than an
    /// identifying value. Such identifiers are stable within one client
    /// session only.
    pub fn is_client_generated(&self) -> bool {
        self.0.starts_with(CLIENT_ID_PREFIX)
    }
}

impl From<&str> for DataId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DataId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A deterministic identifier for an embedded object that carries no
/// identifying value of its own: parent identifier plus storage key, plus the
/// array index for entries of plural fields.
pub fn generate_client_id(parent: &DataId, storage_key: &str, index: Option<usize>) -> DataId {
    let mut key = format!("{}:{}", parent, storage_key);
    if let Some(index) = index {
        key.push_str(&format!(":{}", index));
    }
    if !key.starts_with(CLIENT_ID_PREFIX) {
        key.insert_str(0, CLIENT_ID_PREFIX);
    }
    DataId(key)
}

/// The identifier for a linked payload object: its explicit identifying
/// value when present, a generated one otherwise.
pub(crate) fn linked_record_id(
    object: &Object,
    parent: &DataId,
    storage_key: &str,
    index: Option<usize>,
) -> DataId {
    match object.get(ID_KEY) {
        Some(Value::String(id)) => DataId::from(id.as_str()),
        Some(Value::Number(id)) => DataId::from(id.to_string()),
        _ => generate_client_id(parent, storage_key, index),
    }
}

/// The storage key a discriminator entry for `abstract_key` is kept under.
pub(crate) fn discriminator_key(abstract_key: &str) -> String {
    format!("{}{}", DISCRIMINATOR_PREFIX, abstract_key)
}

/// One stored field value.
///
/// `Missing` marks a linked field the payload did not provide at all; it is
/// distinct from an explicit `Null` and may be replaced by a real value from
/// a later payload.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StoreValue {
    Missing,
    Null,
    Scalar { value: Value },
    Ref { id: DataId },
    RefList { ids: Vec<Option<DataId>> },
    ActorRef { actor: String, id: DataId },
}

impl StoreValue {
    pub fn scalar(value: impl Into<Value>) -> Self {
        StoreValue::Scalar {
            value: value.into(),
        }
    }

    pub fn as_ref_id(&self) -> Option<&DataId> {
        match self {
            StoreValue::Ref { id } => Some(id),
            _ => None,
        }
    }

    pub fn as_ref_list(&self) -> Option<&[Option<DataId>]> {
        match self {
            StoreValue::RefList { ids } => Some(ids),
            _ => None,
        }
    }
}

/// One entity snapshot: a mapping from storage key to stored value.
#[derive(Clone, Debug, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: IndexMap<String, StoreValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, storage_key: &str) -> Option<&StoreValue> {
        self.fields.get(storage_key)
    }

    pub fn contains_key(&self, storage_key: &str) -> bool {
        self.fields.contains_key(storage_key)
    }

    /// Set a field value. Within a pass the last write wins.
    pub fn set(&mut self, storage_key: impl Into<String>, value: StoreValue) {
        self.fields.insert(storage_key.into(), value);
    }

    /// Set a field value only when the record has no entry for the key yet.
    /// Used for `Missing` markers, which must never downgrade real values.
    pub fn set_if_absent(&mut self, storage_key: impl Into<String>, value: StoreValue) {
        self.fields.entry(storage_key.into()).or_insert(value);
    }

    /// Merge another record into this one field by field; the incoming
    /// fields win, except that a `Missing` marker never replaces data.
    pub fn merge_from(&mut self, other: Record) {
        for (key, value) in other.fields {
            if matches!(value, StoreValue::Missing) && self.fields.contains_key(&key) {
                continue;
            }
            self.fields.insert(key, value);
        }
    }

    pub fn typename(&self) -> Option<&str> {
        match self.fields.get(TYPENAME_KEY)? {
            StoreValue::Scalar { value } => value.as_str(),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StoreValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
