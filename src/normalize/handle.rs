//! Handle application.
//!
//! A handle mirrors a normalized field under a second, namespaced storage
//! key, so client-side post-processors (connection merging and the like) can
//! maintain their own view of the data without disturbing the server field.

use crate::error::NormalizeError;
use crate::json_ext::Object;
use crate::spec::{self, Handle};
use crate::store::{DataId, MutationBuffer};

const DYNAMIC_KEY_ARGUMENT: &str = "__dynamicKey";

/// Copy the already-normalized value of the handle's field to the handle's
/// own storage key on the same record.
///
/// Handles appear after the field they annotate, so by the time one is
/// reached the source value is staged in the buffer. A handle whose source
/// was never written is a no-op.
pub(crate) fn apply(
    handle: &Handle,
    variables: &Object,
    buffer: &mut MutationBuffer,
    record: &DataId,
) -> Result<(), NormalizeError> {
    let source_key = spec::field_storage_key(&handle.name, None, &handle.args, variables)?;
    let target_key = storage_key(handle, variables)?;
    match buffer.field(record, &source_key) {
        Some(value) => buffer.write_field(record, target_key, value),
        None => {
            tracing::trace!(
                field = source_key.as_str(),
                record = %record,
                "handle source field has no value to mirror"
            );
        }
    }
    Ok(())
}

/// The namespaced storage key for a handle: `__<key>_<handle>` plus the
/// filtered field arguments, any handle argument overrides, and the dynamic
/// key, canonicalized the same way ordinary field keys are.
pub(crate) fn storage_key(handle: &Handle, variables: &Object) -> Result<String, NormalizeError> {
    let mut resolved = spec::resolve_all(&handle.args, variables)?;
    if let Some(filters) = &handle.filters {
        resolved.retain(|(name, _)| filters.iter().any(|filter| filter == name));
    }
    for argument in &handle.handle_args {
        let value = spec::resolve(argument, variables)?;
        match resolved.iter_mut().find(|(name, _)| name == argument.name()) {
            Some(entry) => entry.1 = value,
            None => resolved.push((argument.name().to_string(), value)),
        }
    }
    if let Some(dynamic) = &handle.dynamic_key {
        resolved.push((
            DYNAMIC_KEY_ARGUMENT.to_string(),
            spec::resolve(dynamic, variables)?,
        ));
    }
    resolved.sort_by(|(a, _), (b, _)| a.cmp(b));

    let key = if handle.key.is_empty() {
        handle.name.as_str()
    } else {
        handle.key.as_str()
    };
    Ok(spec::format_storage_key(
        &format!("__{}_{}", key, handle.handle),
        &resolved,
    ))
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;
    use crate::store::{MemoryStore, StoreValue};
    use std::sync::Arc;

    fn handle(value: serde_json_bytes::Value) -> Handle {
        serde_json_bytes::from_value(value).unwrap()
    }

    #[test]
    fn handle_keys_are_namespaced_and_filtered() {
        let handle = handle(json!({
            "name": "friends",
            "handle": "connection",
            "key": "UserProfile_friends",
            "args": [
                {"kind": "Literal", "name": "first", "value": 10},
                {"kind": "Literal", "name": "orderBy", "value": "NAME"},
            ],
            "filters": ["orderBy"],
        }));
        assert_eq!(
            storage_key(&handle, &Object::new()).unwrap(),
            r#"__UserProfile_friends_connection(orderBy:"NAME")"#
        );
    }

    #[test]
    fn handle_args_override_field_args() {
        let handle = handle(json!({
            "name": "friends",
            "handle": "connection",
            "key": "",
            "args": [{"kind": "Literal", "name": "first", "value": 10}],
            "handleArgs": [{"kind": "Literal", "name": "first", "value": 20}],
        }));
        assert_eq!(
            storage_key(&handle, &Object::new()).unwrap(),
            "__friends_connection(first:20)"
        );
    }

    #[test]
    fn dynamic_keys_participate_in_the_storage_key() {
        let handle = handle(json!({
            "name": "friends",
            "handle": "connection",
            "key": "Feed_friends",
            "dynamicKey": {"kind": "Variable", "name": "__dynamicKey", "variableName": "scope"},
        }));
        let variables = json!({"scope": "mobile"}).as_object().cloned().unwrap();
        assert_eq!(
            storage_key(&handle, &variables).unwrap(),
            r#"__Feed_friends_connection(__dynamicKey:"mobile")"#
        );
    }

    #[test]
    fn apply_mirrors_the_staged_field_value() {
        let store = Arc::new(MemoryStore::new());
        let mut buffer = MutationBuffer::new(store);
        let record = DataId::from("4");
        buffer.write_field(&record, "friends(first:10)", StoreValue::Ref { id: DataId::from("7") });

        let handle = handle(json!({
            "name": "friends",
            "handle": "connection",
            "key": "UserProfile_friends",
            "args": [{"kind": "Literal", "name": "first", "value": 10}],
            "filters": [],
        }));
        apply(&handle, &Object::new(), &mut buffer, &record).unwrap();

        assert_eq!(
            buffer.field(&record, "__UserProfile_friends_connection"),
            Some(StoreValue::Ref { id: DataId::from("7") })
        );
    }
}
