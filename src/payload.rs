use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::{ByteString, Map};

use crate::json_ext::{Object, Path, Value};

/// An incremental (deferred or streamed) response payload.
///
/// Addressed by the `label` of the selection that deferred it and the
/// response path that selection was reached at. Streamed item payloads
/// additionally carry the index of the plural entry they fulfill.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct IncrementalPayload {
    /// The label that was attached to the defer or stream selection.
    pub label: String,

    /// The path the payload must be merged at.
    pub path: Path,

    /// The payload data.
    #[serde(default)]
    pub data: Value,

    /// The position of a streamed item within its plural field.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub index: Option<usize>,

    /// The optional extensions attached by the transport.
    #[serde(default, skip_serializing_if = "Object::is_empty")]
    pub extensions: Object,
}

#[buildstructor::buildstructor]
impl IncrementalPayload {
    /// Constructor
    #[builder(visibility = "pub")]
    fn new(
        label: String,
        path: Path,
        data: Option<Value>,
        index: Option<usize>,
        extensions: Map<ByteString, Value>,
    ) -> Self {
        Self {
            label,
            path,
            data: data.unwrap_or_default(),
            index,
            extensions,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn payloads_deserialize_from_the_wire_format() {
        let payload: IncrementalPayload = serde_json_bytes::from_value(json!({
            "label": "friends$stream",
            "path": ["viewer", "friends"],
            "data": {"id": "7", "name": "Sam"},
            "index": 3,
        }))
        .unwrap();

        assert_eq!(payload.label, "friends$stream");
        assert_eq!(payload.path, Path::from("viewer/friends"));
        assert_eq!(payload.index, Some(3));
        assert_eq!(
            payload,
            IncrementalPayload::builder()
                .label("friends$stream".to_string())
                .path(Path::from("viewer/friends"))
                .data(json!({"id": "7", "name": "Sam"}))
                .index(3)
                .build()
        );
    }
}
