//! The compiled selection tree consumed by normalization.
//!
//! Trees are produced by an external compiler and exchanged as JSON; they are
//! immutable and shared across every normalization run for the same
//! operation.

mod argument;
mod selection;

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::Value;

pub use argument::Argument;
pub(crate) use argument::{field_storage_key, format_storage_key, resolve, resolve_all, variable};
pub use selection::*;

use crate::error::NormalizeError;
use crate::json_ext::Object;

/// Every `kind` tag this runtime understands. Anything else in a tree means
/// the tree was produced by a newer compiler and must be rejected, not
/// skipped.
const KNOWN_KINDS: &[&str] = &[
    "Operation",
    "SplitOperation",
    "ScalarField",
    "LinkedField",
    "FlightField",
    "InlineFragment",
    "FragmentSpread",
    "Condition",
    "ClientExtension",
    "ClientComponent",
    "Defer",
    "Stream",
    "ModuleImport",
    "ActorChange",
    "ScalarHandle",
    "LinkedHandle",
    "TypeDiscriminator",
    "Literal",
    "Variable",
    "ListValue",
    "ObjectValue",
    "LocalArgument",
];

/// A compiled root operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,

    #[serde(default)]
    pub argument_definitions: Vec<LocalArgument>,

    pub selections: Vec<Selection>,

    /// Declared members of each client-only abstract type, keyed by abstract
    /// key. Declaration order is preserved and is the tie-break order when an
    /// object matches several abstract keys.
    #[serde(default)]
    pub client_abstract_types: IndexMap<String, Vec<String>>,
}

/// A compiled fragment extracted into its own tree, the target of fragment
/// spreads and module imports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitOperation {
    pub name: String,

    #[serde(default)]
    pub argument_definitions: Vec<LocalArgument>,

    #[serde(default)]
    pub metadata: Option<Object>,

    pub selections: Vec<Selection>,
}

impl Operation {
    /// Deserialize a compiled operation, rejecting unknown selection kinds.
    pub fn from_value(value: &Value) -> Result<Self, NormalizeError> {
        reject_unknown_kinds(value)?;
        serde_json_bytes::from_value(value.clone()).map_err(|err| {
            NormalizeError::InvalidDocument {
                reason: err.to_string(),
            }
        })
    }

    /// The variable environment for one normalization pass: declared defaults
    /// overlaid with the caller-provided bindings.
    pub(crate) fn effective_variables(&self, variables: &Object) -> Object {
        merge_defaults(&self.argument_definitions, variables)
    }
}

impl SplitOperation {
    /// Deserialize a compiled split operation, rejecting unknown selection
    /// kinds.
    pub fn from_value(value: &Value) -> Result<Self, NormalizeError> {
        reject_unknown_kinds(value)?;
        serde_json_bytes::from_value(value.clone()).map_err(|err| {
            NormalizeError::InvalidDocument {
                reason: err.to_string(),
            }
        })
    }

    pub(crate) fn effective_variables(&self, variables: &Object) -> Object {
        merge_defaults(&self.argument_definitions, variables)
    }
}

fn merge_defaults(definitions: &[LocalArgument], variables: &Object) -> Object {
    if definitions.is_empty() {
        return variables.clone();
    }
    definitions
        .iter()
        .filter(|definition| !definition.default_value.is_null())
        .map(|definition| {
            (
                definition.name.as_str().into(),
                definition.default_value.clone(),
            )
        })
        .chain(variables.iter().map(|(k, v)| (k.clone(), v.clone())))
        .collect()
}

fn reject_unknown_kinds(value: &Value) -> Result<(), NormalizeError> {
    match value {
        Value::Object(object) => {
            let kind = object.get("kind").and_then(|kind| kind.as_str());
            if let Some(kind) = kind {
                if !KNOWN_KINDS.contains(&kind) {
                    return Err(NormalizeError::UnsupportedSelection {
                        kind: kind.to_string(),
                    });
                }
            }
            // literal values and argument defaults are arbitrary client
            // JSON, not tree nodes; a `kind` key inside them is data
            let opaque_field = match kind {
                Some("Literal") => Some("value"),
                Some("LocalArgument") => Some("defaultValue"),
                _ => None,
            };
            object
                .iter()
                .filter(|(key, _)| Some(key.as_str()) != opaque_field)
                .try_for_each(|(_, value)| reject_unknown_kinds(value))
        }
        Value::Array(array) => array.iter().try_for_each(reject_unknown_kinds),
        _ => Ok(()),
    }
}
