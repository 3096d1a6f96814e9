use displaydoc::Display;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::json_ext::Path;
use crate::store::DataId;

/// The shape a payload value was expected to have, or actually had.
///
/// Used to report shape disagreements between a selection and the payload
/// slice it was matched against.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, Display)]
pub enum PayloadShape {
    /// object
    Object,
    /// list
    List,
    /// scalar
    Scalar,
    /// null
    Null,
    /// missing
    Missing,
}

/// Error types for normalization.
///
/// A module load error is scoped to the subtree it was raised for; every
/// other variant aborts the whole pass, whose staged writes are then
/// discarded.
#[derive(Error, Display, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NormalizeError {
    /// payload for '{storage_key}' does not match the selection: expected {expected}, got {actual}
    ShapeMismatch {
        /// The storage key of the mismatched field.
        storage_key: String,

        /// The shape the selection expected.
        expected: PayloadShape,

        /// The shape the payload provided.
        actual: PayloadShape,
    },

    /// operation requires variable '{name}', but it was not provided
    MissingVariable {
        /// Name of the variable.
        name: String,
    },

    /// could not resolve a concrete type for the object at '{path}'
    UnresolvedType {
        /// The response path of the ambiguous object.
        path: Path,
    },

    /// unsupported selection kind '{kind}'
    UnsupportedSelection {
        /// The unknown `kind` tag.
        kind: String,
    },

    /// selection tree was malformed: {reason}
    InvalidDocument {
        /// The reason deserialization failed.
        reason: String,
    },

    /// loading module '{document_name}' failed: {reason}
    ModuleLoadError {
        /// The document that could not be loaded.
        document_name: String,

        /// The reason the loader gave.
        reason: String,
    },
}

/// A failed normalization pass.
///
/// Carries the structured error plus the record identifiers that had been
/// staged before the failure. A failing pass commits nothing, so those
/// records are untouched in the store; the set tells the caller which
/// entities the aborted payload was about.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[error("{error}")]
pub struct NormalizeFailure {
    pub error: NormalizeError,
    pub touched: Vec<DataId>,
}

impl From<NormalizeError> for NormalizeFailure {
    fn from(error: NormalizeError) -> Self {
        Self {
            error,
            touched: Vec::new(),
        }
    }
}

/// An error reported by an external module loader.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[error("{0}")]
pub struct ModuleError(pub String);
