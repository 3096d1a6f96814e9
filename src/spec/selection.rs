use serde::Deserialize;
use serde::Serialize;

use crate::spec::Argument;
use crate::spec::SplitOperation;

/// One node of a compiled selection tree.
///
/// The set of kinds is closed: the compiler that produces these trees and
/// this runtime must agree on it, and an unknown `kind` tag is rejected at
/// parse time instead of being skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Selection {
    ScalarField(Field),
    LinkedField(LinkedField),
    FlightField(Field),
    InlineFragment(InlineFragment),
    FragmentSpread(FragmentSpread),
    Condition(Condition),
    ClientExtension(ClientExtension),
    ClientComponent(ClientComponent),
    Defer(Defer),
    Stream(Stream),
    ModuleImport(ModuleImport),
    ActorChange(ActorChange),
    ScalarHandle(Handle),
    LinkedHandle(Handle),
    TypeDiscriminator(TypeDiscriminator),
}

/// A scalar-valued field selection.
///
/// Also used for flight fields, whose payload is stored as an opaque scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,

    #[serde(default)]
    pub alias: Option<String>,

    #[serde(default)]
    pub args: Vec<Argument>,

    /// Precomputed storage key. When absent, the key is derived at
    /// normalization time from the name and the resolved arguments.
    #[serde(default)]
    pub storage_key: Option<String>,
}

impl Field {
    /// The key under which this field appears in the response payload.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// A field selection whose value is another object, or a list of objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedField {
    pub name: String,

    #[serde(default)]
    pub alias: Option<String>,

    #[serde(default)]
    pub args: Vec<Argument>,

    #[serde(default)]
    pub storage_key: Option<String>,

    /// The concrete type of the linked objects, when the field is
    /// monomorphic. `None` means the position is abstract and the type is
    /// resolved per payload object.
    #[serde(default)]
    pub concrete_type: Option<String>,

    #[serde(default)]
    pub plural: bool,

    pub selections: Vec<Selection>,
}

impl LinkedField {
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Guards its child selections by a concrete type or abstract key match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineFragment {
    #[serde(rename = "type")]
    pub type_condition: String,

    #[serde(default)]
    pub abstract_key: Option<String>,

    pub selections: Vec<Selection>,
}

/// A spread of a split operation, with its own argument bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentSpread {
    pub fragment: SplitOperation,

    #[serde(default)]
    pub args: Vec<Argument>,
}

/// Guards its child selections by a boolean variable.
///
/// The subtree applies only when the evaluated condition equals
/// `passing_value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub condition: String,
    pub passing_value: bool,
    pub selections: Vec<Selection>,
}

/// Client-only selections; the server never returns data for them, so
/// missing payload values are tolerated and left absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientExtension {
    pub selections: Vec<Selection>,
}

/// A client-synthesized nested fragment, normalized against the same payload
/// object as its parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientComponent {
    pub fragment: SplitOperation,

    #[serde(default)]
    pub args: Vec<Argument>,
}

/// A deferred selection set, fulfilled by a later incremental payload
/// addressed by `label` and the response path of this node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Defer {
    #[serde(rename = "if", default)]
    pub if_condition: Option<String>,

    pub label: String,

    pub selections: Vec<Selection>,
}

/// A streamed plural selection; streamed items arrive as incremental
/// payloads carrying the index to place them at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    #[serde(rename = "if", default)]
    pub if_condition: Option<String>,

    pub label: String,

    pub selections: Vec<Selection>,
}

/// A dynamically loaded sub-operation. The selection tree for it is obtained
/// from an external module loader, possibly asynchronously.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleImport {
    pub document_name: String,
    pub fragment_prop_name: String,
    pub fragment_name: String,

    #[serde(default)]
    pub args: Vec<Argument>,
}

/// Redirects the wrapped linked field's subtree into another actor's store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorChange {
    pub linked_field: LinkedField,
}

/// A scalar or linked handle: a client-side post-processing hook whose
/// payload is stored under a namespaced storage key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handle {
    pub name: String,

    #[serde(default)]
    pub alias: Option<String>,

    #[serde(default)]
    pub args: Vec<Argument>,

    /// The handle name, e.g. `connection`.
    pub handle: String,

    /// The key the handle data is stored under; falls back to the field's
    /// name when empty.
    #[serde(default)]
    pub key: String,

    #[serde(default)]
    pub dynamic_key: Option<Argument>,

    /// Argument names that participate in the handle storage key. Absent
    /// means all arguments participate.
    #[serde(default)]
    pub filters: Option<Vec<String>>,

    #[serde(default)]
    pub handle_args: Vec<Argument>,
}

/// Records the resolved concrete type of an object under an abstract key,
/// supporting membership in multiple interfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDiscriminator {
    pub abstract_key: String,
}

/// A local argument definition on an operation, with an optional default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalArgument {
    pub name: String,

    #[serde(default)]
    pub default_value: crate::json_ext::Value,
}
