//! The normalization core.
//!
//! [`Normalizer::normalize_response`] walks a compiled selection tree and a
//! response payload side by side, staging record writes for every object the
//! payload describes. Deferred and streamed selections, and module imports,
//! suspend by registering pending work that the caller resumes through
//! [`Normalizer::normalize_incremental`] and
//! [`Normalizer::resolve_module_imports`].

mod actor;
mod handle;
mod incremental;
mod module;

use std::sync::Arc;

use indexmap::IndexMap;

pub use actor::{ActorRegistry, MemoryActorRegistry};
pub use module::{ModuleImportHandle, ModuleLoader};

use crate::error::{NormalizeError, NormalizeFailure, PayloadShape};
use crate::json_ext::{Object, Path, PathElement, Value};
use crate::spec::{
    self, ActorChange, Condition, Defer, Field, InlineFragment, LinkedField, ModuleImport,
    Operation, Selection, Stream, TypeDiscriminator,
};
use crate::store::{
    discriminator_key, linked_record_id, DataId, MemoryStore, MutationBuffer, StoreValue,
    ACTOR_IDENTIFIER_KEY, ROOT_ID, ROOT_TYPE, TYPENAME_KEY,
};

use incremental::{IncrementalKey, IncrementalState, PendingIncremental, PendingKind};
use module::{ModuleImports, PendingModuleImport};

/// The outcome of one successful normalization pass.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct Normalized {
    /// The records this pass created or merged into, in first-touch order.
    pub touched: Vec<DataId>,

    /// Defer/stream labels registered by this pass, with the response path
    /// they were registered at. Each awaits an incremental payload.
    pub pending: Vec<(String, Path)>,

    /// Module imports registered by this pass, awaiting resolution.
    pub module_imports: Vec<ModuleImportHandle>,
}

/// Normalizes response payloads into a record store.
///
/// One `Normalizer` owns the pending-work state for one operation's
/// lifetime: the base payload, its incremental payloads and its module
/// imports all go through the same instance. The store itself may be shared
/// with other normalizers.
pub struct Normalizer {
    store: Arc<MemoryStore>,
    registry: Arc<dyn ActorRegistry>,
    incremental: IncrementalState,
    modules: ModuleImports,
}

impl Normalizer {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self::with_actor_registry(store, Arc::new(MemoryActorRegistry::new()))
    }

    pub fn with_actor_registry(store: Arc<MemoryStore>, registry: Arc<dyn ActorRegistry>) -> Self {
        Self {
            store,
            registry,
            incremental: IncrementalState::default(),
            modules: ModuleImports::default(),
        }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Normalize one base response payload under `operation`.
    ///
    /// On success the staged writes are committed and the outcome lists the
    /// labels and module imports still outstanding. On failure nothing is
    /// committed and the failure carries the identifiers the aborted pass
    /// had staged.
    #[tracing::instrument(skip_all, level = "trace")]
    pub fn normalize_response(
        &self,
        operation: &Operation,
        variables: &Object,
        data: &Value,
    ) -> Result<Normalized, NormalizeFailure> {
        let root = match data.as_object() {
            Some(object) => object,
            None => {
                return Err(NormalizeError::ShapeMismatch {
                    storage_key: ROOT_ID.to_string(),
                    expected: PayloadShape::Object,
                    actual: shape_of(Some(data)),
                }
                .into())
            }
        };

        let variables = operation.effective_variables(variables);
        let mut pass = Pass::new(
            self.store.clone(),
            None,
            self.registry.clone(),
            operation.client_abstract_types.clone(),
        );
        let root_id = DataId::from(ROOT_ID);
        pass.buffers[0].write_field(&root_id, TYPENAME_KEY, StoreValue::scalar(ROOT_TYPE));

        let ctx = Ctx {
            buffer: 0,
            record: root_id,
            typename: Some(ROOT_TYPE.to_string()),
            lenient: false,
        };
        let result = pass.normalize_selections(
            &operation.selections,
            &variables,
            &ctx,
            root,
            &mut Path::empty(),
        );
        self.finish_pass(pass, result)
    }

    /// Run a resumed pass (incremental fulfillment or module import) against
    /// the record it was registered for.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn resume_pass(
        &self,
        selections: &[Selection],
        variables: &Object,
        client_abstract_types: &IndexMap<String, Vec<String>>,
        record: &DataId,
        typename: Option<&str>,
        origin_actor: Option<&str>,
        path: &Path,
        data: &Object,
    ) -> Result<Normalized, NormalizeFailure> {
        let store = match origin_actor {
            Some(actor) => self.registry.store_for(actor),
            None => self.store.clone(),
        };
        let mut pass = Pass::new(
            store,
            origin_actor.map(str::to_string),
            self.registry.clone(),
            client_abstract_types.clone(),
        );
        let ctx = Ctx {
            buffer: 0,
            record: record.clone(),
            typename: typename.map(str::to_string),
            lenient: false,
        };
        let result =
            pass.normalize_selections(selections, variables, &ctx, data, &mut path.clone());
        self.finish_pass(pass, result)
    }

    fn finish_pass(
        &self,
        pass: Pass,
        result: Result<(), NormalizeError>,
    ) -> Result<Normalized, NormalizeFailure> {
        match result {
            Ok(()) => {
                let (touched, registrations, imports) = pass.commit();
                let pending = registrations
                    .iter()
                    .map(|(key, _)| key.clone())
                    .collect::<Vec<_>>();
                let module_imports = imports
                    .iter()
                    .map(PendingModuleImport::handle)
                    .collect::<Vec<_>>();
                self.incremental.register(registrations);
                self.modules.push_all(imports);
                Ok(Normalized {
                    touched,
                    pending,
                    module_imports,
                })
            }
            Err(error) => Err(NormalizeFailure {
                error,
                touched: pass.touched_staged(),
            }),
        }
    }
}

/// Per-recursion context of the selection walker.
#[derive(Clone)]
pub(crate) struct Ctx {
    /// Index of the buffer (origin or actor store) writes go to.
    buffer: usize,

    /// The record the current payload object normalizes into.
    record: DataId,

    /// The resolved concrete type of the current object, when known.
    typename: Option<String>,

    /// Set inside client extensions, where the server never provides data
    /// and absence is not recorded.
    lenient: bool,
}

/// The staged state of one normalization pass: one mutation buffer per store
/// written to, plus the pending work discovered along the way. Nothing here
/// is observable until the pass succeeds and is committed.
pub(crate) struct Pass {
    registry: Arc<dyn ActorRegistry>,
    client_abstract_types: IndexMap<String, Vec<String>>,
    buffers: Vec<MutationBuffer>,
    buffer_actors: Vec<Option<String>>,
    registrations: Vec<(IncrementalKey, PendingIncremental)>,
    module_imports: Vec<PendingModuleImport>,
}

impl Pass {
    pub(crate) fn new(
        store: Arc<MemoryStore>,
        origin_actor: Option<String>,
        registry: Arc<dyn ActorRegistry>,
        client_abstract_types: IndexMap<String, Vec<String>>,
    ) -> Self {
        Self {
            registry,
            client_abstract_types,
            buffers: vec![MutationBuffer::new(store)],
            buffer_actors: vec![origin_actor],
            registrations: Vec::new(),
            module_imports: Vec::new(),
        }
    }

    pub(crate) fn buffer(&mut self, index: usize) -> &mut MutationBuffer {
        &mut self.buffers[index]
    }

    fn buffer_for_actor(&mut self, actor: &str) -> usize {
        if let Some(index) = self
            .buffer_actors
            .iter()
            .position(|a| a.as_deref() == Some(actor))
        {
            return index;
        }
        self.buffers
            .push(MutationBuffer::new(self.registry.store_for(actor)));
        self.buffer_actors.push(Some(actor.to_string()));
        self.buffers.len() - 1
    }

    pub(crate) fn touched_staged(&self) -> Vec<DataId> {
        let mut touched = Vec::new();
        for buffer in &self.buffers {
            for id in buffer.touched() {
                if !touched.contains(&id) {
                    touched.push(id);
                }
            }
        }
        touched
    }

    pub(crate) fn commit(
        self,
    ) -> (
        Vec<DataId>,
        Vec<(IncrementalKey, PendingIncremental)>,
        Vec<PendingModuleImport>,
    ) {
        let mut touched = Vec::new();
        for buffer in self.buffers {
            for id in buffer.commit() {
                if !touched.contains(&id) {
                    touched.push(id);
                }
            }
        }
        (touched, self.registrations, self.module_imports)
    }

    /// Depth-first, left-to-right traversal of one selection list against
    /// one payload object.
    pub(crate) fn normalize_selections(
        &mut self,
        selections: &[Selection],
        variables: &Object,
        ctx: &Ctx,
        data: &Object,
        path: &mut Path,
    ) -> Result<(), NormalizeError> {
        for selection in selections {
            match selection {
                Selection::ScalarField(field) | Selection::FlightField(field) => {
                    self.normalize_scalar_field(field, variables, ctx, data)?;
                }
                Selection::LinkedField(field) => {
                    self.normalize_linked_field(field, variables, ctx, data, path)?;
                }
                Selection::ScalarHandle(h) | Selection::LinkedHandle(h) => {
                    handle::apply(h, variables, self.buffer(ctx.buffer), &ctx.record)?;
                }
                Selection::InlineFragment(fragment) => {
                    if self.inline_fragment_matches(fragment, ctx.typename.as_deref(), data, path)? {
                        let ctx = Ctx {
                            typename: Some(fragment.type_condition.clone()),
                            ..ctx.clone()
                        };
                        self.normalize_selections(
                            &fragment.selections,
                            variables,
                            &ctx,
                            data,
                            path,
                        )?;
                    }
                }
                Selection::FragmentSpread(spread) => {
                    let bindings = spec::resolve_all(&spread.args, variables)?
                        .into_iter()
                        .map(|(name, value)| (name.into(), value))
                        .collect::<Object>();
                    let fragment_variables = spread.fragment.effective_variables(&bindings);
                    self.normalize_selections(
                        &spread.fragment.selections,
                        &fragment_variables,
                        ctx,
                        data,
                        path,
                    )?;
                }
                Selection::Condition(condition) => {
                    if self.condition_passes(condition, variables)? {
                        self.normalize_selections(
                            &condition.selections,
                            variables,
                            ctx,
                            data,
                            path,
                        )?;
                    }
                }
                Selection::ClientExtension(extension) => {
                    let ctx = Ctx {
                        lenient: true,
                        ..ctx.clone()
                    };
                    self.normalize_selections(&extension.selections, variables, &ctx, data, path)?;
                }
                Selection::ClientComponent(component) => {
                    let bindings = spec::resolve_all(&component.args, variables)?
                        .into_iter()
                        .map(|(name, value)| (name.into(), value))
                        .collect::<Object>();
                    let fragment_variables = component.fragment.effective_variables(&bindings);
                    self.normalize_selections(
                        &component.fragment.selections,
                        &fragment_variables,
                        ctx,
                        data,
                        path,
                    )?;
                }
                Selection::TypeDiscriminator(discriminator) => {
                    self.normalize_type_discriminator(discriminator, ctx, data);
                }
                Selection::Defer(defer) => {
                    self.normalize_defer(defer, variables, ctx, data, path)?;
                }
                Selection::Stream(stream) => {
                    self.normalize_stream(stream, variables, ctx, data, path)?;
                }
                Selection::ModuleImport(import) => {
                    self.register_module_import(import, variables, ctx, data, path)?;
                }
                Selection::ActorChange(change) => {
                    self.normalize_actor_change(change, variables, ctx, data, path)?;
                }
            }
        }
        Ok(())
    }

    fn normalize_scalar_field(
        &mut self,
        field: &Field,
        variables: &Object,
        ctx: &Ctx,
        data: &Object,
    ) -> Result<(), NormalizeError> {
        // the alias governs where the payload value sits, never the key it
        // is stored under: aliased selections of one field share one key
        let storage_key = spec::field_storage_key(
            &field.name,
            field.storage_key.as_deref(),
            &field.args,
            variables,
        )?;
        match data.get(field.response_key()) {
            Some(Value::Null) => {
                self.buffer(ctx.buffer)
                    .write_field(&ctx.record, storage_key, StoreValue::Null);
            }
            Some(value) => {
                let value = value.clone();
                self.buffer(ctx.buffer).write_field(
                    &ctx.record,
                    storage_key,
                    StoreValue::Scalar { value },
                );
            }
            None => {
                // absent scalars are left absent; the record is not marked
                if !ctx.lenient {
                    tracing::trace!(
                        field = field.response_key(),
                        record = %ctx.record,
                        "payload did not provide a value for scalar field"
                    );
                }
            }
        }
        Ok(())
    }

    fn normalize_linked_field(
        &mut self,
        field: &LinkedField,
        variables: &Object,
        ctx: &Ctx,
        data: &Object,
        path: &mut Path,
    ) -> Result<(), NormalizeError> {
        let storage_key = spec::field_storage_key(
            &field.name,
            field.storage_key.as_deref(),
            &field.args,
            variables,
        )?;
        let value = data.get(field.response_key());
        path.push(PathElement::Key(field.response_key().to_string()));
        let result = self.normalize_linked_value(field, &storage_key, variables, ctx, value, path);
        path.pop();
        result
    }

    fn normalize_linked_value(
        &mut self,
        field: &LinkedField,
        storage_key: &str,
        variables: &Object,
        ctx: &Ctx,
        value: Option<&Value>,
        path: &mut Path,
    ) -> Result<(), NormalizeError> {
        match value {
            None => {
                // the first payload that actually provides the field wins
                if !ctx.lenient {
                    self.buffer(ctx.buffer)
                        .write_missing(&ctx.record, storage_key);
                }
                Ok(())
            }
            Some(Value::Null) => {
                self.buffer(ctx.buffer)
                    .write_link(&ctx.record, storage_key, None);
                Ok(())
            }
            Some(Value::Array(items)) => {
                if !field.plural {
                    return Err(NormalizeError::ShapeMismatch {
                        storage_key: storage_key.to_string(),
                        expected: PayloadShape::Object,
                        actual: PayloadShape::List,
                    });
                }
                let mut ids = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    match item {
                        Value::Null => ids.push(None),
                        Value::Object(object) => {
                            path.push(PathElement::Index(index));
                            let id = self.normalize_linked_object(
                                field,
                                storage_key,
                                variables,
                                ctx,
                                object,
                                Some(index),
                                path,
                            )?;
                            path.pop();
                            ids.push(Some(id));
                        }
                        other => {
                            return Err(NormalizeError::ShapeMismatch {
                                storage_key: storage_key.to_string(),
                                expected: PayloadShape::Object,
                                actual: shape_of(Some(other)),
                            })
                        }
                    }
                }
                self.buffer(ctx.buffer)
                    .write_link_list(&ctx.record, storage_key, ids);
                Ok(())
            }
            Some(Value::Object(object)) => {
                if field.plural {
                    return Err(NormalizeError::ShapeMismatch {
                        storage_key: storage_key.to_string(),
                        expected: PayloadShape::List,
                        actual: PayloadShape::Object,
                    });
                }
                let id = self.normalize_linked_object(
                    field,
                    storage_key,
                    variables,
                    ctx,
                    object,
                    None,
                    path,
                )?;
                self.buffer(ctx.buffer)
                    .write_link(&ctx.record, storage_key, Some(id));
                Ok(())
            }
            Some(other) => Err(NormalizeError::ShapeMismatch {
                storage_key: storage_key.to_string(),
                expected: if field.plural {
                    PayloadShape::List
                } else {
                    PayloadShape::Object
                },
                actual: shape_of(Some(other)),
            }),
        }
    }

    /// Normalize one linked payload object into its own record and return
    /// that record's identifier.
    #[allow(clippy::too_many_arguments)]
    fn normalize_linked_object(
        &mut self,
        field: &LinkedField,
        storage_key: &str,
        variables: &Object,
        ctx: &Ctx,
        object: &Object,
        index: Option<usize>,
        path: &mut Path,
    ) -> Result<DataId, NormalizeError> {
        let id = linked_record_id(object, &ctx.record, storage_key, index);
        let typename = self.resolve_object_type(field.concrete_type.as_deref(), object, None);
        if typename.is_none() && has_type_constraints(&field.selections) {
            return Err(NormalizeError::UnresolvedType { path: path.clone() });
        }
        if let Some(typename) = &typename {
            self.buffer(ctx.buffer).write_field(
                &id,
                TYPENAME_KEY,
                StoreValue::scalar(typename.as_str()),
            );
        }
        let child = Ctx {
            record: id.clone(),
            typename,
            ..ctx.clone()
        };
        self.normalize_selections(&field.selections, variables, &child, object, path)?;
        Ok(id)
    }

    fn normalize_type_discriminator(
        &mut self,
        discriminator: &TypeDiscriminator,
        ctx: &Ctx,
        data: &Object,
    ) {
        let resolved = data
            .get(TYPENAME_KEY)
            .and_then(|value| value.as_str())
            .map(str::to_string)
            .or_else(|| ctx.typename.clone());
        match resolved {
            Some(typename) => {
                self.buffer(ctx.buffer).write_field(
                    &ctx.record,
                    discriminator_key(&discriminator.abstract_key),
                    StoreValue::scalar(typename),
                );
            }
            None => {
                tracing::trace!(
                    abstract_key = discriminator.abstract_key.as_str(),
                    record = %ctx.record,
                    "no concrete type to record a discriminator entry for"
                );
            }
        }
    }

    fn normalize_defer(
        &mut self,
        defer: &Defer,
        variables: &Object,
        ctx: &Ctx,
        data: &Object,
        path: &mut Path,
    ) -> Result<(), NormalizeError> {
        if !incremental_active(&defer.if_condition, variables)? {
            // not deferred after all: the data is inline
            return self.normalize_selections(&defer.selections, variables, ctx, data, path);
        }
        self.registrations.push((
            (defer.label.clone(), path.clone()),
            PendingIncremental {
                kind: PendingKind::Defer,
                selections: defer.selections.clone(),
                variables: variables.clone(),
                client_abstract_types: self.client_abstract_types.clone(),
                record: ctx.record.clone(),
                typename: ctx.typename.clone(),
                actor: self.buffer_actors[ctx.buffer].clone(),
            },
        ));
        Ok(())
    }

    fn normalize_stream(
        &mut self,
        stream: &Stream,
        variables: &Object,
        ctx: &Ctx,
        data: &Object,
        path: &mut Path,
    ) -> Result<(), NormalizeError> {
        // initial items arrive inline either way; streaming only governs
        // whether later items are still expected
        self.normalize_selections(&stream.selections, variables, ctx, data, path)?;
        if incremental_active(&stream.if_condition, variables)? {
            self.registrations.push((
                (stream.label.clone(), path.clone()),
                PendingIncremental {
                    kind: PendingKind::Stream {
                        applied: Default::default(),
                    },
                    selections: stream.selections.clone(),
                    variables: variables.clone(),
                    client_abstract_types: self.client_abstract_types.clone(),
                    record: ctx.record.clone(),
                    typename: ctx.typename.clone(),
                    actor: self.buffer_actors[ctx.buffer].clone(),
                },
            ));
        }
        Ok(())
    }

    fn register_module_import(
        &mut self,
        import: &ModuleImport,
        variables: &Object,
        ctx: &Ctx,
        data: &Object,
        path: &Path,
    ) -> Result<(), NormalizeError> {
        let bindings = spec::resolve_all(&import.args, variables)?
            .into_iter()
            .map(|(name, value)| (name.into(), value))
            .collect::<Object>();
        self.module_imports.push(PendingModuleImport {
            document_name: import.document_name.clone(),
            fragment_name: import.fragment_name.clone(),
            fragment_prop_name: import.fragment_prop_name.clone(),
            bindings,
            record: ctx.record.clone(),
            typename: ctx.typename.clone(),
            actor: self.buffer_actors[ctx.buffer].clone(),
            path: path.clone(),
            slice: data.clone(),
            client_abstract_types: self.client_abstract_types.clone(),
        });
        Ok(())
    }

    fn normalize_actor_change(
        &mut self,
        change: &ActorChange,
        variables: &Object,
        ctx: &Ctx,
        data: &Object,
        path: &mut Path,
    ) -> Result<(), NormalizeError> {
        let field = &change.linked_field;
        let storage_key = spec::field_storage_key(
            &field.name,
            field.storage_key.as_deref(),
            &field.args,
            variables,
        )?;
        let object = match data.get(field.response_key()) {
            None => {
                if !ctx.lenient {
                    self.buffer(ctx.buffer)
                        .write_missing(&ctx.record, &storage_key);
                }
                return Ok(());
            }
            Some(Value::Null) => {
                self.buffer(ctx.buffer)
                    .write_link(&ctx.record, storage_key, None);
                return Ok(());
            }
            Some(Value::Object(object)) => object,
            Some(other) => {
                return Err(NormalizeError::ShapeMismatch {
                    storage_key,
                    expected: PayloadShape::Object,
                    actual: shape_of(Some(other)),
                })
            }
        };

        let actor = match object
            .get(ACTOR_IDENTIFIER_KEY)
            .and_then(|value| value.as_str())
        {
            Some(actor) => actor.to_string(),
            None => {
                return Err(NormalizeError::ShapeMismatch {
                    storage_key: format!("{}.{}", storage_key, ACTOR_IDENTIFIER_KEY),
                    expected: PayloadShape::Scalar,
                    actual: PayloadShape::Missing,
                })
            }
        };

        let buffer = self.buffer_for_actor(&actor);
        path.push(PathElement::Key(field.response_key().to_string()));
        let remote_ctx = Ctx {
            buffer,
            record: ctx.record.clone(),
            typename: ctx.typename.clone(),
            lenient: ctx.lenient,
        };
        let remote_id =
            self.normalize_linked_object(field, &storage_key, variables, &remote_ctx, object, None, path);
        path.pop();
        let remote_id = remote_id?;

        self.buffer(ctx.buffer).write_field(
            &ctx.record,
            storage_key,
            StoreValue::ActorRef {
                actor,
                id: remote_id,
            },
        );
        Ok(())
    }

    fn condition_passes(
        &self,
        condition: &Condition,
        variables: &Object,
    ) -> Result<bool, NormalizeError> {
        let value = spec::variable(variables, &condition.condition)?;
        Ok(value.as_bool().unwrap_or(false) == condition.passing_value)
    }

    /// The concrete type of a payload object: an explicitly known type, the
    /// payload's own typename field, or a discriminator entry validated
    /// against the declared abstract type members, in that order.
    fn resolve_object_type(
        &self,
        concrete: Option<&str>,
        object: &Object,
        inherited: Option<&str>,
    ) -> Option<String> {
        if let Some(typename) = concrete {
            return Some(typename.to_string());
        }
        if let Some(typename) = object.get(TYPENAME_KEY).and_then(|value| value.as_str()) {
            return Some(typename.to_string());
        }
        for (abstract_key, members) in &self.client_abstract_types {
            if let Some(marker) = object
                .get(discriminator_key(abstract_key).as_str())
                .and_then(|value| value.as_str())
            {
                if members.iter().any(|member| member == marker) {
                    return Some(marker.to_string());
                }
            }
        }
        inherited.map(str::to_string)
    }

    fn inline_fragment_matches(
        &self,
        fragment: &InlineFragment,
        typename: Option<&str>,
        data: &Object,
        path: &Path,
    ) -> Result<bool, NormalizeError> {
        let resolved = self.resolve_object_type(None, data, typename);

        if let Some(abstract_key) = &fragment.abstract_key {
            match data.get(discriminator_key(abstract_key).as_str()) {
                Some(Value::Bool(conforms)) => return Ok(*conforms),
                Some(Value::String(marker)) => {
                    if let Some(members) = self.client_abstract_types.get(abstract_key) {
                        return Ok(members.iter().any(|member| member == marker.as_str()));
                    }
                    return Ok(true);
                }
                _ => {}
            }
            return match resolved {
                Some(typename) => {
                    if typename == fragment.type_condition {
                        return Ok(true);
                    }
                    match self.client_abstract_types.get(abstract_key) {
                        Some(members) => Ok(members.iter().any(|member| member == &typename)),
                        // membership is unknowable here; trees compiled
                        // against the same schema only reach this for
                        // conforming objects
                        None => Ok(true),
                    }
                }
                None => Err(NormalizeError::UnresolvedType { path: path.clone() }),
            };
        }

        match resolved {
            Some(typename) => Ok(typename == fragment.type_condition),
            None => Err(NormalizeError::UnresolvedType { path: path.clone() }),
        }
    }
}

fn incremental_active(
    if_condition: &Option<String>,
    variables: &Object,
) -> Result<bool, NormalizeError> {
    match if_condition {
        None => Ok(true),
        Some(name) => Ok(spec::variable(variables, name)?.as_bool().unwrap_or(false)),
    }
}

/// Whether any selection in the set dispatches on the object's concrete
/// type, which makes an unresolvable type a hard error instead of a
/// tolerable unknown.
fn has_type_constraints(selections: &[Selection]) -> bool {
    selections.iter().any(|selection| match selection {
        Selection::InlineFragment(_) | Selection::TypeDiscriminator(_) => true,
        Selection::Condition(condition) => has_type_constraints(&condition.selections),
        Selection::ClientExtension(extension) => has_type_constraints(&extension.selections),
        Selection::Defer(defer) => has_type_constraints(&defer.selections),
        Selection::Stream(stream) => has_type_constraints(&stream.selections),
        Selection::FragmentSpread(spread) => has_type_constraints(&spread.fragment.selections),
        _ => false,
    })
}

fn shape_of(value: Option<&Value>) -> PayloadShape {
    match value {
        None => PayloadShape::Missing,
        Some(Value::Null) => PayloadShape::Null,
        Some(Value::Object(_)) => PayloadShape::Object,
        Some(Value::Array(_)) => PayloadShape::List,
        Some(_) => PayloadShape::Scalar,
    }
}
