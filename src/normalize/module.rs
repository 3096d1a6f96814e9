//! Module import resolution.
//!
//! A `ModuleImport` selection names a selection tree that is not part of the
//! operation document; it lives in a separately delivered module. The walker
//! only registers such imports, and the caller resolves them later through a
//! [`ModuleLoader`], typically once per server round trip.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;

use crate::error::{ModuleError, NormalizeError, NormalizeFailure};
use crate::json_ext::{Object, Path};
use crate::spec::SplitOperation;
use crate::store::DataId;

use super::{Normalized, Normalizer};

/// Loads the split operation a module import refers to.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn load(
        &self,
        document_name: &str,
        fragment_name: &str,
    ) -> Result<Arc<SplitOperation>, ModuleError>;
}

/// A module import awaiting resolution.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ModuleImportHandle {
    /// The document the loader must provide.
    pub document_name: String,

    /// The fragment within that document to normalize with.
    pub fragment_name: String,

    /// The response path the import was registered at.
    pub path: Path,
}

/// Everything a registered module import needs to resume normalization once
/// its selection tree is available.
pub(crate) struct PendingModuleImport {
    pub(crate) document_name: String,
    pub(crate) fragment_name: String,
    pub(crate) fragment_prop_name: String,
    pub(crate) bindings: Object,
    pub(crate) record: DataId,
    pub(crate) typename: Option<String>,
    pub(crate) actor: Option<String>,
    pub(crate) path: Path,

    /// The payload object the import was reached at. The resumed pass
    /// normalizes against this slice; incremental transports do not resend
    /// it.
    pub(crate) slice: Object,

    pub(crate) client_abstract_types: IndexMap<String, Vec<String>>,
}

impl PendingModuleImport {
    pub(crate) fn handle(&self) -> ModuleImportHandle {
        ModuleImportHandle {
            document_name: self.document_name.clone(),
            fragment_name: self.fragment_name.clone(),
            path: self.path.clone(),
        }
    }
}

/// The set of module imports registered by committed passes.
#[derive(Default)]
pub(crate) struct ModuleImports {
    pending: Mutex<Vec<PendingModuleImport>>,
}

impl ModuleImports {
    fn lock(&self) -> MutexGuard<'_, Vec<PendingModuleImport>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn push_all(&self, imports: Vec<PendingModuleImport>) {
        if !imports.is_empty() {
            self.lock().extend(imports);
        }
    }

    pub(crate) fn drain(&self) -> Vec<PendingModuleImport> {
        std::mem::take(&mut *self.lock())
    }

    pub(crate) fn handles(&self) -> Vec<ModuleImportHandle> {
        self.lock().iter().map(PendingModuleImport::handle).collect()
    }
}

impl Normalizer {
    /// Resolve every registered module import through `loader`, in
    /// registration order.
    ///
    /// Each import is its own pass with its own outcome: a load failure or a
    /// normalization failure is scoped to that import's subtree and leaves
    /// both the store and the other imports' outcomes unaffected.
    #[tracing::instrument(skip_all, level = "trace")]
    pub async fn resolve_module_imports(
        &self,
        loader: &dyn ModuleLoader,
    ) -> Vec<Result<Normalized, NormalizeFailure>> {
        let pending = self.modules.drain();
        let mut outcomes = Vec::with_capacity(pending.len());
        for import in pending {
            outcomes.push(self.resolve_module_import(import, loader).await);
        }
        outcomes
    }

    async fn resolve_module_import(
        &self,
        import: PendingModuleImport,
        loader: &dyn ModuleLoader,
    ) -> Result<Normalized, NormalizeFailure> {
        let fragment = loader
            .load(&import.document_name, &import.fragment_name)
            .await
            .map_err(|err| NormalizeError::ModuleLoadError {
                document_name: import.document_name.clone(),
                reason: err.to_string(),
            })?;
        let variables = fragment.effective_variables(&import.bindings);
        // the module's data sits under the fragment prop when the server
        // nested it there, otherwise it shares the parent object
        let data = import
            .slice
            .get(import.fragment_prop_name.as_str())
            .and_then(|value| value.as_object())
            .unwrap_or(&import.slice);
        self.resume_pass(
            &fragment.selections,
            &variables,
            &import.client_abstract_types,
            &import.record,
            import.typename.as_deref(),
            import.actor.as_deref(),
            &import.path,
            data,
        )
    }

    /// The module imports still awaiting resolution.
    pub fn pending_module_imports(&self) -> Vec<ModuleImportHandle> {
        self.modules.handles()
    }

    /// Drop every pending module import, returning how many were dropped.
    /// Used when the operation is disposed before its modules arrive.
    pub fn abandon_module_imports(&self) -> usize {
        self.modules.drain().len()
    }
}
