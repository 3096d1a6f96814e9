use std::sync::Arc;

use dashmap::DashMap;

use crate::store::MemoryStore;

/// Maps actor identifiers to their record stores.
///
/// Every actor owns a fully separate store with its own `client:root`;
/// normalization routes the subtree below an actor change into the store
/// this registry returns for the payload's actor identifier.
pub trait ActorRegistry: Send + Sync {
    /// The store holding `actor_id`'s records, created on first use.
    fn store_for(&self, actor_id: &str) -> Arc<MemoryStore>;
}

/// An in-memory registry creating one store per actor on demand.
#[derive(Debug, Default)]
pub struct MemoryActorRegistry {
    stores: DashMap<String, Arc<MemoryStore>>,
}

impl MemoryActorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

impl ActorRegistry for MemoryActorRegistry {
    fn store_for(&self, actor_id: &str) -> Arc<MemoryStore> {
        self.stores
            .entry(actor_id.to_string())
            .or_default()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_store_per_actor() {
        let registry = MemoryActorRegistry::new();
        let first = registry.store_for("actor:1");
        let again = registry.store_for("actor:1");
        let other = registry.store_for("actor:2");

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(registry.len(), 2);
    }
}
