//! A response normalization engine for persisted-query clients.
//!
//! Responses arrive as JSON trees shaped by the query that produced them;
//! caches want flat, identity-addressed records so that every entity exists
//! exactly once no matter how many paths reach it. This crate walks a
//! compiled selection tree and a response payload in lockstep and writes the
//! payload into a [`MemoryStore`] of such records, handling polymorphic
//! object types, deferred and streamed payloads, dynamically loaded
//! sub-operations and multi-actor routing along the way.
//!
//! The entry point is [`Normalizer`]: one instance per operation lifetime,
//! fed the base payload through [`Normalizer::normalize_response`] and any
//! incremental payloads through [`Normalizer::normalize_incremental`].

mod error;
mod json_ext;
mod normalize;
mod payload;
mod spec;
mod store;

pub use error::{ModuleError, NormalizeError, NormalizeFailure, PayloadShape};
pub use json_ext::{Object, Path, PathElement, Value};
pub use normalize::{
    ActorRegistry, MemoryActorRegistry, ModuleImportHandle, ModuleLoader, Normalized, Normalizer,
};
pub use payload::IncrementalPayload;
pub use spec::{
    ActorChange, Argument, ClientComponent, ClientExtension, Condition, Defer, Field,
    FragmentSpread, Handle, InlineFragment, LinkedField, LocalArgument, ModuleImport, Operation,
    Selection, SplitOperation, Stream, TypeDiscriminator,
};
pub use store::{
    generate_client_id, DataId, MemoryStore, MutationBuffer, Record, StoreValue,
    ACTOR_IDENTIFIER_KEY, ID_KEY, INVALIDATED_AT_KEY, ROOT_ID, ROOT_TYPE, TYPENAME_KEY,
};
