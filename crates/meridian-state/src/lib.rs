//! State store abstraction for the Meridian control plane.
//!
//! Every registry manager persists through the [`StateStore`] trait. The
//! store is schemaless: bodies are opaque JSON documents, and callers scope
//! operations with an [`EntryMeta`] carrying the resource coordinates
//! (`scope`, `group`, `version`, `resource`). Each stored entry carries an
//! opaque etag used for optimistic concurrency on upsert.
//!
//! The only backend shipped here is [`MemoryStateStore`]; production
//! deployments plug in an external driver behind the same trait.

mod error;
mod memory;
mod traits;
mod types;

pub use error::{StateError, StateResult};
pub use memory::MemoryStateStore;
pub use traits::StateStore;
pub use types::{EntryMeta, StateEntry, UpsertRequest};
