//! User-Agent Switcher Rule Synchronization
//!
//! This crate keeps the engine's dynamic rule table in step with the stored
//! configuration. The browser is reached only through two async traits,
//! `ConfigStore` and `RuleEngine`, so everything here runs unchanged against
//! the in-memory implementations used by the CLI and the tests.
//!
//! # Modules
//!
//! - `store`: key-value store interface and change notifications
//! - `engine`: dynamic rule table interface and namespace-scoped mutations
//! - `synchronizer`: per-namespace rebuild of the rule table
//! - `coordinator`: event handling with per-namespace serialization
//! - `repository`: configuration writes made by the popup and options page
//! - `memory`: in-memory store and engine

pub mod coordinator;
pub mod engine;
pub mod memory;
pub mod repository;
pub mod store;
pub mod synchronizer;

pub use coordinator::{Coordinator, Message};
pub use engine::{EngineError, NamespaceViolation, RuleEngine, RuleMutation};
pub use memory::{MemoryEngine, MemoryStore};
pub use repository::RepositoryError;
pub use store::{load_snapshot, ConfigStore, StorageChange, StoreError, LOCAL_AREA};
pub use synchronizer::{RuleSynchronizer, SyncError, SyncReport};
