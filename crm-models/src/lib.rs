//! CRM Models - entities, records, the generic repository interface and
//! its storage adapters.
//!
//! This crate owns all persistence: entity names, typed models, the
//! `Repository` trait with in-memory and SQLite adapters, change events
//! produced by writes, and the local key-value cache.

pub mod entity;
pub mod record;
pub mod models;
pub mod repository;
pub mod memory;
pub mod db;
pub mod schema;
pub mod migrations;
pub mod sqlite;
pub mod kv;

// Re-export key types
pub use entity::{EntityKind, WatchedEntity};
pub use record::{ChangeEvent, ChangeKind, Record, RecordData};
pub use repository::{ChangeSink, ObservedRepository, Repository, RepositoryExt};
pub use memory::MemoryRepository;
pub use db::{Database, DbPool};
pub use sqlite::SqliteRepository;
pub use kv::{KeyValueCache, MemoryKeyValueCache, SqliteKeyValueCache};
pub use models::TypedEntity;
pub use models::client::Client;
pub use models::proposal::{Proposal, ProposalStage};
pub use models::organization::Organization;
pub use models::user::User;
pub use models::form::Form;
