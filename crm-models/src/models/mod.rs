//! Typed CRM models layered over the generic `Record`.

pub mod client;
pub mod proposal;
pub mod organization;
pub mod user;
pub mod form;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::entity::EntityKind;

/// A model stored as records of a single entity kind.
pub trait TypedEntity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Table this model lives in.
    const KIND: EntityKind;

    /// Record id; empty for models not yet persisted.
    fn id(&self) -> &str;
}
