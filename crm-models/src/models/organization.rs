use serde::{Deserialize, Serialize};

use crate::entity::EntityKind;
use crate::models::TypedEntity;

/// A tenant grouping users, clients and proposals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

impl TypedEntity for Organization {
    const KIND: EntityKind = EntityKind::Organizations;

    fn id(&self) -> &str {
        &self.id
    }
}
