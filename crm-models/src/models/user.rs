//! Application users (sales reps and admins).

use serde::{Deserialize, Serialize};

use crate::entity::EntityKind;
use crate::models::TypedEntity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    #[default]
    Sales,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub organization_id: Option<String>,
}

impl User {
    /// Admins see the admin panel.
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl TypedEntity for User {
    const KIND: EntityKind = EntityKind::Users;

    fn id(&self) -> &str {
        &self.id
    }
}
