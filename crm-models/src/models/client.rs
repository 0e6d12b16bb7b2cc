//! Client (customer contact) model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::EntityKind;
use crate::models::TypedEntity;

/// Pipeline status of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    #[default]
    Lead,
    Active,
    Inactive,
}

/// A customer tracked by the sales team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub status: ClientStatus,
    #[serde(default)]
    pub last_contacted_at: Option<DateTime<Utc>>,
}

impl Client {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            email: None,
            phone: None,
            company: None,
            organization_id: None,
            status: ClientStatus::default(),
            last_contacted_at: None,
        }
    }
}

impl TypedEntity for Client {
    const KIND: EntityKind = EntityKind::Clients;

    fn id(&self) -> &str {
        &self.id
    }
}
