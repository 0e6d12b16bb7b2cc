//! Entity names: the tables the repository stores and the subset the
//! realtime layer watches.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crm_core::error::CrmError;

/// Every table kind stored behind the generic repository interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Clients,
    Proposals,
    Organizations,
    Users,
    Forms,
}

impl EntityKind {
    /// All kinds, in display order.
    pub const ALL: [EntityKind; 5] = [
        Self::Clients,
        Self::Proposals,
        Self::Organizations,
        Self::Users,
        Self::Forms,
    ];

    /// Table identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clients => "clients",
            Self::Proposals => "proposals",
            Self::Organizations => "organizations",
            Self::Users => "users",
            Self::Forms => "forms",
        }
    }

    /// The watched counterpart, if changes to this kind are streamed.
    pub fn watched(&self) -> Option<WatchedEntity> {
        match self {
            Self::Clients => Some(WatchedEntity::Clients),
            Self::Proposals => Some(WatchedEntity::Proposals),
            Self::Organizations => Some(WatchedEntity::Organizations),
            Self::Users | Self::Forms => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = CrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| CrmError::InvalidEntity(s.to_string()))
    }
}

/// The closed set of tables whose changes are mirrored in realtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchedEntity {
    Clients,
    Proposals,
    Organizations,
}

impl WatchedEntity {
    /// Every watched entity.
    pub const ALL: [WatchedEntity; 3] = [Self::Clients, Self::Proposals, Self::Organizations];

    pub fn as_str(&self) -> &'static str {
        self.kind().as_str()
    }

    /// The repository kind backing this entity.
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Clients => EntityKind::Clients,
            Self::Proposals => EntityKind::Proposals,
            Self::Organizations => EntityKind::Organizations,
        }
    }

    /// Resolve a configured list of names; an empty list means all entities.
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<WatchedEntity>, CrmError> {
        if names.is_empty() {
            return Ok(Self::ALL.to_vec());
        }
        let mut entities = Vec::with_capacity(names.len());
        for name in names {
            let entity: WatchedEntity = name.as_ref().parse()?;
            if !entities.contains(&entity) {
                entities.push(entity);
            }
        }
        Ok(entities)
    }
}

impl fmt::Display for WatchedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WatchedEntity {
    type Err = CrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind: EntityKind = s.parse()?;
        kind.watched()
            .ok_or_else(|| CrmError::InvalidEntity(format!("{s} is not a watched entity")))
    }
}
