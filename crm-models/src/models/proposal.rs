//! Proposal model and the kanban stages it moves through.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::entity::EntityKind;
use crate::models::TypedEntity;

/// Kanban column of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStage {
    #[default]
    Draft,
    Sent,
    Negotiation,
    Won,
    Lost,
}

impl ProposalStage {
    /// Board order, left to right.
    pub const BOARD: [ProposalStage; 5] = [
        Self::Draft,
        Self::Sent,
        Self::Negotiation,
        Self::Won,
        Self::Lost,
    ];

    /// Whether the deal is finished either way.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

/// A priced offer made to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    #[serde(default)]
    pub id: String,
    pub client_id: String,
    pub title: String,
    /// Value in the organization's currency, minor units.
    #[serde(default)]
    pub amount_cents: i64,
    #[serde(default)]
    pub stage: ProposalStage,
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
    #[serde(default)]
    pub owner_id: Option<String>,
}

impl Proposal {
    /// A new draft for `client_id`.
    pub fn new(client_id: impl Into<String>, title: impl Into<String>, amount_cents: i64) -> Self {
        Self {
            id: String::new(),
            client_id: client_id.into(),
            title: title.into(),
            amount_cents,
            stage: ProposalStage::Draft,
            valid_until: None,
            owner_id: None,
        }
    }
}

impl TypedEntity for Proposal {
    const KIND: EntityKind = EntityKind::Proposals;

    fn id(&self) -> &str {
        &self.id
    }
}
