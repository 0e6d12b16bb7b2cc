//! Dynamic capture forms.
//!
//! A form is a named list of field definitions; submissions are stored by
//! the capture UI and are not modelled here.

use serde::{Deserialize, Serialize};

use crate::entity::EntityKind;
use crate::models::TypedEntity;

/// Input type of a form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    Text,
    Email,
    Phone,
    Number,
    Select,
    Checkbox,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    /// Choices for `Select` fields.
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Form {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FormField>,
    #[serde(default)]
    pub organization_id: Option<String>,
}

impl Form {
    /// Names of the fields a submission must fill in.
    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
    }
}

impl TypedEntity for Form {
    const KIND: EntityKind = EntityKind::Forms;

    fn id(&self) -> &str {
        &self.id
    }
}
