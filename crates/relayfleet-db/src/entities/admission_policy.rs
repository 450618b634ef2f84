//! Admission policy entity: an IP allow-list gate for a resource

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "admission_policies")]
pub struct Model {
    /// Policy code (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub code: String,

    /// Whether the allow-list is enforced; a disabled policy admits everyone
    pub enabled: bool,

    /// Allow-listed source addresses, serialized as a JSON string array
    #[sea_orm(column_type = "Text")]
    pub allow_list: String,

    /// When the policy was created
    pub created_at: ChronoDateTimeUtc,

    /// When the policy was last recomputed
    pub updated_at: ChronoDateTimeUtc,
}

impl Model {
    /// Deserialize the allow-list; malformed stored JSON reads as empty.
    pub fn sources(&self) -> Vec<String> {
        serde_json::from_str(&self.allow_list).unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
