//! Credential entity: the generated username/password pair bound 1:1 to an
//! allocation; immutable after insert

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::allocation::TunnelKind;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "credentials")]
pub struct Model {
    /// Credential id (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Kind of the owning tunnel
    pub tunnel_type: TunnelKind,

    /// Code of the owning allocation; (tunnel_type, tunnel_code) is unique
    pub tunnel_code: String,

    /// Generated username
    pub username: String,

    /// Generated password
    pub password: String,

    /// When the pair was issued
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
