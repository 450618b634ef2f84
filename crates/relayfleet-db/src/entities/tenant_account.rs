//! Tenant account entity holding the prepaid balance debited by provisioning

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tenant_accounts")]
pub struct Model {
    /// Tenant code (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub code: String,

    /// Display name
    pub name: String,

    /// Prepaid balance; every chargeable allocation debits it
    #[sea_orm(column_type = "Decimal(Some((20, 4)))")]
    pub balance: Decimal,

    /// Optimistic-concurrency counter; a successful debit bumps it by
    /// exactly one, and a debit only applies while it still matches
    pub version: i64,

    /// When the account was created
    pub created_at: ChronoDateTimeUtc,

    /// When the account was last mutated
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Tenant owns clients
    #[sea_orm(has_many = "super::client::Entity")]
    Clients,

    /// Tenant owns allocations
    #[sea_orm(has_many = "super::allocation::Entity")]
    Allocations,
}

impl Related<super::client::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Clients.def()
    }
}

impl Related<super::allocation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Allocations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
