//! Client entity: a tenant-owned endpoint that tunnels terminate at

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "clients")]
pub struct Model {
    /// Client code (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub code: String,

    /// Owning tenant
    pub tenant_code: String,

    /// Display name
    pub name: String,

    /// When the client was created
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Client belongs to a tenant
    #[sea_orm(
        belongs_to = "super::tenant_account::Entity",
        from = "Column::TenantCode",
        to = "super::tenant_account::Column::Code"
    )]
    Tenant,

    /// Client terminates allocations
    #[sea_orm(has_many = "super::allocation::Entity")]
    Allocations,
}

impl Related<super::tenant_account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl Related<super::allocation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Allocations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
