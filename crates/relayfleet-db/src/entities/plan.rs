//! Plan entity: the charging descriptor a tunnel is provisioned under

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How an allocation is charged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum ChargingType {
    /// Debited per cycle; the allocation expires at the end of the paid cycle
    #[sea_orm(string_value = "cyclic")]
    Cyclic,

    /// Debited once at allocation time; never expires, never re-billed
    #[sea_orm(string_value = "once")]
    Once,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "plans")]
pub struct Model {
    /// Plan code (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub code: String,

    /// Node this plan is offered on
    pub node_code: String,

    /// Display name
    pub name: String,

    /// Charging policy
    pub charging_type: ChargingType,

    /// Cycle length in days (cyclic plans)
    pub cycle_days: i32,

    /// Price per charge
    #[sea_orm(column_type = "Decimal(Some((20, 4)))")]
    pub price: Decimal,

    /// Bandwidth cap in Mbps applied to tunnels on this plan (0 = uncapped)
    pub limiter: i32,

    /// When the plan was created
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Plan belongs to a node
    #[sea_orm(
        belongs_to = "super::node::Entity",
        from = "Column::NodeCode",
        to = "super::node::Column::Code"
    )]
    Node,
}

impl Related<super::node::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Node.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
