//! Arranged forward ports; rows are created up front at node registration
//! and claimed by conditional update when a forward tunnel is provisioned

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "node_ports")]
pub struct Model {
    /// Node the port is reserved on
    #[sea_orm(primary_key, auto_increment = false)]
    pub node_code: String,

    /// Public port number
    #[sea_orm(primary_key, auto_increment = false)]
    pub port: i32,

    /// Allocation currently holding the port; NULL while free
    pub allocation_code: Option<String>,

    /// When the port row was arranged
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Port belongs to a node
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
