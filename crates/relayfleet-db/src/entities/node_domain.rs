//! Allocated domain prefix rows; the composite primary key is the
//! collision-safe insert-or-fail target for prefix allocation

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "node_domains")]
pub struct Model {
    /// Node the prefix is published on
    #[sea_orm(primary_key, auto_increment = false)]
    pub node_code: String,

    /// The allocated prefix; unique per node while the row is live
    #[sea_orm(primary_key, auto_increment = false)]
    pub prefix: String,

    /// When the prefix was allocated
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Prefix belongs to a node
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
