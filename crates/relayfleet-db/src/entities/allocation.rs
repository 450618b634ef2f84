//! Allocation entity: one provisioned tunnel binding and its charging state

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::plan::ChargingType;

/// Kind of relay binding an allocation represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum TunnelKind {
    /// Domain-bound host tunnel
    #[sea_orm(string_value = "host")]
    Host,

    /// Public port forward
    #[sea_orm(string_value = "forward")]
    Forward,

    /// Peer-to-peer link
    #[sea_orm(string_value = "p2p")]
    P2p,
}

/// A host→target override attached to a forward tunnel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matcher {
    pub host: String,
    pub target_ip: String,
    pub target_port: String,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "allocations")]
pub struct Model {
    /// Allocation code (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub code: String,

    /// Binding kind
    pub kind: TunnelKind,

    /// Display name
    pub name: String,

    /// Private target address the owning client forwards to
    pub target_ip: String,

    /// Private target port
    pub target_port: String,

    /// Whether the private target speaks HTTPS
    pub target_https: bool,

    /// Allocated domain prefix (host tunnels)
    pub domain_prefix: Option<String>,

    /// Claimed public port (forward tunnels)
    pub port: Option<i32>,

    /// Serving node
    pub node_code: String,

    /// Terminating client
    pub client_code: String,

    /// Owning tenant
    pub tenant_code: String,

    /// Charging policy copied from the plan at allocation time
    pub charging_type: ChargingType,

    /// Cycle length in days copied from the plan
    pub cycle_days: i32,

    /// Price copied from the plan
    #[sea_orm(column_type = "Decimal(Some((20, 4)))")]
    pub price: Decimal,

    /// Bandwidth cap in Mbps copied from the plan (0 = uncapped)
    pub limiter: i32,

    /// Host→target overrides, serialized as JSON (forward tunnels)
    #[sea_orm(column_type = "Text", nullable)]
    pub matchers: Option<String>,

    /// When the paid cycle ends; NULL for one-time charging
    pub expires_at: Option<ChronoDateTimeUtc>,

    /// When the allocation was provisioned
    pub created_at: ChronoDateTimeUtc,

    /// When the allocation was last updated
    pub updated_at: ChronoDateTimeUtc,
}

impl Model {
    /// Deserialize the matcher list; malformed stored JSON reads as empty.
    pub fn matcher_list(&self) -> Vec<Matcher> {
        self.matchers
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Allocation is served by a node
    #[sea_orm(
        belongs_to = "super::node::Entity",
        from = "Column::NodeCode",
        to = "super::node::Column::Code"
    )]
    Node,

    /// Allocation terminates at a client
    #[sea_orm(
        belongs_to = "super::client::Entity",
        from = "Column::ClientCode",
        to = "super::client::Column::Code"
    )]
    Client,

    /// Allocation is owned by a tenant
    #[sea_orm(
        belongs_to = "super::tenant_account::Entity",
        from = "Column::TenantCode",
        to = "super::tenant_account::Column::Code"
    )]
    Tenant,
}

impl Related<super::node::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Node.def()
    }
}

impl Related<super::client::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Client.def()
    }
}

impl Related<super::tenant_account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
