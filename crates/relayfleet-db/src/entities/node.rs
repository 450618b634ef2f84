//! Relay node entity: a managed agent instance with declared feature flags

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "nodes")]
pub struct Model {
    /// Node code (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub code: String,

    /// Secret key the remote agent authenticates with
    pub key: Uuid,

    /// Display name
    pub name: String,

    /// Operator remark
    pub remark: Option<String>,

    /// Domain-bound host tunnels enabled
    pub web: bool,

    /// Private tunnels enabled
    pub tunnel: bool,

    /// Port forwards enabled
    pub forward: bool,

    /// Proxy tunnels enabled
    pub proxy: bool,

    /// P2P links enabled
    pub p2p: bool,

    /// Public address of the relay agent
    pub address: String,

    /// Relay protocol spoken by the agent
    pub protocol: String,

    /// Base domain host tunnels are published under
    pub domain: Option<String>,

    /// Comma-separated domain prefixes that may never be allocated
    pub deny_domain_prefix: Option<String>,

    /// Comma-separated rule names verified before each allocation
    pub rules: Option<String>,

    /// Inclusive "lo-hi" port range arranged for forwards
    pub forward_port_range: Option<String>,

    /// Day-of-month the node's traffic limit window resets on
    pub limit_reset_index: i32,

    /// Maximum live allocations per tenant (0 = unlimited)
    pub limit_total: i32,

    /// Which direction counts against the limit
    pub limit_kind: i32,

    /// When the node was registered
    pub created_at: ChronoDateTimeUtc,

    /// When the node was last updated
    pub updated_at: ChronoDateTimeUtc,
}

impl Model {
    /// Whether a candidate domain prefix is acceptable on this node.
    ///
    /// The deny list is an operator-maintained comma-separated set; matching
    /// is exact and case-insensitive.
    pub fn allows_prefix(&self, prefix: &str) -> bool {
        let Some(deny) = &self.deny_domain_prefix else {
            return true;
        };
        !deny
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .any(|d| d.eq_ignore_ascii_case(prefix))
    }

    /// Named rules this node requires, in declaration order.
    pub fn rule_names(&self) -> Vec<&str> {
        self.rules
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .collect()
    }

    /// The inclusive forward port range, if one is declared and well-formed.
    pub fn port_range(&self) -> Option<(u16, u16)> {
        let range = self.forward_port_range.as_deref()?;
        let (lo, hi) = range.split_once('-')?;
        let lo: u16 = lo.trim().parse().ok()?;
        let hi: u16 = hi.trim().parse().ok()?;
        (lo <= hi).then_some((lo, hi))
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Node owns arranged ports
    #[sea_orm(has_many = "super::node_port::Entity")]
    Ports,

    /// Node owns allocated domain prefixes
    #[sea_orm(has_many = "super::node_domain::Entity")]
    Domains,

    /// Node serves allocations
    #[sea_orm(has_many = "super::allocation::Entity")]
    Allocations,

    /// Node offers plans
    #[sea_orm(has_many = "super::plan::Entity")]
    Plans,
}

impl Related<super::node_port::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ports.def()
    }
}

impl Related<super::node_domain::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Domains.def()
    }
}

impl Related<super::allocation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Allocations.def()
    }
}

impl Related<super::plan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Plans.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn node(deny: Option<&str>, range: Option<&str>) -> Model {
        Model {
            code: "n1".into(),
            key: Uuid::new_v4(),
            name: "edge-1".into(),
            remark: None,
            web: true,
            tunnel: true,
            forward: true,
            proxy: false,
            p2p: false,
            address: "relay.example.com:8443".into(),
            protocol: "tls".into(),
            domain: Some("edge.example.com".into()),
            deny_domain_prefix: deny.map(Into::into),
            rules: None,
            forward_port_range: range.map(Into::into),
            limit_reset_index: 1,
            limit_total: 0,
            limit_kind: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn deny_list_matching_is_exact_and_case_insensitive() {
        let n = node(Some("www, api,Admin"), None);
        assert!(!n.allows_prefix("www"));
        assert!(!n.allows_prefix("API"));
        assert!(!n.allows_prefix("admin"));
        assert!(n.allows_prefix("wwwx"));
        assert!(n.allows_prefix("blog"));
    }

    #[test]
    fn empty_deny_list_allows_everything() {
        assert!(node(None, None).allows_prefix("anything"));
        assert!(node(Some(""), None).allows_prefix("anything"));
    }

    #[test]
    fn port_range_parsing() {
        assert_eq!(node(None, Some("20000-20100")).port_range(), Some((20000, 20100)));
        assert_eq!(node(None, Some("9000-9000")).port_range(), Some((9000, 9000)));
        assert_eq!(node(None, Some("9001-9000")).port_range(), None);
        assert_eq!(node(None, Some("garbage")).port_range(), None);
        assert_eq!(node(None, None).port_range(), None);
    }
}
