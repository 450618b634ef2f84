//! Cached tunnel descriptors: the per-allocation state agents enforce

use crate::Cache;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const TUNNEL_KEY: &str = "tunnel:";

/// Kind of relay binding, as published to agents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TunnelKind {
    Host,
    Forward,
    P2p,
}

/// Charging policy, as published to agents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargingKind {
    Cyclic,
    Once,
}

/// Cache-resident projection of one allocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelSnapshot {
    pub code: String,
    pub kind: TunnelKind,
    pub client_code: String,
    pub tenant_code: String,
    pub node_code: String,
    pub charging: ChargingKind,
    /// End of the paid cycle; `None` for one-time charging
    pub expires_at: Option<DateTime<Utc>>,
    /// Bandwidth cap in Mbps (0 = uncapped)
    pub limiter: i32,
}

impl Cache {
    /// Publish a tunnel snapshot, replacing any previous one
    pub fn put_tunnel_snapshot(&self, snapshot: &TunnelSnapshot) {
        self.set(&format!("{TUNNEL_KEY}{}", snapshot.code), snapshot, None);
    }

    /// Fetch the tunnel snapshot for `code`
    pub fn tunnel_snapshot(&self, code: &str) -> Option<TunnelSnapshot> {
        self.get(&format!("{TUNNEL_KEY}{code}"))
    }

    /// Drop the tunnel snapshot for `code`
    pub fn remove_tunnel_snapshot(&self, code: &str) {
        self.delete(&format!("{TUNNEL_KEY}{code}"));
    }
}
