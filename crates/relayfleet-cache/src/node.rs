//! Cached node descriptors: the limit state agents need per node

use crate::Cache;
use serde::{Deserialize, Serialize};

const NODE_KEY: &str = "node:";

/// Cache-resident projection of a node's limit configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub code: String,
    /// Day-of-month the node's traffic window resets on
    pub limit_reset_index: i32,
    /// Maximum live allocations per tenant (0 = unlimited)
    pub limit_total: i32,
    /// Which traffic direction counts against the limit
    pub limit_kind: i32,
}

impl Cache {
    /// Publish a node snapshot, replacing any previous one
    pub fn put_node_snapshot(&self, snapshot: &NodeSnapshot) {
        self.set(&format!("{NODE_KEY}{}", snapshot.code), snapshot, None);
    }

    /// Fetch the node snapshot for `code`
    pub fn node_snapshot(&self, code: &str) -> Option<NodeSnapshot> {
        self.get(&format!("{NODE_KEY}{code}"))
    }

    /// Drop the node snapshot for `code`
    pub fn remove_node_snapshot(&self, code: &str) {
        self.delete(&format!("{NODE_KEY}{code}"));
    }
}
