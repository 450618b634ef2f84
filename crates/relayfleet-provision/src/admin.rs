//! Operator-facing flows: node registration, admission policies and the
//! feature switchboard
//!
//! These share the coordinator's ownership of the store/cache write path;
//! each mutation republishes the affected runtime snapshot wholesale.

use crate::coordinator::Coordinator;
use crate::error::ProvisionError;
use chrono::Utc;
use relayfleet_alloc as alloc;
use relayfleet_cache::{AdmissionSnapshot, FeatureGates, NodeSnapshot};
use relayfleet_db::entities::{admission_policy, node};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Operator request to register a relay node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRequest {
    pub name: String,
    pub remark: Option<String>,
    pub rules: Vec<String>,
    pub web: bool,
    pub tunnel: bool,
    pub forward: bool,
    pub proxy: bool,
    pub p2p: bool,
    pub address: String,
    pub protocol: String,
    pub domain: Option<String>,
    pub deny_domain_prefix: Option<String>,
    pub forward_port_range: Option<String>,
    pub limit_reset_index: i32,
    pub limit_total: i32,
    pub limit_kind: i32,
}

/// Operator request to create or replace an admission policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionPolicyRequest {
    pub code: String,
    pub enabled: bool,
    pub allow_list: Vec<String>,
}

impl Coordinator {
    /// Register a relay node, publish its runtime snapshot and arrange its
    /// forward port range
    pub async fn register_node(&self, req: NodeRequest) -> Result<node::Model, ProvisionError> {
        if req.name.trim().is_empty() || req.address.trim().is_empty() {
            return Err(ProvisionError::Validation(
                "a node needs a name and an address".to_string(),
            ));
        }

        let now = Utc::now();
        let node = node::ActiveModel {
            code: Set(Uuid::new_v4().to_string()),
            key: Set(Uuid::new_v4()),
            name: Set(req.name),
            remark: Set(req.remark),
            web: Set(req.web),
            tunnel: Set(req.tunnel),
            forward: Set(req.forward),
            proxy: Set(req.proxy),
            p2p: Set(req.p2p),
            address: Set(req.address),
            protocol: Set(req.protocol),
            domain: Set(req.domain),
            deny_domain_prefix: Set(req.deny_domain_prefix),
            rules: Set(if req.rules.is_empty() {
                None
            } else {
                Some(req.rules.join(","))
            }),
            forward_port_range: Set(req.forward_port_range),
            limit_reset_index: Set(req.limit_reset_index),
            limit_total: Set(req.limit_total),
            limit_kind: Set(req.limit_kind),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db())
        .await?;

        self.cache().put_node_snapshot(&NodeSnapshot {
            code: node.code.clone(),
            limit_reset_index: node.limit_reset_index,
            limit_total: node.limit_total,
            limit_kind: node.limit_kind,
        });
        alloc::arrange_node_ports(self.db(), &node).await?;

        tracing::info!(node_code = %node.code, name = %node.name, "registered relay node");
        Ok(node)
    }

    /// Remove a relay node's runtime snapshot and row
    pub async fn deregister_node(&self, code: &str) -> Result<(), ProvisionError> {
        node::Entity::delete_by_id(code).exec(self.db()).await?;
        self.cache().remove_node_snapshot(code);
        tracing::info!(node_code = code, "deregistered relay node");
        Ok(())
    }

    /// Create or replace an admission policy and republish its snapshot.
    ///
    /// The allow set is recomputed wholesale on every update; there is no
    /// incremental patching.
    pub async fn put_admission_policy(
        &self,
        req: AdmissionPolicyRequest,
    ) -> Result<(), ProvisionError> {
        let allow_list = serde_json::to_string(&req.allow_list)
            .map_err(|_| ProvisionError::Validation("invalid allow list".to_string()))?;

        let now = Utc::now();
        let row = admission_policy::ActiveModel {
            code: Set(req.code.clone()),
            enabled: Set(req.enabled),
            allow_list: Set(allow_list),
            created_at: Set(now),
            updated_at: Set(now),
        };
        admission_policy::Entity::insert(row)
            .on_conflict(
                OnConflict::column(admission_policy::Column::Code)
                    .update_columns([
                        admission_policy::Column::Enabled,
                        admission_policy::Column::AllowList,
                        admission_policy::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(self.db())
            .await?;

        self.cache().put_admission(&AdmissionSnapshot::new(
            req.code.clone(),
            req.enabled,
            req.allow_list,
        ));
        tracing::info!(policy_code = %req.code, enabled = req.enabled, "admission policy published");
        Ok(())
    }

    /// Remove an admission policy and its snapshot
    pub async fn remove_admission_policy(&self, code: &str) -> Result<(), ProvisionError> {
        admission_policy::Entity::delete_by_id(code).exec(self.db()).await?;
        self.cache().remove_admission(code);
        tracing::info!(policy_code = code, "admission policy removed");
        Ok(())
    }

    /// Publish the fleet-wide feature switchboard.
    ///
    /// The host process seeds this from its own configuration at startup;
    /// an unset switchboard reads as everything disabled.
    pub fn set_feature_gates(&self, gates: FeatureGates) {
        self.cache().put_feature_gates(&gates);
        tracing::info!(?gates, "feature gates published");
    }
}
