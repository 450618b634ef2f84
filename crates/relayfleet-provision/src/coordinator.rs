//! The provisioning state machine
//!
//! One request moves through `Validated → Allocating → Charging →
//! Committing → Published`; `Rejected` is reachable from validation and
//! `Aborted` from any in-transaction step. Aborting before commit leaves no
//! persisted side effect; once committed, cache publication and config
//! distribution are best-effort and never roll the commit back.

use crate::distributor::ConfigDistributor;
use crate::error::ProvisionError;
use crate::settings::ProvisionSettings;
use crate::validate;
use chrono::Utc;
use relayfleet_alloc::{
    allocate_domain_prefix, claim_forward_port, issue_credential, release_domain_prefix,
    release_forward_port, verify_rules,
};
use relayfleet_cache::{Cache, ChargingKind, TunnelSnapshot};
use relayfleet_db::entities::{
    allocation::{self, Matcher, TunnelKind},
    client, credential, node,
    plan::{self, ChargingType},
    tenant_account,
};
use relayfleet_ledger::{charge_expiry, debit, DebitOutcome};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Where a provisioning request currently is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionPhase {
    Validated,
    Allocating,
    Charging,
    Committing,
    Published,
    Rejected,
    Aborted,
}

impl ProvisionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            ProvisionPhase::Validated => "validated",
            ProvisionPhase::Allocating => "allocating",
            ProvisionPhase::Charging => "charging",
            ProvisionPhase::Committing => "committing",
            ProvisionPhase::Published => "published",
            ProvisionPhase::Rejected => "rejected",
            ProvisionPhase::Aborted => "aborted",
        }
    }
}

impl fmt::Display for ProvisionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request for a domain-bound host tunnel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostRequest {
    pub name: String,
    pub target_ip: String,
    pub target_port: String,
    pub target_https: bool,
    pub node_code: String,
    pub client_code: String,
    pub plan_code: String,
}

/// Request for a public port forward
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardRequest {
    pub name: String,
    pub target_ip: String,
    pub target_port: String,
    pub node_code: String,
    pub client_code: String,
    pub plan_code: String,
}

/// Request for a peer-to-peer link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct P2pRequest {
    pub name: String,
    pub target_ip: String,
    pub target_port: String,
    pub node_code: String,
    pub client_code: String,
    pub plan_code: String,
}

/// Everything a successful provisioning run hands back to the caller
#[derive(Debug, Clone)]
pub struct Provisioned {
    pub allocation: allocation::Model,
    pub credential: credential::Model,
}

/// Kind-erased provisioning input assembled by the public entry points
struct ProvisionJob {
    kind: TunnelKind,
    name: String,
    target_ip: String,
    target_port: String,
    target_https: bool,
    node_code: String,
    client_code: String,
    plan_code: String,
}

/// The provisioning coordinator.
///
/// Holds the store handle, the injected runtime cache and the config
/// distribution hook. Cheap to clone; one instance per process is the
/// intended lifecycle.
#[derive(Clone)]
pub struct Coordinator {
    db: DatabaseConnection,
    cache: Cache,
    distributor: Arc<dyn ConfigDistributor>,
    settings: ProvisionSettings,
}

impl Coordinator {
    pub fn new(
        db: DatabaseConnection,
        cache: Cache,
        distributor: Arc<dyn ConfigDistributor>,
        settings: ProvisionSettings,
    ) -> Self {
        Self {
            db,
            cache,
            distributor,
            settings,
        }
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub(crate) fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Provision a domain-bound host tunnel for `tenant_code`
    pub async fn provision_host(
        &self,
        tenant_code: &str,
        req: HostRequest,
    ) -> Result<Provisioned, ProvisionError> {
        self.provision(
            tenant_code,
            ProvisionJob {
                kind: TunnelKind::Host,
                name: req.name,
                target_ip: req.target_ip,
                target_port: req.target_port,
                target_https: req.target_https,
                node_code: req.node_code,
                client_code: req.client_code,
                plan_code: req.plan_code,
            },
        )
        .await
    }

    /// Provision a public port forward for `tenant_code`
    pub async fn provision_forward(
        &self,
        tenant_code: &str,
        req: ForwardRequest,
    ) -> Result<Provisioned, ProvisionError> {
        self.provision(
            tenant_code,
            ProvisionJob {
                kind: TunnelKind::Forward,
                name: req.name,
                target_ip: req.target_ip,
                target_port: req.target_port,
                target_https: false,
                node_code: req.node_code,
                client_code: req.client_code,
                plan_code: req.plan_code,
            },
        )
        .await
    }

    /// Provision a peer-to-peer link for `tenant_code`
    pub async fn provision_p2p(
        &self,
        tenant_code: &str,
        req: P2pRequest,
    ) -> Result<Provisioned, ProvisionError> {
        self.provision(
            tenant_code,
            ProvisionJob {
                kind: TunnelKind::P2p,
                name: req.name,
                target_ip: req.target_ip,
                target_port: req.target_port,
                target_https: false,
                node_code: req.node_code,
                client_code: req.client_code,
                plan_code: req.plan_code,
            },
        )
        .await
    }

    async fn provision(
        &self,
        tenant_code: &str,
        job: ProvisionJob,
    ) -> Result<Provisioned, ProvisionError> {
        if let Err(err) = self.validate(&job) {
            tracing::info!(
                phase = %ProvisionPhase::Rejected,
                tenant_code,
                kind = ?job.kind,
                %err,
                "provisioning request rejected before transaction"
            );
            return Err(err);
        }
        tracing::debug!(phase = %ProvisionPhase::Validated, tenant_code, kind = ?job.kind, "request validated");

        let txn = self.db.begin().await?;
        let staged = match self.provision_in_txn(&txn, tenant_code, &job).await {
            Ok(staged) => staged,
            Err(err) => {
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::error!(%rollback_err, "rollback failed after aborted provisioning");
                }
                tracing::info!(
                    phase = %ProvisionPhase::Aborted,
                    tenant_code,
                    kind = ?job.kind,
                    %err,
                    "provisioning transaction aborted"
                );
                return Err(err);
            }
        };

        tracing::debug!(phase = %ProvisionPhase::Committing, allocation_code = %staged.allocation.code, "committing");
        txn.commit().await?;

        // The cache must never see uncommitted state; publication happens
        // strictly after commit and its failure leaves only a stale cache,
        // reconciled by the periodic refresh.
        self.publish_allocation(&staged.allocation, &staged.credential);
        self.distribute(&staged.allocation.code).await;
        tracing::info!(
            phase = %ProvisionPhase::Published,
            tenant_code,
            allocation_code = %staged.allocation.code,
            kind = ?staged.allocation.kind,
            "tunnel provisioned"
        );
        Ok(staged)
    }

    fn validate(&self, job: &ProvisionJob) -> Result<(), ProvisionError> {
        if job.name.trim().is_empty() {
            return Err(ProvisionError::Validation("a tunnel name is required".to_string()));
        }
        if !validate::local_ip(&job.target_ip) {
            return Err(ProvisionError::Validation(
                "the target address must be a private IPv4 address".to_string(),
            ));
        }
        if !validate::port(&job.target_port) {
            return Err(ProvisionError::Validation("the target port is invalid".to_string()));
        }

        let gates = self.cache.feature_gates();
        let enabled = match job.kind {
            TunnelKind::Host => gates.web,
            TunnelKind::Forward => gates.forward,
            TunnelKind::P2p => gates.p2p,
        };
        if !enabled {
            return Err(ProvisionError::BusinessRule(
                "the operator has not enabled this tunnel kind".to_string(),
            ));
        }
        Ok(())
    }

    /// Everything between `Allocating` and the inserts, inside one
    /// transaction. Rows are re-fetched here — pre-transaction reads are
    /// never trusted.
    async fn provision_in_txn(
        &self,
        txn: &DatabaseTransaction,
        tenant_code: &str,
        job: &ProvisionJob,
    ) -> Result<Provisioned, ProvisionError> {
        tracing::debug!(phase = %ProvisionPhase::Allocating, tenant_code, "allocating resources");

        let tenant = tenant_account::Entity::find_by_id(tenant_code)
            .one(txn)
            .await?
            .ok_or_else(|| ProvisionError::BusinessRule("unknown tenant account".to_string()))?;
        let node = node::Entity::find_by_id(&job.node_code)
            .one(txn)
            .await?
            .ok_or_else(|| ProvisionError::BusinessRule("unknown node".to_string()))?;
        let client = client::Entity::find()
            .filter(client::Column::Code.eq(&job.client_code))
            .filter(client::Column::TenantCode.eq(tenant_code))
            .one(txn)
            .await?
            .ok_or_else(|| ProvisionError::BusinessRule("unknown client".to_string()))?;
        let plan = plan::Entity::find()
            .filter(plan::Column::Code.eq(&job.plan_code))
            .filter(plan::Column::NodeCode.eq(&node.code))
            .one(txn)
            .await?
            .ok_or_else(|| ProvisionError::BusinessRule("unknown plan".to_string()))?;

        let code = Uuid::new_v4().to_string();
        let (domain_prefix, port) = match job.kind {
            TunnelKind::Host => {
                let prefix = allocate_domain_prefix(
                    txn,
                    &node,
                    self.settings.prefix_len,
                    self.settings.max_prefix_attempts,
                )
                .await?;
                (Some(prefix), None)
            }
            TunnelKind::Forward => {
                let port = claim_forward_port(txn, &node, &code).await?;
                (None, Some(i32::from(port)))
            }
            TunnelKind::P2p => {
                if !node.p2p {
                    return Err(ProvisionError::BusinessRule(
                        "the node does not offer this tunnel kind".to_string(),
                    ));
                }
                (None, None)
            }
        };

        verify_rules(txn, tenant_code, &client.code, &node).await?;

        tracing::debug!(phase = %ProvisionPhase::Charging, tenant_code, plan_code = %plan.code, "charging");
        let now = Utc::now();
        let expires_at = charge_expiry(plan.charging_type, plan.cycle_days, now);
        if plan.price > Decimal::ZERO {
            match debit(txn, tenant_code, tenant.version, plan.price).await? {
                DebitOutcome::Applied { .. } => {}
                DebitOutcome::Conflict => return Err(ProvisionError::Conflict),
                DebitOutcome::InsufficientFunds => {
                    return Err(ProvisionError::BusinessRule(
                        "the account balance is insufficient".to_string(),
                    ));
                }
            }
        }

        let allocation = allocation::ActiveModel {
            code: Set(code.clone()),
            kind: Set(job.kind),
            name: Set(job.name.clone()),
            target_ip: Set(job.target_ip.clone()),
            target_port: Set(job.target_port.clone()),
            target_https: Set(job.target_https),
            domain_prefix: Set(domain_prefix),
            port: Set(port),
            node_code: Set(node.code.clone()),
            client_code: Set(client.code.clone()),
            tenant_code: Set(tenant.code.clone()),
            charging_type: Set(plan.charging_type),
            cycle_days: Set(plan.cycle_days),
            price: Set(plan.price),
            limiter: Set(plan.limiter),
            matchers: Set(None),
            expires_at: Set(expires_at),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(txn)
        .await?;

        let credential =
            issue_credential(txn, job.kind, &code, self.settings.credential_len).await?;

        Ok(Provisioned {
            allocation,
            credential,
        })
    }

    /// Remove an allocation, its credential and its runtime projections.
    ///
    /// The inverse of provisioning: one transaction deletes the rows and
    /// frees the prefix/port, then the cache entries are dropped and the
    /// serving agent is told to re-sync.
    pub async fn deprovision(&self, tenant_code: &str, code: &str) -> Result<(), ProvisionError> {
        let txn = self.db.begin().await?;
        let (_, credential) = match self.deprovision_in_txn(&txn, tenant_code, code).await {
            Ok(removed) => removed,
            Err(err) => {
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::error!(%rollback_err, "rollback failed after aborted deprovisioning");
                }
                return Err(err);
            }
        };
        txn.commit().await?;

        self.cache.remove_tunnel_snapshot(code);
        if let Some(credential) = &credential {
            self.cache.remove_auth(&credential.username, &credential.password);
        }
        self.distribute(code).await;
        tracing::info!(tenant_code, allocation_code = code, "tunnel deprovisioned");
        Ok(())
    }

    async fn deprovision_in_txn(
        &self,
        txn: &DatabaseTransaction,
        tenant_code: &str,
        code: &str,
    ) -> Result<(allocation::Model, Option<credential::Model>), ProvisionError> {
        let allocation = allocation::Entity::find()
            .filter(allocation::Column::Code.eq(code))
            .filter(allocation::Column::TenantCode.eq(tenant_code))
            .one(txn)
            .await?
            .ok_or_else(|| ProvisionError::BusinessRule("unknown allocation".to_string()))?;

        let credential = credential::Entity::find()
            .filter(credential::Column::TunnelType.eq(allocation.kind))
            .filter(credential::Column::TunnelCode.eq(code))
            .one(txn)
            .await?;

        if let Some(prefix) = &allocation.domain_prefix {
            release_domain_prefix(txn, &allocation.node_code, prefix).await?;
        }
        release_forward_port(txn, code).await?;

        credential::Entity::delete_many()
            .filter(credential::Column::TunnelType.eq(allocation.kind))
            .filter(credential::Column::TunnelCode.eq(code))
            .exec(txn)
            .await?;
        allocation::Entity::delete_many()
            .filter(allocation::Column::Code.eq(code))
            .exec(txn)
            .await?;

        Ok((allocation, credential))
    }

    /// Replace a forward tunnel's host→target overrides.
    ///
    /// The list is stored wholesale and the derived config re-pushed; there
    /// is no incremental patching of individual matchers.
    pub async fn update_forward_matchers(
        &self,
        tenant_code: &str,
        code: &str,
        matchers: Vec<Matcher>,
    ) -> Result<allocation::Model, ProvisionError> {
        let serialized = serde_json::to_string(&matchers)
            .map_err(|_| ProvisionError::Validation("invalid matcher list".to_string()))?;

        let txn = self.db.begin().await?;
        let updated = match self
            .update_matchers_in_txn(&txn, tenant_code, code, serialized)
            .await
        {
            Ok(updated) => updated,
            Err(err) => {
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::error!(%rollback_err, "rollback failed after aborted matcher update");
                }
                return Err(err);
            }
        };
        txn.commit().await?;

        self.cache.put_tunnel_snapshot(&runtime_snapshot(&updated));
        self.distribute(code).await;
        tracing::info!(tenant_code, allocation_code = code, "forward matchers updated");
        Ok(updated)
    }

    async fn update_matchers_in_txn(
        &self,
        txn: &DatabaseTransaction,
        tenant_code: &str,
        code: &str,
        serialized: String,
    ) -> Result<allocation::Model, ProvisionError> {
        let existing = allocation::Entity::find()
            .filter(allocation::Column::Code.eq(code))
            .filter(allocation::Column::TenantCode.eq(tenant_code))
            .filter(allocation::Column::Kind.eq(TunnelKind::Forward))
            .one(txn)
            .await?
            .ok_or_else(|| ProvisionError::BusinessRule("unknown forward tunnel".to_string()))?;

        let mut row: allocation::ActiveModel = existing.into();
        row.matchers = Set(Some(serialized));
        row.updated_at = Set(Utc::now());
        Ok(row.update(txn).await?)
    }

    /// Re-project one committed allocation into the cache.
    ///
    /// The entry point the periodic refresh calls to reconcile a cache that
    /// missed a publication; republishing identical state is idempotent.
    pub async fn republish(&self, code: &str) -> Result<(), ProvisionError> {
        let allocation = allocation::Entity::find_by_id(code)
            .one(&self.db)
            .await?
            .ok_or_else(|| ProvisionError::BusinessRule("unknown allocation".to_string()))?;
        let credential = credential::Entity::find()
            .filter(credential::Column::TunnelType.eq(allocation.kind))
            .filter(credential::Column::TunnelCode.eq(code))
            .one(&self.db)
            .await?;

        if let Some(credential) = &credential {
            self.publish_allocation(&allocation, credential);
        } else {
            self.cache.put_tunnel_snapshot(&runtime_snapshot(&allocation));
        }
        Ok(())
    }

    fn publish_allocation(&self, allocation: &allocation::Model, credential: &credential::Model) {
        self.cache
            .put_auth(&credential.username, &credential.password, &allocation.code);
        self.cache.put_tunnel_snapshot(&runtime_snapshot(allocation));
    }

    pub(crate) async fn distribute(&self, code: &str) {
        if let Err(error) = self.distributor.distribute(code).await {
            tracing::warn!(
                allocation_code = code,
                %error,
                "config distribution failed; the periodic refresh will reconcile"
            );
        }
    }
}

/// Project a committed allocation row into its cache-resident snapshot
fn runtime_snapshot(allocation: &allocation::Model) -> TunnelSnapshot {
    TunnelSnapshot {
        code: allocation.code.clone(),
        kind: match allocation.kind {
            TunnelKind::Host => relayfleet_cache::TunnelKind::Host,
            TunnelKind::Forward => relayfleet_cache::TunnelKind::Forward,
            TunnelKind::P2p => relayfleet_cache::TunnelKind::P2p,
        },
        client_code: allocation.client_code.clone(),
        tenant_code: allocation.tenant_code.clone(),
        node_code: allocation.node_code.clone(),
        charging: match allocation.charging_type {
            ChargingType::Cyclic => ChargingKind::Cyclic,
            ChargingType::Once => ChargingKind::Once,
        },
        expires_at: allocation.expires_at,
        limiter: allocation.limiter,
    }
}
