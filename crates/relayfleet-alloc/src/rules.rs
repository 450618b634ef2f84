//! Named allocation rules verified inside the provisioning transaction
//!
//! A node declares the rules it enforces as a comma-separated list of names.
//! Verification runs against live rows inside the same transaction as the
//! eventual insert, so a concurrent allocation by the same tenant cannot
//! slip between check and act. Names unknown to this build are skipped, so
//! rule sets written by a newer admin do not break older planes.

use crate::AllocError;
use relayfleet_db::entities::{allocation, node, tenant_account};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter};

/// Tenant's live allocation count on the node must stay below `limit_total`
pub const RULE_TUNNEL_LIMIT: &str = "tunnel-limit";

/// Tenant balance must be positive before any allocation-side work starts
pub const RULE_BALANCE_FLOOR: &str = "balance-floor";

/// At most one live allocation per client on the node
pub const RULE_SINGLE_PER_CLIENT: &str = "single-per-client";

/// Verify every rule the node declares, in declaration order.
///
/// The first violated rule aborts verification; its message is internal
/// detail and never reaches the external caller verbatim.
pub async fn verify_rules(
    txn: &DatabaseTransaction,
    tenant_code: &str,
    client_code: &str,
    node: &node::Model,
) -> Result<(), AllocError> {
    for rule in node.rule_names() {
        match rule {
            RULE_TUNNEL_LIMIT => verify_tunnel_limit(txn, tenant_code, node).await?,
            RULE_BALANCE_FLOOR => verify_balance_floor(txn, tenant_code).await?,
            RULE_SINGLE_PER_CLIENT => verify_single_per_client(txn, client_code, node).await?,
            unknown => {
                tracing::debug!(rule = unknown, node_code = %node.code, "skipping unknown rule");
            }
        }
    }
    Ok(())
}

async fn verify_tunnel_limit(
    txn: &DatabaseTransaction,
    tenant_code: &str,
    node: &node::Model,
) -> Result<(), AllocError> {
    if node.limit_total <= 0 {
        return Ok(());
    }
    let live = allocation::Entity::find()
        .filter(allocation::Column::NodeCode.eq(&node.code))
        .filter(allocation::Column::TenantCode.eq(tenant_code))
        .count(txn)
        .await?;
    if live >= node.limit_total as u64 {
        return Err(AllocError::RuleViolation(format!(
            "tenant {tenant_code} reached the node's tunnel limit of {}",
            node.limit_total
        )));
    }
    Ok(())
}

async fn verify_balance_floor(
    txn: &DatabaseTransaction,
    tenant_code: &str,
) -> Result<(), AllocError> {
    let account = tenant_account::Entity::find_by_id(tenant_code)
        .one(txn)
        .await?
        .ok_or_else(|| AllocError::RuleViolation(format!("tenant {tenant_code} does not exist")))?;
    if account.balance <= Decimal::ZERO {
        return Err(AllocError::RuleViolation(format!(
            "tenant {tenant_code} has no balance"
        )));
    }
    Ok(())
}

async fn verify_single_per_client(
    txn: &DatabaseTransaction,
    client_code: &str,
    node: &node::Model,
) -> Result<(), AllocError> {
    let live = allocation::Entity::find()
        .filter(allocation::Column::NodeCode.eq(&node.code))
        .filter(allocation::Column::ClientCode.eq(client_code))
        .count(txn)
        .await?;
    if live > 0 {
        return Err(AllocError::RuleViolation(format!(
            "client {client_code} already holds an allocation on node {}",
            node.code
        )));
    }
    Ok(())
}
