//! Resource allocator for the relayfleet control plane
//!
//! Issues the scarce resources a tunnel needs — a unique domain prefix or a
//! public port on the serving node, plus a credential pair — and verifies the
//! node's allocation rules. Every operation here runs inside the caller's
//! open transaction; nothing is persisted if the enclosing provisioning
//! transaction aborts.
//!
//! Candidate generation itself is not transactionally protected; only the
//! final insert is. A generated prefix that collides with a live record
//! fails on the unique key and generation retries, bounded by
//! `max_attempts`.

pub mod random;
pub mod rules;

pub use random::{random_string, Alphabet};
pub use rules::verify_rules;

use chrono::Utc;
use relayfleet_db::entities::{allocation::TunnelKind, credential, node, node_domain, node_port};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by allocation-side work.
///
/// Any of these aborts the enclosing provisioning transaction; no partial
/// allocation is ever persisted.
#[derive(Debug, Error)]
pub enum AllocError {
    /// The node does not offer the requested tunnel kind
    #[error("node has the requested feature disabled")]
    FeatureDisabled,

    /// The generated prefix is on the node's deny list
    #[error("domain prefix is forbidden on this node")]
    PrefixForbidden,

    /// Generation kept colliding with live records and hit its attempt bound
    #[error("could not allocate a unique domain prefix after {attempts} attempts")]
    Collision { attempts: u32 },

    /// No arranged port on the node is free
    #[error("node has no free forward port")]
    PortsExhausted,

    /// A node- or tenant-scoped rule rejected the allocation
    #[error("allocation rule violated: {0}")]
    RuleViolation(String),

    /// The store failed
    #[error("database error: {0}")]
    Db(#[from] DbErr),
}

/// Allocate a unique domain prefix on `node` inside the caller's transaction.
///
/// The prefix is drawn from the lowercase-letter alphabet, checked against
/// the node's deny list and capability flag, and claimed by inserting into
/// `node_domains` — the composite key makes the insert fail atomically on a
/// collision with a live record, in which case generation retries up to
/// `max_attempts` times.
pub async fn allocate_domain_prefix(
    txn: &DatabaseTransaction,
    node: &node::Model,
    prefix_len: usize,
    max_attempts: u32,
) -> Result<String, AllocError> {
    if !node.web {
        return Err(AllocError::FeatureDisabled);
    }

    for attempt in 1..=max_attempts {
        let candidate = random_string(prefix_len, Alphabet::Letters);
        if !node.allows_prefix(&candidate) {
            return Err(AllocError::PrefixForbidden);
        }

        let row = node_domain::ActiveModel {
            node_code: Set(node.code.clone()),
            prefix: Set(candidate.clone()),
            created_at: Set(Utc::now()),
        };
        // Savepoint per attempt: a unique-key failure must not poison the
        // enclosing provisioning transaction on backends that abort on error
        let attempt_txn = txn.begin().await?;
        match row.insert(&attempt_txn).await {
            Ok(_) => {
                attempt_txn.commit().await?;
                tracing::debug!(node_code = %node.code, prefix = %candidate, "allocated domain prefix");
                return Ok(candidate);
            }
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                attempt_txn.rollback().await?;
                tracing::debug!(
                    node_code = %node.code,
                    prefix = %candidate,
                    attempt,
                    "domain prefix collided with a live record, regenerating"
                );
            }
            Err(err) => {
                let _ = attempt_txn.rollback().await;
                return Err(err.into());
            }
        }
    }

    Err(AllocError::Collision {
        attempts: max_attempts,
    })
}

/// Release a previously allocated domain prefix
pub async fn release_domain_prefix(
    txn: &DatabaseTransaction,
    node_code: &str,
    prefix: &str,
) -> Result<(), AllocError> {
    node_domain::Entity::delete_many()
        .filter(node_domain::Column::NodeCode.eq(node_code))
        .filter(node_domain::Column::Prefix.eq(prefix))
        .exec(txn)
        .await?;
    Ok(())
}

/// Claim a free arranged port on `node` for `allocation_code`.
///
/// The claim is a conditional update (`WHERE allocation_code IS NULL`); a
/// concurrent claim of the same port affects zero rows and the search moves
/// to the next free port.
pub async fn claim_forward_port(
    txn: &DatabaseTransaction,
    node: &node::Model,
    allocation_code: &str,
) -> Result<u16, AllocError> {
    if !node.forward {
        return Err(AllocError::FeatureDisabled);
    }

    loop {
        let Some(free) = node_port::Entity::find()
            .filter(node_port::Column::NodeCode.eq(&node.code))
            .filter(node_port::Column::AllocationCode.is_null())
            .order_by_asc(node_port::Column::Port)
            .one(txn)
            .await?
        else {
            return Err(AllocError::PortsExhausted);
        };

        let claimed = node_port::Entity::update_many()
            .col_expr(
                node_port::Column::AllocationCode,
                sea_orm::sea_query::Expr::value(allocation_code),
            )
            .filter(node_port::Column::NodeCode.eq(&node.code))
            .filter(node_port::Column::Port.eq(free.port))
            .filter(node_port::Column::AllocationCode.is_null())
            .exec(txn)
            .await?;

        if claimed.rows_affected == 1 {
            tracing::debug!(node_code = %node.code, port = free.port, allocation_code, "claimed forward port");
            return Ok(free.port as u16);
        }
        // Lost the port to a concurrent claim; try the next free one
    }
}

/// Release the port held by `allocation_code`, if any
pub async fn release_forward_port(
    txn: &DatabaseTransaction,
    allocation_code: &str,
) -> Result<(), AllocError> {
    node_port::Entity::update_many()
        .col_expr(
            node_port::Column::AllocationCode,
            sea_orm::sea_query::Expr::value(Option::<String>::None),
        )
        .filter(node_port::Column::AllocationCode.eq(allocation_code))
        .exec(txn)
        .await?;
    Ok(())
}

/// Arrange the node's declared forward port range as claimable rows.
///
/// Idempotent: ports already arranged are left untouched, so re-running
/// after a range extension only adds the new ports. Returns the number of
/// rows inserted.
pub async fn arrange_node_ports<C: ConnectionTrait>(
    db: &C,
    node: &node::Model,
) -> Result<u64, AllocError> {
    let Some((lo, hi)) = node.port_range() else {
        return Ok(0);
    };

    let now = Utc::now();
    let rows: Vec<node_port::ActiveModel> = (lo..=hi)
        .map(|port| node_port::ActiveModel {
            node_code: Set(node.code.clone()),
            port: Set(i32::from(port)),
            allocation_code: Set(None),
            created_at: Set(now),
        })
        .collect();
    if rows.is_empty() {
        return Ok(0);
    }

    let inserted = node_port::Entity::insert_many(rows)
        .on_conflict(
            OnConflict::columns([node_port::Column::NodeCode, node_port::Column::Port])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    tracing::info!(node_code = %node.code, lo, hi, inserted, "arranged forward ports");
    Ok(inserted)
}

/// Issue the credential pair for a freshly allocated tunnel.
///
/// Both halves are independent draws from the alphanumeric alphabet; at the
/// configured length a collision across the live credential set is
/// practically negligible, and the pair is immutable once stored.
pub async fn issue_credential(
    txn: &DatabaseTransaction,
    kind: TunnelKind,
    tunnel_code: &str,
    credential_len: usize,
) -> Result<credential::Model, AllocError> {
    let row = credential::ActiveModel {
        id: Set(Uuid::new_v4()),
        tunnel_type: Set(kind),
        tunnel_code: Set(tunnel_code.to_string()),
        username: Set(random_string(credential_len, Alphabet::Alphanumeric)),
        password: Set(random_string(credential_len, Alphabet::Alphanumeric)),
        created_at: Set(Utc::now()),
    };
    let stored = row.insert(txn).await?;
    tracing::debug!(tunnel_code, username = %stored.username, "issued tunnel credential");
    Ok(stored)
}
