//! Quota ledger: optimistic-concurrency balance debits for tenant accounts
//!
//! A debit is a compare-and-swap on the account's `version` column, not a row
//! lock: the conditional update applies only while the version the caller
//! observed still matches, so a losing concurrent debit sees a [`Conflict`]
//! outcome instead of silently clobbering the balance. Retry policy belongs
//! to the caller — the ledger never loops internally, which keeps transaction
//! lifetimes bounded and rules out double-charging on ambiguous outcomes.
//!
//! [`Conflict`]: DebitOutcome::Conflict

use chrono::{DateTime, Duration, Utc};
use relayfleet_db::entities::{plan::ChargingType, tenant_account};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseTransaction, DbErr, EntityTrait, QueryFilter};

/// Result of one debit attempt.
///
/// Exactly one of three things happens, and the caller decides what each
/// means for the enclosing provisioning transaction: `Applied` proceeds,
/// `Conflict` is retryable with a freshly read version, `InsufficientFunds`
/// is terminal for the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitOutcome {
    /// The balance was debited and the version advanced by exactly one
    Applied { new_version: i64 },
    /// A concurrent debit won the race; nothing was written
    Conflict,
    /// The balance cannot cover the amount; nothing was written
    InsufficientFunds,
}

/// Debit `amount` from a tenant account inside the caller's open transaction.
///
/// `expected_version` must come from a read performed inside the same
/// transaction — pre-transaction reads are stale by definition. The balance
/// floor is zero: a debit may land the balance exactly on 0 but never below.
pub async fn debit(
    txn: &DatabaseTransaction,
    tenant_code: &str,
    expected_version: i64,
    amount: Decimal,
) -> Result<DebitOutcome, DbErr> {
    if amount.is_sign_negative() {
        return Err(DbErr::Custom(format!(
            "refusing negative debit of {amount} for tenant {tenant_code}"
        )));
    }

    let Some(account) = tenant_account::Entity::find_by_id(tenant_code).one(txn).await? else {
        tracing::debug!(tenant_code, "debit against unknown tenant account");
        return Ok(DebitOutcome::Conflict);
    };

    if account.balance < amount {
        tracing::debug!(
            tenant_code,
            balance = %account.balance,
            %amount,
            "debit rejected: insufficient funds"
        );
        return Ok(DebitOutcome::InsufficientFunds);
    }

    let result = tenant_account::Entity::update_many()
        .col_expr(
            tenant_account::Column::Balance,
            Expr::col(tenant_account::Column::Balance).sub(amount),
        )
        .col_expr(
            tenant_account::Column::Version,
            Expr::col(tenant_account::Column::Version).add(1),
        )
        .col_expr(tenant_account::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(tenant_account::Column::Code.eq(tenant_code))
        .filter(tenant_account::Column::Version.eq(expected_version))
        .exec(txn)
        .await?;

    if result.rows_affected == 0 {
        tracing::debug!(tenant_code, expected_version, "debit lost the version race");
        return Ok(DebitOutcome::Conflict);
    }

    let new_version = expected_version + 1;
    tracing::info!(tenant_code, %amount, new_version, "debited tenant account");
    Ok(DebitOutcome::Applied { new_version })
}

/// When a freshly charged allocation expires.
///
/// Cyclic plans run until the end of the paid cycle; one-time plans are paid
/// once and never expire.
pub fn charge_expiry(
    charging: ChargingType,
    cycle_days: i32,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match charging {
        ChargingType::Cyclic => Some(now + Duration::days(i64::from(cycle_days))),
        ChargingType::Once => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn cyclic_expiry_is_cycle_length_out() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

        let expiry = charge_expiry(ChargingType::Cyclic, 30, now);
        assert_eq!(expiry, Some(Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap()));
    }

    #[test]
    fn one_time_charging_never_expires() {
        let now = Utc::now();

        assert_eq!(charge_expiry(ChargingType::Once, 30, now), None);
    }
}
