//! Relational store for the relayfleet control plane
//!
//! This crate owns the authoritative transactional state: tenant balances,
//! nodes, clients, plans, allocations and their credentials. Everything the
//! data path reads at runtime is a projection of these tables into the
//! runtime cache; the tables here are the single source of truth.

pub mod entities;
pub mod migrator;

pub use migrator::Migrator;

use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;

/// Connect to the control-plane database.
///
/// Accepts any sea-orm connection URL (`sqlite::memory:`, `sqlite://...`,
/// `postgres://...`).
pub async fn connect(url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(url).await?;
    tracing::debug!(backend = ?db.get_database_backend(), "connected to control-plane database");
    Ok(db)
}

/// Run all pending migrations.
pub async fn migrate(db: &DatabaseConnection) -> Result<(), DbErr> {
    Migrator::up(db, None).await
}
