//! Database configuration module for the ledger store.
//!
//! This module handles the database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust
//! structs. Composite unique constraints that the entity macros cannot express
//! (one rate per pack level, one commission per purchase event and level) are
//! added as explicit indexes.

use crate::entities::{
    Commission, CommissionRate, ExchangeRate, Pack, User, UserPack, Wallet, WalletSystem,
    WalletSystemTransaction, WalletTransaction, WithdrawalRequest, commission, commission_rate,
    user_pack,
};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use tracing::info;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/pack_ledger.sqlite?mode=rwc";

/// Gets the database URL from environment variable or returns default `SQLite` path.
///
/// This function looks for `DATABASE_URL` in the environment and falls back to
/// a default local `SQLite` file if not found.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the ledger store named by `DATABASE_URL`.
///
/// Falls back to a default local `SQLite` file if no environment variable is set.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    if let Some(file) = database_url.strip_prefix("sqlite://") {
        let file = file.split('?').next().unwrap_or_default();
        if let Some(parent) = std::path::Path::new(file).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }
    info!("Connecting to ledger store");
    Database::connect(&database_url).await.map_err(Into::into)
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates all ledger tables and unique indexes if they do not exist yet.
///
/// Safe to call on every start.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    create_table(db, &schema, User).await?;
    create_table(db, &schema, Wallet).await?;
    create_table(db, &schema, WalletTransaction).await?;
    create_table(db, &schema, WalletSystem).await?;
    create_table(db, &schema, WalletSystemTransaction).await?;
    create_table(db, &schema, Pack).await?;
    create_table(db, &schema, CommissionRate).await?;
    create_table(db, &schema, UserPack).await?;
    create_table(db, &schema, Commission).await?;
    create_table(db, &schema, WithdrawalRequest).await?;
    create_table(db, &schema, ExchangeRate).await?;

    let rate_per_level = Index::create()
        .name("idx_commission_rates_pack_level")
        .table(CommissionRate)
        .col(commission_rate::Column::PackId)
        .col(commission_rate::Column::Level)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&rate_per_level)).await?;

    let commission_per_event_level = Index::create()
        .name("idx_commissions_event_level")
        .table(Commission)
        .col(commission::Column::EventRef)
        .col(commission::Column::Level)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&commission_per_event_level))
        .await?;

    let sponsor_lookup = Index::create()
        .name("idx_user_packs_user_pack")
        .table(UserPack)
        .col(user_pack::Column::UserId)
        .col(user_pack::Column::PackId)
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&sponsor_lookup)).await?;

    info!("Ledger tables and indexes ensured");
    Ok(())
}
