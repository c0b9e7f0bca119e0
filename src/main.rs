use dotenvy::dotenv;
use pack_ledger::{
    config::{database, settings},
    core::{purchase, report, wallet},
    errors::Result,
};
use std::env;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load application settings
    let app_config = match env::var("LEDGER_CONFIG") {
        Ok(path) => settings::load_config(&path)?,
        Err(_) => settings::load_default_config()?,
    };
    info!(
        "Ledger currency {}, withdrawal fee {}%, transfer fee {}%",
        app_config.base_currency,
        app_config.withdrawal.fee_percent,
        app_config.transfer_fee_percent
    );

    // 4. Open the store and make sure the schema and platform wallet exist
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to open the ledger store: {}", e))?;
    database::create_tables(&db).await?;
    let system = wallet::get_or_create_system_wallet(&db).await?;
    info!("Platform wallet {} ready (balance {})", system.id, system.balance);

    // 5. Housekeeping
    let expired = purchase::expire_packs(&db, chrono::Utc::now()).await?;
    info!("{} subscriptions expired", expired);

    // 6. Reconcile and report
    let reconciliation = report::reconcile(&db).await?;
    let summary = report::format_reconciliation_summary(&reconciliation);
    if reconciliation.is_balanced() {
        info!("{}", summary);
    } else {
        warn!("{}", summary);
    }

    Ok(())
}
