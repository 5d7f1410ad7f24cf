use budget_tracker::{
    BudgetTrackingEngine, EngineContext, Error, Result, TransactionEvent,
    config::{self, AppConfig, database},
    sink::LoggingAlertSink,
    store::SeaOrmBudgetStore,
};
use dotenvy::dotenv;
use std::{io::BufRead, sync::Arc};
use tokio::sync::mpsc;
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

    // 2. Load .env file, env vars can also be set externally
    dotenv().ok();
    info!(version = env!("CARGO_PKG_VERSION"), "Starting budget tracker");

    // 3. Load the application configuration
    let app_config = config::load_app_configuration()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;

    // 4. Initialize database
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|()| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;
    let store = Arc::new(SeaOrmBudgetStore::new(db));

    // 5. Seed configured budgets
    seed_budgets(&store, &app_config).await?;

    // 6. Start the engine
    let (sender, receiver) = mpsc::channel(app_config.engine.queue_capacity);
    let ctx = EngineContext::new(store, Arc::new(LoggingAlertSink))
        .with_call_timeout(app_config.engine.call_timeout());
    let engine = BudgetTrackingEngine::new(receiver, ctx);
    engine.start()?;

    // 7. Feed newline-delimited JSON events from stdin; EOF closes the channel.
    // A plain thread, so a pending read cannot hold up runtime shutdown after Ctrl-C.
    std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || read_events(std::io::stdin().lock(), &sender))
        .map_err(|e| Error::Engine {
            message: format!("Failed to spawn stdin reader: {e}"),
        })?;

    // 8. Run until upstream closes or Ctrl-C
    let summary = tokio::select! {
        summary = engine.wait() => summary?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            engine.stop().await?
        }
    };

    if let Some(summary) = summary {
        info!(
            reason = ?summary.reason,
            received = summary.stats.events_received,
            skipped = summary.stats.events_skipped,
            applied = summary.stats.spends_applied,
            duplicates = summary.stats.duplicates,
            failures = summary.stats.failures,
            alerts_delivered = summary.stats.alerts_delivered,
            alerts_failed = summary.stats.alerts_failed,
            "Budget tracker finished"
        );
    }
    Ok(())
}

async fn seed_budgets(store: &SeaOrmBudgetStore, app_config: &AppConfig) -> Result<()> {
    for seed in &app_config.budgets {
        let budget = seed.to_budget()?;
        if store.insert_budget_if_missing(&budget).await? {
            info!(budget_id = %budget.id, user_id = %budget.user_id, "Seeded budget");
        }
    }
    Ok(())
}

fn read_events<R: BufRead>(input: R, sender: &mpsc::Sender<TransactionEvent>) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to read from stdin: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let event: TransactionEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(e) => {
                warn!("Skipping malformed transaction event: {}", e);
                continue;
            }
        };
        if sender.blocking_send(event).is_err() {
            // Engine stopped consuming
            break;
        }
    }
    info!("Transaction input closed");
}
