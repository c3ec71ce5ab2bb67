use std::sync::Arc;

use tokio::io::AsyncBufReadExt;

use ember::config::CompanionConfig;
use ember::dispatch::OutboundDispatcher;
use ember::gateway::{ConsoleGateway, DeliveryGateway, GatewayConfig, HttpGateway};
use ember::journal::JournalManager;
use ember::llm::{LlmConfig, create_provider};
use ember::orchestrator::{ConversationOrchestrator, InboundEvent, OrchestratorDeps};
use ember::risk::RiskAssessor;
use ember::scheduler::{ProactiveScheduler, ScheduleManager, SchedulerDeps};
use ember::session::SessionManager;
use ember::store::{LibSqlStore, StateStore};

/// How often expired records are swept from the store.
const SWEEP_INTERVAL_SECS: u64 = 60;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let api_key = std::env::var("ANTHROPIC_API_KEY").unwrap_or_else(|_| {
        eprintln!("Error: ANTHROPIC_API_KEY not set");
        eprintln!("  export ANTHROPIC_API_KEY=sk-ant-...");
        std::process::exit(1);
    });
    let model =
        std::env::var("EMBER_MODEL").unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string());
    let db_path = std::env::var("EMBER_DB_PATH").unwrap_or_else(|_| "./data/ember.db".to_string());

    let config = CompanionConfig::default();

    eprintln!("🕯️ Ember v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {model}");
    eprintln!("   Database: {db_path}");
    eprintln!("   Type a message and press Enter. /quit to exit.\n");

    let llm = create_provider(&LlmConfig {
        api_key: secrecy::SecretString::from(api_key),
        model,
        timeout: config.llm_timeout,
    });

    let store: Arc<dyn StateStore> = Arc::new(
        LibSqlStore::new_local(std::path::Path::new(&db_path))
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: Failed to open store at {db_path}: {e}");
                std::process::exit(1);
            }),
    );

    // Gateway: real messaging API when credentials exist, stdout otherwise.
    let gateway_config = GatewayConfig::from_env();
    let gateway: Arc<dyn DeliveryGateway> = if gateway_config.token.is_some() {
        Arc::new(HttpGateway::new(gateway_config))
    } else {
        eprintln!("   No gateway credentials; printing outbound messages here.");
        Arc::new(ConsoleGateway::new())
    };

    let sessions = Arc::new(SessionManager::new(store.clone(), config.history_cap));
    let schedules = Arc::new(ScheduleManager::new(store.clone()));
    let journal = Arc::new(JournalManager::new(store.clone(), config.journal_ttl));
    let dispatcher = Arc::new(OutboundDispatcher::new(
        gateway,
        config.max_segment_len,
        config.segment_pacing,
    ));
    let risk = Arc::new(RiskAssessor::new(
        llm.clone(),
        store.clone(),
        schedules.clone(),
        config.crisis_log_ttl,
    ));

    let orchestrator = Arc::new(ConversationOrchestrator::new(OrchestratorDeps {
        config: config.clone(),
        store: store.clone(),
        sessions: sessions.clone(),
        schedules: schedules.clone(),
        journal: journal.clone(),
        risk,
        llm: llm.clone(),
        dispatcher: dispatcher.clone(),
    }));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    // Proactive scheduler: leader-elected across replicas sharing the store.
    let scheduler = Arc::new(ProactiveScheduler::new(SchedulerDeps {
        config: config.clone(),
        store: store.clone(),
        sessions: sessions.clone(),
        schedules,
        llm,
        dispatcher,
    }));
    let scheduler_handle = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run(shutdown_rx).await })
    };

    // Expired-record sweep.
    let sweep_handle = {
        let store = store.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(SWEEP_INTERVAL_SECS));
            loop {
                interval.tick().await;
                match store.purge_expired().await {
                    Ok(0) => {}
                    Ok(n) => tracing::debug!(purged = n, "Swept expired records"),
                    Err(e) => tracing::warn!(error = %e, "Store sweep failed"),
                }
            }
        })
    };

    // Local REPL: each line becomes an inbound text event.
    let identity =
        std::env::var("EMBER_LOCAL_IDENTITY").unwrap_or_else(|_| "local-user".to_string());
    let stdin = tokio::io::stdin();
    let mut lines = tokio::io::BufReader::new(stdin).lines();
    loop {
        eprint!("> ");
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            continue;
                        }
                        if line == "/quit" {
                            break;
                        }
                        let event = InboundEvent::text(
                            &format!("local-{}", uuid::Uuid::new_v4()),
                            &identity,
                            &line,
                        );
                        if let Err(e) = orchestrator.handle_event(event).await {
                            tracing::error!(error = %e, "Failed to handle event");
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!(error = %e, "Error reading stdin");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    // Graceful shutdown: the scheduler releases its lease.
    let _ = shutdown_tx.send(true);
    let _ = scheduler_handle.await;
    sweep_handle.abort();
    eprintln!("Goodbye.");
    Ok(())
}

/// Tracing to stderr, plus a daily-rolling file when EMBER_LOG_DIR is set.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if let Ok(dir) = std::env::var("EMBER_LOG_DIR") {
        let appender = tracing_appender::rolling::daily(dir, "ember.log");
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(appender)
            .with_ansi(false)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }
}
