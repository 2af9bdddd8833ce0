//! menuflow - menu-driven conversation bot
//!
//! Serves a Telegram webhook and walks each chat through declarative,
//! state-based conversation flows.

mod api;
mod config;
mod engine;
mod session;
mod state_machine;
mod telegram;
mod validate;

use api::{create_router, pump_outbox, AppState, Ingress};
use config::Config;
use engine::{
    spawn_sweeper, Engine, LogSink, MemorySink, NotificationSink, OperatorChatSink, Transport,
};
use state_machine::standard_definition;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use telegram::{LogTransport, TelegramTransport};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const OUTBOX_CAPACITY: usize = 256;
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "menuflow=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = Config::from_env()?;

    // Conversation definition; a broken one stops us here
    let definition = standard_definition(config.flows.clone(), &config.entry_commands)?;

    // Transport
    let transport: Arc<dyn Transport> = match &config.bot_token {
        Some(token) => Arc::new(TelegramTransport::new(token, &config.telegram_api_url)?),
        None => {
            tracing::warn!("BOT_TOKEN not set; replies will only be logged");
            Arc::new(LogTransport)
        }
    };

    // Notification sink, journaled for /health
    let primary: Arc<dyn NotificationSink> = match &config.operator_chat {
        Some(chat) => Arc::new(OperatorChatSink::new(Arc::clone(&transport), chat.clone())),
        None => {
            tracing::warn!("MENUFLOW_OPERATOR_CHAT_ID not set; submissions will only be logged");
            Arc::new(LogSink)
        }
    };
    let journal = Arc::new(MemorySink::forwarding(config.journal_capacity, primary));
    let sink: Arc<dyn NotificationSink> = journal.clone();

    // Engine and background tasks
    let (outbox_tx, outbox_rx) = mpsc::channel(OUTBOX_CAPACITY);
    let engine = Arc::new(Engine::new(
        definition,
        sink,
        config.engine_settings(),
        outbox_tx,
    ));
    tracing::info!(
        states = engine.definition().declared_states().count(),
        entries = ?config.entry_commands,
        "Conversation definition validated"
    );
    let outbox = tokio::spawn(pump_outbox(outbox_rx, Arc::clone(&transport)));

    let cancel = CancellationToken::new();
    let sweeper = spawn_sweeper(
        Arc::clone(&engine),
        Arc::clone(&transport),
        config.sweep_interval,
        cancel.clone(),
    );

    let (ingress, workers) =
        Ingress::spawn(Arc::clone(&engine), Arc::clone(&transport), config.workers);

    // Create router
    let state = AppState::new(Arc::clone(&engine), ingress)
        .with_journal(journal)
        .with_webhook_secret(config.webhook_secret.clone());
    let app = create_router(state).layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("menuflow listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain: queued events first, then deliveries, then notices
    tracing::info!("Shutting down");
    cancel.cancel();
    for result in futures::future::join_all(workers).await {
        if let Err(e) = result {
            tracing::error!(error = %e, "Ingestion worker failed");
        }
    }
    if let Err(e) = sweeper.await {
        tracing::error!(error = %e, "Sweeper failed");
    }
    if tokio::time::timeout(SHUTDOWN_GRACE, engine.flush_notifications())
        .await
        .is_err()
    {
        tracing::warn!(
            pending = engine.pending_notifications(),
            "Abandoning undelivered submissions"
        );
    }
    drop(engine);
    if tokio::time::timeout(SHUTDOWN_GRACE, outbox).await.is_err() {
        tracing::warn!("Outbox did not drain in time");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
