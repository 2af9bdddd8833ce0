//! HTTP surface: the Telegram webhook plus liveness, health and version endpoints

mod handlers;
mod ingress;
mod types;

pub use handlers::create_router;
pub use ingress::{pump_outbox, Ingress, IngressError};

use crate::engine::{MemorySink, ProductionEngine};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ProductionEngine>,
    pub ingress: Ingress,
    /// Recent submissions, when the sink keeps them
    pub journal: Option<Arc<MemorySink>>,
    /// Expected `X-Telegram-Bot-Api-Secret-Token`, if one was registered
    pub webhook_secret: Option<Arc<str>>,
}

impl AppState {
    pub fn new(engine: Arc<ProductionEngine>, ingress: Ingress) -> Self {
        Self {
            engine,
            ingress,
            journal: None,
            webhook_secret: None,
        }
    }

    pub fn with_journal(mut self, journal: Arc<MemorySink>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn with_webhook_secret(mut self, secret: Option<String>) -> Self {
        self.webhook_secret = secret.map(Arc::from);
        self
    }
}
