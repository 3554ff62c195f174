//! HTTP API adapter.
//!
//! Exposes the backtest orchestrator as `POST /api/backtest` on an Axum
//! router. Collaborators are shared read-only between requests; each request
//! builds its own orchestrator on the blocking thread pool.

mod error;
mod handlers;

pub use error::WebError;
pub use handlers::*;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::domain::settings::{Lookback, ScanSettings};
use crate::ports::data_port::DataPort;
use crate::ports::interpretation_port::InterpretationPort;
use crate::ports::narrative_port::NarrativePort;
use crate::ports::sandbox_port::PredicateSandbox;

pub struct AppState {
    pub data: Arc<dyn DataPort + Send + Sync>,
    pub interpreter: Arc<dyn InterpretationPort + Send + Sync>,
    pub narrator: Arc<dyn NarrativePort + Send + Sync>,
    pub sandbox: Arc<dyn PredicateSandbox + Send + Sync>,
    pub lookback: Lookback,
    pub scan: ScanSettings,
}

/// The caller may keep its own handle on `state`; blocking HTTP clients
/// inside it must be dropped outside the async runtime.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/backtest", post(handlers::run_backtest))
        .route("/api/scan-anomalies", get(handlers::scan_anomalies))
        .fallback(handlers::not_found)
        .with_state(state)
}
