//! HTTP request handlers for the API adapter.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use chrono::Local;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::domain::anomaly::{ScanAlert, scan_volume};
use crate::domain::backtest::{BacktestOrchestrator, BacktestRequest};
use crate::domain::report::Report;

use super::{AppState, WebError};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn run_backtest(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BacktestRequest>, JsonRejection>,
) -> Result<Json<Report>, WebError> {
    let Json(request) = payload.map_err(|rejection| WebError::unprocessable(rejection.body_text()))?;
    tracing::info!(symbol = %request.symbol, interval = %request.interval, "backtest requested");

    let report = tokio::task::spawn_blocking(move || {
        BacktestOrchestrator::new(
            &*state.data,
            &*state.interpreter,
            &*state.narrator,
            &*state.sandbox,
            state.lookback,
        )
        .run(&request)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "backtest worker failed");
        WebError::internal()
    })??;

    Ok(Json(report))
}

pub async fn scan_anomalies(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ScanAlert>>, WebError> {
    let alerts = tokio::task::spawn_blocking(move || {
        scan_volume(&*state.data, &state.scan, Local::now().naive_local())
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "scan worker failed");
        WebError::internal()
    })?;
    Ok(Json(alerts))
}

pub async fn not_found() -> WebError {
    WebError::not_found("Not Found")
}
