use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::{ApiError, AppState};
use crate::reconcile::ReconcileOutcome;
use crate::store::ConfigRecord;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub declared_settings: usize,
    pub modules: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub module: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SettingValue {
    pub id: String,
    pub value: Value,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let registry = state.runtime.registry();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        declared_settings: registry.len(),
        modules: registry.modules().into_iter().map(String::from).collect(),
    })
}

pub async fn list_settings(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ConfigRecord>>, ApiError> {
    Ok(Json(state.runtime.list(query.module.as_deref()).await?))
}

pub async fn get_setting(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SettingValue>, ApiError> {
    let value = state.runtime.fetch(&id).await?;
    Ok(Json(SettingValue { id, value }))
}

pub async fn put_setting(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(value): Json<Value>,
) -> Result<Json<ConfigRecord>, ApiError> {
    Ok(Json(state.runtime.set(&id, value).await?))
}

pub async fn run_reconcile(State(state): State<AppState>) -> Result<Json<ReconcileOutcome>, ApiError> {
    Ok(Json(state.reconciler.run().await?))
}
