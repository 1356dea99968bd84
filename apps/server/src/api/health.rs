use std::sync::Arc;

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::main_lib::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "symbols": state.hub.len(),
        "subscribers": state.hub.subscriber_count(),
    }))
}
