//! # Health Check Handler

use axum::Json;
use serde_json::{json, Value};

/// Liveness check for load balancers and monitoring
///
/// ## Route
/// GET /health
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME")
    }))
}
