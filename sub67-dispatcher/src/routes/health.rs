use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use diesel::prelude::*;
use std::sync::Arc;

use sub67_shared::clients::db::DbPool;
use sub67_shared::{HealthCheck, HealthResponse, HealthStatus};

use crate::AppState;

async fn probe_database(pool: DbPool) -> HealthCheck {
    let result = tokio::task::spawn_blocking(move || -> Result<(), String> {
        let mut conn = pool.get().map_err(|e| e.to_string())?;
        diesel::sql_query("SELECT 1")
            .execute(&mut conn)
            .map(|_| ())
            .map_err(|e| e.to_string())
    })
    .await
    .unwrap_or_else(|e| Err(e.to_string()));

    match result {
        Ok(()) => HealthCheck {
            name: "postgres".to_string(),
            status: HealthStatus::Healthy,
            message: None,
        },
        Err(message) => HealthCheck {
            name: "postgres".to_string(),
            status: HealthStatus::Unhealthy,
            message: Some(message),
        },
    }
}

/// Health check probing the database and the broker channel.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let database = probe_database(state.db.clone()).await;

    let broker = if state.rabbitmq.is_connected() {
        HealthCheck {
            name: "rabbitmq".to_string(),
            status: HealthStatus::Healthy,
            message: None,
        }
    } else {
        HealthCheck {
            name: "rabbitmq".to_string(),
            status: HealthStatus::Degraded,
            message: Some("channel not connected".to_string()),
        }
    };

    let response = HealthResponse::healthy("sub67-dispatcher", env!("CARGO_PKG_VERSION"))
        .with_checks(vec![database, broker]);

    let status = match response.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status, Json(response)).into_response()
}

/// Returns Prometheus metrics.
pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}
