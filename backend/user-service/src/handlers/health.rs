use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;

use crate::app_state::AppState;
use crate::db;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: String,
    database: &'static str,
}

/// Liveness probe, mounted outside the versioned API.
pub async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let database = match &state.db {
        Some(pool) => match db::ping(pool).await {
            Ok(()) => "healthy",
            Err(e) => {
                tracing::warn!(error = %e, "database ping failed");
                "unhealthy"
            }
        },
        None => "memory",
    };

    HttpResponse::Ok().json(HealthResponse {
        status: if database == "unhealthy" { "degraded" } else { "ok" },
        version: state.config.app.server_version.clone(),
        database,
    })
}
