use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;
use std::collections::HashMap;
use std::env;

use crate::config::{GEMINI_SETUP, STORAGE_SETUP};
use crate::db::store::TripStore;
use crate::services::gemini::Generative;
use crate::state::AppState;

#[derive(Serialize)]
struct HealthStatus {
    status: String,
    services: HashMap<String, ServiceStatus>,
    environment: String,
    version: String,
}

#[derive(Serialize, Clone)]
struct ServiceStatus {
    status: String,
    details: Option<String>,
}

impl ServiceStatus {
    fn ok(details: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            details: Some(details.into()),
        }
    }

    fn error(details: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            details: Some(details.into()),
        }
    }

    fn unconfigured(details: &str) -> Self {
        Self {
            status: "not_configured".to_string(),
            details: Some(details.to_string()),
        }
    }
}

pub async fn health_check<S: TripStore + 'static, G: Generative + 'static>(
    state: web::Data<AppState<S, G>>,
) -> impl Responder {
    let mut health = HealthStatus {
        status: "ok".to_string(),
        services: HashMap::new(),
        environment: env::var("RUST_ENV").unwrap_or("development".to_string()),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    health
        .services
        .insert("database".to_string(), check_store(&state.store).await);
    health
        .services
        .insert("generative_ai".to_string(), check_generative(&state.ai));
    health
        .services
        .insert("image_storage".to_string(), check_image_storage(&state).await);

    // Anything short of ok degrades the whole service
    if health.services.values().any(|service| service.status != "ok") {
        health.status = "degraded".to_string();
    }

    HttpResponse::Ok().json(health)
}

async fn check_store<S: TripStore>(store: &S) -> ServiceStatus {
    match store.ping().await {
        Ok(details) => ServiceStatus::ok(details),
        Err(e) => ServiceStatus::error(format!("Database ping failed: {}", e)),
    }
}

fn check_generative<G: Generative>(ai: &G) -> ServiceStatus {
    if ai.is_configured() {
        ServiceStatus::ok("API key present")
    } else {
        ServiceStatus::unconfigured(GEMINI_SETUP)
    }
}

async fn check_image_storage<S, G>(state: &AppState<S, G>) -> ServiceStatus {
    let Some(images) = &state.images else {
        return ServiceStatus::unconfigured(STORAGE_SETUP);
    };

    match images.check().await {
        Ok(()) => ServiceStatus::ok(format!("Bucket '{}' is reachable", images.bucket_name())),
        Err(e) => ServiceStatus::error(e.to_string()),
    }
}
