use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::db::store::TripStore;
use crate::error::{ok_json, AppError};
use crate::middleware::auth_context::AuthenticatedUser;
use crate::services::gemini::Generative;
use crate::services::ledger;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ClearQuery {
    pub location: Option<String>,
}

#[derive(Serialize)]
struct Cleared {
    removed: u64,
}

/// Drops shared discovery records; trip-owned activities are untouched.
pub async fn clear_shared_activities<S: TripStore + 'static, G: Generative + 'static>(
    state: web::Data<AppState<S, G>>,
    user: AuthenticatedUser,
    query: web::Query<ClearQuery>,
) -> Result<HttpResponse, AppError> {
    let location = query
        .location
        .as_deref()
        .map(str::trim)
        .filter(|location| !location.is_empty());
    log::warn!("Admin {} is clearing shared activities", user.user_id);
    let removed = ledger::clear_shared(&state.store, location).await?;
    Ok(ok_json(Cleared { removed }))
}
