use actix_web::{web, HttpResponse};

use crate::db::store::TripStore;
use crate::error::{ok_json, AppError};
use crate::services::gemini::Generative;
use crate::services::ledger::{self, ActivityScope};
use crate::state::AppState;

/// Shared records for a destination, visible to every trip going there.
pub async fn shared_activities<S: TripStore + 'static, G: Generative + 'static>(
    state: web::Data<AppState<S, G>>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let activities = ledger::list_activities(&state.store, ActivityScope::Location(&path)).await?;
    Ok(ok_json(activities))
}

pub async fn discover<S: TripStore + 'static, G: Generative + 'static>(
    state: web::Data<AppState<S, G>>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let activities = ledger::discover_activities(&state, &path).await?;
    Ok(ok_json(activities))
}
