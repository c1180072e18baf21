use actix_web::{web, HttpResponse};
use chrono::NaiveDate;

use crate::db::store::TripStore;
use crate::error::{ok_json, AppError};
use crate::middleware::auth_context::AuthenticatedUser;
use crate::models::itinerary::InsertActivity;
use crate::services::gemini::Generative;
use crate::services::itinerary_service;
use crate::state::AppState;

pub async fn get_itinerary<S: TripStore + 'static, G: Generative + 'static>(
    state: web::Data<AppState<S, G>>,
    user: AuthenticatedUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let itinerary = itinerary_service::get_itinerary(&state.store, &path, &user.user_id).await?;
    Ok(ok_json(itinerary))
}

pub async fn generate<S: TripStore + 'static, G: Generative + 'static>(
    state: web::Data<AppState<S, G>>,
    user: AuthenticatedUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let itinerary = itinerary_service::generate(&state, &path, &user.user_id).await?;
    Ok(ok_json(itinerary))
}

pub async fn insert_activity<S: TripStore + 'static, G: Generative + 'static>(
    state: web::Data<AppState<S, G>>,
    user: AuthenticatedUser,
    path: web::Path<(String, String)>,
    input: web::Json<InsertActivity>,
) -> Result<HttpResponse, AppError> {
    let (trip_id, raw_date) = path.into_inner();
    let date = NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d").map_err(|_| {
        AppError::Validation(format!("'{}' is not a date (expected YYYY-MM-DD).", raw_date))
    })?;

    let itinerary = itinerary_service::insert_activity(
        &state.store,
        &trip_id,
        &user.user_id,
        date,
        input.into_inner(),
    )
    .await?;
    Ok(ok_json(itinerary))
}
