use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::db::store::TripStore;
use crate::error::{ok_json, AppError};
use crate::middleware::auth_context::AuthenticatedUser;
use crate::models::activity::{NewActivity, VoteInput};
use crate::services::gemini::Generative;
use crate::services::ledger::{self, ActivityScope};
use crate::services::trip_service::load_member_trip;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ExtractInput {
    pub url: String,
}

pub async fn list_activities<S: TripStore + 'static, G: Generative + 'static>(
    state: web::Data<AppState<S, G>>,
    user: AuthenticatedUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let trip = load_member_trip(&state.store, &path, &user.user_id).await?;
    let activities = ledger::list_activities(&state.store, ActivityScope::Trip(&trip)).await?;
    Ok(ok_json(activities))
}

pub async fn create_activity<S: TripStore + 'static, G: Generative + 'static>(
    state: web::Data<AppState<S, G>>,
    user: AuthenticatedUser,
    path: web::Path<String>,
    input: web::Json<NewActivity>,
) -> Result<HttpResponse, AppError> {
    let trip = load_member_trip(&state.store, &path, &user.user_id).await?;
    let activity =
        ledger::create_activity(&state.store, &trip, &user.user_id, input.into_inner()).await?;
    Ok(ok_json(activity))
}

pub async fn extract_activity<S: TripStore + 'static, G: Generative + 'static>(
    state: web::Data<AppState<S, G>>,
    user: AuthenticatedUser,
    path: web::Path<String>,
    input: web::Json<ExtractInput>,
) -> Result<HttpResponse, AppError> {
    let trip = load_member_trip(&state.store, &path, &user.user_id).await?;
    let activity = ledger::extract_activity(&state, &trip, &user.user_id, &input.url).await?;
    Ok(ok_json(activity))
}

pub async fn cast_vote<S: TripStore + 'static, G: Generative + 'static>(
    state: web::Data<AppState<S, G>>,
    user: AuthenticatedUser,
    path: web::Path<(String, String)>,
    input: web::Json<VoteInput>,
) -> Result<HttpResponse, AppError> {
    let (trip_id, activity_id) = path.into_inner();
    let trip = load_member_trip(&state.store, &trip_id, &user.user_id).await?;
    let receipt =
        ledger::cast_vote(&state.store, &trip, &activity_id, &user.user_id, input.liked).await?;
    Ok(ok_json(receipt))
}

pub async fn retract_vote<S: TripStore + 'static, G: Generative + 'static>(
    state: web::Data<AppState<S, G>>,
    user: AuthenticatedUser,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (trip_id, activity_id) = path.into_inner();
    let trip = load_member_trip(&state.store, &trip_id, &user.user_id).await?;
    let activity = ledger::retract_vote(&state.store, &trip, &activity_id, &user.user_id).await?;
    Ok(ok_json(activity))
}

pub async fn describe_activity<S: TripStore + 'static, G: Generative + 'static>(
    state: web::Data<AppState<S, G>>,
    user: AuthenticatedUser,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (trip_id, activity_id) = path.into_inner();
    let trip = load_member_trip(&state.store, &trip_id, &user.user_id).await?;
    let activity = ledger::describe_activity(&state, &trip, &activity_id).await?;
    Ok(ok_json(activity))
}

pub async fn illustrate_activity<S: TripStore + 'static, G: Generative + 'static>(
    state: web::Data<AppState<S, G>>,
    user: AuthenticatedUser,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (trip_id, activity_id) = path.into_inner();
    let trip = load_member_trip(&state.store, &trip_id, &user.user_id).await?;
    let activity = ledger::illustrate_activity(&state, &trip, &activity_id).await?;
    Ok(ok_json(activity))
}
