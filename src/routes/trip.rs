use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::db::store::TripStore;
use crate::error::{ok_json, AppError};
use crate::middleware::auth_context::AuthenticatedUser;
use crate::models::trip::{NewTrip, TripUpdate};
use crate::models::user::normalize_email;
use crate::services::gemini::Generative;
use crate::services::trip_service::{self, InviteInput, ResendInput};
use crate::state::AppState;

#[derive(Serialize)]
struct Deleted {
    deleted: String,
}

#[derive(Serialize)]
struct Resent {
    resent_to: String,
}

pub async fn list_trips<S: TripStore + 'static, G: Generative + 'static>(
    state: web::Data<AppState<S, G>>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let trips = state.store.trips_for_user(&user.user_id).await?;
    Ok(ok_json(trips))
}

pub async fn create_trip<S: TripStore + 'static, G: Generative + 'static>(
    state: web::Data<AppState<S, G>>,
    user: AuthenticatedUser,
    input: web::Json<NewTrip>,
) -> Result<HttpResponse, AppError> {
    let trip = trip_service::create_trip(&state, &user, input.into_inner()).await?;
    Ok(ok_json(trip))
}

pub async fn get_trip<S: TripStore + 'static, G: Generative + 'static>(
    state: web::Data<AppState<S, G>>,
    user: AuthenticatedUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let trip = trip_service::load_member_trip(&state.store, &path, &user.user_id).await?;
    Ok(ok_json(trip))
}

pub async fn update_trip<S: TripStore + 'static, G: Generative + 'static>(
    state: web::Data<AppState<S, G>>,
    user: AuthenticatedUser,
    path: web::Path<String>,
    input: web::Json<TripUpdate>,
) -> Result<HttpResponse, AppError> {
    let trip =
        trip_service::update_trip(&state.store, &path, &user.user_id, input.into_inner()).await?;
    Ok(ok_json(trip))
}

pub async fn delete_trip<S: TripStore + 'static, G: Generative + 'static>(
    state: web::Data<AppState<S, G>>,
    user: AuthenticatedUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let trip_id = path.into_inner();
    trip_service::delete_trip(&state.store, &trip_id, &user.user_id).await?;
    Ok(ok_json(Deleted { deleted: trip_id }))
}

pub async fn join_trip<S: TripStore + 'static, G: Generative + 'static>(
    state: web::Data<AppState<S, G>>,
    user: AuthenticatedUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let trip = trip_service::join_trip(&state.store, &path, &user).await?;
    Ok(ok_json(trip))
}

pub async fn remove_participant<S: TripStore + 'static, G: Generative + 'static>(
    state: web::Data<AppState<S, G>>,
    user: AuthenticatedUser,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (trip_id, participant_id) = path.into_inner();
    let trip =
        trip_service::remove_participant(&state.store, &trip_id, &user.user_id, &participant_id)
            .await?;
    Ok(ok_json(trip))
}

pub async fn invite<S: TripStore + 'static, G: Generative + 'static>(
    state: web::Data<AppState<S, G>>,
    user: AuthenticatedUser,
    path: web::Path<String>,
    input: web::Json<InviteInput>,
) -> Result<HttpResponse, AppError> {
    let report =
        trip_service::invite_participants(&state, &path, &user, input.into_inner()).await?;
    Ok(ok_json(report))
}

pub async fn resend_invitation<S: TripStore + 'static, G: Generative + 'static>(
    state: web::Data<AppState<S, G>>,
    user: AuthenticatedUser,
    path: web::Path<String>,
    input: web::Json<ResendInput>,
) -> Result<HttpResponse, AppError> {
    let input = input.into_inner();
    let resent_to = normalize_email(&input.email);
    trip_service::resend_invitation(&state, &path, &user, input).await?;
    Ok(ok_json(Resent { resent_to }))
}
