use actix_web::{web, HttpResponse};

use crate::db::store::TripStore;
use crate::error::{ok_json, AppError};
use crate::middleware::auth_context::AuthenticatedUser;
use crate::models::user::ProfileUpdate;
use crate::services::gemini::Generative;
use crate::services::user_service;
use crate::state::AppState;

/// The caller's own profile, created from the token on first visit.
pub async fn get_profile<S: TripStore + 'static, G: Generative + 'static>(
    state: web::Data<AppState<S, G>>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let profile = user_service::load_or_create(&state.store, &user).await?;
    Ok(ok_json(profile))
}

pub async fn update_profile<S: TripStore + 'static, G: Generative + 'static>(
    state: web::Data<AppState<S, G>>,
    user: AuthenticatedUser,
    input: web::Json<ProfileUpdate>,
) -> Result<HttpResponse, AppError> {
    let profile = user_service::update_profile(&state.store, &user, input.into_inner()).await?;
    Ok(ok_json(profile))
}

pub async fn get_user<S: TripStore + 'static, G: Generative + 'static>(
    state: web::Data<AppState<S, G>>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let profile = user_service::public_profile(&state.store, &path).await?;
    Ok(ok_json(profile))
}
