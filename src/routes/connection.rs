use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::db::store::TripStore;
use crate::error::{ok_json, AppError};
use crate::middleware::auth_context::AuthenticatedUser;
use crate::services::gemini::Generative;
use crate::services::handshake::{self, ConnectionKind, RespondInput, SendRequestInput};
use crate::state::AppState;

#[derive(Serialize)]
struct Disconnected {
    kind: ConnectionKind,
    user_id: String,
}

pub async fn list_connections<S: TripStore + 'static, G: Generative + 'static>(
    state: web::Data<AppState<S, G>>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let view = handshake::connections(&state.store, &user).await?;
    Ok(ok_json(view))
}

pub async fn send_request<S: TripStore + 'static, G: Generative + 'static>(
    state: web::Data<AppState<S, G>>,
    user: AuthenticatedUser,
    path: web::Path<ConnectionKind>,
    input: web::Json<SendRequestInput>,
) -> Result<HttpResponse, AppError> {
    let request =
        handshake::send_request(&state.store, &user, path.into_inner(), input.into_inner())
            .await?;
    Ok(ok_json(request))
}

pub async fn respond_request<S: TripStore + 'static, G: Generative + 'static>(
    state: web::Data<AppState<S, G>>,
    user: AuthenticatedUser,
    path: web::Path<(ConnectionKind, String)>,
    input: web::Json<RespondInput>,
) -> Result<HttpResponse, AppError> {
    let (kind, sender_id) = path.into_inner();
    let request =
        handshake::respond_request(&state.store, &user, kind, &sender_id, input.accept).await?;
    Ok(ok_json(request))
}

pub async fn cancel_request<S: TripStore + 'static, G: Generative + 'static>(
    state: web::Data<AppState<S, G>>,
    user: AuthenticatedUser,
    path: web::Path<(ConnectionKind, String)>,
) -> Result<HttpResponse, AppError> {
    let (kind, recipient_id) = path.into_inner();
    let request = handshake::cancel_request(&state.store, &user, kind, &recipient_id).await?;
    Ok(ok_json(request))
}

pub async fn remove_connection<S: TripStore + 'static, G: Generative + 'static>(
    state: web::Data<AppState<S, G>>,
    user: AuthenticatedUser,
    path: web::Path<(ConnectionKind, String)>,
) -> Result<HttpResponse, AppError> {
    let (kind, user_id) = path.into_inner();
    handshake::remove_connection(&state.store, &user, kind, &user_id).await?;
    Ok(ok_json(Disconnected { kind, user_id }))
}
