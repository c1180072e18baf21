pub mod activity;
pub mod admin;
pub mod connection;
pub mod health;
pub mod itinerary;
pub mod location;
pub mod profile;
pub mod trip;

use actix_web::error::{JsonPayloadError, PathError, QueryPayloadError};
use actix_web::{web, HttpRequest};

use crate::db::store::TripStore;
use crate::error::AppError;
use crate::middleware::auth::AuthMiddleware;
use crate::middleware::role_auth::{RequireRole, UserRole};
use crate::services::gemini::Generative;

fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::Validation(format!("Invalid request body: {}", err)).into()
}

fn path_error(err: PathError, _req: &HttpRequest) -> actix_web::Error {
    AppError::Validation(format!("Invalid path: {}", err)).into()
}

fn query_error(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::Validation(format!("Invalid query string: {}", err)).into()
}

/// Registers every `/api` route. All of them require a bearer token; the
/// admin scope additionally requires the admin role. Malformed bodies, paths
/// and query strings answer with the usual error envelope.
pub fn configure<S: TripStore + 'static, G: Generative + 'static>(
    cfg: &mut web::ServiceConfig,
    jwt_secret: &str,
) {
    cfg.service(
        web::scope("/api")
            .app_data(web::JsonConfig::default().error_handler(json_error))
            .app_data(web::PathConfig::default().error_handler(path_error))
            .app_data(web::QueryConfig::default().error_handler(query_error))
            .wrap(AuthMiddleware::new(jwt_secret))
            .service(
                web::scope("/admin")
                    .wrap(RequireRole::new(UserRole::Admin))
                    .route(
                        "/activities",
                        web::delete().to(admin::clear_shared_activities::<S, G>),
                    ),
            )
            .service(
                web::resource("/profile")
                    .route(web::get().to(profile::get_profile::<S, G>))
                    .route(web::put().to(profile::update_profile::<S, G>)),
            )
            .route("/users/{id}", web::get().to(profile::get_user::<S, G>))
            .service(
                web::scope("/trips")
                    .service(
                        web::resource("")
                            .route(web::get().to(trip::list_trips::<S, G>))
                            .route(web::post().to(trip::create_trip::<S, G>)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(trip::get_trip::<S, G>))
                            .route(web::put().to(trip::update_trip::<S, G>))
                            .route(web::delete().to(trip::delete_trip::<S, G>)),
                    )
                    .route("/{id}/join", web::post().to(trip::join_trip::<S, G>))
                    .route(
                        "/{id}/participants/{user_id}",
                        web::delete().to(trip::remove_participant::<S, G>),
                    )
                    .route("/{id}/invitations", web::post().to(trip::invite::<S, G>))
                    .route(
                        "/{id}/invitations/resend",
                        web::post().to(trip::resend_invitation::<S, G>),
                    )
                    .service(
                        web::resource("/{id}/activities")
                            .route(web::get().to(activity::list_activities::<S, G>))
                            .route(web::post().to(activity::create_activity::<S, G>)),
                    )
                    .route(
                        "/{id}/activities/extract",
                        web::post().to(activity::extract_activity::<S, G>),
                    )
                    .service(
                        web::resource("/{id}/activities/{activity_id}/vote")
                            .route(web::put().to(activity::cast_vote::<S, G>))
                            .route(web::delete().to(activity::retract_vote::<S, G>)),
                    )
                    .route(
                        "/{id}/activities/{activity_id}/description",
                        web::post().to(activity::describe_activity::<S, G>),
                    )
                    .route(
                        "/{id}/activities/{activity_id}/image",
                        web::post().to(activity::illustrate_activity::<S, G>),
                    )
                    .route(
                        "/{id}/itinerary",
                        web::get().to(itinerary::get_itinerary::<S, G>),
                    )
                    .route(
                        "/{id}/itinerary/generate",
                        web::post().to(itinerary::generate::<S, G>),
                    )
                    .route(
                        "/{id}/itinerary/days/{date}/activities",
                        web::post().to(itinerary::insert_activity::<S, G>),
                    ),
            )
            .service(
                web::scope("/locations")
                    .route(
                        "/{location}/activities",
                        web::get().to(location::shared_activities::<S, G>),
                    )
                    .route(
                        "/{location}/discover",
                        web::post().to(location::discover::<S, G>),
                    ),
            )
            .service(
                web::scope("/connections")
                    .route("", web::get().to(connection::list_connections::<S, G>))
                    // Request paths first so "requests" is never read as a user id
                    .route(
                        "/{kind}/requests",
                        web::post().to(connection::send_request::<S, G>),
                    )
                    .route(
                        "/{kind}/requests/{user_id}/respond",
                        web::post().to(connection::respond_request::<S, G>),
                    )
                    .route(
                        "/{kind}/requests/{user_id}",
                        web::delete().to(connection::cancel_request::<S, G>),
                    )
                    .route(
                        "/{kind}/{user_id}",
                        web::delete().to(connection::remove_connection::<S, G>),
                    ),
            ),
    );
}
