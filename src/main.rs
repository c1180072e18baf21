use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use env_logger::Env;

use tripmates_api::config::AppConfig;
use tripmates_api::db::{memory::MemoryStore, mongo, store::TripStore};
use tripmates_api::routes;
use tripmates_api::services::{
    email_service::EmailService,
    gemini::{GeminiClient, Generative},
    image_service::ImageService,
};
use tripmates_api::state::AppState;

#[cfg(debug_assertions)]
fn setup_credentials() {
    use std::{env, path::PathBuf};

    let credentials_path = PathBuf::from("credentials/service-account.json");
    if env::var_os("GOOGLE_APPLICATION_CREDENTIALS").is_none() && credentials_path.exists() {
        env::set_var("GOOGLE_APPLICATION_CREDENTIALS", &credentials_path);
        log::info!("Using local service account credentials");
    }
}

async fn serve<S, G>(config: AppConfig, state: AppState<S, G>) -> std::io::Result<()>
where
    S: TripStore + Send + Sync + 'static,
    G: Generative + Send + Sync + 'static,
{
    let state = web::Data::new(state);
    let jwt_secret = config.jwt_secret.clone();

    log::info!("Starting HTTP server on {}:{}", config.host, config.port);
    HttpServer::new(move || {
        let secret = jwt_secret.clone();
        App::new()
            .app_data(state.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .route(
                "/health",
                web::get().to(routes::health::health_check::<S, G>),
            )
            .configure(move |cfg| routes::configure::<S, G>(cfg, &secret))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    #[cfg(debug_assertions)]
    setup_credentials();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
        }
    };

    let ai = GeminiClient::new(&config);
    if !ai.is_configured() {
        log::warn!("GEMINI_API_KEY is not set; AI features will report setup instructions");
    }

    let images = match &config.image_bucket {
        Some(bucket) => match ImageService::new(bucket).await {
            Ok(service) => Some(service),
            Err(e) => {
                log::warn!("Image storage disabled: {}", e);
                None
            }
        },
        None => {
            log::warn!("IMAGE_BUCKET is not set; activity images are disabled");
            None
        }
    };
    let mailer = EmailService::new(config.email_from.clone(), config.app_base_url.clone());

    match config.mongo_uri.clone() {
        Some(uri) => {
            let client = mongo::create_mongo_client(&uri)
                .await
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
            let store = mongo::MongoStore::new(&client, &config.database);
            if let Err(e) = store.ensure_indexes().await {
                log::warn!("Could not create indexes: {}", e);
            }
            serve(config, AppState::new(store, ai, images, mailer)).await
        }
        None => {
            log::warn!("MONGODB_URI is not set; using the in-memory store, data will not persist");
            serve(config, AppState::new(MemoryStore::new(), ai, images, mailer)).await
        }
    }
}
