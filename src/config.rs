use std::env;

use crate::error::AppError;

const HOST: &str = "0.0.0.0";
const PORT: u16 = 8080;
const DATABASE: &str = "tripmates";
const GEMINI_MODEL: &str = "gemini-2.0-flash";
const IMAGEN_MODEL: &str = "imagen-3.0-generate-002";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const EMAIL_FROM: &str = "invites@tripmates.app";
const APP_BASE_URL: &str = "http://localhost:3000";

pub const JWT_SETUP: &str = "JWT_SECRET is not set. Add JWT_SECRET=<the signing secret shared with your auth provider> to your environment or .env file and restart the server.";
pub const GEMINI_SETUP: &str = "AI features are not configured. Create an API key in Google AI Studio, set GEMINI_API_KEY=<key> in your environment or .env file, and restart the server.";
pub const STORAGE_SETUP: &str = "Image storage is not configured. Set IMAGE_BUCKET=<bucket name> and GOOGLE_APPLICATION_CREDENTIALS=<service account json> and restart the server.";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub mongo_uri: Option<String>,
    pub database: String,
    pub jwt_secret: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub imagen_model: String,
    pub gemini_base_url: String,
    pub image_bucket: Option<String>,
    pub email_from: String,
    pub app_base_url: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        if cfg!(debug_assertions) {
            dotenv::dotenv().ok();
        }
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; blank values count as unset.
    pub fn from_vars<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = match var("PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| AppError::Config(format!("PORT must be a number, got '{}'", raw)))?,
            None => PORT,
        };
        let jwt_secret = var("JWT_SECRET").ok_or_else(|| AppError::Config(JWT_SETUP.to_string()))?;

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| HOST.to_string()),
            port,
            mongo_uri: var("MONGODB_URI"),
            database: var("MONGODB_DATABASE").unwrap_or_else(|| DATABASE.to_string()),
            jwt_secret,
            gemini_api_key: var("GEMINI_API_KEY"),
            gemini_model: var("GEMINI_MODEL").unwrap_or_else(|| GEMINI_MODEL.to_string()),
            imagen_model: var("IMAGEN_MODEL").unwrap_or_else(|| IMAGEN_MODEL.to_string()),
            gemini_base_url: var("GEMINI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
            image_bucket: var("IMAGE_BUCKET"),
            email_from: var("EMAIL_FROM").unwrap_or_else(|| EMAIL_FROM.to_string()),
            app_base_url: var("APP_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| APP_BASE_URL.to_string()),
        })
    }
}
