use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use crate::services::gemini::AiError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Config(String),
    #[error("{0}")]
    Validation(String),
    #[error("Authentication required")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NoQualifyingActivities(String),
    #[error("{}", .0.guidance())]
    Ai(#[from] AiError),
    #[error("Image storage failed: {0}")]
    Storage(String),
    #[error(transparent)]
    Database(#[from] mongodb::error::Error),
    #[error(transparent)]
    Bson(#[from] bson::ser::Error),
}

/// Envelope every endpoint answers with.
#[derive(Debug, Serialize)]
pub struct ActionResult<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ActionResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ActionResult<()> {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

pub fn ok_json<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(ActionResult::ok(data))
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NoQualifyingActivities(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Ai(_) => StatusCode::BAD_GATEWAY,
            AppError::Config(_)
            | AppError::Storage(_)
            | AppError::Database(_)
            | AppError::Bson(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::Database(err) => {
                log::error!("Database error: {:?}", err);
                "Something went wrong while talking to the database.".to_string()
            }
            AppError::Bson(err) => {
                log::error!("Failed to encode document: {:?}", err);
                "Something went wrong while saving your changes.".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(ActionResult::failure(message))
    }
}
