use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use linkwatch::EngineError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidWindow(String),
    #[error("{0}")]
    Engine(#[from] EngineError),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidWindow(_) => StatusCode::BAD_REQUEST,
            AppError::Engine(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}
