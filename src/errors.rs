// src/errors.rs
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Image unavailable: {0}")]
    ImageUnavailable(String),

    #[error("API key required: {0}")]
    AuthRequired(String),

    #[error("API key revoked: {0}")]
    AuthRevoked(String),

    #[error("Transient service error: {0}")]
    Transient(String),

    #[error("No image in model response")]
    NoImageInResponse,

    #[error("Generation error: {0}")]
    Unclassified(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl ResponseError for RenderError {
    fn error_response(&self) -> HttpResponse {
        match self {
            RenderError::ImageUnavailable(_) => {
                HttpResponse::UnprocessableEntity().json(serde_json::json!({
                    "error": "Image unavailable",
                    "message": self.to_string()
                }))
            }
            RenderError::AuthRequired(_) => HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "API key required",
                "message": self.to_string()
            })),
            RenderError::AuthRevoked(_) => HttpResponse::Forbidden().json(serde_json::json!({
                "error": "API key revoked",
                "message": self.to_string()
            })),
            RenderError::Transient(_) => {
                HttpResponse::ServiceUnavailable().json(serde_json::json!({
                    "error": "Model busy",
                    "message": self.to_string()
                }))
            }
            RenderError::NoImageInResponse => HttpResponse::BadGateway().json(serde_json::json!({
                "error": "No image in response",
                "message": self.to_string()
            })),
            RenderError::Unclassified(_) => {
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Generation error",
                    "message": self.to_string()
                }))
            }
            RenderError::Validation(_) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Validation error",
                "message": self.to_string()
            })),
        }
    }
}
