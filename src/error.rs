use crate::database::DbError;
use crate::validation::FieldErrors;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::{debug, error};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Authentication required")]
    AuthenticationRequired,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Not found")]
    NotFound,
    #[error("Validation failed")]
    ValidationFailed {
        errors: FieldErrors,
        submitted: serde_json::Value,
    },
    #[error("Username already exists")]
    DuplicateIdentity,
    #[error("Database error")]
    Database(#[from] DbError),
    #[error("Verification error")]
    Hashing(#[from] bcrypt::BcryptError),
}

impl CatalogError {
    /// Rejects a form, echoing back what was submitted alongside the errors.
    pub fn invalid<T: Serialize>(errors: FieldErrors, submitted: &T) -> Self {
        CatalogError::ValidationFailed {
            errors,
            submitted: serde_json::to_value(submitted).unwrap_or(serde_json::Value::Null),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    submitted: Option<&'a serde_json::Value>,
}

impl ResponseError for CatalogError {
    fn status_code(&self) -> StatusCode {
        match self {
            CatalogError::AuthenticationRequired | CatalogError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            CatalogError::NotFound => StatusCode::NOT_FOUND,
            CatalogError::ValidationFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            CatalogError::DuplicateIdentity => StatusCode::CONFLICT,
            CatalogError::Database(_) | CatalogError::Hashing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            CatalogError::ValidationFailed { errors, submitted } => ErrorBody {
                error: self.to_string(),
                fields: Some(errors),
                submitted: Some(submitted),
            },
            CatalogError::Database(err) => {
                error!("{}", err);
                debug!("{:?}", err);
                ErrorBody {
                    error: self.to_string(),
                    fields: None,
                    submitted: None,
                }
            }
            CatalogError::Hashing(err) => {
                error!("{}", err);
                ErrorBody {
                    error: self.to_string(),
                    fields: None,
                    submitted: None,
                }
            }
            _ => ErrorBody {
                error: self.to_string(),
                fields: None,
                submitted: None,
            },
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}
