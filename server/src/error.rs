use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gismap_shared::AdapterError;

use crate::draw::DrawError;
use crate::entry::EntryError;
use crate::registry::RegistryError;
use crate::sync::SyncError;

/// Error returned by route handlers as `{"error": "..."}` with a status.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        let status = match e {
            RegistryError::NameTaken { .. } => StatusCode::CONFLICT,
            RegistryError::StaleHandle(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl From<AdapterError> for ApiError {
    fn from(e: AdapterError) -> Self {
        let status = match e {
            AdapterError::Parse(_) | AdapterError::UnknownSrid(_) => StatusCode::BAD_REQUEST,
            AdapterError::Projection(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        Self::new(status, e.to_string())
    }
}

impl From<EntryError> for ApiError {
    fn from(e: EntryError) -> Self {
        match e {
            EntryError::Adapter(e) => e.into(),
            EntryError::Registry(e) => e.into(),
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::UnknownLayer(_) => Self::not_found(e.to_string()),
            SyncError::Fetch { .. } | SyncError::Projection(_) => {
                Self::new(StatusCode::BAD_GATEWAY, e.to_string())
            }
            SyncError::Registry(e) => e.into(),
        }
    }
}

impl From<DrawError> for ApiError {
    fn from(e: DrawError) -> Self {
        match e {
            DrawError::NoSession => Self::new(StatusCode::CONFLICT, e.to_string()),
            DrawError::TooFewVertices { .. } | DrawError::NonFiniteVertex { .. } => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
            }
            DrawError::Registry(e) => e.into(),
        }
    }
}
