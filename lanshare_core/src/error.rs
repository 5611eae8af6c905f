//! Error types shared by the share server and its session controller.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShareError {
    /// Every user supplied path was missing
    #[error("no valid paths to share")]
    NoValidPaths,

    /// Two shared entries map to the same download route
    #[error("duplicate download route: {0}")]
    DuplicateRoute(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("file not found")]
    NotFound,

    #[error("file was already downloaded and removed")]
    Gone,

    #[error("unauthorized: invalid or missing token")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("failed to build archive: {0}")]
    Archive(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for ShareError {
    fn from(err: zip::result::ZipError) -> Self {
        ShareError::Archive(err.to_string())
    }
}

impl From<walkdir::Error> for ShareError {
    fn from(err: walkdir::Error) -> Self {
        ShareError::Archive(err.to_string())
    }
}

impl ShareError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ShareError::NotFound => StatusCode::NOT_FOUND,
            ShareError::Gone => StatusCode::GONE,
            ShareError::Unauthorized => StatusCode::UNAUTHORIZED,
            ShareError::Forbidden => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ShareError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Don't leak filesystem details to the client
            tracing::error!("Request failed: {}", self);
            return (status, "Internal server error").into_response();
        }
        (status, self.to_string()).into_response()
    }
}
