use std::error::Error as StdError;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::{
    application::{admin::menus::AdminMenuError, menu::MenuResolutionError},
    infra::{error::InfraError, http::repo_error_to_http},
};

/// Diagnostics attached to an error response for the logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Failure body shared by every JSON endpoint.
#[derive(Debug, Serialize)]
pub struct FailureBody {
    pub success: bool,
    pub message: String,
}

impl FailureBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: String,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            status,
            public_message: public_message.into(),
            report: ErrorReport::from_message(source, status, detail),
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: impl Into<String>,
        error: &dyn StdError,
    ) -> Self {
        Self {
            status,
            public_message: public_message.into(),
            report: ErrorReport::from_error(source, status, error),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let body = Json(FailureBody::new(self.public_message));
        let mut response = (self.status, body).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<MenuResolutionError> for HttpError {
    fn from(error: MenuResolutionError) -> Self {
        const SOURCE: &str = "infra::http::menu_error_to_http_error";
        match &error {
            MenuResolutionError::ResolutionFailed(_) => HttpError::from_error(
                SOURCE,
                StatusCode::SERVICE_UNAVAILABLE,
                "Menu is temporarily unavailable",
                &error,
            ),
            MenuResolutionError::UnknownEntry(_) => HttpError::from_error(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Menu entry not found",
                &error,
            ),
        }
    }
}

impl From<AdminMenuError> for HttpError {
    fn from(error: AdminMenuError) -> Self {
        const SOURCE: &str = "infra::http::admin_menu_error_to_http_error";
        match error {
            AdminMenuError::ConstraintViolation(message) => HttpError::new(
                SOURCE,
                StatusCode::BAD_REQUEST,
                message.clone(),
                message,
            ),
            AdminMenuError::NotFound => HttpError::from_error(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Menu item not found",
                &AdminMenuError::NotFound,
            ),
            AdminMenuError::Repo(inner) => repo_error_to_http(SOURCE, inner),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
