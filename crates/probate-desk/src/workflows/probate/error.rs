use std::fmt;

use serde::Serialize;

use super::store::StoreError;

/// A single field the client needs to correct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Field-level validation failures collected across a whole payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    pub fields: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.fields.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|error| error.field == field)
    }

    pub fn into_result(self) -> Result<(), CaseError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(CaseError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|error| format!("{}: {}", error.field, error.message))
            .collect();
        f.write_str(&fields.join("; "))
    }
}

/// An external collaborator (renderer, storage, delivery) failed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{collaborator} failed: {message}")]
pub struct UpstreamError {
    pub collaborator: &'static str,
    pub message: String,
}

impl UpstreamError {
    pub fn new(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self {
            collaborator,
            message: message.into(),
        }
    }
}

/// Error raised by the case workflow service.
#[derive(Debug, thiserror::Error)]
pub enum CaseError {
    #[error("authentication required")]
    Unauthorized,
    #[error("not permitted")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("invalid request: {0}")]
    Validation(ValidationErrors),
    #[error("{0}")]
    Conflict(String),
    #[error("this resume link has expired, please start again from the beginning")]
    Expired,
    #[error("too many requests, try again later")]
    RateLimited,
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Store(StoreError),
}

impl CaseError {
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }
}

impl From<StoreError> for CaseError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(resource) => Self::NotFound(resource),
            StoreError::Conflict(message) => Self::Conflict(message),
            other => Self::Store(other),
        }
    }
}
