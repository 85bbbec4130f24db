use std::sync::Arc;

use async_graphql::{Error, ErrorExtensions};
use thiserror::Error;
use tracing::error;

/// Shared GraphQL result type.
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error, Clone)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("{0} not found")]
    NotFound(String),
    #[error("unknown stage {0}")]
    InvalidStage(String),
    #[error("bad request: {0}")]
    InvalidInput(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("internal server error")]
    Internal(Arc<anyhow::Error>),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InvalidStage(_) => "INVALID_STAGE",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self::Internal(Arc::new(err))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::internal(value)
    }
}

impl ErrorExtensions for ApiError {
    fn extend(&self) -> Error {
        if let ApiError::Internal(inner) = self {
            error!(error = %inner, "internal error");
        }
        let mut err = Error::new(self.to_string());
        err = err.extend_with(|_err, e| {
            e.set("code", self.code());
        });
        if matches!(self, ApiError::InvalidInput(_) | ApiError::InvalidStage(_)) {
            err = err.extend_with(|_err, e| {
                e.set("type", "BAD_REQUEST");
            });
        }
        err
    }
}

/// Convert any error into a GraphQL error payload while hiding internals.
pub fn internal_error(err: impl Into<anyhow::Error>) -> Error {
    ApiError::internal(err.into()).extend()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_graphql::Value;

    fn code_of(err: &Error) -> Option<Value> {
        err.extensions
            .as_ref()
            .and_then(|map| map.get("code"))
            .cloned()
    }

    #[test]
    fn internal_errors_are_masked() {
        let err = internal_error(anyhow::anyhow!("boom"));
        assert_eq!(err.message, "internal server error");
        assert_eq!(code_of(&err), Some(Value::from("INTERNAL")));
    }

    #[test]
    fn invalid_stage_is_a_bad_request() {
        let err = ApiError::InvalidStage("closed".into()).extend();
        assert_eq!(err.message, "unknown stage closed");
        assert_eq!(code_of(&err), Some(Value::from("INVALID_STAGE")));
        let kind = err.extensions.as_ref().and_then(|map| map.get("type")).cloned();
        assert_eq!(kind, Some(Value::from("BAD_REQUEST")));
    }

    #[test]
    fn conflict_keeps_its_message() {
        let err = ApiError::Conflict("deal changed concurrently".into()).extend();
        assert_eq!(err.message, "conflict: deal changed concurrently");
        assert_eq!(code_of(&err), Some(Value::from("CONFLICT")));
    }
}
