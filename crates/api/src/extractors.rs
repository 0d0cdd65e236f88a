//! Request extractors.

use std::str::FromStr;

use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
};

use crate::error::ApiError;

/// A single path segment parsed into a typed id.
///
/// Malformed ids are rejected with `400 VALIDATION_ERROR` instead of axum's
/// plain-text path rejection.
#[derive(Debug, Clone, Copy)]
pub struct IdPath<T>(pub T);

impl<S, T> FromRequestParts<S> for IdPath<T>
where
    S: Send + Sync,
    T: FromStr + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::validation(e.body_text()))?;
        raw.parse::<T>()
            .map(IdPath)
            .map_err(|_| ApiError::validation(format!("Invalid id: {raw}")))
    }
}
