//! Request authentication
//!
//! Read endpoints and the viewer stream accept any known token; control
//! endpoints need the operator role. The token comes from an
//! `Authorization: Bearer` header or, for browser websockets that cannot set
//! headers, a `token` query parameter.

use axum::extract::{FromRequestParts, Query};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use serde::Deserialize;

use crate::auth::{bearer_token, AuthError, Role};

use super::http::ApiError;
use super::listener::RelayState;

#[derive(Debug, Default, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Bearer token of a request, header first
fn request_token(parts: &Parts) -> Option<String> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token);
    if let Some(token) = header {
        return Some(token.to_string());
    }

    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(query)| query.token)
}

/// Authenticated caller of any role
///
/// Rejects with 401 when the token is missing or unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub role: Role,
}

impl FromRequestParts<RelayState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &RelayState,
    ) -> Result<Self, Self::Rejection> {
        let token = request_token(parts).ok_or(AuthError::MissingCredentials)?;
        let role = state.authorizer.authorize(&token).await?;
        Ok(Caller { role })
    }
}

/// Caller holding the operator role
///
/// Rejects with 401 for unknown callers and 403 for viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operator;

impl FromRequestParts<RelayState> for Operator {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &RelayState,
    ) -> Result<Self, Self::Rejection> {
        let token = request_token(parts).ok_or(AuthError::MissingCredentials)?;
        if !state.authorizer.is_operator(&token).await? {
            return Err(ApiError::Forbidden("Operator role required".to_string()));
        }
        Ok(Operator)
    }
}
