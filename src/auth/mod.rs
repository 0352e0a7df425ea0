//! Caller authorization
//!
//! The relay needs two decisions from an identity service: is this caller
//! known at all, and is it an operator. [`Authorizer`] is that seam;
//! [`StaticTokenAuthorizer`] maps a fixed set of bearer tokens to roles.

use std::collections::HashSet;

use async_trait::async_trait;

/// Authorization failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No bearer token was supplied
    MissingCredentials,
    /// The token is not known to the authorizer
    InvalidCredentials,
    /// The identity service could not be reached
    Unavailable(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingCredentials => write!(f, "Missing bearer token"),
            AuthError::InvalidCredentials => write!(f, "Invalid credentials"),
            AuthError::Unavailable(msg) => write!(f, "Identity service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

/// Role granted to an authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Operator,
    Viewer,
}

/// Identity service consulted once per authenticated request
#[async_trait]
pub trait Authorizer: Send + Sync + 'static {
    /// Resolve a bearer token to a role
    async fn authorize(&self, token: &str) -> Result<Role, AuthError>;

    /// Whether the caller may toggle recording
    async fn is_operator(&self, token: &str) -> Result<bool, AuthError> {
        Ok(self.authorize(token).await? == Role::Operator)
    }
}

/// Authorizer backed by fixed token lists
#[derive(Debug, Clone, Default)]
pub struct StaticTokenAuthorizer {
    operators: HashSet<String>,
    viewers: HashSet<String>,
}

impl StaticTokenAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant the operator role to `token`
    pub fn operator(mut self, token: impl Into<String>) -> Self {
        self.operators.insert(token.into());
        self
    }

    /// Grant the viewer role to `token`
    pub fn viewer(mut self, token: impl Into<String>) -> Self {
        self.viewers.insert(token.into());
        self
    }

    pub fn operator_count(&self) -> usize {
        self.operators.len()
    }
}

#[async_trait]
impl Authorizer for StaticTokenAuthorizer {
    async fn authorize(&self, token: &str) -> Result<Role, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        if self.operators.contains(token) {
            Ok(Role::Operator)
        } else if self.viewers.contains(token) {
            Ok(Role::Viewer)
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}

/// Extract the token from an `Authorization` header value
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
