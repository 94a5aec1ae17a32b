//! Access control for project routes
//!
//! Session handling lives outside this service. Requests carry a bearer
//! token, which is lifted into an explicit [`Credentials`] value and handed
//! to an [`AccessControl`] implementation together with the project being
//! touched. Route handlers call [`ensure_access`] before doing anything else.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};
use std::convert::Infallible;

use crate::db::ProjectName;
use crate::error::AppError;

/// Caller credentials taken from the `Authorization` header.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub bearer: Option<String>,
}

impl Credentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer: Some(token.into()),
        }
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| {
                let (scheme, token) = value.trim().split_once(' ')?;
                scheme.eq_ignore_ascii_case("bearer").then(|| token.trim().to_string())
            })
            .filter(|token| !token.is_empty());

        Self { bearer }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("bearer", &self.bearer.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Credentials
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

#[async_trait]
pub trait AccessControl: Send + Sync {
    async fn check_access(
        &self,
        credentials: &Credentials,
        project: &ProjectName,
        require_admin: bool,
    ) -> bool;
}

/// Single shared admin token.
///
/// Every inventory operation is administrative, so the same token grants
/// both admin and ordinary access. With no token configured nothing is
/// granted.
#[derive(Clone, Default)]
pub struct AdminTokenAccess {
    token: Option<String>,
}

impl AdminTokenAccess {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|token| !token.is_empty()),
        }
    }
}

#[async_trait]
impl AccessControl for AdminTokenAccess {
    async fn check_access(
        &self,
        credentials: &Credentials,
        project: &ProjectName,
        require_admin: bool,
    ) -> bool {
        let granted = match (&self.token, &credentials.bearer) {
            (Some(expected), Some(given)) => constant_time_eq(expected.as_bytes(), given.as_bytes()),
            _ => false,
        };

        if !granted {
            tracing::debug!(project = %project, require_admin, "Access denied");
        }
        granted
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Short-circuit with `Unauthorized` unless `access` grants the request.
pub async fn ensure_access(
    access: &dyn AccessControl,
    credentials: &Credentials,
    project: &ProjectName,
    require_admin: bool,
) -> Result<(), AppError> {
    if access.check_access(credentials, project, require_admin).await {
        Ok(())
    } else {
        Err(AppError::Unauthorized(format!(
            "Not authorized to administer project '{}'",
            project
        )))
    }
}
