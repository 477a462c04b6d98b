//! Request-scoped authentication state.
//!
//! The resolved [`Principal`] lives in the request's extensions; handlers read
//! it through [`CurrentPrincipal`]. Nothing here is process-global.

use std::convert::Infallible;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::Response;
use common_auth::Principal;

/// Extractor for the caller installed by the authentication gate.
///
/// Falls back to anonymous when no principal was installed, which only happens
/// when host identities are inherited and the host supplied none.
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentPrincipal(
            parts
                .extensions
                .get::<Principal>()
                .cloned()
                .unwrap_or_default(),
        ))
    }
}

/// Marks a 401 response that must reach the client as-is rather than being
/// turned into a login redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoRedirect;

impl NoRedirect {
    pub fn is_set(response: &Response) -> bool {
        response.extensions().get::<NoRedirect>().is_some()
    }
}
