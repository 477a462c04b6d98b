//! Authentication gate: a tower layer that resolves the caller of every request.
//!
//! For each request the gate:
//! 1. resets the installed principal to anonymous unless host identities are inherited
//! 2. asks the [`Authenticator`] for a principal
//! 3. answers session-token requests itself, installs authenticated principals,
//!    and rejects invalid credentials with a 401
//! 4. forwards everything else and decorates any 401 coming back with the
//!    challenge header and the no-redirect marker

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::body::Body;
use axum::http::request::Parts;
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use common_auth::{AuthError, Principal};
use common_config::ConfigError;
use tower::{Layer, Service};

use crate::authenticator::Authenticator;
use crate::config::AuthenticationSettings;
use crate::context::NoRedirect;
use crate::error::ApiError;

/// How a single request was classified. Computed once, consumed immediately.
#[derive(Debug)]
pub enum AuthenticationOutcome {
    Anonymous,
    Authenticated(Principal),
    SessionTokenRequested(Principal),
    Rejected(AuthError),
}

/// Behaviour switches of the gate, resolved from configuration once.
#[derive(Debug, Clone)]
pub struct GateOptions {
    pub inherit_host_client_identity: bool,
    /// `WWW-Authenticate` value for 401 responses; `None` disables the header.
    pub challenge: Option<HeaderValue>,
    pub set_no_redirect_marker: bool,
}

impl GateOptions {
    pub fn from_settings(settings: &AuthenticationSettings) -> Result<Self, ConfigError> {
        Ok(Self {
            inherit_host_client_identity: settings.inherit_host_client_identity,
            challenge: settings.challenge_header()?,
            set_no_redirect_marker: settings.set_no_redirect_marker,
        })
    }

    /// Attach the challenge header and the no-redirect marker to a 401.
    ///
    /// Calling this more than once leaves a single challenge value.
    pub fn decorate_unauthorized(&self, response: &mut Response) {
        if let Some(challenge) = &self.challenge {
            let present = response
                .headers()
                .get_all(header::WWW_AUTHENTICATE)
                .iter()
                .any(|value| value == challenge);
            if !present {
                response
                    .headers_mut()
                    .append(header::WWW_AUTHENTICATE, challenge.clone());
            }
        }

        if self.set_no_redirect_marker {
            response.extensions_mut().insert(NoRedirect);
        }
    }
}

struct GateState {
    authenticator: Arc<dyn Authenticator>,
    options: GateOptions,
}

impl GateState {
    async fn classify(&self, parts: &Parts) -> Result<AuthenticationOutcome, ApiError> {
        let principal = match self.authenticator.authenticate(parts).await {
            Ok(Some(principal)) => principal,
            Ok(None) => {
                tracing::error!(path = %parts.uri.path(), "authenticator produced no principal");
                return Err(ApiError::Internal);
            }
            Err(err) if err.is_credential_fault() => {
                return Ok(AuthenticationOutcome::Rejected(err));
            }
            Err(err) => {
                tracing::error!(error = %err, path = %parts.uri.path(), "authenticator failed");
                return Err(ApiError::Internal);
            }
        };

        if !principal.is_authenticated() {
            return Ok(AuthenticationOutcome::Anonymous);
        }

        if self.authenticator.is_session_token_request(parts) {
            Ok(AuthenticationOutcome::SessionTokenRequested(principal))
        } else {
            Ok(AuthenticationOutcome::Authenticated(principal))
        }
    }

    async fn session_token_body(&self, principal: &Principal) -> Result<String, AuthError> {
        let token = self.authenticator.create_session_token(principal).await?;
        tracing::info!(
            subject = principal.name().unwrap_or_default(),
            expires_at = %token.expires_at(),
            "session token issued"
        );
        self.authenticator.create_session_token_response(&token)
    }

    async fn issue_session_token(&self, principal: &Principal) -> Response {
        match self.session_token_body(principal).await {
            Ok(body) => (
                StatusCode::OK,
                [(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                )],
                body,
            )
                .into_response(),
            Err(err) if err.is_credential_fault() => self.unauthorized(&err),
            Err(err) => {
                tracing::error!(error = %err, "session token issuance failed");
                ApiError::Internal.into_response()
            }
        }
    }

    fn unauthorized(&self, err: &AuthError) -> Response {
        if let AuthError::InvalidCredential { fault, detail } = err {
            tracing::debug!(fault = fault.as_str(), %detail, "credential rejected");
        }
        let mut response = ApiError::Unauthorized.into_response();
        self.options.decorate_unauthorized(&mut response);
        response
    }
}

/// Layer that places the authentication gate in front of a service.
///
/// # Example
/// ```ignore
/// router = router.layer(AuthenticationLayer::new(authenticator, options));
/// ```
#[derive(Clone)]
pub struct AuthenticationLayer {
    state: Arc<GateState>,
}

impl AuthenticationLayer {
    pub fn new(authenticator: Arc<dyn Authenticator>, options: GateOptions) -> Self {
        Self {
            state: Arc::new(GateState {
                authenticator,
                options,
            }),
        }
    }

    pub fn from_settings(
        authenticator: Arc<dyn Authenticator>,
        settings: &AuthenticationSettings,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(authenticator, GateOptions::from_settings(settings)?))
    }
}

impl<S> Layer<S> for AuthenticationLayer {
    type Service = AuthenticationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthenticationService {
            inner,
            state: self.state.clone(),
        }
    }
}

/// Service produced by [`AuthenticationLayer`].
#[derive(Clone)]
pub struct AuthenticationService<S> {
    inner: S,
    state: Arc<GateState>,
}

impl<S> Service<Request<Body>> for AuthenticationService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let state = self.state.clone();
        let not_ready_inner = self.inner.clone();
        let mut ready_inner = std::mem::replace(&mut self.inner, not_ready_inner);

        Box::pin(async move {
            let (mut parts, body) = request.into_parts();

            if !state.options.inherit_host_client_identity {
                parts.extensions.insert(Principal::anonymous());
            }

            let outcome = match state.classify(&parts).await {
                Ok(outcome) => outcome,
                Err(err) => return Ok(err.into_response()),
            };

            match outcome {
                AuthenticationOutcome::Anonymous => {
                    tracing::trace!(path = %parts.uri.path(), "no credential presented");
                }
                AuthenticationOutcome::Authenticated(principal) => {
                    tracing::debug!(
                        subject = principal.name().unwrap_or_default(),
                        authentication_type = principal.authentication_type().unwrap_or_default(),
                        "request authenticated"
                    );
                    parts.extensions.insert(principal);
                }
                AuthenticationOutcome::SessionTokenRequested(principal) => {
                    return Ok(state.issue_session_token(&principal).await);
                }
                AuthenticationOutcome::Rejected(err) => {
                    return Ok(state.unauthorized(&err));
                }
            }

            let mut response = ready_inner.call(Request::from_parts(parts, body)).await?;
            if response.status() == StatusCode::UNAUTHORIZED {
                state.options.decorate_unauthorized(&mut response);
            }
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(challenge: Option<&'static str>, marker: bool) -> GateOptions {
        GateOptions {
            inherit_host_client_identity: false,
            challenge: challenge.map(HeaderValue::from_static),
            set_no_redirect_marker: marker,
        }
    }

    #[test]
    fn decorating_twice_keeps_one_challenge() {
        let options = options(Some("Bearer"), true);
        let mut response = ApiError::Unauthorized.into_response();

        options.decorate_unauthorized(&mut response);
        options.decorate_unauthorized(&mut response);

        let values: Vec<_> = response
            .headers()
            .get_all(header::WWW_AUTHENTICATE)
            .iter()
            .map(|value| value.to_str().unwrap())
            .collect();
        assert_eq!(values, vec!["Bearer"]);
        assert!(NoRedirect::is_set(&response));
    }

    #[test]
    fn existing_foreign_challenge_is_preserved() {
        let options = options(Some("Bearer"), false);
        let mut response = ApiError::Unauthorized.into_response();
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Basic"));

        options.decorate_unauthorized(&mut response);

        let values: Vec<_> = response
            .headers()
            .get_all(header::WWW_AUTHENTICATE)
            .iter()
            .collect();
        assert_eq!(values.len(), 2);
        assert!(!NoRedirect::is_set(&response));
    }

    #[test]
    fn disabled_options_leave_response_untouched() {
        let options = options(None, false);
        let mut response = ApiError::Unauthorized.into_response();
        options.decorate_unauthorized(&mut response);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
        assert!(!NoRedirect::is_set(&response));
    }

    #[test]
    fn options_follow_settings() {
        let mut settings = AuthenticationSettings::default();
        settings.default_authentication_scheme = "Session".to_string();
        settings.set_no_redirect_marker = false;

        let options = GateOptions::from_settings(&settings).expect("options");
        assert_eq!(options.challenge, Some(HeaderValue::from_static("Session")));
        assert!(!options.set_no_redirect_marker);
        assert!(!options.inherit_host_client_identity);
    }
}
