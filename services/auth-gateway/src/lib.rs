pub mod authenticator;
pub mod config;
pub mod context;
pub mod error;
pub mod gate;
pub mod redirect;
pub mod static_authn;

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{HeaderValue, Request};
use axum::middleware::{from_fn, from_fn_with_state, Next};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use common_config::ConfigError;
use serde_json::json;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use authenticator::Authenticator;
use config::GatewayConfig;
use context::CurrentPrincipal;
use error::ApiError;
use gate::AuthenticationLayer;
use redirect::login_redirect;

pub const SERVICE_NAME: &str = "auth-gateway";
pub const ADMIN_ROLE: &str = "admin";
pub const HEALTH_PATH: &str = "/v1/health";
pub const WHOAMI_PATH: &str = "/v1/whoami";
pub const ADMIN_PATH: &str = "/v1/admin";
/// Routes served by the gateway itself; the session-token endpoint may not reuse them.
pub const RESERVED_PATHS: [&str; 3] = [HEALTH_PATH, WHOAMI_PATH, ADMIN_PATH];
const REQUEST_ID_HEADER: &str = "x-request-id";

pub struct AppState {
    pub gate: AuthenticationLayer,
    pub login_redirect_url: Option<String>,
    /// Path answered by the gate with a session token; `None` when disabled.
    pub session_token_endpoint: Option<String>,
}

impl AppState {
    pub fn new(
        config: &GatewayConfig,
        authenticator: Arc<dyn Authenticator>,
    ) -> Result<Self, ConfigError> {
        let session = &config.authentication.session_token;
        Ok(Self {
            gate: AuthenticationLayer::from_settings(authenticator, &config.authentication)?,
            login_redirect_url: config.login_redirect_url.clone(),
            session_token_endpoint: session.enabled.then(|| session.endpoint.clone()),
        })
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route(HEALTH_PATH, get(health))
        .route(WHOAMI_PATH, get(whoami))
        .route(ADMIN_PATH, get(admin));

    if let Some(endpoint) = &state.session_token_endpoint {
        router = router.route(endpoint, get(session_token_unavailable));
    }

    router
        .layer(state.gate.clone())
        .layer(from_fn_with_state(state.clone(), login_redirect))
        .layer(from_fn(request_context))
        .with_state(state)
}

async fn request_context(mut req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let request_id_value = HeaderValue::from_str(&request_id).ok();
    if let Some(value) = &request_id_value {
        req.headers_mut().insert(REQUEST_ID_HEADER, value.clone());
    }

    let span = info_span!(
        "http.request",
        method = %method,
        path = %path,
        request_id = %request_id
    );

    let start = Instant::now();
    span.in_scope(|| tracing::info!(event = "request_start"));
    let mut response = next.run(req).instrument(span.clone()).await;
    span.in_scope(|| {
        tracing::info!(
            event = "request_end",
            status = response.status().as_u16(),
            latency_ms = start.elapsed().as_secs_f64() * 1000.0
        )
    });

    if let Some(value) = request_id_value {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "service": SERVICE_NAME }))
}

async fn whoami(CurrentPrincipal(principal): CurrentPrincipal) -> Json<serde_json::Value> {
    Json(json!({
        "authenticated": principal.is_authenticated(),
        "name": principal.name(),
        "authentication_type": principal.authentication_type(),
        "claims": principal.claims(),
    }))
}

async fn admin(
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !principal.is_authenticated() {
        return Err(ApiError::Unauthorized);
    }
    if !principal.is_in_role(ADMIN_ROLE) {
        return Err(ApiError::Forbidden {
            reason: format!("{ADMIN_ROLE} role required"),
        });
    }
    Ok(Json(json!({ "service": SERVICE_NAME, "admin": principal.name() })))
}

/// Reached only when the gate did not issue a token, i.e. no valid credential.
async fn session_token_unavailable() -> ApiError {
    ApiError::Unauthorized
}
