use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::context::NoRedirect;
use crate::AppState;

/// Send unauthenticated browser callers to the login page.
///
/// Runs outside the authentication gate. A 401 the gate marked with
/// [`NoRedirect`] is returned untouched so API clients see the challenge.
pub async fn login_redirect(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(login_url) = state.login_redirect_url.as_deref() else {
        return next.run(req).await;
    };

    let return_path = req
        .uri()
        .path_and_query()
        .map(|value| value.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let response = next.run(req).await;
    if response.status() != StatusCode::UNAUTHORIZED || NoRedirect::is_set(&response) {
        return response;
    }

    let location = login_location(login_url, &return_path);
    match HeaderValue::from_str(&location) {
        Ok(value) => {
            tracing::debug!(%location, "redirecting unauthenticated caller to login");
            (StatusCode::FOUND, [(header::LOCATION, value)]).into_response()
        }
        Err(error) => {
            tracing::warn!(%location, %error, "login redirect target is not a valid header");
            response
        }
    }
}

fn login_location(login_url: &str, return_path: &str) -> String {
    let separator = if login_url.contains('?') { '&' } else { '?' };
    format!(
        "{login_url}{separator}returnUrl={}",
        urlencoding::encode(return_path)
    )
}
