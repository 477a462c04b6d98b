//! The seam between the authentication gate and whatever validates credentials.

use async_trait::async_trait;
use axum::http::request::Parts;
use chrono::{DateTime, Utc};
use common_auth::{AuthError, Principal};
use serde::Serialize;

/// Scheme under which issued session tokens are presented back.
pub const SESSION_SCHEME: &str = "Session";

/// A short-lived credential issued in exchange for a validated primary credential.
#[derive(Debug, Clone)]
pub struct SessionToken {
    token: String,
    principal: Principal,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl SessionToken {
    pub fn new(
        token: String,
        principal: Principal,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token,
            principal,
            issued_at,
            expires_at,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Lifetime in whole seconds, as granted at issue time.
    pub fn expires_in(&self) -> i64 {
        (self.expires_at - self.issued_at).num_seconds().max(0)
    }
}

#[derive(Debug, Serialize)]
struct SessionTokenResponse<'a> {
    access_token: &'a str,
    token_type: &'a str,
    expires_in: i64,
}

/// Validates credentials and issues session tokens on behalf of the gate.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Resolve the caller of a request.
    ///
    /// Returns the anonymous principal when no credential was presented and
    /// `AuthError::InvalidCredential` when one was presented but rejected.
    /// `Ok(None)` violates the contract and is treated as an internal fault.
    async fn authenticate(&self, parts: &Parts) -> Result<Option<Principal>, AuthError>;

    /// Whether the request asks to exchange its credential for a session token.
    fn is_session_token_request(&self, parts: &Parts) -> bool;

    async fn create_session_token(&self, principal: &Principal) -> Result<SessionToken, AuthError>;

    /// Serialize an issued token into the JSON response body.
    fn create_session_token_response(&self, token: &SessionToken) -> Result<String, AuthError> {
        let body = SessionTokenResponse {
            access_token: token.token(),
            token_type: SESSION_SCHEME,
            expires_in: token.expires_in(),
        };
        serde_json::to_string(&body)
            .map_err(|err| AuthError::Internal(format!("failed to encode session token: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    struct NoopAuthenticator;

    #[async_trait]
    impl Authenticator for NoopAuthenticator {
        async fn authenticate(&self, _parts: &Parts) -> Result<Option<Principal>, AuthError> {
            Ok(Some(Principal::anonymous()))
        }

        fn is_session_token_request(&self, _parts: &Parts) -> bool {
            false
        }

        async fn create_session_token(
            &self,
            _principal: &Principal,
        ) -> Result<SessionToken, AuthError> {
            Err(AuthError::Internal("not supported".into()))
        }
    }

    #[test]
    fn default_response_encodes_token_fields() {
        let issued = Utc::now();
        let token = SessionToken::new(
            "abc".to_string(),
            Principal::anonymous(),
            issued,
            issued + Duration::seconds(600),
        );

        let body = NoopAuthenticator
            .create_session_token_response(&token)
            .expect("encode");
        let json: serde_json::Value = serde_json::from_str(&body).expect("json");
        assert_eq!(json["access_token"], "abc");
        assert_eq!(json["token_type"], "Session");
        assert_eq!(json["expires_in"], 600);
    }

    #[test]
    fn expiry_is_inclusive() {
        let issued = Utc::now();
        let expires = issued + Duration::seconds(1);
        let token = SessionToken::new("t".into(), Principal::anonymous(), issued, expires);
        assert!(!token.is_expired_at(issued));
        assert!(token.is_expired_at(expires));
    }
}
