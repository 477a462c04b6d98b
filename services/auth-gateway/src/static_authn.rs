//! Configuration-driven authenticator.
//!
//! Accepts `Basic` user/password pairs and `Bearer` API tokens taken from the
//! gateway configuration, plus `Session` tokens it issued itself.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::request::Parts;
use axum::http::{header, Method};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::Utc;
use common_auth::{claim_types, AuthError, Claim, CredentialFault, Principal};
use rand::RngCore;
use tokio::sync::RwLock;

use crate::authenticator::{Authenticator, SessionToken, SESSION_SCHEME};
use crate::config::{GatewayConfig, SessionTokenSettings, StaticCredential};

pub const BASIC_SCHEME: &str = "Basic";
pub const BEARER_SCHEME: &str = "Bearer";

const SESSION_TOKEN_BYTES: usize = 32;

pub struct StaticAuthenticator {
    by_subject: HashMap<String, StaticCredential>,
    by_api_token: HashMap<String, String>,
    session: SessionTokenSettings,
    sessions: RwLock<HashMap<String, SessionToken>>,
}

impl StaticAuthenticator {
    pub fn new(credentials: &[StaticCredential], session: SessionTokenSettings) -> Self {
        let mut by_subject = HashMap::new();
        let mut by_api_token = HashMap::new();
        for credential in credentials {
            if let Some(token) = &credential.api_token {
                by_api_token.insert(token.clone(), credential.subject.clone());
            }
            by_subject.insert(credential.subject.clone(), credential.clone());
        }

        Self {
            by_subject,
            by_api_token,
            session,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(
            &config.credentials,
            config.authentication.session_token.clone(),
        )
    }

    fn principal_for(
        &self,
        credential: &StaticCredential,
        authentication_type: &str,
    ) -> Result<Principal, AuthError> {
        let mut claims = vec![
            Claim::new(claim_types::NAME, &credential.subject),
            Claim::new(claim_types::NAME_IDENTIFIER, &credential.subject),
        ];
        claims.extend(
            credential
                .roles
                .iter()
                .map(|role| Claim::new(claim_types::ROLE, role)),
        );
        claims.push(Claim::new(
            claim_types::AUTHENTICATION_METHOD,
            authentication_type,
        ));
        claims.push(Claim::new(
            claim_types::AUTHENTICATION_INSTANT,
            Utc::now().to_rfc3339(),
        ));
        Principal::create(authentication_type, claims)
    }

    fn authenticate_basic(&self, parameter: &str) -> Result<Principal, AuthError> {
        let decoded = STANDARD.decode(parameter.trim()).map_err(|err| {
            AuthError::invalid_credential(CredentialFault::Malformed, format!("basic payload: {err}"))
        })?;
        let decoded = String::from_utf8(decoded).map_err(|_| {
            AuthError::invalid_credential(CredentialFault::Malformed, "basic payload is not utf-8")
        })?;
        let Some((user, password)) = decoded.split_once(':') else {
            return Err(AuthError::invalid_credential(
                CredentialFault::Malformed,
                "basic payload lacks a separator",
            ));
        };

        match self.by_subject.get(user) {
            Some(credential) if credential.password.as_deref() == Some(password) => {
                self.principal_for(credential, BASIC_SCHEME)
            }
            _ => Err(AuthError::invalid_credential(
                CredentialFault::Untrusted,
                format!("unknown user or wrong password for {user}"),
            )),
        }
    }

    fn authenticate_bearer(&self, token: &str) -> Result<Principal, AuthError> {
        let credential = self
            .by_api_token
            .get(token.trim())
            .and_then(|subject| self.by_subject.get(subject))
            .ok_or_else(|| {
                AuthError::invalid_credential(CredentialFault::Untrusted, "unknown api token")
            })?;
        self.principal_for(credential, BEARER_SCHEME)
    }

    async fn authenticate_session(&self, token: &str) -> Result<Principal, AuthError> {
        let token = token.trim();
        let session = self.sessions.read().await.get(token).cloned();
        let Some(session) = session else {
            return Err(AuthError::invalid_credential(
                CredentialFault::Untrusted,
                "unknown session token",
            ));
        };

        if session.is_expired_at(Utc::now()) {
            self.sessions.write().await.remove(token);
            return Err(AuthError::invalid_credential(
                CredentialFault::Expired,
                format!("session token expired at {}", session.expires_at()),
            ));
        }

        Principal::create(SESSION_SCHEME, session.principal().claims().to_vec())
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, parts: &Parts) -> Result<Option<Principal>, AuthError> {
        let Some(value) = parts.headers.get(header::AUTHORIZATION) else {
            return Ok(Some(Principal::anonymous()));
        };
        let value = value.to_str().map_err(|_| {
            AuthError::invalid_credential(
                CredentialFault::Malformed,
                "authorization header is not visible ascii",
            )
        })?;
        let (scheme, parameter) = value.trim().split_once(' ').unwrap_or((value.trim(), ""));

        let principal = if scheme.eq_ignore_ascii_case(BASIC_SCHEME) {
            self.authenticate_basic(parameter)?
        } else if scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
            self.authenticate_bearer(parameter)?
        } else if scheme.eq_ignore_ascii_case(SESSION_SCHEME) {
            self.authenticate_session(parameter).await?
        } else {
            tracing::debug!(%scheme, "unrecognised authorization scheme");
            Principal::anonymous()
        };
        Ok(Some(principal))
    }

    fn is_session_token_request(&self, parts: &Parts) -> bool {
        self.session.enabled
            && parts.method == Method::GET
            && parts.uri.path() == self.session.endpoint
    }

    async fn create_session_token(&self, principal: &Principal) -> Result<SessionToken, AuthError> {
        if principal.authentication_type() == Some(SESSION_SCHEME) {
            return Err(AuthError::invalid_credential(
                CredentialFault::Untrusted,
                "session tokens are only issued for a primary credential",
            ));
        }

        let lifetime = chrono::Duration::from_std(self.session.lifetime())
            .map_err(|_| AuthError::Internal("session lifetime out of range".to_string()))?;
        let issued_at = Utc::now();
        let expires_at = issued_at
            .checked_add_signed(lifetime)
            .ok_or_else(|| AuthError::Internal("session expiry out of range".to_string()))?;
        let token = SessionToken::new(generate_token(), principal.clone(), issued_at, expires_at);

        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, existing| !existing.is_expired_at(issued_at));
        sessions.insert(token.token().to_string(), token.clone());
        Ok(token)
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
