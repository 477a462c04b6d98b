use std::net::SocketAddr;
use std::time::Duration;

use axum::http::HeaderValue;
use common_config::{env_flag, env_string, service_port, ConfigError, ServiceConfig};
use serde::Deserialize;

use crate::RESERVED_PATHS;

/// Upper bound on `authentication.session_token.lifetime_secs` (30 days).
pub const MAX_SESSION_LIFETIME_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub bind_address: String,
    pub port: u16,
    pub authentication: AuthenticationSettings,
    /// Interactive login page unauthenticated browser callers are sent to.
    pub login_redirect_url: Option<String>,
    pub credentials: Vec<StaticCredential>,
}

/// Options read by the authentication gate.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthenticationSettings {
    /// Keep a principal installed by the host instead of resetting to anonymous.
    pub inherit_host_client_identity: bool,
    pub send_www_authenticate_response_header: bool,
    pub default_authentication_scheme: String,
    pub set_no_redirect_marker: bool,
    pub session_token: SessionTokenSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionTokenSettings {
    pub enabled: bool,
    pub endpoint: String,
    pub lifetime_secs: u64,
}

/// A caller known to the static authenticator.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StaticCredential {
    pub subject: String,
    pub password: Option<String>,
    pub api_token: Option<String>,
    pub roles: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            authentication: AuthenticationSettings::default(),
            login_redirect_url: None,
            credentials: Vec::new(),
        }
    }
}

impl Default for AuthenticationSettings {
    fn default() -> Self {
        Self {
            inherit_host_client_identity: false,
            send_www_authenticate_response_header: true,
            default_authentication_scheme: "Bearer".to_string(),
            set_no_redirect_marker: true,
            session_token: SessionTokenSettings::default(),
        }
    }
}

impl Default for SessionTokenSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "/token".to_string(),
            lifetime_secs: 10 * 60 * 60,
        }
    }
}

impl AuthenticationSettings {
    /// The `WWW-Authenticate` value to attach to 401 responses, if any.
    pub fn challenge_header(&self) -> Result<Option<HeaderValue>, ConfigError> {
        if !self.send_www_authenticate_response_header {
            return Ok(None);
        }

        let scheme = self.default_authentication_scheme.trim();
        if scheme.is_empty() {
            return Err(ConfigError::Invalid {
                field: "authentication.default_authentication_scheme",
                message: "must not be empty when the challenge header is enabled".to_string(),
            });
        }

        HeaderValue::from_str(scheme)
            .map(Some)
            .map_err(|err| ConfigError::Invalid {
                field: "authentication.default_authentication_scheme",
                message: err.to_string(),
            })
    }
}

impl SessionTokenSettings {
    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = self.endpoint.as_str();
        let invalid_endpoint = |message: String| ConfigError::Invalid {
            field: "authentication.session_token.endpoint",
            message,
        };

        if !endpoint.starts_with('/') {
            return Err(invalid_endpoint(format!("{endpoint} is not an absolute path")));
        }
        if RESERVED_PATHS.contains(&endpoint) {
            return Err(invalid_endpoint(format!("{endpoint} is already routed")));
        }
        if endpoint
            .split('/')
            .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
            || endpoint.contains(['{', '}', '?', '#'])
        {
            return Err(invalid_endpoint(format!("{endpoint} must be a literal path")));
        }

        if self.lifetime_secs > MAX_SESSION_LIFETIME_SECS {
            return Err(ConfigError::Invalid {
                field: "authentication.session_token.lifetime_secs",
                message: format!(
                    "{} exceeds the maximum of {MAX_SESSION_LIFETIME_SECS}",
                    self.lifetime_secs
                ),
            });
        }

        Ok(())
    }
}

impl GatewayConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.bind_address, self.port).parse()
    }
}

impl ServiceConfig for GatewayConfig {
    const PREFIX: &'static str = "AUTH_GATEWAY_";

    fn apply_environment_overrides(&mut self, prefix: &str) {
        self.port = service_port(&format!("{prefix}PORT"), self.port);
        if let Some(address) = env_string(&format!("{prefix}BIND_ADDRESS")) {
            self.bind_address = address;
        }
        if let Some(url) = env_string(&format!("{prefix}LOGIN_REDIRECT_URL")) {
            self.login_redirect_url = Some(url);
        }

        let auth = &mut self.authentication;
        if let Some(flag) = env_flag(&format!("{prefix}INHERIT_HOST_CLIENT_IDENTITY")) {
            auth.inherit_host_client_identity = flag;
        }
        if let Some(flag) = env_flag(&format!("{prefix}SEND_WWW_AUTHENTICATE")) {
            auth.send_www_authenticate_response_header = flag;
        }
        if let Some(scheme) = env_string(&format!("{prefix}DEFAULT_SCHEME")) {
            auth.default_authentication_scheme = scheme;
        }
        if let Some(flag) = env_flag(&format!("{prefix}SET_NO_REDIRECT_MARKER")) {
            auth.set_no_redirect_marker = flag;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.authentication.challenge_header()?;

        let session = &self.authentication.session_token;
        if session.enabled {
            session.validate()?;
        }

        for credential in &self.credentials {
            if credential.subject.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field: "credentials.subject",
                    message: "must not be empty".to_string(),
                });
            }
        }

        Ok(())
    }
}
