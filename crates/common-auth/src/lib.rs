//! Common authentication primitives shared by the gateway and its authenticators.

mod claims;
mod principal;

use std::fmt;

use thiserror::Error;

pub use claims::{claim_types, Claim};
pub use principal::{Identity, Principal};

/// Why a presented credential was not accepted.
///
/// The kind only feeds diagnostics; every variant is answered the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialFault {
    /// The credential could not be decoded.
    Malformed,
    /// The credential was valid once but its lifetime has passed.
    Expired,
    /// The credential's signature did not verify.
    InvalidSignature,
    /// The credential was well formed but is not known or not trusted.
    Untrusted,
}

impl CredentialFault {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialFault::Malformed => "malformed",
            CredentialFault::Expired => "expired",
            CredentialFault::InvalidSignature => "invalid_signature",
            CredentialFault::Untrusted => "untrusted",
        }
    }
}

impl fmt::Display for CredentialFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while building principals or validating credentials.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A caller supplied arguments that violate a construction rule.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The presented credential was rejected.
    #[error("credential rejected ({fault}): {detail}")]
    InvalidCredential {
        fault: CredentialFault,
        detail: String,
    },
    /// The authentication machinery itself misbehaved.
    #[error("authentication internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn invalid_credential(fault: CredentialFault, detail: impl Into<String>) -> Self {
        AuthError::InvalidCredential {
            fault,
            detail: detail.into(),
        }
    }

    /// True when the error should be answered with a challenge rather than a server fault.
    pub fn is_credential_fault(&self) -> bool {
        matches!(self, AuthError::InvalidCredential { .. })
    }
}
