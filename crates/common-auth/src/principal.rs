use std::sync::Arc;

use crate::claims::{claim_types, Claim};
use crate::AuthError;

/// A named bearer of claims, tagged with the mechanism that authenticated it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Identity {
    authentication_type: Option<String>,
    claims: Vec<Claim>,
}

impl Identity {
    pub fn new(authentication_type: Option<String>, claims: Vec<Claim>) -> Self {
        Self {
            authentication_type: authentication_type.filter(|value| !value.is_empty()),
            claims,
        }
    }

    pub fn authentication_type(&self) -> Option<&str> {
        self.authentication_type.as_deref()
    }

    /// An identity is authenticated iff it carries a non-empty authentication type.
    pub fn is_authenticated(&self) -> bool {
        self.authentication_type.is_some()
    }

    /// Value of the first `name` claim.
    pub fn name(&self) -> Option<&str> {
        self.find_first(claim_types::NAME).map(Claim::value)
    }

    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    pub fn find_first(&self, claim_type: &str) -> Option<&Claim> {
        self.claims
            .iter()
            .find(|claim| claim.claim_type().eq_ignore_ascii_case(claim_type))
    }

    pub fn find_all<'a>(&'a self, claim_type: &'a str) -> impl Iterator<Item = &'a Claim> + 'a {
        self.claims
            .iter()
            .filter(move |claim| claim.claim_type().eq_ignore_ascii_case(claim_type))
    }
}

/// The resolved caller of one request.
///
/// Cloning is cheap; the identity is shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    identity: Arc<Identity>,
}

impl Principal {
    /// The principal used when no credential was presented.
    pub fn anonymous() -> Self {
        Self {
            identity: Arc::new(Identity::default()),
        }
    }

    /// Build an authenticated principal from `claims`.
    ///
    /// An empty `authentication_type` is only accepted together with an empty
    /// claim set, in which case the result is unauthenticated.
    pub fn create(authentication_type: &str, claims: Vec<Claim>) -> Result<Self, AuthError> {
        let authentication_type = authentication_type.trim();
        if authentication_type.is_empty() && !claims.is_empty() {
            return Err(AuthError::InvalidArgument(
                "authentication type must not be empty when claims are supplied".to_string(),
            ));
        }

        Ok(Self::from_identity(Identity::new(
            Some(authentication_type.to_string()),
            claims,
        )))
    }

    pub fn from_identity(identity: Identity) -> Self {
        Self {
            identity: Arc::new(identity),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_authenticated()
    }

    pub fn authentication_type(&self) -> Option<&str> {
        self.identity.authentication_type()
    }

    pub fn name(&self) -> Option<&str> {
        self.identity.name()
    }

    pub fn claims(&self) -> &[Claim] {
        self.identity.claims()
    }

    pub fn find_first(&self, claim_type: &str) -> Option<&Claim> {
        self.identity.find_first(claim_type)
    }

    pub fn find_all<'a>(&'a self, claim_type: &'a str) -> impl Iterator<Item = &'a Claim> + 'a {
        self.identity.find_all(claim_type)
    }

    pub fn has_claim(&self, claim_type: &str, value: &str) -> bool {
        self.identity
            .claims()
            .iter()
            .any(|claim| claim.is(claim_type, value))
    }

    pub fn is_in_role(&self, role: &str) -> bool {
        self.has_claim(claim_types::ROLE, role)
    }
}

impl Default for Principal {
    fn default() -> Self {
        Self::anonymous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Principal {
        Principal::create(
            "Basic",
            vec![
                Claim::new(claim_types::NAME, "alice"),
                Claim::new(claim_types::ROLE, "admin"),
                Claim::new(claim_types::ROLE, "operator"),
            ],
        )
        .expect("principal")
    }

    #[test]
    fn anonymous_is_stable_and_unauthenticated() {
        let first = Principal::anonymous();
        let second = Principal::anonymous();
        assert_eq!(first, second);
        assert!(!first.is_authenticated());
        assert!(!second.is_authenticated());
        assert!(first.name().is_none());
        assert!(first.claims().is_empty());
    }

    #[test]
    fn create_tags_identity() {
        let principal = alice();
        assert!(principal.is_authenticated());
        assert_eq!(principal.authentication_type(), Some("Basic"));
        assert_eq!(principal.name(), Some("alice"));
        assert!(principal.is_in_role("admin"));
        assert!(!principal.is_in_role("guest"));
        assert_eq!(principal.find_all(claim_types::ROLE).count(), 2);
    }

    #[test]
    fn create_rejects_untagged_claims() {
        let err = Principal::create("  ", vec![Claim::new(claim_types::NAME, "bob")])
            .expect_err("empty type with claims");
        assert!(matches!(err, AuthError::InvalidArgument(_)));
    }

    #[test]
    fn create_without_type_or_claims_is_anonymous_equivalent() {
        let principal = Principal::create("", Vec::new()).expect("principal");
        assert!(!principal.is_authenticated());
        assert_eq!(principal, Principal::anonymous());
    }

    #[test]
    fn claim_lookup_is_case_insensitive_on_type() {
        let principal = alice();
        assert_eq!(
            principal.find_first("NAME").map(Claim::value),
            Some("alice")
        );
        assert!(principal.has_claim("Role", "operator"));
    }
}
