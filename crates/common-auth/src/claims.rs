/// Well-known claim types.
pub mod claim_types {
    pub const NAME: &str = "name";
    pub const NAME_IDENTIFIER: &str = "nameidentifier";
    pub const ROLE: &str = "role";
    pub const AUTHENTICATION_METHOD: &str = "authenticationmethod";
    pub const AUTHENTICATION_INSTANT: &str = "authenticationinstant";
}

/// A single assertion about a subject. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Claim {
    #[cfg_attr(feature = "with-serde", serde(rename = "type"))]
    claim_type: String,
    value: String,
}

impl Claim {
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }

    pub fn claim_type(&self) -> &str {
        &self.claim_type
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Claim types compare case-insensitively, values exactly.
    pub fn is(&self, claim_type: &str, value: &str) -> bool {
        self.claim_type.eq_ignore_ascii_case(claim_type) && self.value == value
    }
}
