//! Fully qualified names and EDM identifier rules

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace reserved for the EDM primitive types (`Edm.Int32`, `Edm.String`, ...)
pub const EDM_NAMESPACE: &str = "Edm";

/// Maximum length of a simple identifier
pub const MAX_IDENTIFIER_LENGTH: usize = 480;

static SIMPLE_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\p{L}\p{Nl}_][\p{L}\p{Nl}\p{Nd}\p{Mn}\p{Mc}\p{Pc}\p{Cf}]*$").unwrap());

static NAMESPACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\p{L}\p{Nl}_][\p{L}\p{Nl}\p{Nd}\p{Mn}\p{Mc}\p{Pc}\p{Cf}]*(\.[\p{L}\p{Nl}_][\p{L}\p{Nl}\p{Nd}\p{Mn}\p{Mc}\p{Pc}\p{Cf}]*)*$").unwrap()
});

/// A (namespace, name) pair identifying a schema element uniquely
///
/// # Example
///
/// ```rust
/// use edm_metadata::models::FullQualifiedName;
///
/// let fqn = FullQualifiedName::parse("Acme.Facilities.Room").unwrap();
/// assert_eq!(fqn.namespace(), "Acme.Facilities");
/// assert_eq!(fqn.name(), "Room");
/// assert_eq!(fqn.to_string(), "Acme.Facilities.Room");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FullQualifiedName {
    namespace: String,
    name: String,
}

impl FullQualifiedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Split a dotted name at its last `.`; `None` when there is no namespace part
    pub fn parse(qualified: &str) -> Option<Self> {
        let (namespace, name) = qualified.rsplit_once('.')?;
        if namespace.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(namespace, name))
    }

    /// Parse a possibly unqualified reference, resolving bare names in `default_namespace`
    pub fn parse_in(reference: &str, default_namespace: &str) -> Self {
        Self::parse(reference).unwrap_or_else(|| Self::new(default_namespace, reference))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this name lives in the reserved primitive namespace
    pub fn is_edm(&self) -> bool {
        self.namespace == EDM_NAMESPACE
    }

    /// Match either the qualified form or, within `namespace`, the bare name
    pub fn matches(&self, reference: &str) -> bool {
        match Self::parse(reference) {
            Some(other) if other == *self => true,
            _ => reference == self.name,
        }
    }
}

impl fmt::Display for FullQualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// Check an EDM simple identifier (entity type, property, role, set names)
pub fn validate_identifier(identifier: &str) -> Result<(), String> {
    if identifier.is_empty() {
        return Err("identifier cannot be empty".to_string());
    }
    if identifier.chars().count() > MAX_IDENTIFIER_LENGTH {
        return Err(format!(
            "identifier '{}' exceeds maximum length {}",
            identifier, MAX_IDENTIFIER_LENGTH
        ));
    }
    if !SIMPLE_IDENTIFIER.is_match(identifier) {
        return Err(format!("'{}' is not a valid EDM identifier", identifier));
    }
    Ok(())
}

/// Check a dotted namespace
pub fn validate_namespace(namespace: &str) -> Result<(), String> {
    if namespace.is_empty() {
        return Err("namespace cannot be empty".to_string());
    }
    if !NAMESPACE.is_match(namespace) {
        return Err(format!("'{}' is not a valid EDM namespace", namespace));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uses_last_dot() {
        let fqn = FullQualifiedName::parse("a.b.C").unwrap();
        assert_eq!(fqn.namespace(), "a.b");
        assert_eq!(fqn.name(), "C");
        assert!(FullQualifiedName::parse("Room").is_none());
        assert!(FullQualifiedName::parse("Acme.").is_none());
    }

    #[test]
    fn test_parse_in_defaults_namespace() {
        let fqn = FullQualifiedName::parse_in("Room", "Acme");
        assert_eq!(fqn, FullQualifiedName::new("Acme", "Room"));
        assert!(FullQualifiedName::parse_in("Edm.Int32", "Acme").is_edm());
    }

    #[test]
    fn test_matches_bare_and_qualified() {
        let fqn = FullQualifiedName::new("Acme", "Room");
        assert!(fqn.matches("Room"));
        assert!(fqn.matches("Acme.Room"));
        assert!(!fqn.matches("Other.Room"));
    }

    #[test]
    fn test_identifier_rules() {
        assert!(validate_identifier("Room").is_ok());
        assert!(validate_identifier("_private").is_ok());
        assert!(validate_identifier("räume").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1st").is_err());
        assert!(validate_identifier("has space").is_err());
        assert!(validate_identifier(&"a".repeat(481)).is_err());
    }

    #[test]
    fn test_namespace_rules() {
        assert!(validate_namespace("Acme.Facilities").is_ok());
        assert!(validate_namespace("Acme..Facilities").is_err());
        assert!(validate_namespace(".Acme").is_err());
    }
}
