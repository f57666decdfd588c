//! State codec - wire attribute bags to typed records and back

use crate::descriptor::{ID, describe};
use crate::error::{Error, Result};
use crate::resource::ManagedResource;
use crate::types::{AttrValue, AttributeBag, Identifier, ResourceKind};

/// Copy of `bag` with descriptor defaults filled in for absent attributes
pub fn with_defaults(kind: ResourceKind, bag: &AttributeBag) -> AttributeBag {
    let mut out = bag.clone();
    for spec in describe(kind).attributes {
        if let Some(default) = spec.default
            && !out.contains(spec.name)
        {
            out.insert(spec.name, default.to_value());
        }
    }
    out
}

/// Check a desired bag against the kind's attribute set
///
/// Returns every violation rather than stopping at the first, so callers can
/// report them together.
pub fn check_desired(kind: ResourceKind, bag: &AttributeBag) -> Vec<Error> {
    let descriptor = describe(kind);
    let mut errors = Vec::new();

    for spec in descriptor.required() {
        match bag.get(spec.name) {
            None => errors.push(Error::validation(kind, spec.name, "attribute is required")),
            Some(AttrValue::Str(s)) if s.is_empty() => {
                errors.push(Error::validation(kind, spec.name, "must not be empty"));
            }
            _ => {}
        }
    }

    for (name, value) in bag.iter() {
        if name == ID {
            continue;
        }
        if descriptor.attribute(name).is_none() {
            errors.push(Error::validation(kind, name, "unsupported attribute"));
        } else if value.is_unknown() {
            errors.push(Error::validation(
                kind,
                name,
                "value is still unknown and must be resolved before this change",
            ));
        }
    }

    errors
}

/// Identifier for a decoded record
pub fn compute_identifier<R: ManagedResource>(record: &R) -> Identifier {
    record.identifier()
}

/// Encode a record as an observed bag, including its identifier
pub fn encode<R: ManagedResource>(record: &R) -> AttributeBag {
    let mut bag = record.to_bag();
    bag.insert(ID, compute_identifier(record).as_str());
    bag
}

/// Fill computed attributes missing from `bag` with their observed values
pub fn fill_computed(kind: ResourceKind, bag: &mut AttributeBag, observed: &AttributeBag) {
    for spec in describe(kind).attributes {
        if spec.computed
            && spec.name != ID
            && !bag.contains(spec.name)
            && let Some(value) = observed.get(spec.name)
        {
            bag.insert(spec.name, value.clone());
        }
    }
}

/// Typed accessors over a bag, producing validation errors for the kind
pub(crate) struct Fields<'a> {
    kind: ResourceKind,
    bag: &'a AttributeBag,
}

impl<'a> Fields<'a> {
    pub(crate) fn new(kind: ResourceKind, bag: &'a AttributeBag) -> Self {
        Self { kind, bag }
    }

    pub(crate) fn string(&self, name: &str) -> Result<String> {
        self.opt_string(name)?
            .ok_or_else(|| Error::validation(self.kind, name, "attribute is required"))
    }

    /// Optional string; an empty string counts as absent
    pub(crate) fn opt_string(&self, name: &str) -> Result<Option<String>> {
        match self.bag.get(name) {
            None => Ok(None),
            Some(AttrValue::Str(s)) if s.is_empty() => Ok(None),
            Some(AttrValue::Str(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.wrong_type(name, "string", other)),
        }
    }

    pub(crate) fn opt_int(&self, name: &str) -> Result<Option<i64>> {
        match self.bag.get(name) {
            None => Ok(None),
            Some(AttrValue::Int(n)) => Ok(Some(*n)),
            Some(other) => Err(self.wrong_type(name, "integer", other)),
        }
    }

    /// String that must be one of `allowed`
    pub(crate) fn one_of(&self, name: &str, allowed: &[&str]) -> Result<String> {
        let value = self.string(name)?;
        if allowed.contains(&value.as_str()) {
            Ok(value)
        } else {
            Err(Error::validation(
                self.kind,
                name,
                format!("'{value}' is not one of: {}", allowed.join(", ")),
            ))
        }
    }

    fn wrong_type(&self, name: &str, expected: &str, got: &AttrValue) -> Error {
        Error::validation(
            self.kind,
            name,
            format!("expected {expected}, got {}", got.type_name()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::resources::{Database, Login, User};

    #[test]
    fn test_defaults_fill_only_missing() {
        let bag = AttributeBag::new()
            .with("name", "app")
            .with("collation", "Latin1_General_CI_AS");
        let filled = with_defaults(ResourceKind::Database, &bag);
        assert_eq!(filled.get_str("collation"), Some("Latin1_General_CI_AS"));
        assert_eq!(
            filled.get("compatibility_level"),
            Some(&AttrValue::Int(150))
        );
        assert!(!filled.contains("owner"));
    }

    #[test]
    fn test_missing_required_reported_together() {
        let errors = check_desired(ResourceKind::RoleAssignment, &AttributeBag::new());
        assert_eq!(errors.len(), 3);
        assert!(
            errors
                .iter()
                .all(|e| e.category() == ErrorCategory::Validation)
        );
    }

    #[test]
    fn test_unknown_value_rejected() {
        let bag = AttributeBag::new()
            .with("name", "app")
            .with("database", AttrValue::Unknown);
        let errors = check_desired(ResourceKind::User, &bag);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].attribute(), Some("database"));
    }

    #[test]
    fn test_unsupported_attribute_rejected() {
        let bag = AttributeBag::new().with("name", "app").with("size_mb", 10_i64);
        let errors = check_desired(ResourceKind::Database, &bag);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].attribute(), Some("size_mb"));
    }

    #[test]
    fn test_invalid_login_type() {
        let bag = AttributeBag::new()
            .with("name", "app")
            .with("type", "kerberos")
            .with("password", "x");
        let err = Login::from_bag(&with_defaults(ResourceKind::Login, &bag)).unwrap_err();
        assert_eq!(err.attribute(), Some("type"));
    }

    #[test]
    fn test_wrong_type_rejected() {
        let bag = AttributeBag::new()
            .with("name", "app")
            .with("compatibility_level", "150");
        let err = Database::from_bag(&with_defaults(ResourceKind::Database, &bag)).unwrap_err();
        assert!(err.to_string().contains("expected integer"));
    }

    #[test]
    fn test_identifier_depends_only_on_identity() {
        let a = User::from_bag(
            &AttributeBag::new()
                .with("database", "app")
                .with("name", "bob")
                .with("login", "bob_login"),
        )
        .unwrap();
        let b = User::from_bag(
            &AttributeBag::new()
                .with("database", "app")
                .with("name", "bob"),
        )
        .unwrap();
        let c = User::from_bag(
            &AttributeBag::new()
                .with("database", "other")
                .with("name", "bob"),
        )
        .unwrap();

        assert_eq!(compute_identifier(&a), compute_identifier(&b));
        assert_eq!(compute_identifier(&a), compute_identifier(&a));
        assert_ne!(compute_identifier(&a), compute_identifier(&c));
        assert_eq!(compute_identifier(&a).as_str(), "app.bob");
    }

    #[test]
    fn test_encode_sets_id() {
        let db = Database::from_bag(&with_defaults(
            ResourceKind::Database,
            &AttributeBag::new().with("name", "app"),
        ))
        .unwrap();
        let bag = encode(&db);
        assert_eq!(bag.get_str(ID), Some("app"));
        assert_eq!(bag.get_str("collation"), Some("SQL_Latin1_General_CP1_CI_AS"));
    }

    #[test]
    fn test_fill_computed_keeps_observed_owner() {
        let observed = AttributeBag::new().with("name", "app").with("owner", "sa");
        let mut desired = AttributeBag::new().with("name", "app");
        fill_computed(ResourceKind::Database, &mut desired, &observed);
        assert_eq!(desired.get_str("owner"), Some("sa"));
    }
}
