//! Attribute-level diff between desired and observed state

use crate::descriptor::{Descriptor, UpdatePolicy};
use crate::types::{AttrValue, AttributeBag, ResourceKind};
use serde::Serialize;

/// How one changed attribute will be applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Change {
    /// Explicit rename command
    Rename,
    /// Alter command on the existing object
    InPlace,
    /// Needs delete + create
    Replace,
}

/// A single differing attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeChange {
    pub attribute: &'static str,
    pub from: Option<AttrValue>,
    pub to: Option<AttrValue>,
    pub change: Change,
    pub sensitive: bool,
}

/// A diff between desired and observed state of one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diff {
    pub kind: ResourceKind,
    pub changes: Vec<AttributeChange>,
    pub unchanged: Vec<&'static str>,
}

impl Diff {
    /// Compare two bags attribute by attribute
    ///
    /// A computed attribute with no desired value keeps whatever was
    /// observed. Read-only attributes are never compared.
    pub fn compute(
        descriptor: &Descriptor,
        desired: &AttributeBag,
        observed: &AttributeBag,
    ) -> Self {
        let mut changes = Vec::new();
        let mut unchanged = Vec::new();

        for spec in descriptor.attributes {
            let change = match spec.update {
                UpdatePolicy::ReadOnly => continue,
                UpdatePolicy::Rename => Change::Rename,
                UpdatePolicy::InPlace => Change::InPlace,
                UpdatePolicy::Identity | UpdatePolicy::Replace => Change::Replace,
            };

            let want = desired.get(spec.name);
            let have = observed.get(spec.name);

            if (want.is_none() && spec.computed) || want == have {
                unchanged.push(spec.name);
                continue;
            }

            changes.push(AttributeChange {
                attribute: spec.name,
                from: have.cloned(),
                to: want.cloned(),
                change,
                sensitive: spec.sensitive,
            });
        }

        Self {
            kind: descriptor.kind,
            changes,
            unchanged,
        }
    }

    /// Turn in-place changes of `attributes` into replace changes
    pub fn escalate(&mut self, attributes: &[&str]) {
        for change in &mut self.changes {
            if change.change == Change::InPlace && attributes.contains(&change.attribute) {
                change.change = Change::Replace;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn changed(&self, attribute: &str) -> bool {
        self.changes.iter().any(|c| c.attribute == attribute)
    }

    pub fn requires_replace(&self) -> impl Iterator<Item = &AttributeChange> {
        self.changes.iter().filter(|c| c.change == Change::Replace)
    }

    pub fn renames(&self) -> impl Iterator<Item = &AttributeChange> {
        self.changes.iter().filter(|c| c.change == Change::Rename)
    }

    pub fn in_place(&self) -> impl Iterator<Item = &AttributeChange> {
        self.changes.iter().filter(|c| c.change == Change::InPlace)
    }

    /// Whether applying this diff needs delete + create
    pub fn needs_replace(&self) -> bool {
        self.requires_replace().next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::describe;

    #[test]
    fn test_partition() {
        let observed = AttributeBag::new()
            .with("name", "app")
            .with("type", "sql")
            .with("password", "old")
            .with("default_database", "master")
            .with("id", "app");
        let desired = AttributeBag::new()
            .with("name", "app2")
            .with("type", "windows")
            .with("password", "new")
            .with("default_database", "master");

        let diff = Diff::compute(describe(ResourceKind::Login), &desired, &observed);

        assert_eq!(diff.renames().count(), 1);
        assert_eq!(diff.in_place().map(|c| c.attribute).collect::<Vec<_>>(), ["password"]);
        assert_eq!(diff.requires_replace().map(|c| c.attribute).collect::<Vec<_>>(), ["type"]);
        assert_eq!(diff.unchanged, ["default_database"]);
        assert!(diff.in_place().all(|c| c.sensitive));
    }

    #[test]
    fn test_absent_computed_is_unchanged() {
        let observed = AttributeBag::new().with("name", "app").with("owner", "sa");
        let desired = AttributeBag::new().with("name", "app");
        let diff = Diff::compute(describe(ResourceKind::Database), &desired, &observed);
        assert!(!diff.changed("owner"));
    }

    #[test]
    fn test_absent_optional_is_a_change() {
        let observed = AttributeBag::new()
            .with("database", "app")
            .with("name", "bob")
            .with("login", "bob");
        let desired = AttributeBag::new().with("database", "app").with("name", "bob");
        let diff = Diff::compute(describe(ResourceKind::User), &desired, &observed);
        assert!(diff.needs_replace());
        assert_eq!(diff.changes[0].to, None);
    }

    #[test]
    fn test_escalate() {
        let observed = AttributeBag::new().with("default_database", "master");
        let desired = AttributeBag::new().with("default_database", "app");
        let mut diff = Diff::compute(describe(ResourceKind::Login), &desired, &observed);
        assert!(!diff.requires_replace().any(|c| c.attribute == "default_database"));
        diff.escalate(&["default_database"]);
        assert!(diff.requires_replace().any(|c| c.attribute == "default_database"));
    }
}
