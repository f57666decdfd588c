//! Execution planner - decides what each declared or tracked resource needs

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::diff::Diff;
use crate::reconciler;
use crate::types::{Address, AttributeBag, ResourceKind};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// What applying a resource will do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Update,
    /// Delete, then create
    Replace,
    Delete,
    NoChange,
}

impl Action {
    /// Marker shown in plan output
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Create => "+",
            Self::Update => "~",
            Self::Replace => "-/+",
            Self::Delete => "-",
            Self::NoChange => " ",
        }
    }

    pub fn is_change(&self) -> bool {
        !matches!(self, Self::NoChange)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Replace => "replace",
            Self::Delete => "delete",
            Self::NoChange => "no change",
        })
    }
}

/// One resource in the plan
#[derive(Debug, Clone, Serialize)]
pub struct PlannedChange {
    pub address: Address,
    pub action: Action,
    /// Declared attributes; `None` for deletes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desired: Option<AttributeBag>,
    /// Tracked attributes; `None` for creates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed: Option<AttributeBag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<Diff>,
}

impl PlannedChange {
    pub fn kind(&self) -> ResourceKind {
        self.address.kind
    }
}

/// A group of changes of one kind that may run concurrently
#[derive(Debug)]
pub struct Stage<'a> {
    pub kind: ResourceKind,
    pub deleting: bool,
    pub changes: Vec<&'a PlannedChange>,
}

/// An execution plan, ordered by address
#[derive(Debug, Default, Serialize)]
pub struct ExecutionPlan {
    pub changes: Vec<PlannedChange>,
}

impl ExecutionPlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare declared resources with tracked (and refreshed) ones
    ///
    /// Resources that fail validation are left out of the plan and reported
    /// in the returned diagnostics.
    pub fn build(
        declared: &BTreeMap<Address, AttributeBag>,
        tracked: &BTreeMap<Address, AttributeBag>,
    ) -> (Self, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let mut changes = Vec::new();

        for (address, desired) in declared {
            let checks = reconciler::validate(address.kind, desired);
            let blocked = checks.has_error();
            diagnostics.extend(checks.into_iter().map(|d| with_address(d, address)));
            if blocked {
                continue;
            }

            let Some(observed) = tracked.get(address) else {
                changes.push(PlannedChange {
                    address: address.clone(),
                    action: Action::Create,
                    desired: Some(desired.clone()),
                    observed: None,
                    diff: None,
                });
                continue;
            };

            let diff = match reconciler::diff(address.kind, desired, observed) {
                Ok(diff) => diff,
                Err(err) => {
                    diagnostics.push(with_address(Diagnostic::from(&err), address));
                    continue;
                }
            };
            let action = if diff.is_empty() {
                Action::NoChange
            } else if diff.needs_replace() {
                Action::Replace
            } else {
                Action::Update
            };
            changes.push(PlannedChange {
                address: address.clone(),
                action,
                desired: Some(desired.clone()),
                observed: Some(observed.clone()),
                diff: Some(diff),
            });
        }

        for (address, observed) in tracked {
            if !declared.contains_key(address) {
                changes.push(PlannedChange {
                    address: address.clone(),
                    action: Action::Delete,
                    desired: None,
                    observed: Some(observed.clone()),
                    diff: None,
                });
            }
        }

        changes.sort_by(|a, b| a.address.cmp(&b.address));
        (Self { changes }, diagnostics)
    }

    /// Plan that deletes every tracked resource
    pub fn destroy(tracked: &BTreeMap<Address, AttributeBag>) -> Self {
        Self {
            changes: tracked
                .iter()
                .map(|(address, observed)| PlannedChange {
                    address: address.clone(),
                    action: Action::Delete,
                    desired: None,
                    observed: Some(observed.clone()),
                    diff: None,
                })
                .collect(),
        }
    }

    /// Filter plan to only include resources matching a target pattern
    ///
    /// Target format: "kind" or "kind.label"
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (kind, label) = parse_target(t);
                Self {
                    changes: self
                        .changes
                        .into_iter()
                        .filter(|c| {
                            c.address.kind.as_str() == kind
                                && label.is_none_or(|l| c.address.label == l)
                        })
                        .collect(),
                }
            }
        }
    }

    /// Dependency stages: deletes in reverse order, then the rest in order
    pub fn stages(&self) -> Vec<Stage<'_>> {
        let mut stages = Vec::new();

        for kind in ResourceKind::MANAGED.iter().rev() {
            let changes: Vec<_> = self
                .changes
                .iter()
                .filter(|c| c.kind() == *kind && c.action == Action::Delete)
                .collect();
            if !changes.is_empty() {
                stages.push(Stage {
                    kind: *kind,
                    deleting: true,
                    changes,
                });
            }
        }

        for kind in ResourceKind::MANAGED {
            let changes: Vec<_> = self
                .changes
                .iter()
                .filter(|c| {
                    c.kind() == kind
                        && matches!(
                            c.action,
                            Action::Create | Action::Update | Action::Replace
                        )
                })
                .collect();
            if !changes.is_empty() {
                stages.push(Stage {
                    kind,
                    deleting: false,
                    changes,
                });
            }
        }

        stages
    }

    /// Number of changes with the given action
    pub fn count(&self, action: Action) -> usize {
        self.changes.iter().filter(|c| c.action == action).count()
    }

    /// Number of resources that will change
    pub fn pending(&self) -> usize {
        self.changes.iter().filter(|c| c.action.is_change()).count()
    }

    pub fn has_changes(&self) -> bool {
        self.pending() > 0
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

fn with_address(diagnostic: Diagnostic, address: &Address) -> Diagnostic {
    if diagnostic.identifier.is_some() {
        diagnostic
    } else {
        diagnostic.for_identifier(address.to_string())
    }
}

/// Parse a target string like "kind.label" into (kind, label)
fn parse_target(target: &str) -> (&str, Option<&str>) {
    match target.split_once('.') {
        Some((kind, label)) => (kind, Some(label)),
        None => (target, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login(password: &str) -> AttributeBag {
        AttributeBag::new()
            .with("name", "app")
            .with("type", "sql")
            .with("password", password)
    }

    fn tracked_login(password: &str) -> AttributeBag {
        login(password)
            .with("default_database", "master")
            .with("id", "app")
    }

    fn role(name: &str) -> AttributeBag {
        AttributeBag::new().with("database", "app").with("name", name)
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(parse_target("login"), ("login", None));
        assert_eq!(parse_target("login.app"), ("login", Some("app")));
        assert_eq!(parse_target("role.a.b"), ("role", Some("a.b")));
    }

    #[test]
    fn test_build_actions() {
        let declared = BTreeMap::from([
            (Address::new(ResourceKind::Login, "app"), login("new")),
            (Address::new(ResourceKind::Role, "readers"), role("readers")),
            (Address::new(ResourceKind::Role, "writers"), role("writers2")),
            (
                Address::new(ResourceKind::Database, "app"),
                AttributeBag::new().with("name", "app"),
            ),
        ]);
        let tracked = BTreeMap::from([
            (Address::new(ResourceKind::Login, "app"), tracked_login("old")),
            (Address::new(ResourceKind::Role, "readers"), role("readers")),
            (Address::new(ResourceKind::Role, "writers"), role("writers")),
            (Address::new(ResourceKind::User, "gone"), role("gone")),
        ]);

        let (plan, diagnostics) = ExecutionPlan::build(&declared, &tracked);
        assert!(diagnostics.is_empty());

        let action = |kind, label: &str| {
            plan.changes
                .iter()
                .find(|c| c.address == Address::new(kind, label))
                .map(|c| c.action)
        };
        assert_eq!(action(ResourceKind::Login, "app"), Some(Action::Update));
        assert_eq!(action(ResourceKind::Role, "readers"), Some(Action::NoChange));
        assert_eq!(action(ResourceKind::Role, "writers"), Some(Action::Replace));
        assert_eq!(action(ResourceKind::Database, "app"), Some(Action::Create));
        assert_eq!(action(ResourceKind::User, "gone"), Some(Action::Delete));
        assert_eq!(plan.pending(), 4);
    }

    #[test]
    fn test_invalid_resource_is_reported_not_planned() {
        let declared = BTreeMap::from([(
            Address::new(ResourceKind::Login, "broken"),
            AttributeBag::new().with("name", "broken"),
        )]);

        let (plan, diagnostics) = ExecutionPlan::build(&declared, &BTreeMap::new());
        assert!(plan.is_empty());
        assert!(diagnostics.has_error());
        assert!(
            diagnostics
                .iter()
                .all(|d| d.identifier.as_deref() == Some("login.broken"))
        );
    }

    #[test]
    fn test_stages_delete_in_reverse_then_create_in_order() {
        let tracked = BTreeMap::from([
            (Address::new(ResourceKind::Login, "old"), tracked_login("x")),
            (Address::new(ResourceKind::Role, "old"), role("old")),
        ]);
        let mut plan = ExecutionPlan::destroy(&tracked);
        plan.changes.push(PlannedChange {
            address: Address::new(ResourceKind::RoleAssignment, "new"),
            action: Action::Create,
            desired: Some(AttributeBag::new()),
            observed: None,
            diff: None,
        });
        plan.changes.push(PlannedChange {
            address: Address::new(ResourceKind::Database, "new"),
            action: Action::Create,
            desired: Some(AttributeBag::new()),
            observed: None,
            diff: None,
        });

        let order: Vec<(ResourceKind, bool)> =
            plan.stages().iter().map(|s| (s.kind, s.deleting)).collect();
        assert_eq!(
            order,
            [
                (ResourceKind::Role, true),
                (ResourceKind::Login, true),
                (ResourceKind::Database, false),
                (ResourceKind::RoleAssignment, false),
            ]
        );
    }

    #[test]
    fn test_filter_by_target() {
        let tracked = BTreeMap::from([
            (Address::new(ResourceKind::Role, "a"), role("a")),
            (Address::new(ResourceKind::Role, "b"), role("b")),
            (Address::new(ResourceKind::Login, "a"), tracked_login("x")),
        ]);
        let plan = ExecutionPlan::destroy(&tracked);
        assert_eq!(plan.changes.len(), 3);

        let roles = ExecutionPlan::destroy(&tracked).filter_by_target(Some("role"));
        assert_eq!(roles.changes.len(), 2);

        let one = ExecutionPlan::destroy(&tracked).filter_by_target(Some("role.b"));
        assert_eq!(one.changes.len(), 1);
        assert_eq!(one.changes[0].address.label, "b");
    }
}
