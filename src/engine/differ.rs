//! Plan display - groups planned changes by kind, masks secrets

use colored::Colorize;
use reconciler::{
    Action, AttrValue, AttributeBag, Change, Diagnostics, ExecuteSummary, ExecutionPlan,
    PlannedChange, ResourceKind, describe,
};

const MASK: &str = "(sensitive)";

fn heading(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Login => "Logins",
        ResourceKind::Database => "Databases",
        ResourceKind::User => "Users",
        ResourceKind::Role => "Roles",
        ResourceKind::RoleAssignment => "Role assignments",
        ResourceKind::ServerInfo => "Server",
    }
}

fn symbol(action: Action) -> colored::ColoredString {
    match action {
        Action::Create => action.symbol().green(),
        Action::Update => action.symbol().yellow(),
        Action::Replace => action.symbol().magenta(),
        Action::Delete => action.symbol().red(),
        Action::NoChange => action.symbol().dimmed(),
    }
}

fn show(value: Option<&AttrValue>, sensitive: bool) -> String {
    match value {
        None => "(unset)".to_string(),
        Some(_) if sensitive => MASK.to_string(),
        Some(v) => v.to_string(),
    }
}

/// Copy of a bag with sensitive attributes masked
fn mask_bag(kind: ResourceKind, bag: &AttributeBag) -> AttributeBag {
    let descriptor = describe(kind);
    bag.iter()
        .map(|(name, value)| {
            if descriptor.is_sensitive(name) {
                (name.clone(), AttrValue::from(MASK))
            } else {
                (name.clone(), value.clone())
            }
        })
        .collect()
}

/// Copy of a planned change that is safe to print or serialize
pub fn redact(change: &PlannedChange) -> PlannedChange {
    let kind = change.kind();
    let mut redacted = change.clone();
    redacted.desired = change.desired.as_ref().map(|b| mask_bag(kind, b));
    redacted.observed = change.observed.as_ref().map(|b| mask_bag(kind, b));
    if let Some(diff) = &mut redacted.diff {
        for attr in diff.changes.iter_mut().filter(|c| c.sensitive) {
            attr.from = attr.from.as_ref().map(|_| AttrValue::from(MASK));
            attr.to = attr.to.as_ref().map(|_| AttrValue::from(MASK));
        }
    }
    redacted
}

/// Plan as JSON, with secrets masked
pub fn plan_json(plan: &ExecutionPlan) -> serde_json::Result<String> {
    let redacted = ExecutionPlan {
        changes: plan.changes.iter().map(redact).collect(),
    };
    serde_json::to_string_pretty(&redacted)
}

/// Display a plan in a user-friendly format
pub fn display_plan(plan: &ExecutionPlan) {
    if !plan.has_changes() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Execution Plan".bold()
    );
    println!("│");

    for kind in ResourceKind::MANAGED {
        let changes: Vec<_> = plan
            .changes
            .iter()
            .filter(|c| c.kind() == kind && c.action.is_change())
            .collect();
        if changes.is_empty() {
            continue;
        }

        println!("│ {}", heading(kind).bold());
        for change in changes {
            display_change(change);
        }
        println!("│");
    }

    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Plan: {} to create, {} to update, {} to replace, {} to delete",
        plan.count(Action::Create).to_string().green(),
        plan.count(Action::Update).to_string().yellow(),
        plan.count(Action::Replace).to_string().magenta(),
        plan.count(Action::Delete).to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

fn display_change(change: &PlannedChange) {
    let kind = change.kind();
    let descriptor = describe(kind);
    let id = change
        .observed
        .as_ref()
        .and_then(|b| b.get_str(reconciler::descriptor::ID))
        .map(|id| format!("({id})"))
        .unwrap_or_default();

    println!(
        "│   {} {:<30} {}",
        symbol(change.action),
        change.address.to_string(),
        id.dimmed()
    );

    match change.action {
        Action::Create => {
            if let Some(desired) = &change.desired {
                for (name, value) in desired.iter() {
                    let value = show(Some(value), descriptor.is_sensitive(name));
                    println!("│       {} = {}", name, value.dimmed());
                }
            }
        }
        Action::Update | Action::Replace => {
            let Some(diff) = &change.diff else { return };
            for attr in &diff.changes {
                let note = match attr.change {
                    Change::Replace => " (forces replacement)".red().to_string(),
                    Change::Rename => " (rename)".dimmed().to_string(),
                    Change::InPlace => String::new(),
                };
                println!(
                    "│       {}: {} → {}{}",
                    attr.attribute,
                    show(attr.from.as_ref(), attr.sensitive).dimmed(),
                    show(attr.to.as_ref(), attr.sensitive),
                    note
                );
            }
        }
        Action::Delete | Action::NoChange => {}
    }
}

/// Display validation and planning diagnostics
pub fn display_diagnostics(diagnostics: &Diagnostics) {
    if diagnostics.is_empty() {
        return;
    }
    println!();
    crate::ui::diagnostics(diagnostics);
}

/// Print execution summary
pub fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        println!(
            "  {} {} created, {} updated, {} replaced, {} deleted",
            "✓".green(),
            summary.created,
            summary.modified,
            summary.replaced,
            summary.removed
        );
    } else {
        println!(
            "  {} {} succeeded, {} failed",
            "⚠".yellow(),
            summary.total_changes(),
            summary.failed.to_string().red()
        );
    }
    if summary.skipped > 0 {
        println!("  {} {} skipped", "⊘".dimmed(), summary.skipped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconciler::Address;
    use std::collections::BTreeMap;

    fn login(password: &str) -> AttributeBag {
        AttributeBag::new()
            .with("name", "app")
            .with("type", "sql")
            .with("password", password)
    }

    #[test]
    fn test_json_masks_passwords() {
        let address = Address::new(ResourceKind::Login, "app");
        let declared = BTreeMap::from([(address.clone(), login("n3w-secret"))]);
        let tracked = BTreeMap::from([(
            address,
            login("old-secret")
                .with("default_database", "master")
                .with("id", "app"),
        )]);

        let (plan, _) = ExecutionPlan::build(&declared, &tracked);
        assert_eq!(plan.count(Action::Update), 1);

        let json = plan_json(&plan).unwrap();
        assert!(!json.contains("n3w-secret"));
        assert!(!json.contains("old-secret"));
        assert!(json.contains(MASK));
        assert!(json.contains("\"update\""));
    }

    #[test]
    fn test_redact_keeps_plain_attributes() {
        let change = PlannedChange {
            address: Address::new(ResourceKind::Login, "app"),
            action: Action::Create,
            desired: Some(login("pw")),
            observed: None,
            diff: None,
        };
        let redacted = redact(&change);
        let desired = redacted.desired.unwrap();
        assert_eq!(desired.get_str("name"), Some("app"));
        assert_eq!(desired.get_str("password"), Some(MASK));
    }

    #[test]
    fn test_show() {
        assert_eq!(show(None, true), "(unset)");
        assert_eq!(show(Some(&AttrValue::Int(150)), false), "150");
        assert_eq!(show(Some(&AttrValue::from("x")), true), MASK);
    }
}
