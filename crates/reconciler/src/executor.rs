//! Execution engine - applies a plan stage by stage with bounded parallelism

use crate::context::{ConfirmCallback, ProgressCallback};
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::planner::{Action, ExecutionPlan, PlannedChange};
use crate::reconciler::{Reconciler, Response};
use crate::server::ServerHandle;
use crate::types::{Address, ApplyResult, AttributeBag, ExecuteOptions, ExecuteSummary};
use rayon::prelude::*;

/// What the caller should do with the tracked entry of a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    /// Leave the entry as it was
    Keep,
    /// Store these observed attributes
    Upsert(AttributeBag),
    /// Forget the resource
    Remove,
}

/// Result of applying one planned change
#[derive(Debug, Clone)]
pub struct Outcome {
    pub address: Address,
    pub action: Action,
    pub result: ApplyResult,
    pub state: StateChange,
    pub diagnostics: Diagnostics,
}

/// Summary plus per-resource outcomes, in execution order
#[derive(Debug, Default)]
pub struct ExecuteReport {
    pub summary: ExecuteSummary,
    pub outcomes: Vec<Outcome>,
}

impl ExecuteReport {
    fn record(&mut self, outcome: Outcome) {
        self.summary.add_result(&outcome.result);
        self.outcomes.push(outcome);
    }
}

/// Execute a plan with the given options and callbacks
///
/// # Arguments
/// * `plan` - The execution plan to run
/// * `server` - Handle every lifecycle call runs against
/// * `opts` - Execution options (dry_run, jobs)
/// * `progress` - Progress callback
/// * `confirm` - Confirmation callback
///
/// # Returns
/// Summary and outcomes. Per-resource failures are outcomes, not errors;
/// only a failed prompt or worker pool aborts the run.
pub fn execute<P, C>(
    plan: &ExecutionPlan,
    server: &dyn ServerHandle,
    opts: &ExecuteOptions,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ExecuteReport>
where
    P: ProgressCallback,
    C: ConfirmCallback,
{
    let pending = plan.pending();
    if pending == 0 {
        return Ok(ExecuteReport::default());
    }

    if opts.dry_run {
        return Ok(skip_all(plan, "dry run"));
    }

    let noun = if pending == 1 { "change" } else { "changes" };
    if !confirm.confirm(&format!("Apply {pending} {noun}?"))? {
        return Ok(skip_all(plan, "declined"));
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs.max(1))
        .build()
        .map_err(|e| Error::WorkerPool(e.to_string()))?;
    let reconciler = Reconciler::new(server);
    let mut report = ExecuteReport::default();

    for stage in plan.stages() {
        progress.on_stage_start(stage.kind, stage.changes.len(), stage.deleting);

        if opts.jobs <= 1 || stage.changes.len() == 1 {
            for change in &stage.changes {
                progress.on_change_start(&change.address, change.action);
                let outcome = apply_change(&reconciler, change);
                progress.on_change_complete(&outcome.address, &outcome.result);
                report.record(outcome);
            }
        } else {
            // Progress callbacks are not thread-safe; report once the stage is done
            let outcomes: Vec<Outcome> = pool.install(|| {
                stage
                    .changes
                    .par_iter()
                    .map(|change| apply_change(&reconciler, change))
                    .collect()
            });
            for outcome in outcomes {
                progress.on_change_complete(&outcome.address, &outcome.result);
                report.record(outcome);
            }
        }

        progress.on_stage_complete();
    }

    Ok(report)
}

fn skip_all(plan: &ExecutionPlan, reason: &str) -> ExecuteReport {
    let mut report = ExecuteReport::default();
    for change in plan.changes.iter().filter(|c| c.action.is_change()) {
        report.record(Outcome {
            address: change.address.clone(),
            action: change.action,
            result: ApplyResult::Skipped {
                reason: reason.to_string(),
            },
            state: StateChange::Keep,
            diagnostics: Diagnostics::new(),
        });
    }
    report
}

/// Apply a single change
fn apply_change(reconciler: &Reconciler<'_>, change: &PlannedChange) -> Outcome {
    let kind = change.kind();
    let empty = AttributeBag::new();
    let desired = change.desired.as_ref().unwrap_or(&empty);
    let observed = change.observed.as_ref().unwrap_or(&empty);

    let (result, state, diagnostics) = match change.action {
        Action::NoChange => (ApplyResult::NoChange, StateChange::Keep, Diagnostics::new()),
        Action::Create => settle(
            reconciler.create(kind, desired),
            ApplyResult::Created,
            StateChange::Keep,
        ),
        Action::Update => settle(
            reconciler.update(kind, desired, observed),
            ApplyResult::Modified,
            StateChange::Keep,
        ),
        Action::Delete => {
            let diagnostics = reconciler.delete(kind, observed);
            if diagnostics.has_error() {
                (failure(&diagnostics), StateChange::Keep, diagnostics)
            } else {
                (ApplyResult::Removed, StateChange::Remove, diagnostics)
            }
        }
        Action::Replace => {
            let mut diagnostics = reconciler.delete(kind, observed);
            if diagnostics.has_error() {
                (failure(&diagnostics), StateChange::Keep, diagnostics)
            } else {
                // The old object is gone whatever happens next
                let (result, state, created) = settle(
                    reconciler.create(kind, desired),
                    ApplyResult::Replaced,
                    StateChange::Remove,
                );
                diagnostics.extend(created);
                (result, state, diagnostics)
            }
        }
    };

    if let ApplyResult::Failed { error } = &result {
        log::warn!("{}: {error}", change.address);
    }

    Outcome {
        address: change.address.clone(),
        action: change.action,
        result,
        state,
        diagnostics,
    }
}

/// Turn a lifecycle response into a result
///
/// A failed response that still carries a state records it anyway; without
/// one the state change falls back to `on_failure`.
fn settle(
    response: Response,
    on_success: ApplyResult,
    on_failure: StateChange,
) -> (ApplyResult, StateChange, Diagnostics) {
    let failed = response.diagnostics.has_error();
    match response.state {
        Some(state) if !failed => (on_success, StateChange::Upsert(state), response.diagnostics),
        Some(state) => (
            failure(&response.diagnostics),
            StateChange::Upsert(state),
            response.diagnostics,
        ),
        None => (failure(&response.diagnostics), on_failure, response.diagnostics),
    }
}

fn failure(diagnostics: &Diagnostics) -> ApplyResult {
    ApplyResult::Failed {
        error: diagnostics
            .errors()
            .next()
            .map_or_else(|| "unknown failure".to_string(), |d| d.detail.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AutoConfirm, AutoDecline, NoProgress};
    use crate::testing::RecordingServer;
    use crate::types::ResourceKind;

    fn create(kind: ResourceKind, label: &str, desired: AttributeBag) -> PlannedChange {
        PlannedChange {
            address: Address::new(kind, label),
            action: Action::Create,
            desired: Some(desired),
            observed: None,
            diff: None,
        }
    }

    fn role(name: &str) -> AttributeBag {
        AttributeBag::new().with("database", "app").with("name", name)
    }

    fn sample_plan() -> ExecutionPlan {
        ExecutionPlan {
            changes: vec![
                create(
                    ResourceKind::RoleAssignment,
                    "bob_readers",
                    AttributeBag::new()
                        .with("database", "app")
                        .with("role", "readers")
                        .with("member", "bob"),
                ),
                create(ResourceKind::Role, "readers", role("readers")),
                create(ResourceKind::Role, "writers", role("writers")),
                PlannedChange {
                    address: Address::new(ResourceKind::Role, "old"),
                    action: Action::Delete,
                    desired: None,
                    observed: Some(role("old")),
                    diff: None,
                },
            ],
        }
    }

    #[test]
    fn test_execute_empty_plan() {
        let server = RecordingServer::new();
        let report = execute(
            &ExecutionPlan::new(),
            &server,
            &ExecuteOptions::default(),
            &mut NoProgress,
            &mut AutoConfirm,
        )
        .unwrap();
        assert_eq!(report.summary.total(), 0);
    }

    #[test]
    fn test_execute_in_dependency_order() {
        let server = RecordingServer::new();
        let opts = ExecuteOptions {
            jobs: 1,
            ..Default::default()
        };
        let report =
            execute(&sample_plan(), &server, &opts, &mut NoProgress, &mut AutoConfirm).unwrap();

        assert!(report.summary.is_success());
        assert_eq!(report.summary.created, 3);
        assert_eq!(report.summary.removed, 1);

        let executed = server.executed();
        assert!(executed[0].ends_with("DROP ROLE [old];"));
        assert!(executed[3].ends_with("ALTER ROLE [readers] ADD MEMBER [bob];"));
        assert!(matches!(report.outcomes[0].state, StateChange::Remove));
        assert!(matches!(report.outcomes[3].state, StateChange::Upsert(_)));
    }

    #[test]
    fn test_parallel_stage_records_every_outcome() {
        let server = RecordingServer::new();
        let report = execute(
            &sample_plan(),
            &server,
            &ExecuteOptions::default(),
            &mut NoProgress,
            &mut AutoConfirm,
        )
        .unwrap();
        assert_eq!(report.outcomes.len(), 4);
        assert_eq!(server.executed().len(), 4);
    }

    #[test]
    fn test_failure_does_not_stop_other_resources() {
        let server = RecordingServer::new().fail_when("CREATE ROLE [readers]", "permission denied");
        let opts = ExecuteOptions {
            jobs: 1,
            ..Default::default()
        };
        let report =
            execute(&sample_plan(), &server, &opts, &mut NoProgress, &mut AutoConfirm).unwrap();

        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.created, 2);
        let failed = report
            .outcomes
            .iter()
            .find(|o| !o.result.is_success())
            .unwrap();
        assert_eq!(failed.address.label, "readers");
        assert_eq!(failed.state, StateChange::Keep);
        assert!(failed.diagnostics.has_error());
    }

    #[test]
    fn test_declined_skips_everything() {
        let server = RecordingServer::new();
        let report = execute(
            &sample_plan(),
            &server,
            &ExecuteOptions::default(),
            &mut NoProgress,
            &mut AutoDecline,
        )
        .unwrap();
        assert_eq!(report.summary.skipped, 4);
        assert!(server.executed().is_empty());
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let server = RecordingServer::new();
        let opts = ExecuteOptions {
            dry_run: true,
            ..Default::default()
        };
        let report =
            execute(&sample_plan(), &server, &opts, &mut NoProgress, &mut AutoDecline).unwrap();
        assert_eq!(report.summary.skipped, 4);
        assert!(server.executed().is_empty());
    }

    #[test]
    fn test_replace_deletes_then_creates() {
        let server = RecordingServer::new();
        let plan = ExecutionPlan {
            changes: vec![PlannedChange {
                address: Address::new(ResourceKind::Role, "writers"),
                action: Action::Replace,
                desired: Some(role("editors")),
                observed: Some(role("writers")),
                diff: None,
            }],
        };
        let report = execute(
            &plan,
            &server,
            &ExecuteOptions::default(),
            &mut NoProgress,
            &mut AutoConfirm,
        )
        .unwrap();

        assert_eq!(report.summary.replaced, 1);
        assert_eq!(
            server.executed(),
            [
                "USE [app];\nDROP ROLE [writers];",
                "USE [app];\nCREATE ROLE [editors];"
            ]
        );
        match &report.outcomes[0].state {
            StateChange::Upsert(bag) => assert_eq!(bag.get_str("id"), Some("app.editors")),
            other => panic!("unexpected state change: {other:?}"),
        }
    }

    #[test]
    fn test_alter_failure_after_rename_tracks_new_name() {
        let server = RecordingServer::new().fail_when("DEFAULT_DATABASE", "Cannot open database");
        let observed = AttributeBag::new()
            .with("name", "app")
            .with("type", "sql")
            .with("password", "x")
            .with("default_database", "master")
            .with("id", "app");
        let desired = observed
            .clone()
            .with("name", "app2")
            .with("default_database", "nope");
        let plan = ExecutionPlan {
            changes: vec![PlannedChange {
                address: Address::new(ResourceKind::Login, "app"),
                action: Action::Update,
                desired: Some(desired),
                observed: Some(observed),
                diff: None,
            }],
        };
        let report = execute(
            &plan,
            &server,
            &ExecuteOptions::default(),
            &mut NoProgress,
            &mut AutoConfirm,
        )
        .unwrap();

        assert_eq!(report.summary.failed, 1);
        assert!(report.outcomes[0].diagnostics.has_error());
        match &report.outcomes[0].state {
            StateChange::Upsert(bag) => {
                assert_eq!(bag.get_str("id"), Some("app2"));
                assert_eq!(bag.get_str("default_database"), Some("master"));
            }
            other => panic!("unexpected state change: {other:?}"),
        }
    }
}
