//! plan / apply / refresh / destroy

use anyhow::Result;
use reconciler::{
    AutoConfirm, Diagnostic, Diagnostics, ExecuteOptions, ExecuteReport, ExecutionPlan,
    Reconciler, ServerHandle,
};

use super::Workspace;
use crate::Context;
use crate::cli::{ApplyArgs, DestroyArgs, PlanArgs};
use crate::engine::{self, PromptConfirm, TerminalProgress};
use crate::state::ConvergeState;
use crate::ui;

pub fn plan(ctx: &Context, args: PlanArgs) -> Result<()> {
    let workspace = Workspace::load(ctx)?;
    let server = workspace.connect()?;
    let mut state = workspace.load_state()?;

    let mut diagnostics = refresh_state(&server, &mut state);
    let (plan, planning) = ExecutionPlan::build(&workspace.manifest.declared(), &state.tracked());
    diagnostics.extend(planning);
    let plan = plan.filter_by_target(args.target.as_deref());

    if args.json {
        println!("{}", engine::plan_json(&plan)?);
        return Ok(());
    }

    engine::display_diagnostics(&diagnostics);
    engine::display_plan(&plan);
    Ok(())
}

pub fn apply(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let workspace = Workspace::load(ctx)?;
    let server = workspace.connect()?;
    let mut state = workspace.load_state()?;

    let mut diagnostics = refresh_state(&server, &mut state);
    let (plan, planning) = ExecutionPlan::build(&workspace.manifest.declared(), &state.tracked());
    diagnostics.extend(planning);
    let plan = plan.filter_by_target(args.target.as_deref());

    engine::display_diagnostics(&diagnostics);
    engine::display_plan(&plan);

    let opts = ExecuteOptions {
        dry_run: args.dry_run,
        jobs: args.jobs,
    };
    run(ctx, &workspace, &server, &mut state, &plan, &opts, args.yes)
}

pub fn refresh(ctx: &Context) -> Result<()> {
    let workspace = Workspace::load(ctx)?;
    let server = workspace.connect()?;
    let mut state = workspace.load_state()?;

    let before = state.resources.len();
    let diagnostics = refresh_state(&server, &mut state);
    let dropped = before - state.resources.len();
    state.save(&workspace.state_path)?;

    engine::display_diagnostics(&diagnostics);
    if dropped == 0 {
        ui::success(&format!("{} tracked resource(s) up to date", state.resources.len()));
    } else {
        ui::warn(&format!("Dropped {dropped} resource(s) that no longer exist"));
    }
    Ok(())
}

pub fn destroy(ctx: &Context, args: DestroyArgs) -> Result<()> {
    let workspace = Workspace::load_lenient(ctx)?;
    let mut state = workspace.load_state()?;

    let plan = ExecutionPlan::destroy(&state.tracked()).filter_by_target(args.target.as_deref());
    if plan.is_empty() {
        ui::info("Nothing to destroy");
        return Ok(());
    }
    engine::display_plan(&plan);

    let server = workspace.connect()?;
    run(
        ctx,
        &workspace,
        &server,
        &mut state,
        &plan,
        &ExecuteOptions::default(),
        args.yes,
    )
}

/// Execute a plan, record the outcomes in state and report
fn run(
    ctx: &Context,
    workspace: &Workspace,
    server: &dyn ServerHandle,
    state: &mut ConvergeState,
    plan: &ExecutionPlan,
    opts: &ExecuteOptions,
    yes: bool,
) -> Result<()> {
    if !plan.has_changes() {
        return Ok(());
    }
    if opts.dry_run {
        println!();
        ui::info("Dry run - no changes made");
        return Ok(());
    }

    let mut progress = TerminalProgress::new(ctx.quiet);
    let report = if yes {
        reconciler::execute(plan, server, opts, &mut progress, &mut AutoConfirm)?
    } else {
        reconciler::execute(plan, server, opts, &mut progress, &mut PromptConfirm)?
    };

    record(state, &report);
    state.save(&workspace.state_path)?;

    let diagnostics: Vec<&Diagnostic> = report
        .outcomes
        .iter()
        .flat_map(|o| o.diagnostics.iter())
        .collect();
    if !diagnostics.is_empty() {
        println!();
        ui::diagnostics(diagnostics);
    }
    engine::print_summary(&report.summary);

    if !report.summary.is_success() {
        anyhow::bail!("{} resource(s) failed", report.summary.failed);
    }
    Ok(())
}

fn record(state: &mut ConvergeState, report: &ExecuteReport) {
    for outcome in &report.outcomes {
        state.apply_outcome(outcome);
    }
}

/// Re-read every tracked resource
///
/// Vanished objects are dropped; a failed read keeps the tracked entry.
fn refresh_state(server: &dyn ServerHandle, state: &mut ConvergeState) -> Diagnostics {
    let reconciler = Reconciler::new(server);
    let mut diagnostics = Diagnostics::new();

    for (address, observed) in state.tracked() {
        let response = reconciler.read(address.kind, &observed);
        if response.is_absent() {
            log::warn!("{address} no longer exists on the server, dropping it from state");
            state.remove(&address);
        } else if let Some(refreshed) = response.state {
            if refreshed != observed {
                log::info!("{address} drifted since the last apply");
            }
            state.upsert(&address, refreshed);
        }
        diagnostics.extend(response.diagnostics.into_iter().map(|d| {
            if d.identifier.is_some() {
                d
            } else {
                d.for_identifier(address.to_string())
            }
        }));
    }

    diagnostics
}
