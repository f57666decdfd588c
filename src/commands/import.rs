use anyhow::Result;
use reconciler::{Address, Reconciler};

use super::Workspace;
use crate::Context;
use crate::cli::ImportArgs;
use crate::ui;

pub fn run(ctx: &Context, args: ImportArgs) -> Result<()> {
    let Some(address) = Address::parse(&args.address) else {
        anyhow::bail!(
            "Invalid address '{}': expected <kind>.<label> with kind one of database, login, user, role, role_assignment",
            args.address
        );
    };

    let workspace = Workspace::load_lenient(ctx)?;
    let mut state = workspace.load_state()?;
    if let Some(tracked) = state.get(&address) {
        anyhow::bail!("{address} is already tracked as '{}'", tracked.id);
    }

    let server = workspace.connect()?;
    let response = Reconciler::new(&server).import(address.kind, &args.identifier);
    ui::diagnostics(&response.diagnostics);
    let Some(observed) = response.state else {
        anyhow::bail!("Could not import {address} from '{}'", args.identifier);
    };

    log::info!("Imported {address} ({})", args.identifier);
    state.upsert(&address, observed);
    state.save(&workspace.state_path)?;

    ui::success(&format!("Imported {address}"));
    if !workspace.manifest.declared().contains_key(&address) {
        ui::warn(&format!(
            "{address} is not declared in the manifest; the next apply will delete it"
        ));
    }
    Ok(())
}
