use anyhow::Result;
use reconciler::Reconciler;

use super::Workspace;
use crate::Context;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let workspace = Workspace::load_lenient(ctx)?;
    let server = workspace.connect()?;

    let response = Reconciler::new(&server).server_info();
    ui::diagnostics(&response.diagnostics);
    let Some(info) = response.state else {
        anyhow::bail!("Could not read server information");
    };

    if ctx.quiet {
        println!("{}", info.get_str("version").unwrap_or_default());
        return Ok(());
    }

    ui::header("SQL Server");
    for (name, value) in info.iter() {
        ui::kv(name, &value.to_string());
    }
    Ok(())
}
