pub mod import;
pub mod lifecycle;
pub mod server_info;

use crate::Context;
use crate::config::Manifest;
use crate::paths;
use crate::server::TdsServer;
use crate::state::ConvergeState;
use crate::ui;
use anyhow::Result;
use std::path::PathBuf;

/// Manifest plus the state file that goes with it
pub struct Workspace {
    pub manifest: Manifest,
    pub state_path: PathBuf,
}

impl Workspace {
    /// Load and validate the manifest; every problem is printed before failing
    pub fn load(ctx: &Context) -> Result<Self> {
        let manifest_path = paths::manifest_path(ctx.config.as_deref())?;
        let manifest = Manifest::load(&manifest_path)?;

        let problems = manifest.validate();
        if !problems.is_empty() {
            for problem in &problems {
                ui::error(problem);
            }
            anyhow::bail!(
                "{} has {} problem(s)",
                manifest_path.display(),
                problems.len()
            );
        }

        Ok(Self {
            state_path: paths::state_path(ctx.state.as_deref(), &manifest_path),
            manifest,
        })
    }

    /// Like [`Workspace::load`], but a missing manifest leaves connection
    /// settings to the environment
    pub fn load_lenient(ctx: &Context) -> Result<Self> {
        match paths::manifest_path(ctx.config.as_deref()) {
            Ok(_) => Self::load(ctx),
            Err(err) => {
                log::debug!("No manifest, using environment only: {err:#}");
                Ok(Self {
                    manifest: Manifest::default(),
                    state_path: paths::state_path(
                        ctx.state.as_deref(),
                        &PathBuf::from(paths::MANIFEST_FILE),
                    ),
                })
            }
        }
    }

    pub fn connect(&self) -> Result<TdsServer> {
        let settings = self.manifest.server.resolve()?;
        log::debug!("Connection settings: {settings:?}");
        TdsServer::connect(&settings)
    }

    pub fn load_state(&self) -> Result<ConvergeState> {
        ConvergeState::load(&self.state_path)
    }
}
