//! `buildsetup update`: re-materialize a build directory if it drifted.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use super::report;
use crate::GlobalArgs;

/// Arguments for `buildsetup update`.
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Build directory to update. Looked up like `status` when omitted.
    #[arg(long, value_name = "DIR")]
    pub setup_dir: Option<PathBuf>,
}

impl UpdateArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let orchestrator = super::orchestrator(global)?;
        let cwd = std::env::current_dir().context("cannot determine current directory")?;
        let build_dir = orchestrator
            .locate_build_dir(self.setup_dir.as_deref(), &cwd)
            .context("no build directory to update")?;

        let outcome = orchestrator
            .update(
                &build_dir,
                &mut |status| report::print_status(status, false),
                &mut |event| report::print_event(&event),
            )
            .with_context(|| format!("update failed for {}", build_dir.display()))?;
        if outcome.snapshot.is_some() {
            println!("Configuration in {} updated.", build_dir.display());
        }
        Ok(())
    }
}
