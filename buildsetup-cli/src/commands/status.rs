//! `buildsetup status`: compare a build directory with its configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use super::report;
use crate::GlobalArgs;

/// Arguments for `buildsetup status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Build directory to check. Defaults to the one `$BBPATH` points into,
    /// then the one containing the current directory.
    #[arg(long, value_name = "DIR")]
    pub setup_dir: Option<PathBuf>,
}

impl StatusArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let orchestrator = super::orchestrator(global)?;
        let cwd = std::env::current_dir().context("cannot determine current directory")?;
        let build_dir = orchestrator
            .locate_build_dir(self.setup_dir.as_deref(), &cwd)
            .context("no build directory to check")?;

        let status = orchestrator
            .status(&build_dir)
            .with_context(|| format!("status failed for {}", build_dir.display()))?;
        report::print_status(&status, true);
        Ok(())
    }
}
