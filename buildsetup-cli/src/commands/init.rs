//! `buildsetup init <identifier | file.conf.json>`

use anyhow::{Context, Result};
use clap::Args;

use buildsetup_sync::materialize::TARGETS_SCRIPT;

use super::report;
use crate::GlobalArgs;

/// Create a build directory from a registry configuration.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Registry identifier (see `buildsetup list`) or a path to a local
    /// `*.conf.json` file.
    pub config: String,
}

impl InitArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let orchestrator = super::orchestrator(global)?;
        let result = orchestrator
            .init(&self.config, &mut |event| report::print_event(&event))
            .with_context(|| format!("failed to initialize '{}'", self.config))?;

        println!("Build directory {} initialized.", result.build_dir.display());
        for name in &result.configurations {
            println!(
                "  {name}: {}",
                result
                    .build_dir
                    .join(name.build_dir_name())
                    .join(TARGETS_SCRIPT)
                    .display()
            );
        }
        Ok(())
    }
}
