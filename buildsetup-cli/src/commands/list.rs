//! `buildsetup list`: configurations available in the registry.

use anyhow::{Context, Result};
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use crate::GlobalArgs;

/// Arguments for `buildsetup list`.
#[derive(Args, Debug)]
pub struct ListArgs {}

#[derive(Tabled)]
struct ListRow {
    #[tabled(rename = "configuration")]
    identifier: String,
    #[tabled(rename = "description")]
    description: String,
}

impl ListArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let orchestrator = super::orchestrator(global)?;
        let entries = orchestrator
            .list()
            .context("failed to read the configuration registry")?;

        if entries.is_empty() {
            let registry = orchestrator.settings().registry().unwrap_or_default();
            println!("No configurations found in {registry}.");
            return Ok(());
        }

        let rows: Vec<ListRow> = entries
            .into_iter()
            .map(|e| ListRow {
                identifier: e.identifier.0,
                description: e.description,
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}
