//! buildsetup: keep build directories in sync with a registry of config
//! documents.
//!
//! # Usage
//!
//! ```text
//! buildsetup list
//! buildsetup init <identifier | path/to/file.conf.json>
//! buildsetup status [--setup-dir <dir>]
//! buildsetup update [--setup-dir <dir>]
//! buildsetup reset-settings
//! buildsetup change-setting <section> <key> <value>
//! buildsetup show-settings
//! ```
//!
//! Global flags: `--top-dir <dir>`, `--profile <name>`, `-v`/`-vv`.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use buildsetup_core::settings::DEFAULT_PROFILE;
use commands::{
    init::InitArgs,
    list::ListArgs,
    settings::{ChangeSettingArgs, ResetSettingsArgs, ShowSettingsArgs},
    status::StatusArgs,
    update::UpdateArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "buildsetup",
    version,
    about = "Set up and update build directories from a registry of configurations",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Flags accepted by every subcommand.
#[derive(clap::Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Directory holding build directories and the settings file.
    #[arg(long, global = true, value_name = "DIR")]
    pub top_dir: Option<PathBuf>,

    /// Settings section to use.
    #[arg(long, global = true, default_value = DEFAULT_PROFILE)]
    pub profile: String,

    /// More log output (-v info, -vv debug).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the configurations available in the registry.
    List(ListArgs),

    /// Create a build directory from a configuration.
    Init(InitArgs),

    /// Show whether a build directory is behind its configuration.
    Status(StatusArgs),

    /// Bring a build directory up to date with its configuration.
    Update(UpdateArgs),

    /// Write default settings for the active profile.
    ResetSettings(ResetSettingsArgs),

    /// Change one setting.
    ChangeSetting(ChangeSettingArgs),

    /// Show the effective settings.
    ShowSettings(ShowSettingsArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    let global = cli.global;
    match cli.command {
        Commands::List(args) => args.run(&global),
        Commands::Init(args) => args.run(&global),
        Commands::Status(args) => args.run(&global),
        Commands::Update(args) => args.run(&global),
        Commands::ResetSettings(args) => args.run(&global),
        Commands::ChangeSetting(args) => args.run(&global),
        Commands::ShowSettings(args) => args.run(&global),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}
