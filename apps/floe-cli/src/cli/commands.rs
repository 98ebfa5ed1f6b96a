use std::path::PathBuf;

use clap::{Args, Subcommand};

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show the changes required to converge the warehouse to the declared state
    Plan(ProjectArgs),

    /// Compute the plan and execute its statements against the warehouse
    Apply(ProjectArgs),

    /// Check every declared resource against the warehouse and report all mismatches
    Verify(ProjectArgs),
}

#[derive(Debug, Args)]
pub struct ProjectArgs {
    /// Path to the project file (defaults to ./floe.toml)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Emit machine-readable JSON instead of tables
    #[arg(long)]
    pub json: bool,
}
