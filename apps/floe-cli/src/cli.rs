pub mod commands;
pub mod display;
pub mod logger;
pub mod routines;

use clap::Parser;

use commands::Commands;
use routines::{plan, verify, RoutineFailure, RoutineSuccess};

#[derive(Parser)]
#[command(author, version, about, long_about = None, arg_required_else_help(true))]
pub struct Cli {
    /// Turn debugging information on
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

pub async fn top_command_handler(command: &Commands) -> Result<RoutineSuccess, RoutineFailure> {
    match command {
        Commands::Plan(args) => plan::plan(args).await,
        Commands::Apply(args) => plan::apply(args).await,
        Commands::Verify(args) => verify::verify(args).await,
    }
}
