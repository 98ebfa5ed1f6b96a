mod cli;
pub mod core;
pub mod infrastructure;
pub mod project;
pub mod utilities;

use std::process::ExitCode;

use clap::Parser;

use cli::display::show_message;

// Entry point for the CLI application
fn main() -> ExitCode {
    let cli_result = cli::Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create Tokio runtime");

    let result = runtime.block_on(async {
        cli::logger::setup_logging(cli_result.debug);
        cli::top_command_handler(&cli_result.command).await
    });

    match result {
        Ok(success) => {
            show_message!(success.message_type, success.message);
            ExitCode::from(0)
        }
        Err(failure) => {
            show_message!(failure.message_type, failure.message);
            if let Some(err) = failure.error {
                eprintln!("{err:?}");
            }
            ExitCode::from(1)
        }
    }
}
