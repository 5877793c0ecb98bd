//! cli-harness - run command-line tools against isolated fixture projects
//!
//! Copies a fixture project into a temporary directory, runs the tool under
//! test against it and reports exit code and output, either ad hoc (`run`)
//! or from YAML scenarios (`test`).

use clap::Parser;
use cli_harness::commands::Commands;
use cli_harness::{cli, common::logging};

#[derive(Parser)]
#[command(name = "cli-harness", about = "Run CLI tools against isolated fixture projects")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    logging::init_cli();

    let cli = Cli::parse();

    match cli::dispatch(cli.command).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
