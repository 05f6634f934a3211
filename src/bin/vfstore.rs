//! vfstore CLI binary

use anyhow::Context;
use clap::Parser;
use std::process;
use vfstore::logging::init_logging;
use vfstore::tooling::cli::{Cli, CliContext};

fn run(cli: &Cli) -> anyhow::Result<String> {
    let context = CliContext::new(cli).context("Error loading configuration")?;
    init_logging(Some(&context.config().logging)).context("Error initializing logging")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Error starting runtime")?;
    let output = runtime.block_on(context.execute(&cli.command))?;
    Ok(output)
}

fn main() {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
