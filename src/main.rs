mod cli;
mod error;
mod options;
mod paths;
mod update;
mod version;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> std::process::ExitCode {
    if let Err(err) = real_main() {
        eprintln!("{err}");
        return std::process::ExitCode::FAILURE;
    }

    std::process::ExitCode::SUCCESS
}

fn real_main() -> crate::error::Result<()> {
    let cli = crate::cli::Cli::parse();
    init_logging(cli.verbose);
    crate::cli::run(&cli)
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "warn,secret_manager=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .init();
}
