mod args;
mod cmd_check;
mod cmd_update;

pub use args::Cli;

use clap::CommandFactory;

use crate::error::Result;

pub fn run(cli: &Cli) -> Result<()> {
    if cli.version {
        println!("{}", crate::version::long_version());
        return Ok(());
    }

    if cli.update {
        return cmd_update::run();
    }

    if cli.check {
        return cmd_check::run();
    }

    Cli::command().print_help()?;
    Ok(())
}
