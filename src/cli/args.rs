use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "secret_manager",
    about = "secret_manager - keeps itself up to date from GitHub Releases",
    disable_version_flag = true
)]
pub struct Cli {
    /// print version, commit and build date
    #[arg(long)]
    pub version: bool,

    /// check GitHub Releases and install a newer secret_manager if there is one
    #[arg(long, conflicts_with = "check")]
    pub update: bool,

    /// report whether a newer release exists without installing it
    #[arg(long)]
    pub check: bool,

    /// log what the updater is doing to stderr
    #[arg(short, long)]
    pub verbose: bool,
}
