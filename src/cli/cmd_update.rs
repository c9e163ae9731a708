use tracing::debug;

use crate::error::Result;
use crate::update::{UpdateOutcome, Updater};

pub fn run() -> Result<()> {
    let options = crate::options::load()?;
    let mut updater = Updater::for_current_process(&options)?;
    debug!(strategy = ?updater.strategy(), "updater ready");

    println!("checking for updates...");
    match updater.run()? {
        UpdateOutcome::DevelopmentBuild => {
            println!("running a development build, skipping update");
        }
        UpdateOutcome::AlreadyLatest { version } => {
            println!("already running the latest version ({version})");
        }
        UpdateOutcome::Updated { from, to } => {
            println!("updated: v{from} -> v{to}");
            println!("restart secret_manager to use the new version");
        }
    }

    let cleanup = updater.cleanup_tasks();
    if !cleanup.is_empty() {
        debug!(pending = cleanup.len(), "backup removal continues in background");
    }
    Ok(())
}
