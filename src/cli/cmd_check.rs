use crate::error::Result;
use crate::update::{CheckOutcome, Updater};

pub fn run() -> Result<()> {
    let options = crate::options::load()?;
    let updater = Updater::for_current_process(&options)?;

    match updater.check()? {
        CheckOutcome::DevelopmentBuild => println!("running a development build"),
        CheckOutcome::AlreadyLatest { version } => println!("up to date ({version})"),
        CheckOutcome::Available {
            current,
            latest,
            release,
        } => {
            println!("update available: v{current} -> v{latest} ({})", release.name);
            println!("run `secret_manager --update` to install it");
        }
    }
    Ok(())
}
