mod archive;
mod download;
mod filesystem;
mod platform;
mod release;
mod replace;
mod transport;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

pub use archive::{ArchiveKind, ExtractTarget};
pub use filesystem::{FileSystem, StdFileSystem};
pub use platform::Platform;
pub use release::ReleaseMetadata;
pub use replace::{CleanupTasks, PendingUpdate, ReplaceStrategy, Replacer};
pub use transport::{HttpTransport, ReqwestTransport};

use crate::error::{Result, SecretManagerError};
use crate::options::Options;
use crate::version::VersionLabel;

/// Archive entries whose name contains this are the executable.
pub const PAYLOAD_NAME: &str = "secret_manager";

#[derive(Debug, Clone)]
pub struct UpdateSettings {
    pub release_url: String,
    pub user_agent: String,
    pub payload_name: String,
    pub staging_dir: PathBuf,
    pub show_progress: bool,
    pub cleanup_delay: Duration,
}

impl UpdateSettings {
    pub fn from_options(o: &Options) -> Self {
        Self {
            release_url: o.release_url.clone(),
            user_agent: o.user_agent.clone(),
            payload_name: PAYLOAD_NAME.to_string(),
            staging_dir: o.staging_dir(),
            show_progress: o.show_progress,
            cleanup_delay: o.cleanup_delay(),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum CheckOutcome {
    DevelopmentBuild,
    AlreadyLatest {
        version: VersionLabel,
    },
    Available {
        current: VersionLabel,
        latest: VersionLabel,
        release: ReleaseMetadata,
    },
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum UpdateOutcome {
    DevelopmentBuild,
    AlreadyLatest { version: VersionLabel },
    /// The executable on disk was replaced; the running process is still the old one.
    Updated { from: VersionLabel, to: VersionLabel },
}

/// Drives one check: fetch, compare, select, download, extract, replace.
pub struct Updater {
    settings: UpdateSettings,
    transport: Arc<dyn HttpTransport>,
    fs: Arc<dyn FileSystem>,
    platform: Platform,
    replacer: Replacer,
    current_version: VersionLabel,
    current_exe: PathBuf,
    cleanup: CleanupTasks,
}

impl Updater {
    pub fn new(
        settings: UpdateSettings,
        transport: Arc<dyn HttpTransport>,
        fs: Arc<dyn FileSystem>,
        current_exe: PathBuf,
    ) -> Self {
        let platform = Platform::current();
        let replacer = Replacer::new(
            Arc::clone(&fs),
            ReplaceStrategy::for_platform(&platform),
            settings.cleanup_delay,
        );
        Self {
            settings,
            transport,
            fs,
            platform,
            replacer,
            current_version: VersionLabel::parse(crate::version::VERSION),
            current_exe,
            cleanup: CleanupTasks::default(),
        }
    }

    /// Wires the real HTTP client and filesystem for the running executable.
    pub fn for_current_process(options: &Options) -> Result<Self> {
        let transport = ReqwestTransport::new(options.timeout())?;
        let current_exe = std::env::current_exe()?;
        Ok(Self::new(
            UpdateSettings::from_options(options),
            Arc::new(transport),
            Arc::new(StdFileSystem),
            current_exe,
        ))
    }

    /// Overrides the detected platform; the replace strategy follows it.
    #[cfg(test)]
    pub fn platform(mut self, platform: Platform) -> Self {
        self.replacer = Replacer::new(
            Arc::clone(&self.fs),
            ReplaceStrategy::for_platform(&platform),
            self.settings.cleanup_delay,
        );
        self.platform = platform;
        self
    }

    #[cfg(test)]
    pub fn current_version(mut self, version: &str) -> Self {
        self.current_version = VersionLabel::parse(version);
        self
    }

    pub fn strategy(&self) -> ReplaceStrategy {
        self.replacer.strategy()
    }

    /// Background cleanups started by completed installs.
    pub fn cleanup_tasks(&mut self) -> &mut CleanupTasks {
        &mut self.cleanup
    }

    pub fn check(&self) -> Result<CheckOutcome> {
        let release = release::fetch_latest(
            self.transport.as_ref(),
            &self.settings.release_url,
            &self.settings.user_agent,
        )
        .map_err(|e| SecretManagerError::CheckFailed(Box::new(e)))?;

        let latest = VersionLabel::parse(&release.tag);
        let current = self.current_version.clone();

        if current.is_development() {
            debug!(latest = %latest, "development build, not updating");
            return Ok(CheckOutcome::DevelopmentBuild);
        }

        if latest == current {
            debug!(version = %current, "already on latest release");
            return Ok(CheckOutcome::AlreadyLatest { version: current });
        }

        info!(current = %current, latest = %latest, "new version available");
        Ok(CheckOutcome::Available {
            current,
            latest,
            release,
        })
    }

    pub fn run(&mut self) -> Result<UpdateOutcome> {
        let (current, latest, release) = match self.check()? {
            CheckOutcome::DevelopmentBuild => return Ok(UpdateOutcome::DevelopmentBuild),
            CheckOutcome::AlreadyLatest { version } => {
                return Ok(UpdateOutcome::AlreadyLatest { version });
            }
            CheckOutcome::Available {
                current,
                latest,
                release,
            } => (current, latest, release),
        };

        self.install(&release)?;
        info!(from = %current, to = %latest, "update installed");
        Ok(UpdateOutcome::Updated {
            from: current,
            to: latest,
        })
    }

    fn install(&mut self, release: &ReleaseMetadata) -> Result<()> {
        let url = self.platform.select_asset(release).ok_or_else(|| {
            SecretManagerError::UnsupportedPlatform {
                os: self.platform.os.clone(),
                arch: self.platform.arch.clone(),
            }
        })?;
        info!(url, platform = %self.platform, "downloading update");

        let downloaded = download::download(
            self.transport.as_ref(),
            url,
            &self.settings.user_agent,
            &self.settings.staging_dir,
            self.settings.show_progress,
        )?;

        let kind = ArchiveKind::from_url(url);
        let target = ExtractTarget {
            payload_name: &self.settings.payload_name,
            out_dir: &self.settings.staging_dir,
            set_permissions: !self.platform.locks_running_executable(),
        };
        let payload = PendingUpdate::new(
            kind.extract(&downloaded, &target, self.fs.as_ref())?,
            Arc::clone(&self.fs),
        );

        // temp files are created owner-only; a raw payload needs its exec bits
        if kind == ArchiveKind::Raw && target.set_permissions {
            self.fs
                .set_executable(payload.path())
                .map_err(|source| SecretManagerError::Extraction {
                    archive: payload.path().to_path_buf(),
                    source,
                })?;
        }

        self.replacer
            .replace(&self.current_exe, payload, &mut self.cleanup)?;
        drop(downloaded);
        Ok(())
    }
}
