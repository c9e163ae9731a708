use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, warn};

use super::filesystem::FileSystem;
use super::platform::Platform;
use crate::error::{Result, SecretManagerError};

pub const BACKUP_SUFFIX: &str = ".old";

/// A fully extracted executable waiting to be installed.
///
/// Dropping it without installing removes the file.
pub struct PendingUpdate {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
    installed: bool,
}

impl PendingUpdate {
    pub fn new(path: PathBuf, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            path,
            fs,
            installed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mark_installed(mut self) {
        self.installed = true;
    }
}

impl Drop for PendingUpdate {
    fn drop(&mut self) {
        if self.installed {
            return;
        }
        match self.fs.remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed unused payload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => debug!(path = %self.path.display(), error = %e, "could not remove payload"),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ReplaceStrategy {
    /// Rename the payload straight over the running executable.
    InPlaceRename,
    /// Move the running executable aside first, then install.
    RenameDance,
}

impl ReplaceStrategy {
    pub fn for_platform(platform: &Platform) -> Self {
        if platform.locks_running_executable() {
            ReplaceStrategy::RenameDance
        } else {
            ReplaceStrategy::InPlaceRename
        }
    }
}

pub fn backup_path(current: &Path) -> PathBuf {
    let mut s = current.as_os_str().to_owned();
    s.push(BACKUP_SUFFIX);
    PathBuf::from(s)
}

pub struct Replacer {
    fs: Arc<dyn FileSystem>,
    strategy: ReplaceStrategy,
    cleanup_delay: Duration,
}

impl Replacer {
    pub fn new(fs: Arc<dyn FileSystem>, strategy: ReplaceStrategy, cleanup_delay: Duration) -> Self {
        Self {
            fs,
            strategy,
            cleanup_delay,
        }
    }

    pub fn strategy(&self) -> ReplaceStrategy {
        self.strategy
    }

    pub fn replace(
        &self,
        current: &Path,
        pending: PendingUpdate,
        cleanup: &mut CleanupTasks,
    ) -> Result<()> {
        debug!(
            strategy = ?self.strategy,
            current = %current.display(),
            new = %pending.path().display(),
            "replacing executable"
        );

        match self.strategy {
            ReplaceStrategy::InPlaceRename => {
                self.fs
                    .rename(pending.path(), current)
                    .map_err(|source| SecretManagerError::Install {
                        path: current.to_path_buf(),
                        stranded_at: None,
                        source,
                    })?;
            }
            ReplaceStrategy::RenameDance => {
                let tx = ReplaceTransaction::new(current, pending.path());
                tx.run(self.fs.as_ref())?;
                cleanup.schedule_removal(Arc::clone(&self.fs), tx.backup, self.cleanup_delay);
            }
        }

        pending.mark_installed();
        Ok(())
    }
}

/// One backup/install/rollback attempt for platforms that lock a running
/// executable. There is an executable at `current` at every step.
#[derive(Debug, Clone)]
struct ReplaceTransaction {
    current: PathBuf,
    backup: PathBuf,
    new: PathBuf,
}

impl ReplaceTransaction {
    fn new(current: &Path, new: &Path) -> Self {
        Self {
            current: current.to_path_buf(),
            backup: backup_path(current),
            new: new.to_path_buf(),
        }
    }

    fn run(&self, fs: &dyn FileSystem) -> Result<()> {
        if let Err(e) = fs.remove_file(&self.backup) {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!(path = %self.backup.display(), error = %e, "stale backup not removed");
            }
        }

        fs.rename(&self.current, &self.backup)
            .map_err(|source| SecretManagerError::Backup {
                path: self.current.clone(),
                backup: self.backup.clone(),
                source,
            })?;

        if let Err(source) = fs.rename(&self.new, &self.current) {
            let stranded_at = self.rollback(fs);
            return Err(SecretManagerError::Install {
                path: self.current.clone(),
                stranded_at,
                source,
            });
        }

        Ok(())
    }

    /// Puts the backup back; returns where the original ended up if that fails.
    fn rollback(&self, fs: &dyn FileSystem) -> Option<PathBuf> {
        match fs.rename(&self.backup, &self.current) {
            Ok(()) => None,
            Err(e) => {
                warn!(
                    backup = %self.backup.display(),
                    error = %e,
                    "could not restore previous executable"
                );
                Some(self.backup.clone())
            }
        }
    }
}

/// Background work spawned after a successful install.
///
/// Nothing on the update path waits on these.
#[derive(Debug, Default)]
pub struct CleanupTasks {
    handles: Vec<JoinHandle<()>>,
}

impl CleanupTasks {
    pub fn schedule_removal(&mut self, fs: Arc<dyn FileSystem>, path: PathBuf, delay: Duration) {
        debug!(path = %path.display(), ?delay, "scheduling backup removal");
        let handle = std::thread::spawn(move || {
            std::thread::sleep(delay);
            if let Err(e) = fs.remove_file(&path) {
                debug!(path = %path.display(), error = %e, "backup removal failed");
            }
        });
        self.handles.push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    #[cfg(test)]
    pub fn drain(&mut self) {
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::filesystem::StdFileSystem;
    use super::super::filesystem::fake::{Op, RecordingFileSystem};
    use super::*;

    struct Fixture {
        _dir: tempfile::TempDir,
        current: PathBuf,
        payload: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let current = dir.path().join("secret_manager.exe");
        let payload = dir.path().join("payload.exe");
        std::fs::write(&current, b"old build").unwrap();
        std::fs::write(&payload, b"new build").unwrap();
        Fixture {
            _dir: dir,
            current,
            payload,
        }
    }

    #[test]
    fn strategy_follows_platform() {
        assert_eq!(
            ReplaceStrategy::for_platform(&Platform::new("windows", "amd64")),
            ReplaceStrategy::RenameDance
        );
        assert_eq!(
            ReplaceStrategy::for_platform(&Platform::new("linux", "amd64")),
            ReplaceStrategy::InPlaceRename
        );
        assert_eq!(
            ReplaceStrategy::for_platform(&Platform::new("darwin", "arm64")),
            ReplaceStrategy::InPlaceRename
        );
    }

    #[test]
    fn backup_path_appends_suffix() {
        assert_eq!(
            backup_path(Path::new("/opt/secret_manager.exe")),
            PathBuf::from("/opt/secret_manager.exe.old")
        );
    }

    #[test]
    fn in_place_rename_is_a_single_rename() {
        let f = fixture();
        let fs = Arc::new(RecordingFileSystem::new());
        let replacer = Replacer::new(fs.clone(), ReplaceStrategy::InPlaceRename, Duration::ZERO);
        let mut cleanup = CleanupTasks::default();

        replacer
            .replace(&f.current, PendingUpdate::new(f.payload.clone(), fs.clone()), &mut cleanup)
            .unwrap();

        assert_eq!(fs.ops(), vec![Op::Rename(f.payload.clone(), f.current.clone())]);
        assert_eq!(std::fs::read(&f.current).unwrap(), b"new build");
        assert!(!f.payload.exists());
        assert!(cleanup.is_empty());
    }

    #[test]
    fn unused_payload_is_removed_through_the_filesystem() {
        let f = fixture();
        let fs = Arc::new(RecordingFileSystem::new());

        drop(PendingUpdate::new(f.payload.clone(), fs.clone()));

        assert_eq!(fs.ops(), vec![Op::Remove(f.payload.clone())]);
        assert!(!f.payload.exists());
    }

    #[test]
    fn in_place_rename_failure_leaves_original() {
        let f = fixture();
        let fs = Arc::new(RecordingFileSystem::new().fail_rename_from(f.payload.clone()));
        let replacer = Replacer::new(fs.clone(), ReplaceStrategy::InPlaceRename, Duration::ZERO);
        let mut cleanup = CleanupTasks::default();

        let err = replacer
            .replace(&f.current, PendingUpdate::new(f.payload.clone(), fs.clone()), &mut cleanup)
            .unwrap_err();

        assert!(matches!(err, SecretManagerError::Install { stranded_at: None, .. }));
        assert_eq!(std::fs::read(&f.current).unwrap(), b"old build");
        // the unused payload is cleaned up when dropped
        assert!(!f.payload.exists());
    }

    #[test]
    fn rename_dance_installs_and_schedules_backup_removal() {
        let f = fixture();
        let backup = backup_path(&f.current);
        std::fs::write(&backup, b"stale").unwrap();

        let fs = Arc::new(RecordingFileSystem::new());
        let replacer = Replacer::new(fs.clone(), ReplaceStrategy::RenameDance, Duration::ZERO);
        let mut cleanup = CleanupTasks::default();

        replacer
            .replace(&f.current, PendingUpdate::new(f.payload.clone(), fs.clone()), &mut cleanup)
            .unwrap();

        assert_eq!(std::fs::read(&f.current).unwrap(), b"new build");
        assert_eq!(cleanup.len(), 1);
        assert_eq!(
            fs.ops()[..3],
            [
                Op::Remove(backup.clone()),
                Op::Rename(f.current.clone(), backup.clone()),
                Op::Rename(f.payload.clone(), f.current.clone()),
            ]
        );

        cleanup.drain();
        assert!(cleanup.is_empty());
        assert!(!backup.exists());
        assert_eq!(fs.ops().last(), Some(&Op::Remove(backup)));
    }

    #[test]
    fn rename_dance_keeps_backup_until_delay_elapses() {
        let f = fixture();
        let fs = Arc::new(StdFileSystem);
        let replacer = Replacer::new(
            fs.clone(),
            ReplaceStrategy::RenameDance,
            Duration::from_secs(60),
        );
        let mut cleanup = CleanupTasks::default();

        replacer
            .replace(&f.current, PendingUpdate::new(f.payload.clone(), fs.clone()), &mut cleanup)
            .unwrap();

        let backup = backup_path(&f.current);
        assert_eq!(std::fs::read(&backup).unwrap(), b"old build");
        assert_eq!(std::fs::read(&f.current).unwrap(), b"new build");
        assert_eq!(cleanup.len(), 1);
    }

    #[test]
    fn rename_dance_backup_failure_changes_nothing() {
        let f = fixture();
        let fs = Arc::new(RecordingFileSystem::new().fail_rename_from(f.current.clone()));
        let replacer = Replacer::new(fs.clone(), ReplaceStrategy::RenameDance, Duration::ZERO);
        let mut cleanup = CleanupTasks::default();

        let err = replacer
            .replace(&f.current, PendingUpdate::new(f.payload.clone(), fs.clone()), &mut cleanup)
            .unwrap_err();

        assert!(matches!(err, SecretManagerError::Backup { .. }));
        assert_eq!(std::fs::read(&f.current).unwrap(), b"old build");
        assert!(!backup_path(&f.current).exists());
        assert!(cleanup.is_empty());
    }

    #[test]
    fn rename_dance_install_failure_restores_original() {
        let f = fixture();
        let fs = Arc::new(RecordingFileSystem::new().fail_rename_from(f.payload.clone()));
        let replacer = Replacer::new(fs.clone(), ReplaceStrategy::RenameDance, Duration::ZERO);
        let mut cleanup = CleanupTasks::default();

        let err = replacer
            .replace(&f.current, PendingUpdate::new(f.payload.clone(), fs.clone()), &mut cleanup)
            .unwrap_err();

        assert!(matches!(err, SecretManagerError::Install { stranded_at: None, .. }));
        assert_eq!(std::fs::read(&f.current).unwrap(), b"old build");
        assert!(!backup_path(&f.current).exists());
        assert!(cleanup.is_empty());
    }

    #[test]
    fn rename_dance_reports_stranded_backup_when_restore_fails() {
        let f = fixture();
        let backup = backup_path(&f.current);
        let fs = Arc::new(
            RecordingFileSystem::new()
                .fail_rename_from(f.payload.clone())
                .fail_rename_from(backup.clone()),
        );
        let replacer = Replacer::new(fs.clone(), ReplaceStrategy::RenameDance, Duration::ZERO);
        let mut cleanup = CleanupTasks::default();

        let err = replacer
            .replace(&f.current, PendingUpdate::new(f.payload.clone(), fs.clone()), &mut cleanup)
            .unwrap_err();

        match err {
            SecretManagerError::Install { stranded_at, .. } => {
                assert_eq!(stranded_at, Some(backup.clone()))
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(std::fs::read(&backup).unwrap(), b"old build");
    }
}
