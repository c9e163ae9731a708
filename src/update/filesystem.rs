use std::io;
use std::path::Path;

/// The filesystem primitives the installer relies on.
pub trait FileSystem: Send + Sync {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Sets mode 0755 where permission bits exist; a no-op elsewhere.
    fn set_executable(&self, path: &Path) -> io::Result<()>;

    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StdFileSystem;

impl FileSystem for StdFileSystem {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn set_executable(&self, path: &Path) -> io::Result<()> {
        self.set_mode(path, 0o755)
    }

    #[cfg(unix)]
    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
    }

    #[cfg(not(unix))]
    fn set_mode(&self, _path: &Path, _mode: u32) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone, Eq, PartialEq)]
    pub enum Op {
        Rename(PathBuf, PathBuf),
        Remove(PathBuf),
        Chmod(PathBuf, u32),
    }

    /// Real filesystem that records every call and can be told to fail
    /// renames out of a given path.
    #[derive(Default)]
    pub struct RecordingFileSystem {
        ops: Mutex<Vec<Op>>,
        fail_rename_from: Mutex<Vec<PathBuf>>,
    }

    impl RecordingFileSystem {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_rename_from(self, path: impl Into<PathBuf>) -> Self {
            self.fail_rename_from.lock().unwrap().push(path.into());
            self
        }

        pub fn ops(&self) -> Vec<Op> {
            self.ops.lock().unwrap().clone()
        }
    }

    impl FileSystem for RecordingFileSystem {
        fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
            self.ops
                .lock()
                .unwrap()
                .push(Op::Rename(from.to_path_buf(), to.to_path_buf()));
            if self.fail_rename_from.lock().unwrap().iter().any(|p| p == from) {
                return Err(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    "rename refused",
                ));
            }
            StdFileSystem.rename(from, to)
        }

        fn remove_file(&self, path: &Path) -> io::Result<()> {
            self.ops.lock().unwrap().push(Op::Remove(path.to_path_buf()));
            StdFileSystem.remove_file(path)
        }

        fn set_executable(&self, path: &Path) -> io::Result<()> {
            self.set_mode(path, 0o755)
        }

        fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
            self.ops
                .lock()
                .unwrap()
                .push(Op::Chmod(path.to_path_buf(), mode));
            StdFileSystem.set_mode(path, mode)
        }
    }
}
