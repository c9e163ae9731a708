use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::debug;

use super::download::TEMP_PREFIX;
use super::filesystem::FileSystem;
use crate::error::{Result, SecretManagerError};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
    Raw,
}

/// Where and how an extracted payload is written.
#[derive(Debug, Clone)]
pub struct ExtractTarget<'a> {
    /// Entries whose name contains this are the payload.
    pub payload_name: &'a str,
    pub out_dir: &'a Path,
    /// Apply unix permission bits to the extracted file.
    pub set_permissions: bool,
}

impl ArchiveKind {
    pub fn from_url(url: &str) -> Self {
        if url.ends_with(".zip") {
            ArchiveKind::Zip
        } else if url.ends_with(".tar.gz") {
            ArchiveKind::TarGz
        } else {
            ArchiveKind::Raw
        }
    }

    /// Returns the path of the payload inside `archive`, extracting it into
    /// `target.out_dir` unless the download already is the payload.
    pub fn extract(
        self,
        archive: &Path,
        target: &ExtractTarget<'_>,
        fs: &dyn FileSystem,
    ) -> Result<PathBuf> {
        let extracted = match self {
            ArchiveKind::Raw => return Ok(archive.to_path_buf()),
            ArchiveKind::Zip => extract_zip(archive, target, fs),
            ArchiveKind::TarGz => extract_tar_gz(archive, target, fs),
        };

        match extracted {
            Ok(Some(path)) => {
                debug!(archive = %archive.display(), path = %path.display(), "payload extracted");
                Ok(path)
            }
            Ok(None) => Err(SecretManagerError::PayloadNotFound {
                archive: archive.to_path_buf(),
                payload: target.payload_name.to_string(),
            }),
            Err(source) => Err(SecretManagerError::Extraction {
                archive: archive.to_path_buf(),
                source,
            }),
        }
    }
}

fn extract_zip(
    archive: &Path,
    target: &ExtractTarget<'_>,
    fs: &dyn FileSystem,
) -> io::Result<Option<PathBuf>> {
    let mut zip = zip::ZipArchive::new(File::open(archive)?)?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        if !entry.is_file() {
            continue;
        }

        let name = entry.name().replace('\\', "/");
        if !name.contains(target.payload_name) {
            continue;
        }

        let Some(base) = base_name(&name) else {
            continue;
        };
        let mode = entry
            .unix_mode()
            .filter(|_| target.set_permissions)
            .map(|m| m & 0o7777);
        let out = write_entry(&mut entry, base, mode, target, fs)?;
        return Ok(Some(out));
    }

    Ok(None)
}

fn extract_tar_gz(
    archive: &Path,
    target: &ExtractTarget<'_>,
    fs: &dyn FileSystem,
) -> io::Result<Option<PathBuf>> {
    let mut tar = tar::Archive::new(GzDecoder::new(File::open(archive)?));

    for entry in tar.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let base = {
            let path = entry.path()?;
            match path.file_name().and_then(|n| n.to_str()) {
                Some(n) if n.contains(target.payload_name) => n.to_string(),
                _ => continue,
            }
        };

        let mode = target.set_permissions.then_some(0o755);
        let out = write_entry(&mut entry, &base, mode, target, fs)?;
        return Ok(Some(out));
    }

    Ok(None)
}

fn base_name(entry_name: &str) -> Option<&str> {
    entry_name
        .rsplit('/')
        .next()
        .filter(|n| !n.is_empty() && *n != "." && *n != "..")
}

/// Copies `entry` into a fresh file in the staging dir. The file is only kept
/// once its bytes and mode are in place; on error it is removed.
fn write_entry<R: Read>(
    entry: &mut R,
    base: &str,
    mode: Option<u32>,
    target: &ExtractTarget<'_>,
    fs: &dyn FileSystem,
) -> io::Result<PathBuf> {
    let mut tmp = tempfile::Builder::new()
        .prefix(&format!("{TEMP_PREFIX}{base}-"))
        .tempfile_in(target.out_dir)?;
    io::copy(entry, &mut tmp)?;
    tmp.as_file().sync_all()?;

    if let Some(mode) = mode {
        fs.set_mode(tmp.path(), mode)?;
    }

    tmp.into_temp_path().keep().map_err(|e| e.error)
}
