use std::io::{Read, Write};
use std::path::Path;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tempfile::TempPath;
use tracing::debug;

use super::transport::HttpTransport;
use crate::error::{Result, SecretManagerError};

pub const TEMP_PREFIX: &str = "secret_manager_update_";

/// Streams `url` into a fresh temp file under `dir`.
///
/// The returned path deletes the file when dropped, unless it has been
/// renamed away first.
pub fn download(
    transport: &dyn HttpTransport,
    url: &str,
    user_agent: &str,
    dir: &Path,
    show_progress: bool,
) -> Result<TempPath> {
    let err = |source: crate::error::BoxError| SecretManagerError::Download {
        url: url.to_string(),
        source,
    };

    let mut resp = transport.get(url, user_agent).map_err(err)?;
    if !resp.is_success() {
        return Err(SecretManagerError::DownloadStatus {
            url: url.to_string(),
            status: resp.status,
        });
    }

    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)
        .map_err(|e| err(e.into()))?;
    debug!(url, path = %tmp.path().display(), "downloading asset");

    let pb = progress_bar(resp.content_length, show_progress);
    let mut buf = [0u8; 64 * 1024];
    loop {
        let read = resp.body.read(&mut buf).map_err(|e| err(e.into()))?;
        if read == 0 {
            break;
        }
        tmp.as_file_mut()
            .write_all(&buf[..read])
            .map_err(|e| err(e.into()))?;
        pb.inc(read as u64);
    }
    pb.finish_and_clear();

    tmp.as_file_mut().flush().map_err(|e| err(e.into()))?;
    tmp.as_file_mut().sync_all().map_err(|e| err(e.into()))?;

    debug!(bytes = pb.position(), "download complete");
    Ok(tmp.into_temp_path())
}

fn progress_bar(total: Option<u64>, show: bool) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }

    match total {
        Some(len) => {
            let pb = ProgressBar::new(len);
            pb.set_draw_target(ProgressDrawTarget::stderr());
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.green} downloading update {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
            ) {
                pb.set_style(style);
            }
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_draw_target(ProgressDrawTarget::stderr());
            if let Ok(style) =
                ProgressStyle::with_template("{spinner:.green} downloading update ({bytes} read)")
            {
                pb.set_style(style);
            }
            pb.enable_steady_tick(std::time::Duration::from_millis(120));
            pb
        }
    }
}
