use serde::Deserialize;
use tracing::debug;

use super::transport::HttpTransport;
use crate::error::{Result, SecretManagerError};

#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct ReleaseMetadata {
    #[serde(rename = "tag_name")]
    pub tag: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct Asset {
    pub name: String,
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
}

/// Single attempt; callers decide whether a failure is worth retrying.
pub fn fetch_latest(
    transport: &dyn HttpTransport,
    url: &str,
    user_agent: &str,
) -> Result<ReleaseMetadata> {
    debug!(url, "fetching release metadata");

    let resp = transport
        .get(url, user_agent)
        .map_err(|source| SecretManagerError::Network {
            url: url.to_string(),
            source,
        })?;

    if !resp.is_success() {
        return Err(SecretManagerError::Remote {
            url: url.to_string(),
            status: resp.status,
        });
    }

    let release: ReleaseMetadata = serde_json::from_reader(resp.body).map_err(|source| {
        if source.is_io() {
            SecretManagerError::Network {
                url: url.to_string(),
                source: Box::new(source),
            }
        } else {
            SecretManagerError::Decode {
                url: url.to_string(),
                source,
            }
        }
    })?;

    debug!(tag = %release.tag, assets = release.assets.len(), "release metadata decoded");
    Ok(release)
}
