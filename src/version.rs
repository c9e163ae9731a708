/// Label baked into builds that were not produced by the release pipeline.
pub const DEV_VERSION: &str = "dev";

pub const VERSION: &str = match option_env!("SECRET_MANAGER_VERSION") {
    Some(v) => v,
    None => DEV_VERSION,
};

pub const COMMIT: &str = match option_env!("SECRET_MANAGER_COMMIT") {
    Some(c) => c,
    None => "none",
};

pub const BUILD_DATE: &str = match option_env!("SECRET_MANAGER_BUILD_DATE") {
    Some(d) => d,
    None => "unknown",
};

pub fn long_version() -> String {
    format!("secret_manager version {VERSION} (commit: {COMMIT}, built: {BUILD_DATE})")
}

/// A version string with its leading `v` removed.
///
/// Labels are only ever compared for equality; no ordering is implied.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct VersionLabel(String);

impl VersionLabel {
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        Self(s.strip_prefix('v').unwrap_or(s).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_development(&self) -> bool {
        self.0 == DEV_VERSION
    }
}

impl std::fmt::Display for VersionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
