use super::release::ReleaseMetadata;

/// OS and architecture, named the way release assets are named
/// (`linux`, `darwin`, `windows`; `amd64`, `arm64`, ...).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    pub fn current() -> Self {
        Self::new(
            asset_os_name(std::env::consts::OS),
            asset_arch_name(std::env::consts::ARCH),
        )
    }

    /// Windows locks the image of a running executable.
    pub fn locks_running_executable(&self) -> bool {
        self.os == "windows"
    }

    pub fn exe_extension(&self) -> Option<&'static str> {
        if self.os == "windows" {
            Some("exe")
        } else {
            None
        }
    }

    pub fn token(&self) -> String {
        match self.exe_extension() {
            Some(ext) => format!("{}-{}.{}", self.os, self.arch, ext),
            None => format!("{}-{}", self.os, self.arch),
        }
    }

    /// Returns the download URL of the first asset carrying this platform's token.
    ///
    /// The token has to end at a word boundary, so `linux-arm` does not pick up
    /// a `linux-arm64` build.
    pub fn select_asset<'a>(&self, release: &'a ReleaseMetadata) -> Option<&'a str> {
        let token = self.token();
        release
            .assets
            .iter()
            .find(|a| contains_token(&a.name, &token))
            .map(|a| a.download_url.as_str())
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

fn contains_token(name: &str, token: &str) -> bool {
    name.match_indices(token).any(|(i, m)| {
        name[i + m.len()..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_ascii_alphanumeric())
    })
}

fn asset_os_name(os: &str) -> &str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

fn asset_arch_name(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        "powerpc64" => "ppc64",
        other => other,
    }
}
