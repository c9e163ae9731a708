use std::path::PathBuf;

use directories::BaseDirs;

pub const CONFIG_ENV: &str = "SECRET_MANAGER_CONFIG";

pub fn app_config_dir() -> Option<PathBuf> {
    let base = BaseDirs::new()?;
    Some(base.config_dir().join("secret_manager"))
}

pub fn options_file() -> Option<PathBuf> {
    if let Some(p) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(p));
    }
    Some(app_config_dir()?.join("options.toml"))
}

pub fn default_staging_dir() -> PathBuf {
    std::env::temp_dir()
}
