//! Credentials from the environment and optional settings from disk.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::domain::error::ConfigError;
use crate::domain::settings::Settings;
use crate::infra::api::DEFAULT_API_BASE;

/// Everything needed to talk to the provider, resolved up front so a
/// missing variable fails before any remote call.
pub struct Credentials {
    pub api_token: String,
    pub ssh_key_id: String,
    pub api_base: String,
}

impl Credentials {
    /// Read `DIGITALOCEAN_TOKEN` and `SSH_KEY_ID`, plus the optional
    /// `DROPLET_PROXY_API` base-URL override.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnv` naming the first absent variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_token: require_env("DIGITALOCEAN_TOKEN")?,
            ssh_key_id: require_env("SSH_KEY_ID")?,
            api_base: std::env::var("DROPLET_PROXY_API")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_owned()),
        })
    }
}

fn require_env(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnv { name }),
    }
}

/// Settings file location: `DROPLET_PROXY_CONFIG` override, else
/// `~/.droplet-proxy/config.yaml`.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn settings_path() -> Result<PathBuf> {
    if let Ok(val) = std::env::var("DROPLET_PROXY_CONFIG") {
        return Ok(PathBuf::from(val));
    }
    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.join(".droplet-proxy").join("config.yaml"))
}

/// Load settings, falling back to defaults when no file exists.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_settings() -> Result<Settings> {
    load_settings_from(&settings_path()?)
}

/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("cannot parse {}", path.display()))
}

/// Default ssh identity used for both provisioning and the tunnel.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn default_identity() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.join(".ssh").join("digitalocean"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn missing_settings_file_yields_defaults() {
        let settings =
            load_settings_from(Path::new("/nonexistent/droplet-proxy/config.yaml")).expect("load");
        assert_eq!(settings.droplet_name, "proxy-US");
        assert_eq!(settings.local_proxy_port, 3128);
    }

    #[test]
    fn partial_settings_file_overrides_only_named_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "droplet_name: my-proxy\nregion: sfo3\n").expect("write");

        let settings = load_settings_from(&path).expect("load");
        assert_eq!(settings.droplet_name, "my-proxy");
        assert_eq!(settings.region, "sfo3");
        assert_eq!(settings.image, "ubuntu-20-04-x64");
        assert_eq!(settings.remote_proxy_port, 8888);
    }

    #[test]
    fn unparseable_settings_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "droplet_name: [unclosed\n").expect("write");

        let err = load_settings_from(&path).expect_err("expected Err");
        assert!(err.to_string().contains("cannot parse"), "got: {err}");
    }
}
