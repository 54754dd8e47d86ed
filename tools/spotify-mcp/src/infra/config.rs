use crate::infra::metrics::MetricsServerConfig;
use crate::infra::spotify::DEFAULT_BASE_URL;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const CONFIG_DIR_ENV: &str = "APP_CONFIG_DIR";
const CONFIG_PROFILE_ENV: &str = "APP_CONFIG_PROFILE";
const DEFAULT_CONFIG_DIR: &str = "config";
const DEFAULT_PROFILE: &str = "default";

/// Process configuration. Access tokens are per call and never live here.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub api_base_url: Option<String>,
    pub user_agent: Option<String>,
    pub metrics_addr: Option<String>,
    pub allow_insecure_metrics_dev: Option<bool>,
    pub metrics_auth_token: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::load_with_dir(None)
    }

    /// `dir` wins over `APP_CONFIG_DIR`, which wins over `./config`.
    pub fn load_with_dir(dir: Option<&Path>) -> Result<Self> {
        let base_dir = match dir {
            Some(dir) => dir.to_path_buf(),
            None => env::var(CONFIG_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_DIR)),
        };
        Self::load_from_dir(&base_dir)
    }

    pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut config = AppConfig::default();
        let mut overlays = Vec::new();

        if dir.exists() {
            let mut profiles = vec![DEFAULT_PROFILE.to_string()];
            if let Ok(active_profile) = env::var(CONFIG_PROFILE_ENV) {
                if !active_profile.trim().is_empty() && active_profile != DEFAULT_PROFILE {
                    profiles.push(active_profile);
                }
            }
            profiles.push("local".to_string());

            for profile in profiles {
                let candidate = dir.join(format!("{profile}.toml"));
                if let Some(overlay) = ConfigOverlay::from_file(&candidate)? {
                    overlays.push(overlay);
                }
            }
        }

        overlays.push(ConfigOverlay::from_env());

        for overlay in overlays {
            config.apply_overlay(overlay);
        }

        Ok(config)
    }

    pub fn api_base_url(&self) -> &str {
        self.api_base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_BASE_URL)
    }

    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        if let Some(value) = overlay.api_base_url {
            self.api_base_url = Some(value);
        }
        if let Some(value) = overlay.user_agent {
            self.user_agent = Some(value);
        }
        if let Some(value) = overlay.metrics_addr {
            self.metrics_addr = Some(value);
        }
        if let Some(value) = overlay.allow_insecure_metrics_dev {
            self.allow_insecure_metrics_dev = Some(value);
        }
        if let Some(value) = overlay.metrics_auth_token {
            self.metrics_auth_token = Some(value);
        }
    }

    pub fn metrics_server_config(&self) -> Result<Option<MetricsServerConfig>> {
        let addr = match self.metrics_addr.as_ref() {
            Some(addr) => addr
                .parse::<SocketAddr>()
                .with_context(|| format!("parse METRICS_ADDR '{}'", addr))?,
            None => return Ok(None),
        };
        let auth_token = match self.metrics_auth_token.as_deref().map(str::trim) {
            Some("") => return Err(anyhow!("METRICS_AUTH_TOKEN is set but empty")),
            Some(token) => Some(token.to_string()),
            None => None,
        };

        Ok(Some(MetricsServerConfig {
            addr,
            auth_token,
            allow_insecure: self.allow_insecure_metrics_dev.unwrap_or(false),
        }))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigOverlay {
    api_base_url: Option<String>,
    user_agent: Option<String>,
    metrics_addr: Option<String>,
    allow_insecure_metrics_dev: Option<bool>,
    metrics_auth_token: Option<String>,
}

impl ConfigOverlay {
    fn from_file(path: &Path) -> Result<Option<Self>> {
        if !path.is_file() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let overlay: Self = toml::from_str(&contents)
            .with_context(|| format!("parse config file {}", path.display()))?;
        Ok(Some(overlay))
    }

    fn from_env() -> Self {
        Self {
            api_base_url: env::var("SPOTIFY_API_BASE_URL").ok(),
            user_agent: env::var("SPOTIFY_USER_AGENT").ok(),
            metrics_addr: env::var("METRICS_ADDR").ok(),
            allow_insecure_metrics_dev: env::var("ALLOW_INSECURE_METRICS_DEV")
                .ok()
                .and_then(|v| v.parse::<bool>().ok()),
            metrics_auth_token: env::var("METRICS_AUTH_TOKEN").ok(),
        }
    }
}
