//! Configuration management for gstmap.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main application configuration.
///
/// This is loaded from `~/.config/gstmap/config.toml` (or platform
/// equivalent). If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// General application settings
    pub general: GeneralConfig,
    /// Browser automation settings
    pub browser: BrowserSettings,
    /// Portal endpoints and timeouts
    pub portal: PortalConfig,
    /// Captcha solving service settings
    pub captcha: CaptchaConfig,
    /// Extraction/enrichment processing settings
    pub processing: ProcessingConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(&config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `GSTMAP_HEADLESS`: Override browser headless mode (true/false)
    /// - `GSTMAP_MAX_CONCURRENT_JOBS`: Override the worker slot cap
    /// - `GSTMAP_DATA_DIR`: Override the data directory
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;

        if let Ok(val) = std::env::var("GSTMAP_HEADLESS") {
            if let Ok(headless) = val.parse() {
                config.browser.headless = headless;
                tracing::debug!("Override browser.headless from env: {}", headless);
            }
        }

        if let Ok(val) = std::env::var("GSTMAP_MAX_CONCURRENT_JOBS") {
            if let Ok(max) = val.parse() {
                config.processing.max_concurrent_jobs = max;
                tracing::debug!("Override processing.max_concurrent_jobs from env: {}", max);
            }
        }

        if let Ok(val) = std::env::var("GSTMAP_DATA_DIR") {
            config.general.data_dir = Some(PathBuf::from(val));
        }

        Ok(config)
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/gstmap/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("in", "gstmap", "gstmap").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Honors `general.data_dir` if set, otherwise uses XDG base
    /// directories: `~/.local/share/gstmap`
    pub fn data_dir(&self) -> ConfigResult<PathBuf> {
        if let Some(dir) = &self.general.data_dir {
            return Ok(dir.clone());
        }
        let dirs = ProjectDirs::from("in", "gstmap", "gstmap").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override for the data directory (output artifacts, job history)
    pub data_dir: Option<PathBuf>,
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Run the browser without a visible window
    pub headless: bool,
    /// Viewport width in pixels
    pub window_width: u32,
    /// Viewport height in pixels
    pub window_height: u32,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
        }
    }
}

/// Portal endpoints and timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Search-taxpayer-by-PAN page
    pub search_by_pan_url: String,
    /// Search-taxpayer-by-GSTIN page (detail lookups)
    pub search_by_gstin_url: String,
    /// Per-page-load timeout in milliseconds
    pub page_timeout_ms: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            search_by_pan_url: "https://services.gst.gov.in/services/searchtpbypan".to_string(),
            search_by_gstin_url: "https://services.gst.gov.in/services/searchtp".to_string(),
            page_timeout_ms: 20_000,
        }
    }
}

/// One captcha service account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptchaAccount {
    /// Account user id
    pub userid: String,
    /// API key for the account
    pub apikey: String,
}

/// Captcha solving service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptchaConfig {
    /// Solver API endpoint
    pub api_url: String,
    /// Accounts tried in order; rotation happens when one reports its
    /// usage limit
    pub accounts: Vec<CaptchaAccount>,
    /// Expected solution length (the portal uses 6 digits)
    pub solution_length: usize,
    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.apitruecaptcha.org/one/gettext".to_string(),
            accounts: Vec::new(),
            solution_length: 6,
            request_timeout_ms: 15_000,
        }
    }
}

/// Extraction/enrichment processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Transient-failure retry bound per record
    pub max_lookup_retries: u32,
    /// Fresh-challenge captcha attempts per lookup
    pub max_captcha_attempts: u32,
    /// Base delay for exponential retry backoff, in milliseconds
    pub retry_base_delay_ms: u64,
    /// Minimum politeness delay between records, in milliseconds
    pub request_delay_min_ms: u64,
    /// Maximum politeness delay between records, in milliseconds
    pub request_delay_max_ms: u64,
    /// Worker slot cap; jobs beyond it stay queued
    pub max_concurrent_jobs: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_lookup_retries: 3,
            max_captcha_attempts: 5,
            retry_base_delay_ms: 2000,
            request_delay_min_ms: 1000,
            request_delay_max_ms: 3000,
            max_concurrent_jobs: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.browser.headless);
        assert_eq!(config.captcha.solution_length, 6);
        assert_eq!(config.processing.max_lookup_retries, 3);
        assert_eq!(config.processing.max_captcha_attempts, 5);
        assert!(config
            .portal
            .search_by_pan_url
            .contains("searchtpbypan"));
    }

    #[test]
    fn test_config_toml_round_trip() {
        let mut config = AppConfig::default();
        config.browser.headless = false;
        config.captcha.accounts.push(CaptchaAccount {
            userid: "user".to_string(),
            apikey: "key".to_string(),
        });

        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let back: AppConfig = toml::from_str(&toml_str).expect("deserialize");

        assert!(!back.browser.headless);
        assert_eq!(back.captcha.accounts.len(), 1);
        assert_eq!(back.captcha.accounts[0].userid, "user");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_str = r#"
            [browser]
            headless = false
        "#;
        let config: AppConfig = toml::from_str(toml_str).expect("deserialize");
        assert!(!config.browser.headless);
        assert_eq!(config.browser.window_width, 1920);
        assert_eq!(config.processing.max_concurrent_jobs, 2);
    }

    #[test]
    fn test_env_override_applies() {
        std::env::set_var("GSTMAP_MAX_CONCURRENT_JOBS", "7");
        let config = AppConfig::load_with_env().expect("load with env");
        assert_eq!(config.processing.max_concurrent_jobs, 7);
        std::env::remove_var("GSTMAP_MAX_CONCURRENT_JOBS");
    }

    #[test]
    fn test_data_dir_override() {
        let mut config = AppConfig::default();
        config.general.data_dir = Some(PathBuf::from("/tmp/gstmap-test"));
        let dir = config.data_dir().expect("data dir");
        assert_eq!(dir, PathBuf::from("/tmp/gstmap-test"));
    }
}
