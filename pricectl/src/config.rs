//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The file path
//! defaults to `pricectl.yaml` and can be set with `-f` or the `PRICECTL_CONFIG` environment
//! variable. A missing file is not an error; every field has a default.
//!
//! ## Loading Priority
//!
//! 1. **YAML config file** - Base configuration (default: `pricectl.yaml`)
//! 2. **Environment variables** - Variables prefixed with `PRICECTL_` override YAML values
//!
//! Nested values use double underscores, e.g. `PRICECTL_PRICING_API__URL=http://pricing:8000`
//! sets `pricing_api.url`.
//!
//! ## Example
//!
//! ```yaml
//! pricing_api:
//!   url: https://pricing.example.com
//!   timeout: 90s
//! upload:
//!   max_file_size_mb: 25
//! storage:
//!   history_path: /var/lib/pricectl/export-history.json
//! export:
//!   output_dir: ./exports
//! telemetry:
//!   enabled: true
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cli::Command;
use crate::errors::Error;

/// CLI arguments: the config file plus an optional subcommand.
#[derive(Parser, Debug)]
#[command(author, version, about = "Bulk EC2 pricing from spreadsheet inventories", long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "PRICECTL_CONFIG", default_value = "pricectl.yaml", global = true)]
    pub config: String,

    /// Validate configuration and exit.
    #[arg(long, global = true)]
    pub validate: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub pricing_api: PricingApiConfig,
    pub upload: UploadConfig,
    pub storage: StorageConfig,
    pub export: ExportConfig,
    pub telemetry: TelemetryConfig,
}

/// Where the pricing service lives.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PricingApiConfig {
    /// Base URL; endpoint paths are appended to it
    pub url: Url,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for PricingApiConfig {
    fn default() -> Self {
        Self {
            url: Url::parse("http://localhost:8000").expect("default pricing URL is valid"),
            timeout: Duration::from_secs(60),
        }
    }
}

/// File-acceptance limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    pub max_file_size_mb: u64,
    /// Accept more than one file per selection
    pub allow_multiple: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 10,
            allow_multiple: false,
        }
    }
}

/// Durable client-side state.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Export audit log (JSON array of records)
    pub history_path: PathBuf,
    /// Session credentials (base64-encoded JSON)
    pub credentials_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            history_path: PathBuf::from("export-history.json"),
            credentials_path: PathBuf::from("credentials.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    /// Directory file exports are written to
    pub output_dir: PathBuf,
    /// Hand remote spreadsheet URLs to the opener after creation
    pub open_spreadsheet: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            open_spreadsheet: true,
        }
    }
}

/// Usage event reporting.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    pub enabled: bool,
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency
    pub fn validate(&self) -> Result<(), Error> {
        if self.upload.max_file_size_mb == 0 {
            return Err(Error::validation(
                "Config validation: upload.max_file_size_mb must be at least 1",
            ));
        }

        if !matches!(self.pricing_api.url.scheme(), "http" | "https") {
            return Err(Error::validation(format!(
                "Config validation: pricing_api.url must be an http(s) URL, got '{}'",
                self.pricing_api.url
            )));
        }

        if self.pricing_api.timeout.is_zero() {
            return Err(Error::validation("Config validation: pricing_api.timeout must be positive"));
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            // PRICECTL_CONFIG names the file itself
            .merge(Env::prefixed("PRICECTL_").ignore(&["config"]).split("__"))
    }
}
