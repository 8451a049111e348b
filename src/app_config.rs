//! Application configuration loading for CLI defaults.
//!
//! The file is TOML; every key is optional and explicit CLI values win.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::cli::Args;

/// Parallel uploads when neither the CLI nor the config file set a value.
pub const DEFAULT_MAX_PARALLEL: usize = 4;

/// TOML-backed file configuration for uploader defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Default target URL.
    pub url: Option<String>,
    /// Default HTTP method.
    pub method: Option<String>,
    /// Default parallel upload cap (0 = unlimited).
    pub max_parallel: Option<usize>,
    /// Default batch window in milliseconds.
    pub batch_offset_ms: Option<u64>,
    /// Default size limit in megabytes.
    pub max_file_size_mb: Option<u64>,
    /// Default accept pattern.
    pub accept: Option<String>,
    pub validate_extension: Option<bool>,
    pub with_credentials: Option<bool>,
    pub auto_remove: Option<bool>,
    /// Headers sent with every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Form fields sent with every request.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl FileConfig {
    /// Validates config values the CLI would also reject.
    pub fn validate(&self) -> Result<()> {
        if self.max_file_size_mb == Some(0) {
            bail!("Invalid config value for `max_file_size_mb`: 0. Expected a positive size");
        }
        if let Some(url) = &self.url
            && url.trim().is_empty()
        {
            bail!("Invalid config value for `url`: must not be empty");
        }
        Ok(())
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/uploader/config.toml`
/// 2. `$HOME/.config/uploader/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("uploader")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("uploader")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file.
///
/// An explicit path must exist; the default path is optional.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(config),
        });
    }

    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path_ref) if path_ref.exists() => Some(load_file_config(path_ref)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}

/// Effective settings after merging CLI values over the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub url: String,
    pub method: Option<String>,
    pub headers: Vec<(String, String)>,
    pub params: Vec<(String, String)>,
    pub max_parallel: usize,
    pub batch_offset_ms: u64,
    pub max_file_size_mb: Option<u64>,
    pub accept: Option<String>,
    pub validate_extension: bool,
    pub with_credentials: bool,
    pub auto_remove: bool,
}

impl RunSettings {
    /// Merges CLI arguments over the file config.
    ///
    /// Headers and params from the file come first; CLI entries with the
    /// same name replace them.
    pub fn resolve(args: &Args, file: Option<&FileConfig>) -> Result<Self> {
        let empty = FileConfig::default();
        let file = file.unwrap_or(&empty);

        let Some(url) = args.url.clone().or_else(|| file.url.clone()) else {
            bail!(
                "No upload URL given.\n  \
                 Pass --url URL or set `url` in the config file"
            );
        };

        let max_parallel = args
            .max_parallel
            .or(file.max_parallel)
            .unwrap_or(DEFAULT_MAX_PARALLEL);

        Ok(Self {
            url,
            method: args.method.clone().or_else(|| file.method.clone()),
            headers: merge_pairs(&file.headers, &args.headers),
            params: merge_pairs(&file.params, &args.params),
            max_parallel,
            batch_offset_ms: args.batch_offset.or(file.batch_offset_ms).unwrap_or(0),
            max_file_size_mb: args.max_file_size.or(file.max_file_size_mb),
            accept: args.accept.clone().or_else(|| file.accept.clone()),
            validate_extension: args.validate_extension
                || file.validate_extension.unwrap_or(false),
            with_credentials: args.with_credentials || file.with_credentials.unwrap_or(false),
            auto_remove: args.auto_remove || file.auto_remove.unwrap_or(false),
        })
    }
}

fn merge_pairs(base: &BTreeMap<String, String>, overrides: &[(String, String)]) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = base
        .iter()
        .filter(|(name, _)| !overrides.iter().any(|(o, _)| o.eq_ignore_ascii_case(name)))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    merged.extend(overrides.iter().cloned());
    merged
}
