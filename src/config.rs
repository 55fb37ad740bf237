#![forbid(unsafe_code)]

use anyhow::{Context, Result, anyhow, ensure};
use chrono::Utc;
use serde::Deserialize;
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

use crate::checkpoint::CheckpointSettings;
use crate::filter::FilterSettings;
use crate::paging::PagingSettings;
use crate::retry::RetryPolicy;
use crate::youtube::{Credentials, DEFAULT_API_BASE, HttpSettings};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_TUNING_PATH: &str = "scraper.toml";
pub const DEFAULT_DATA_ROOT: &str = "data";

/// Contents of the tuning file. Every table and key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Tuning {
    pub retry: RetryPolicy,
    pub paging: PagingSettings,
    pub filter: FilterSettings,
    pub http: HttpSettings,
    pub checkpoint: CheckpointSettings,
}

/// Reads the tuning file. An explicit path must exist; the default one may
/// be absent, in which case built-in values apply.
pub fn load_tuning(explicit: Option<&Path>) -> Result<Tuning> {
    let path = explicit.unwrap_or_else(|| Path::new(DEFAULT_TUNING_PATH));
    if explicit.is_none() && !path.exists() {
        return Ok(Tuning::default());
    }
    let raw = fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    let tuning: Tuning =
        toml::from_str(&raw).with_context(|| format!("Parsing {}", path.display()))?;
    check_tuning(&tuning).with_context(|| format!("Checking {}", path.display()))?;
    Ok(tuning)
}

fn check_tuning(tuning: &Tuning) -> Result<()> {
    let days = tuning.filter.min_age_days;
    ensure!(days >= 0, "[filter] min_age_days must not be negative, got {days}");
    ensure!(
        tuning.filter.cutoff(Utc::now()).is_some(),
        "[filter] min_age_days = {days} is out of range"
    );
    Ok(())
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub data_root: PathBuf,
    pub api_base: String,
    pub credentials: Credentials,
    pub tuning: Tuning,
}

#[derive(Debug, Clone, Default)]
pub struct RuntimeOverrides {
    pub data_root: Option<PathBuf>,
    pub env_path: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
}

pub fn resolve_runtime_config(overrides: RuntimeOverrides) -> Result<RuntimeConfig> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    let tuning = load_tuning(overrides.config_path.as_deref())?;
    build_runtime_config_with_overrides(&file_vars, env_var_string, overrides, tuning)
}

#[cfg(test)]
fn build_runtime_config(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Result<RuntimeConfig> {
    build_runtime_config_with_overrides(
        file_vars,
        env_lookup,
        RuntimeOverrides::default(),
        Tuning::default(),
    )
}

fn build_runtime_config_with_overrides(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: RuntimeOverrides,
    tuning: Tuning,
) -> Result<RuntimeConfig> {
    let data_root = overrides
        .data_root
        .or_else(|| lookup_value("DATA_ROOT", file_vars, &env_lookup).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_ROOT));
    let api_base = lookup_value("YOUTUBE_API_BASE", file_vars, &env_lookup)
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
    let credentials = lookup_value("YOUTUBE_API_KEY", file_vars, &env_lookup)
        .map(Credentials::ApiKey)
        .or_else(|| {
            lookup_value("YOUTUBE_ACCESS_TOKEN", file_vars, &env_lookup)
                .map(Credentials::AccessToken)
        })
        .ok_or_else(|| anyhow!("YOUTUBE_API_KEY or YOUTUBE_ACCESS_TOKEN must be set"))?;
    Ok(RuntimeConfig {
        data_root,
        api_base,
        credentials,
        tuning,
    })
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key)
        .or_else(|| file_vars.get(key).cloned())
        .filter(|value| !value.trim().is_empty())
}

pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}
