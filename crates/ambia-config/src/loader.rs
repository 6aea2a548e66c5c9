// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Merge order, later wins: compiled defaults, `/etc/ambia/ambia.toml`,
//! `~/.config/ambia/ambia.toml`, `./ambia.toml`, then `AMBIA_*` variables.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::AmbiaConfig;

/// Top-level sections addressable from the environment.
const SECTIONS: &[&str] = &[
    "pattern_model",
    "pregenerate",
    "thresholds",
    "generator",
    "anthropic",
    "reasoner",
    "service",
    "storage",
    "cadence",
    "queue",
    "cache",
];

pub const SYSTEM_CONFIG_PATH: &str = "/etc/ambia/ambia.toml";
pub const LOCAL_CONFIG_PATH: &str = "ambia.toml";

/// Path of the per-user config file, if a config directory exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ambia/ambia.toml"))
}

/// Loads configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<AmbiaConfig, figment::Error> {
    build_figment().extract()
}

/// Loads configuration from a TOML string over the defaults. No files, no env.
pub fn load_config_from_str(toml_content: &str) -> Result<AmbiaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AmbiaConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Loads configuration from one explicit file with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<AmbiaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AmbiaConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The unextracted Figment for the standard hierarchy.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(AmbiaConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Env provider with an explicit section map.
///
/// Keys contain underscores, so `Env::split("_")` would be ambiguous:
/// `AMBIA_QUEUE_MAX_ATTEMPTS` must become `queue.max_attempts` and
/// `AMBIA_PATTERN_MODEL_API_KEY` must become `pattern_model.api_key`.
fn env_provider() -> Env {
    Env::prefixed("AMBIA_").map(|key| map_env_key(key.as_str()).into())
}

/// Maps a lowercased, prefix-stripped env key to a dotted config path.
pub fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
            .filter(|r| !r.is_empty())
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
