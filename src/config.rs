// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Configuration persistence for k8sevents
//!
//! All k8sevents data is stored under ~/.k8sevents/:
//! - ~/.k8sevents/config.json - user configuration
//! - ~/.k8sevents/environments.json - context to environment mapping
//! - ~/.k8sevents/log/ - log files

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::WatchError;

/// Get the base k8sevents directory (~/.k8sevents/)
pub fn base_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(".k8sevents"))
        .context("Could not determine home directory")
}

/// k8sevents configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Context picked last time, offered as the picker default
    #[serde(default)]
    pub last_context: Option<String>,
}

impl Config {
    /// Load config from disk, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Get the config file path (~/.k8sevents/config.json)
    pub fn config_path() -> Result<PathBuf> {
        Ok(base_dir()?.join("config.json"))
    }

    /// Remember the picked context
    pub fn set_last_context(&mut self, context: &str) -> Result<()> {
        self.last_context = Some(context.to_string());
        self.save()
    }
}

/// Environment name to the contexts that belong to it, e.g.
/// `{"clusters": {"prod": ["prod-eu"], "nonprod": ["dev", "staging"]}}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvironmentMap {
    pub clusters: BTreeMap<String, Vec<String>>,
}

impl EnvironmentMap {
    /// Default mapping path (~/.k8sevents/environments.json)
    pub fn default_path() -> Result<PathBuf> {
        Ok(base_dir()?.join("environments.json"))
    }

    pub fn load(path: &Path) -> Result<Self, WatchError> {
        let content = fs::read_to_string(path).map_err(|e| {
            WatchError::config(format!(
                "cannot read environment mapping {}: {}",
                path.display(),
                e
            ))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            WatchError::config(format!(
                "invalid environment mapping {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// First environment (in name order) listing the context
    pub fn environment_for(&self, context: &str) -> Option<&str> {
        self.clusters
            .iter()
            .find(|(_, contexts)| contexts.iter().any(|c| c == context))
            .map(|(env, _)| env.as_str())
    }
}
