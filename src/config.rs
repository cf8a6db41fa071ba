// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Configuration persistence for netkat
//!
//! Stores user defaults in a config file. All netkat data is stored under ~/.netkat/:
//! - ~/.netkat/config.json - user configuration
//! - ~/.netkat/log/ - rolling log files

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::Args;

/// Default seconds to wait for a tunnel to become ready
pub const DEFAULT_TUNNEL_TIMEOUT_SECS: u64 = 30;

/// Default seconds to wait for the probe response
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Get the base netkat directory (~/.netkat/)
pub fn base_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(".netkat"))
        .context("Could not determine home directory")
}

/// netkat configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Kubeconfig context to use when --context is not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Kubeconfig file to use when --kubeconfig is not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<PathBuf>,

    /// HTTP path requested by the liveness probe
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe_path: Option<String>,

    /// Seconds to wait for a tunnel to become ready, 0 waits forever
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tunnel_timeout_secs: Option<u64>,

    /// Seconds to wait for the probe response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    /// Load config from disk, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
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

    /// Get the config file path (~/.netkat/config.json)
    pub fn config_path() -> Result<PathBuf> {
        Ok(base_dir()?.join("config.json"))
    }
}

/// Effective settings for one run: CLI flags over config file over defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub context: Option<String>,
    pub kubeconfig: Option<PathBuf>,
    pub probe_path: String,
    /// `None` waits for the tunnel indefinitely
    pub tunnel_timeout: Option<Duration>,
    pub request_timeout: Duration,
}

impl Settings {
    pub fn resolve(args: &Args, config: &Config) -> Self {
        let tunnel_secs = args
            .tunnel_timeout
            .or(config.tunnel_timeout_secs)
            .unwrap_or(DEFAULT_TUNNEL_TIMEOUT_SECS);
        let request_secs = args
            .request_timeout
            .or(config.request_timeout_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        Self {
            context: args.context.clone().or_else(|| config.context.clone()),
            kubeconfig: args.kubeconfig.clone().or_else(|| config.kubeconfig.clone()),
            probe_path: args
                .probe_path
                .clone()
                .or_else(|| config.probe_path.clone())
                .unwrap_or_else(|| "/".to_string()),
            tunnel_timeout: (tunnel_secs > 0).then(|| Duration::from_secs(tunnel_secs)),
            request_timeout: Duration::from_secs(request_secs),
        }
    }
}
