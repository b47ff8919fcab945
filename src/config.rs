// IBM Cloud MCP Server - Configuration
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Server settings: CLI location, manifest, credentials source, timeouts.
// Loaded from an optional JSON file; every field has a default.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// ibmcloud binary: bare name (searched on PATH) or explicit path
    pub cli_path: String,
    pub tools_manifest: PathBuf,
    /// Optional dotenv file consulted when the API key env var is unset
    pub env_file: PathBuf,
    pub api_key_var: String,
    pub region_var: String,
    pub log_file: PathBuf,
    pub command_timeout_secs: u64,
    pub login_timeout_secs: u64,
    /// How long a successful session probe is trusted. 0 = probe every call.
    pub session_cache_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            cli_path: "ibmcloud".to_string(),
            tools_manifest: crate::paths::default_manifest_path(),
            env_file: PathBuf::from(".env"),
            api_key_var: "IBMCLOUD_API_KEY".to_string(),
            region_var: "IBMCLOUD_REGION".to_string(),
            log_file: crate::paths::default_log_path(),
            command_timeout_secs: 60,
            login_timeout_secs: 90,
            session_cache_secs: 0,
        }
    }
}

impl ServerConfig {
    /// Load config from JSON file, falling back to defaults
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            log::warn!("Config not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save config to JSON file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs.max(1))
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs.max(1))
    }

    pub fn session_cache(&self) -> Duration {
        Duration::from_secs(self.session_cache_secs)
    }
}

// ============================================================================
// TESTS
// ============================================================================
