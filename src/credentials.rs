// IBM Cloud MCP Server - Credential Resolution
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// API key lookup: explicit process environment first, then a dotenv file.
// Values are returned to the session gate only; never log them directly,
// use journal::redact().

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Where a credential value was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialOrigin {
    Environment,
    DotEnv,
}

impl std::fmt::Display for CredentialOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Environment => write!(f, "environment"),
            Self::DotEnv => write!(f, "dotenv file"),
        }
    }
}

#[derive(Clone, PartialEq)]
pub struct Credential {
    pub value: String,
    pub origin: CredentialOrigin,
}

// Keeps the key out of {:?} output
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("value", &crate::journal::redact(&self.value))
            .field("origin", &self.origin)
            .finish()
    }
}

/// Lookup rules for the API key and optional default region
#[derive(Debug, Clone)]
pub struct CredentialSource {
    pub api_key_var: String,
    pub region_var: String,
    pub dotenv_path: Option<PathBuf>,
}

impl CredentialSource {
    pub fn new(api_key_var: &str, region_var: &str, dotenv_path: Option<PathBuf>) -> Self {
        Self {
            api_key_var: api_key_var.to_string(),
            region_var: region_var.to_string(),
            dotenv_path,
        }
    }

    pub fn api_key(&self) -> Option<Credential> {
        self.lookup(&self.api_key_var)
    }

    pub fn region(&self) -> Option<String> {
        self.lookup(&self.region_var).map(|c| c.value)
    }

    fn lookup(&self, key: &str) -> Option<Credential> {
        if let Ok(value) = std::env::var(key) {
            if !value.trim().is_empty() {
                return Some(Credential { value: value.trim().to_string(), origin: CredentialOrigin::Environment });
            }
        }
        let path = self.dotenv_path.as_deref()?;
        read_dotenv(path)
            .remove(key)
            .filter(|v| !v.is_empty())
            .map(|value| Credential { value, origin: CredentialOrigin::DotEnv })
    }

    /// Human-readable description of the search, for error messages
    pub fn describe(&self) -> String {
        match &self.dotenv_path {
            Some(p) => format!("no API key in ${} or {}", self.api_key_var, p.display()),
            None => format!("no API key in ${}", self.api_key_var),
        }
    }
}

/// Read a dotenv file. Missing or unreadable files yield an empty map.
pub fn read_dotenv(path: &Path) -> HashMap<String, String> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_dotenv(&content),
        Err(_) => HashMap::new(),
    }
}

/// Parse `KEY=VALUE` lines. `#` comments and blank lines are skipped,
/// an `export ` prefix is tolerated, one pair of matching quotes is stripped.
pub fn parse_dotenv(content: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        vars.insert(key.to_string(), unquote(value.trim()).to_string());
    }
    vars
}

fn unquote(value: &str) -> &str {
    for q in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(q) && value.ends_with(q) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

// ============================================================================
// TESTS
// ============================================================================
