// IBM Cloud MCP Server - Tool Registry
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Tool descriptors come from the JSON manifest, handlers are compiled in.
// The two sets must match exactly or the server refuses to start.

use crate::error::ConfigError;
use crate::tools::ToolHandler;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Client-facing description of one tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Load the manifest: a JSON array of tool descriptors
pub fn load_manifest(path: &Path) -> Result<Vec<ToolDescriptor>, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::ManifestMissing(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ManifestUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    parse_manifest(&content)
}

pub fn parse_manifest(content: &str) -> Result<Vec<ToolDescriptor>, ConfigError> {
    let descriptors: Vec<ToolDescriptor> =
        serde_json::from_str(content).map_err(|e| ConfigError::ManifestInvalid(e.to_string()))?;

    for d in &descriptors {
        if d.name.trim().is_empty() {
            return Err(ConfigError::ManifestInvalid("tool with empty name".to_string()));
        }
        let schema_type = d.parameters.get("type").and_then(|t| t.as_str());
        if !d.parameters.is_object() || schema_type != Some("object") {
            return Err(ConfigError::ManifestInvalid(format!(
                "tool '{}': parameters must be a JSON-Schema object with type \"object\"",
                d.name
            )));
        }
    }
    Ok(descriptors)
}

/// Immutable name -> {descriptor, handler} table
pub struct Registry {
    descriptors: Vec<ToolDescriptor>,
    handlers: HashMap<String, Box<dyn ToolHandler>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("tools", &self.names())
            .finish()
    }
}

impl Registry {
    /// Pair descriptors with handlers. Any mismatch is a configuration error.
    pub fn new(
        descriptors: Vec<ToolDescriptor>,
        handlers: Vec<Box<dyn ToolHandler>>,
    ) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for d in &descriptors {
            if !seen.insert(d.name.as_str()) {
                return Err(ConfigError::DuplicateTool(d.name.clone()));
            }
        }

        let mut table: HashMap<String, Box<dyn ToolHandler>> = HashMap::new();
        for handler in handlers {
            let name = handler.name().to_string();
            if !seen.contains(name.as_str()) {
                return Err(ConfigError::OrphanHandler(name));
            }
            if table.insert(name.clone(), handler).is_some() {
                return Err(ConfigError::DuplicateTool(name));
            }
        }

        if let Some(missing) = descriptors.iter().find(|d| !table.contains_key(&d.name)) {
            return Err(ConfigError::MissingHandler(missing.name.clone()));
        }

        Ok(Self { descriptors, handlers: table })
    }

    /// Manifest-order descriptors, as served by tools/list
    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn handler(&self, name: &str) -> Option<&dyn ToolHandler> {
        self.handlers.get(name).map(|h| h.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.descriptors.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================
