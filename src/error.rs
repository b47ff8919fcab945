// IBM Cloud MCP Server - Error Types
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Startup errors are fatal. Everything else is reported per request
// and the dispatch loop keeps running.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Fatal configuration problems detected before the request loop starts
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("tool manifest not found at {0:?}")]
    ManifestMissing(PathBuf),

    #[error("failed to read tool manifest {path:?}: {source}")]
    ManifestUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid tool manifest: {0}")]
    ManifestInvalid(String),

    #[error("tool '{0}' is declared more than once")]
    DuplicateTool(String),

    #[error("tool '{0}' is declared in the manifest but has no handler")]
    MissingHandler(String),

    #[error("handler '{0}' has no descriptor in the manifest")]
    OrphanHandler(String),

    #[error("required CLI '{0}' not found on PATH")]
    CliNotFound(String),
}

/// Subprocess failures that never produced an exit code
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("failed to collect command output: {0}")]
    Io(#[from] std::io::Error),
}

/// Handler-level failures, surfaced as JSON-RPC -32603 with the message as data
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("No command provided")]
    NoCommand,

    #[error("Command '{0}' is not allowed in safe mode. Only read-only operations are permitted in safe mode; set safe_mode to false to run it")]
    SafeModeDenied(String),

    #[error("Invalid argument '{name}': expected {expected}")]
    InvalidArgument { name: String, expected: &'static str },

    #[error("Error {action}: {detail}")]
    Backend { action: String, detail: String },
}

/// Session gate failure. The triggering tool call must not proceed.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Not logged in to IBM Cloud: {0}")]
    NotLoggedIn(String),
}
