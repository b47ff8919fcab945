// IBM Cloud MCP Server - Library Root
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// All modules exported here for use by the binary and tests.

pub mod paths;
pub mod config;
pub mod error;
pub mod journal;
pub mod jsonrpc;
pub mod mcp;
pub mod session;

// ============================================================================
// TOOL PIPELINE - registry -> handlers -> safe mode -> backend
// ============================================================================

/// Manifest loading and name -> handler table
pub mod registry;

/// Tool handlers and argument extraction
pub mod tools;

/// Read-only keyword filter for execute_command
pub mod safe_mode;

/// ibmcloud subprocess invoker
pub mod backend;

/// API key lookup: environment, then dotenv
pub mod credentials;
