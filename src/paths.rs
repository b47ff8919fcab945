// IBM Cloud MCP Server - Path Resolution
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Single source of truth for default file locations.
// Walk-up discovery from the binary location, cached via OnceLock.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Name of the tool manifest that marks the server root
pub const MANIFEST_FILE: &str = "tools.json";

static SERVER_ROOT_CACHE: OnceLock<PathBuf> = OnceLock::new();

/// Find the server root: the directory holding tools.json.
///
/// Resolution order:
///   1. Walk up from binary location looking for tools.json
///   2. IBMCLOUD_MCP_ROOT environment variable
///   3. Current working directory
pub fn server_root() -> &'static Path {
    SERVER_ROOT_CACHE.get_or_init(|| {
        if let Ok(exe) = std::env::current_exe() {
            if let Ok(canonical) = exe.canonicalize() {
                if let Some(found) = walk_up_for(&canonical, MANIFEST_FILE) {
                    return found;
                }
            }
        }

        if let Ok(root) = std::env::var("IBMCLOUD_MCP_ROOT") {
            let p = PathBuf::from(&root);
            if p.exists() {
                return p;
            }
        }

        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    })
}

/// Nearest ancestor of `start` (exclusive) containing `marker`
pub fn walk_up_for(start: &Path, marker: &str) -> Option<PathBuf> {
    let mut dir = start.parent();
    while let Some(d) = dir {
        if d.join(marker).exists() {
            return Some(d.to_path_buf());
        }
        dir = d.parent();
    }
    None
}

pub fn default_manifest_path() -> PathBuf {
    server_root().join(MANIFEST_FILE)
}

pub fn default_log_path() -> PathBuf {
    server_root().join("logs/ibmcloud-mcp.log")
}

/// Locate an executable. Names with a path separator are checked as-is,
/// bare names are searched on PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .flat_map(|dir| executable_names(name).into_iter().map(move |n| dir.join(n)))
        .find(|p| p.is_file())
}

fn executable_names(name: &str) -> Vec<String> {
    if cfg!(target_os = "windows") {
        vec![format!("{}.exe", name), name.to_string()]
    } else {
        vec![name.to_string()]
    }
}

// ============================================================================
// TESTS
// ============================================================================
