// IBM Cloud MCP Server - Command Journal
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Append-only record of every request and its outcome.
// Journal writes never fail a request: I/O errors are swallowed.

use chrono::Local;
use serde_json::{Map, Value};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Destination for journal lines
pub trait LogSink: Send + Sync {
    fn record(&self, line: &str);
}

/// Timestamped lines appended to a file, mirrored to the diagnostic log
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileSink {
    fn record(&self, line: &str) {
        log::info!("{}", line);
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let ts = Local::now().format("%Y-%m-%d %H:%M:%S");
            let _ = writeln!(f, "[{}] {}", ts, line);
        }
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn record(&self, _line: &str) {}
}

/// In-memory sink, used by tests and the one-shot CLI commands
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl LogSink for MemorySink {
    fn record(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}

/// Credential fingerprint safe for logs: length and a 4-char prefix
pub fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(4).collect();
    format!("len={} prefix={}…", secret.chars().count(), prefix)
}

/// CLI flags whose following value is a credential
const SECRET_FLAGS: &[&str] = &["--apikey", "-p", "--password"];

/// Replace credential values in command text with their `redact()` form.
/// Handles both `--apikey KEY` and `--apikey=KEY`; quotes around the value
/// are ignored when matching.
pub fn mask_secrets(text: &str) -> String {
    let mut secrets = Vec::new();
    let mut tokens = text.split_whitespace();
    while let Some(token) = tokens.next() {
        let token = token.trim_start_matches(['\'', '"']);
        if SECRET_FLAGS.contains(&token) {
            if let Some(value) = tokens.next() {
                secrets.push(value);
            }
        } else if let Some((flag, value)) = token.split_once('=') {
            if SECRET_FLAGS.contains(&flag) {
                secrets.push(value);
            }
        }
    }

    let mut secrets: Vec<&str> = secrets
        .into_iter()
        .map(|raw| raw.trim_matches(['\'', '"', ':', ',']))
        .filter(|s| !s.is_empty())
        .collect();
    secrets.sort_unstable();
    secrets.dedup();

    let mut masked = text.to_string();
    for secret in secrets {
        masked = masked.replace(secret, &redact(secret));
    }
    masked
}

/// Truncate to `max` chars, marking the cut
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max).collect();
        format!("{}…", head)
    } else {
        text.to_string()
    }
}

/// Summarize tool arguments for the journal (truncate large values)
pub fn arg_summary(tool: &str, args: &Map<String, Value>) -> String {
    match tool {
        "execute_command" => {
            let cmd = args.get("command").and_then(|v| v.as_str()).unwrap_or("?");
            let safe = args.get("safe_mode").and_then(|v| v.as_bool()).unwrap_or(true);
            format!("cmd={} safe_mode={}", truncate(&mask_secrets(cmd), 200), safe)
        }
        _ if args.is_empty() => "-".to_string(),
        _ => truncate(&Value::Object(args.clone()).to_string(), 300),
    }
}

// ============================================================================
// TESTS
// ============================================================================
