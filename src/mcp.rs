// IBM Cloud MCP Server - MCP Server (JSON-RPC 2.0 over stdio)
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// One request per line in, exactly one response per line out.
// Methods: initialize, ping, tools/list, tools/call. Notifications
// (no id, notifications/*) are logged and not answered.

use crate::backend::{Backend, CliBackend};
use crate::config::ServerConfig;
use crate::credentials::CredentialSource;
use crate::error::{AuthError, ConfigError};
use crate::journal::{arg_summary, mask_secrets, truncate, FileSink, LogSink, NullSink};
use crate::jsonrpc::{self, Response, RpcError};
use crate::paths;
use crate::registry::{self, Registry};
use crate::session::{SessionGate, SessionState};
use crate::tools::{builtin_handlers, ToolContext};
use serde_json::{json, Map, Value};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "ibmcloud-mcp-server";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
const SERVER_DESCRIPTION: &str = "Read-mostly IBM Cloud CLI operations exposed as MCP tools";

const INSTRUCTIONS: &str = "\
Tools wrap the ibmcloud CLI. Call get_target first to see the active account and region. \
Listing tools accept optional filters (region, resource_group, service, vpc, org, space). \
execute_command runs any ibmcloud command without the leading 'ibmcloud'; safe_mode \
(default true) only permits read-only operations. Authentication uses IBMCLOUD_API_KEY \
from the environment or a .env file when the CLI is not already logged in.";

const REQUIRED_TOOLS: &[&str] = &["ibmcloud"];
const OPTIONAL_PLUGINS: &[&str] = &["vpc-infrastructure"];

pub struct Server {
    registry: Registry,
    backend: Arc<dyn Backend>,
    gate: SessionGate,
    journal: Arc<dyn LogSink>,
    command_timeout: Duration,
}

impl Server {
    pub fn new(registry: Registry, backend: Arc<dyn Backend>, gate: SessionGate) -> Self {
        Self {
            registry,
            backend,
            gate,
            journal: Arc::new(NullSink),
            command_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_journal(mut self, journal: Arc<dyn LogSink>) -> Self {
        self.journal = journal;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Wire up the real CLI backend, manifest, gate and journal.
    /// Every failure here is fatal: no tool can work without them.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ConfigError> {
        let cli = paths::find_executable(&config.cli_path)
            .ok_or_else(|| ConfigError::CliNotFound(config.cli_path.clone()))?;
        log::info!("ibmcloud CLI: {:?}", cli);

        let descriptors = registry::load_manifest(&config.tools_manifest)?;
        let registry = Registry::new(descriptors, builtin_handlers())?;
        log::info!("Loaded {} tools from {:?}", registry.len(), config.tools_manifest);

        let credentials = CredentialSource::new(
            &config.api_key_var,
            &config.region_var,
            Some(config.env_file.clone()),
        );
        let gate = SessionGate::new(credentials)
            .with_timeouts(config.command_timeout(), config.login_timeout())
            .with_cache(config.session_cache());

        Ok(Self::new(registry, Arc::new(CliBackend::new(cli)), gate)
            .with_journal(Arc::new(FileSink::new(&config.log_file)))
            .with_command_timeout(config.command_timeout()))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn journal(&self) -> Arc<dyn LogSink> {
        Arc::clone(&self.journal)
    }

    /// Run the session gate once and report the resulting state
    pub fn check_session(&self) -> Result<SessionState, AuthError> {
        self.gate.ensure(self.backend.as_ref(), self.journal.as_ref())?;
        Ok(self.gate.state())
    }

    /// Main loop, reads until EOF. Returns Err only when output fails.
    pub fn run<R: BufRead, W: Write>(&self, mut input: R, mut output: W) -> io::Result<()> {
        log::info!("Starting {} v{}", SERVER_NAME, SERVER_VERSION);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match input.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    log::error!("stdin read error: {}", e);
                    self.journal.record(&format!("STDIN ERROR | {}", e));
                    break;
                }
            }

            let response = match std::str::from_utf8(&buf) {
                Ok(line) => self.handle_line(line),
                Err(e) => Some(Response::err(Value::Null, RpcError::parse_error(e))),
            };

            if let Some(response) = response {
                write_response(&mut output, &response)?;
            }
        }
        log::info!("stdin closed, shutting down");
        self.journal.record("EOF | shutting down");
        Ok(())
    }

    /// Process one input line. None means nothing is written back.
    pub fn handle_line(&self, line: &str) -> Option<Response> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let request = match jsonrpc::decode(line) {
            Ok(r) => r,
            Err(response) => {
                let msg = response.error.as_ref().map(|e| e.message.as_str()).unwrap_or("");
                log::warn!("Rejected input: {}", msg);
                self.journal.record(&format!("INVALID | {} | {}", msg, truncate(line, 200)));
                return Some(response);
            }
        };

        self.journal.record(&format!("RECV {} id={}", request.method, request.id));

        if request.is_notification && request.method.starts_with("notifications/") {
            return None;
        }

        let outcome = match request.method.as_str() {
            "initialize" => Ok(self.initialize_result()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.tools_list_result()),
            "tools/call" => self.call_tool(&request.params),
            other => Err(RpcError::method_not_found(other)),
        };

        Some(match outcome {
            Ok(result) => Response::ok(request.id, result),
            Err(error) => Response::err(request.id, error),
        })
    }

    fn initialize_result(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": {
                "name": SERVER_NAME,
                "version": SERVER_VERSION,
                "description": SERVER_DESCRIPTION,
            },
            "capabilities": { "tools": { "listChanged": false } },
            "instructions": INSTRUCTIONS,
            "environment": {
                "required_tools": REQUIRED_TOOLS,
                "optional_plugins": OPTIONAL_PLUGINS,
            }
        })
    }

    fn tools_list_result(&self) -> Value {
        json!({ "tools": self.registry.descriptors() })
    }

    fn call_tool(&self, params: &Map<String, Value>) -> Result<Value, RpcError> {
        let name = match params.get("name") {
            Some(Value::String(n)) => n.as_str(),
            _ => return Err(RpcError::invalid_params("tools/call requires a string 'name'")),
        };
        let handler = self.registry.handler(name).ok_or_else(|| {
            self.journal.record(&format!("UNKNOWN TOOL {}", name));
            RpcError::tool_not_found(name)
        })?;
        let args = match params.get("arguments") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(a)) => a.clone(),
            Some(_) => return Err(RpcError::invalid_params("'arguments' must be an object")),
        };

        self.journal.record(&format!("CALL {} | {}", name, arg_summary(name, &args)));

        if handler.needs_session() {
            if let Err(e) = self.gate.ensure(self.backend.as_ref(), self.journal.as_ref()) {
                return Err(self.failed(name, e.to_string()));
            }
        }

        let ctx = ToolContext {
            backend: self.backend.as_ref(),
            journal: self.journal.as_ref(),
            timeout: self.command_timeout,
        };
        match handler.execute(&args, &ctx) {
            Ok(text) => {
                self.journal.record(&format!("OK {} ({} bytes)", name, text.len()));
                Ok(Value::String(text))
            }
            Err(e) => Err(self.failed(name, e.to_string())),
        }
    }

    fn failed(&self, name: &str, detail: String) -> RpcError {
        let snippet: String = mask_secrets(&detail).chars().take(200).collect();
        self.journal.record(&format!("FAIL {} | {}", name, snippet));
        RpcError::execution_failed(detail)
    }
}

/// Single write per response so a concurrent stdout lock holder never
/// observes half a line
fn write_response<W: Write>(out: &mut W, response: &Response) -> io::Result<()> {
    let mut line = response.to_line();
    line.push('\n');
    out.write_all(line.as_bytes())?;
    out.flush()
}

/// Exit cleanly on SIGINT/SIGTERM. Takes the stdout lock first so an
/// in-flight response line is finished before the process goes away.
pub fn install_signal_handler(journal: Arc<dyn LogSink>) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        let _stdout = io::stdout().lock();
        log::info!("Termination signal received, exiting");
        journal.record("SIGNAL | exiting");
        std::process::exit(0);
    })
}

// ============================================================================
// TESTS
// ============================================================================
