// IBM Cloud MCP Server - Tool Handlers
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// One handler per manifest entry. Read-only queries are data-driven
// (CliQuery); execute_command runs free-form commands behind safe mode.

use crate::backend::{Backend, Invocation};
use crate::error::ToolError;
use crate::journal::{mask_secrets, truncate, LogSink};
use crate::safe_mode;
use serde_json::{Map, Value};
use std::time::Duration;

/// Everything a handler may touch while running
pub struct ToolContext<'a> {
    pub backend: &'a dyn Backend,
    pub journal: &'a dyn LogSink,
    pub timeout: Duration,
}

pub trait ToolHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// False for pure-metadata tools that work without a login
    fn needs_session(&self) -> bool {
        true
    }

    fn execute(&self, args: &Map<String, Value>, ctx: &ToolContext<'_>) -> Result<String, ToolError>;
}

// ============================================================================
// ARGUMENT EXTRACTION
// Missing, null and blank values are "not provided"; wrong types are errors.
// ============================================================================

pub fn optional_str<'a>(args: &'a Map<String, Value>, name: &str) -> Result<Option<&'a str>, ToolError> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim())),
        Some(_) => Err(ToolError::InvalidArgument { name: name.to_string(), expected: "a string" }),
    }
}

pub fn optional_bool(args: &Map<String, Value>, name: &str) -> Result<Option<bool>, ToolError> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(ToolError::InvalidArgument { name: name.to_string(), expected: "a boolean" }),
    }
}

/// Run one CLI call; non-zero exit and invoker failures become `Error <action>: ...`
fn run_cli(ctx: &ToolContext<'_>, args: Vec<String>, action: &str) -> Result<String, ToolError> {
    let invocation = Invocation::new(args).timeout(ctx.timeout);
    match ctx.backend.invoke(&invocation) {
        Ok(out) if out.success() => Ok(out.output),
        Ok(out) => {
            let detail = if out.output.is_empty() {
                format!("command exited with code {}", out.exit_code)
            } else {
                out.output
            };
            Err(ToolError::Backend { action: action.to_string(), detail })
        }
        Err(e) => Err(ToolError::Backend { action: action.to_string(), detail: e.to_string() }),
    }
}

// ============================================================================
// RETARGETING
// ============================================================================

/// Optional `ibmcloud target` call issued before the main query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retarget {
    None,
    /// `region` argument -> `target -r <region>`
    Region,
    /// `org` / `space` arguments -> `target -o <org> -s <space>`
    OrgSpace,
}

impl Retarget {
    fn command(self, args: &Map<String, Value>) -> Result<Option<Vec<String>>, ToolError> {
        let pairs: &[(&str, &str)] = match self {
            Retarget::None => return Ok(None),
            Retarget::Region => &[("region", "-r")],
            Retarget::OrgSpace => &[("org", "-o"), ("space", "-s")],
        };
        let mut cmd = vec!["target".to_string()];
        for (arg, flag) in pairs {
            if let Some(value) = optional_str(args, arg)? {
                cmd.push(flag.to_string());
                cmd.push(value.to_string());
            }
        }
        Ok((cmd.len() > 1).then_some(cmd))
    }
}

// ============================================================================
// READ-ONLY QUERIES
// ============================================================================

/// A fixed CLI query with optional argument-driven flags
#[derive(Debug, Clone)]
pub struct CliQuery {
    name: &'static str,
    action: &'static str,
    command: &'static [&'static str],
    flags: Vec<(&'static str, &'static str)>,
    retarget: Retarget,
    needs_session: bool,
    wrap_key: Option<&'static str>,
}

impl CliQuery {
    pub fn new(name: &'static str, action: &'static str, command: &'static [&'static str]) -> Self {
        Self {
            name,
            action,
            command,
            flags: Vec::new(),
            retarget: Retarget::None,
            needs_session: true,
            wrap_key: None,
        }
    }

    /// Map a string argument onto a CLI flag when provided
    pub fn flag(mut self, arg: &'static str, flag: &'static str) -> Self {
        self.flags.push((arg, flag));
        self
    }

    pub fn retarget(mut self, retarget: Retarget) -> Self {
        self.retarget = retarget;
        self
    }

    pub fn without_session(mut self) -> Self {
        self.needs_session = false;
        self
    }

    /// Wrap plain-text output as `{"<key>": "<text>"}`
    pub fn wrap_output(mut self, key: &'static str) -> Self {
        self.wrap_key = Some(key);
        self
    }

    fn build_args(&self, args: &Map<String, Value>) -> Result<Vec<String>, ToolError> {
        let mut argv: Vec<String> = self.command.iter().map(|s| s.to_string()).collect();
        for (arg, flag) in &self.flags {
            if let Some(value) = optional_str(args, arg)? {
                argv.push(flag.to_string());
                argv.push(value.to_string());
            }
        }
        Ok(argv)
    }
}

impl ToolHandler for CliQuery {
    fn name(&self) -> &'static str {
        self.name
    }

    fn needs_session(&self) -> bool {
        self.needs_session
    }

    fn execute(&self, args: &Map<String, Value>, ctx: &ToolContext<'_>) -> Result<String, ToolError> {
        // Validate everything before touching the backend
        let retarget = self.retarget.command(args)?;
        let argv = self.build_args(args)?;

        if let Some(cmd) = retarget {
            // Best effort: a failed retarget is logged, the query still runs
            if let Err(e) = run_cli(ctx, cmd.clone(), "retargeting") {
                log::warn!("{}: {}", self.name, e);
                ctx.journal.record(&format!("RETARGET FAIL {} | {} | {}", self.name, cmd.join(" "), truncate(&e.to_string(), 200)));
            }
        }

        let output = run_cli(ctx, argv, self.action)?;
        Ok(match self.wrap_key {
            Some(key) => {
                let mut envelope = Map::new();
                envelope.insert(key.to_string(), Value::String(output));
                Value::Object(envelope).to_string()
            }
            None => output,
        })
    }
}

// ============================================================================
// EXECUTE COMMAND: free-form, gated by safe mode
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ExecuteCommand;

impl ToolHandler for ExecuteCommand {
    fn name(&self) -> &'static str {
        "execute_command"
    }

    fn execute(&self, args: &Map<String, Value>, ctx: &ToolContext<'_>) -> Result<String, ToolError> {
        let command = optional_str(args, "command")?.ok_or(ToolError::NoCommand)?;
        let safe_mode = optional_bool(args, "safe_mode")?.unwrap_or(true);

        // Filter sees the raw string, before any splitting
        if !safe_mode::is_allowed(command, safe_mode) {
            ctx.journal.record(&format!("SAFE MODE DENY | {}", truncate(&mask_secrets(command), 200)));
            return Err(ToolError::SafeModeDenied(command.to_string()));
        }

        let argv = safe_mode::split_command(command);
        run_cli(ctx, argv, &format!("executing command '{}'", command))
    }
}

/// The compiled handler table. Must match tools.json one-to-one.
pub fn builtin_handlers() -> Vec<Box<dyn ToolHandler>> {
    vec![
        Box::new(CliQuery::new("get_target", "getting target", &["target", "--output", "json"])),
        Box::new(CliQuery::new("list_regions", "listing regions", &["regions", "--output", "json"])),
        Box::new(CliQuery::new(
            "list_resource_groups",
            "listing resource groups",
            &["resource", "groups", "--output", "json"],
        )),
        Box::new(
            CliQuery::new(
                "list_resources",
                "listing resources",
                &["resource", "service-instances", "--output", "json"],
            )
            .flag("resource_group", "-g")
            .flag("service", "--service-name"),
        ),
        Box::new(
            CliQuery::new("list_vpcs", "listing VPCs", &["is", "vpcs", "--output", "json"])
                .retarget(Retarget::Region),
        ),
        Box::new(
            CliQuery::new("list_vpc_instances", "listing VPC instances", &["is", "instances", "--output", "json"])
                .retarget(Retarget::Region)
                .flag("vpc", "--vpc"),
        ),
        Box::new(
            CliQuery::new("list_cf_apps", "listing Cloud Foundry apps", &["cf", "apps"])
                .retarget(Retarget::OrgSpace)
                .wrap_output("apps"),
        ),
        Box::new(
            CliQuery::new("list_plugins", "listing plugins", &["plugin", "list", "--output", "json"])
                .without_session(),
        ),
        Box::new(CliQuery::new("get_version", "getting CLI version", &["version"]).without_session()),
        Box::new(ExecuteCommand),
    ]
}

// ============================================================================
// TESTS
// ============================================================================
