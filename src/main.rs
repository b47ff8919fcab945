// IBM Cloud MCP Server - Main Entry Point
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// CLI and MCP stdio server.
// Usage:
//   ibmcloud-mcp-server [serve]                  # Run MCP server (stdio)
//   ibmcloud-mcp-server tools                    # Print the validated tool manifest
//   ibmcloud-mcp-server status                   # Run the session gate, show state
//   ibmcloud-mcp-server check <command> [--unsafe]  # Evaluate the safe-mode filter

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ibmcloud_mcp::{config::ServerConfig, mcp, paths, safe_mode};
use std::io;
use std::path::PathBuf;

fn default_config_path() -> PathBuf {
    paths::server_root().join("config.json")
}

#[derive(Parser)]
#[command(name = "ibmcloud-mcp-server")]
#[command(author = "Joseph Stone")]
#[command(version)]
#[command(about = "IBM Cloud MCP Server - JSON-RPC tool gateway over the ibmcloud CLI")]
struct Cli {
    /// Server config file (JSON). Missing file = defaults.
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// ibmcloud binary (name on PATH or explicit path)
    #[arg(long)]
    cli: Option<String>,

    /// Tool manifest (tools.json)
    #[arg(long)]
    tools: Option<PathBuf>,

    /// dotenv file consulted for IBMCLOUD_API_KEY
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Command journal file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Per-command timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run MCP server (stdio JSON-RPC)
    Serve,

    /// Print the tool manifest after checking it against the handler table
    Tools,

    /// Check IBM Cloud authentication, logging in from IBMCLOUD_API_KEY if needed
    Status,

    /// Evaluate a command against the safe-mode filter; exits 1 when denied
    Check {
        /// Command as it would be passed to execute_command
        command: String,

        /// Evaluate with safe mode off
        #[arg(long = "unsafe")]
        unsafe_mode: bool,
    },
}

impl Cli {
    fn server_config(&self) -> Result<ServerConfig> {
        let mut config = ServerConfig::load(&self.config)
            .with_context(|| format!("Failed to load config {:?}", self.config))?;
        if let Some(cli) = &self.cli {
            config.cli_path = cli.clone();
        }
        if let Some(tools) = &self.tools {
            config.tools_manifest = tools.clone();
        }
        if let Some(env_file) = &self.env_file {
            config.env_file = env_file.clone();
        }
        if let Some(log_file) = &self.log_file {
            config.log_file = log_file.clone();
        }
        if let Some(timeout) = self.timeout {
            config.command_timeout_secs = timeout;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    // Logs go to stderr; stdout is JSON-RPC
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .try_init();

    let cli = Cli::parse();

    match &cli.command {
        None | Some(Commands::Serve) => {
            let config = cli.server_config()?;
            let server = mcp::Server::from_config(&config)
                .context("Startup failed")?;
            mcp::install_signal_handler(server.journal())
                .context("Failed to install signal handler")?;

            let stdin = io::stdin();
            if let Err(e) = server.run(stdin.lock(), io::stdout()) {
                // Client went away mid-write; nothing left to answer
                log::warn!("stdout closed: {}", e);
            }
        }

        Some(Commands::Tools) => {
            let config = cli.server_config()?;
            let server = mcp::Server::from_config(&config)
                .context("Startup failed")?;
            println!("{}", serde_json::to_string_pretty(server.registry().descriptors())?);
        }

        Some(Commands::Status) => {
            let config = cli.server_config()?;
            let server = mcp::Server::from_config(&config)
                .context("Startup failed")?;
            println!("{} v{}", mcp::SERVER_NAME, mcp::SERVER_VERSION);
            println!("CLI: {}", config.cli_path);
            println!("Tools: {} ({:?})", server.registry().len(), config.tools_manifest);
            println!();
            match server.check_session() {
                Ok(state) => {
                    println!("Session: {}", state.status_summary());
                    println!("{}", serde_json::to_string_pretty(&state)?);
                }
                Err(e) => {
                    println!("Session: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Some(Commands::Check { command, unsafe_mode }) => {
            let safe = !unsafe_mode;
            let allowed = safe_mode::is_allowed(command, safe);
            let decision = serde_json::json!({
                "command": command,
                "safe_mode": safe,
                "allowed": allowed,
                "matched": safe_mode::matching_keyword(command),
                "args": safe_mode::split_command(command),
            });
            println!("{}", serde_json::to_string_pretty(&decision)?);
            if !allowed {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
