// IBM Cloud MCP Server - Backend Invoker
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Runs the ibmcloud CLI as a subprocess. Arguments are passed as a discrete
// argv (no shell), stdin is closed so the CLI can never wait for input,
// stdout+stderr are combined, and every call is bounded by a timeout.

use crate::error::BackendError;
use crate::journal::mask_secrets;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Poll interval while waiting on a child process
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Minimum wait for pipe EOF after the child exits, even past the deadline
const DRAIN_GRACE: Duration = Duration::from_millis(100);

/// Environment applied to every CLI call so output stays machine-readable
const BASE_ENV: &[(&str, &str)] = &[
    ("IBMCLOUD_COLOR", "false"),
    ("IBMCLOUD_VERSION_CHECK", "false"),
];

/// One CLI call: argv after the program name, env overrides, deadline
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
}

impl Invocation {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            env: Vec::new(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Space-joined argv for logs. Env values are never included.
    pub fn display(&self) -> String {
        self.args.join(" ")
    }
}

/// Combined output and exit status of a finished CLI call
#[derive(Debug, Clone, PartialEq)]
pub struct CliOutput {
    pub output: String,
    pub exit_code: i32,
}

impl CliOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Anything that can run a CLI invocation. Tests substitute a scripted fake.
pub trait Backend: Send + Sync {
    fn invoke(&self, invocation: &Invocation) -> Result<CliOutput, BackendError>;
}

/// Real subprocess backend
#[derive(Debug, Clone)]
pub struct CliBackend {
    program: PathBuf,
}

impl CliBackend {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }

    pub fn program(&self) -> &std::path::Path {
        &self.program
    }
}

impl Backend for CliBackend {
    fn invoke(&self, invocation: &Invocation) -> Result<CliOutput, BackendError> {
        let mut child = Command::new(&self.program)
            .args(&invocation.args)
            .envs(BASE_ENV.iter().copied())
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| BackendError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        // Drain both pipes on their own threads so a chatty child never
        // blocks on a full pipe while we poll for exit. A grandchild may keep
        // a pipe open after the child exits; collection is bounded by the
        // same deadline and keeps whatever arrived.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let deadline = Instant::now() + invocation.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                log::warn!(
                    "ibmcloud {} killed after {}s",
                    mask_secrets(&invocation.display()),
                    invocation.timeout.as_secs()
                );
                return Err(BackendError::Timeout(invocation.timeout));
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stdout = collect(stdout, deadline);
        let stderr = collect(stderr, deadline);

        Ok(CliOutput {
            output: combine(&stdout, &stderr),
            exit_code: status.code().unwrap_or(-1),
        })
    }
}

/// Pipe contents accumulated so far, plus an EOF signal
struct Drain {
    buf: Arc<Mutex<Vec<u8>>>,
    done: Receiver<()>,
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> Drain {
    let buf = Arc::new(Mutex::new(Vec::new()));
    let (tx, done) = mpsc::channel();
    let sink = Arc::clone(&buf);
    thread::spawn(move || {
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if let Ok(mut b) = sink.lock() {
                        b.extend_from_slice(&chunk[..n]);
                    }
                }
            }
        }
        let _ = tx.send(());
    });
    Drain { buf, done }
}

fn collect(drain: Option<Drain>, deadline: Instant) -> String {
    let Some(drain) = drain else {
        return String::new();
    };
    let wait = deadline.saturating_duration_since(Instant::now()).max(DRAIN_GRACE);
    if drain.done.recv_timeout(wait).is_err() {
        log::warn!("output pipe still open after command exit, keeping partial output");
    }
    let bytes = drain.buf.lock().map(|b| b.clone()).unwrap_or_default();
    String::from_utf8_lossy(&bytes).to_string()
}

/// stdout first, then stderr, trailing whitespace trimmed
fn combine(stdout: &str, stderr: &str) -> String {
    let stdout = stdout.trim_end();
    let stderr = stderr.trim_end();
    match (stdout.is_empty(), stderr.is_empty()) {
        (_, true) => stdout.to_string(),
        (true, false) => stderr.to_string(),
        (false, false) => format!("{}\n{}", stdout, stderr),
    }
}

// ============================================================================
// TESTS
// ============================================================================
