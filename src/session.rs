// IBM Cloud MCP Server - Session Gate
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Runs before every backend-touching tool call.
// Probe -> (credential -> login -> re-probe) -> allow or fail closed.
// Held behind a mutex so concurrent callers never race a login.
// Negative results are never cached.

use crate::backend::{Backend, Invocation};
use crate::credentials::CredentialSource;
use crate::error::AuthError;
use crate::journal::{redact, truncate, LogSink};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Zero-argument status query; exit 0 means a usable session
pub const PROBE_ARGS: &[&str] = &["target", "--output", "json"];

/// Process-wide session status, re-derived by probing
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionState {
    pub authenticated: bool,
    pub last_checked: Option<DateTime<Utc>>,
    pub login_attempts: u64,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status summary string
    pub fn status_summary(&self) -> String {
        let checked = self
            .last_checked
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "Never".to_string());
        format!(
            "Authenticated: {} | Last checked: {} | Login attempts: {}",
            self.authenticated, checked, self.login_attempts
        )
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        if !self.authenticated || ttl.is_zero() {
            return false;
        }
        match (self.last_checked, chrono::Duration::from_std(ttl)) {
            (Some(at), Ok(ttl)) => Utc::now() - at < ttl,
            _ => false,
        }
    }
}

pub struct SessionGate {
    credentials: CredentialSource,
    probe_timeout: Duration,
    login_timeout: Duration,
    cache_ttl: Duration,
    state: Mutex<SessionState>,
}

impl SessionGate {
    pub fn new(credentials: CredentialSource) -> Self {
        Self {
            credentials,
            probe_timeout: Duration::from_secs(30),
            login_timeout: Duration::from_secs(90),
            cache_ttl: Duration::ZERO,
            state: Mutex::new(SessionState::new()),
        }
    }

    pub fn with_timeouts(mut self, probe: Duration, login: Duration) -> Self {
        self.probe_timeout = probe;
        self.login_timeout = login;
        self
    }

    /// Trust a successful probe for `ttl`. Zero disables caching.
    pub fn with_cache(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn state(&self) -> SessionState {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        // A panic mid-check leaves only a stale boolean behind
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make sure the backend is authenticated, logging in if a credential exists.
    pub fn ensure(&self, backend: &dyn Backend, journal: &dyn LogSink) -> Result<(), AuthError> {
        let mut state = self.lock();

        if state.is_fresh(self.cache_ttl) {
            return Ok(());
        }

        // Step 1: already logged in?
        let first_probe = self.probe(backend);
        state.last_checked = Some(Utc::now());
        let probe_detail = match first_probe {
            Ok(()) => {
                state.authenticated = true;
                return Ok(());
            }
            Err(detail) => detail,
        };
        state.authenticated = false;
        journal.record(&format!("AUTH probe failed | {}", truncate(&probe_detail, 200)));

        // Step 2: find a credential
        let Some(credential) = self.credentials.api_key() else {
            let reason = self.credentials.describe();
            journal.record(&format!("AUTH no credential | {}", reason));
            return Err(AuthError::NotLoggedIn(format!("{}; {}", probe_detail, reason)));
        };
        journal.record(&format!(
            "AUTH login with key from {} ({})",
            credential.origin,
            redact(&credential.value)
        ));

        // Step 3: non-interactive login, key passed via the child's environment
        let mut args = vec!["login".to_string()];
        match self.credentials.region() {
            Some(region) => args.extend(["-r".to_string(), region]),
            None => args.push("--no-region".to_string()),
        }
        let login = Invocation::new(args)
            .env("IBMCLOUD_API_KEY", &credential.value)
            .timeout(self.login_timeout);
        state.login_attempts += 1;
        let login_detail = match backend.invoke(&login) {
            Ok(out) if out.success() => None,
            Ok(out) => Some(out.output),
            Err(e) => Some(e.to_string()),
        };
        if let Some(detail) = &login_detail {
            journal.record(&format!("AUTH login failed | {}", truncate(detail, 200)));
        }

        // Step 4: re-probe, fail closed
        let second_probe = self.probe(backend);
        state.last_checked = Some(Utc::now());
        match second_probe {
            Ok(()) => {
                state.authenticated = true;
                journal.record("AUTH login succeeded");
                Ok(())
            }
            Err(detail) => {
                let detail = login_detail.unwrap_or(detail);
                Err(AuthError::NotLoggedIn(format!("login failed: {}", detail)))
            }
        }
    }

    fn probe(&self, backend: &dyn Backend) -> Result<(), String> {
        let probe = Invocation::new(PROBE_ARGS.iter().copied()).timeout(self.probe_timeout);
        match backend.invoke(&probe) {
            Ok(out) if out.success() => Ok(()),
            Ok(out) if out.output.is_empty() => Err(format!("status check exited with code {}", out.exit_code)),
            Ok(out) => Err(out.output),
            Err(e) => Err(e.to_string()),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
