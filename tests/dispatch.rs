// IBM Cloud MCP Server - Dispatch Integration Tests
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Drives Server::run over in-memory stdin/stdout with a scripted backend.

use ibmcloud_mcp::backend::{Backend, CliOutput, Invocation};
use ibmcloud_mcp::credentials::CredentialSource;
use ibmcloud_mcp::error::BackendError;
use ibmcloud_mcp::journal::MemorySink;
use ibmcloud_mcp::mcp::Server;
use ibmcloud_mcp::registry::{parse_manifest, Registry};
use ibmcloud_mcp::session::SessionGate;
use ibmcloud_mcp::tools::builtin_handlers;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::{Arc, Mutex};

const MANIFEST: &str = include_str!("../tools.json");
const TARGET_JSON: &str = r#"{"account":"acct1","region":"us-south"}"#;

/// Answers by exact argv; anything unscripted fails with exit 1
#[derive(Default)]
struct ScriptedBackend {
    script: HashMap<String, CliOutput>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    fn new() -> Self {
        Self::default()
    }

    fn on(mut self, argv: &str, output: &str, exit_code: i32) -> Self {
        self.script.insert(argv.to_string(), CliOutput { output: output.to_string(), exit_code });
        self
    }

    fn logged_in() -> Self {
        Self::new().on("target --output json", TARGET_JSON, 0)
    }

    fn logged_out() -> Self {
        Self::new().on("target --output json", "FAILED\nNot logged in. Use 'ibmcloud login' to log in.", 1)
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Backend for ScriptedBackend {
    fn invoke(&self, inv: &Invocation) -> Result<CliOutput, BackendError> {
        let key = inv.display();
        self.calls.lock().unwrap().push(key.clone());
        Ok(self
            .script
            .get(&key)
            .cloned()
            .unwrap_or(CliOutput { output: format!("FAILED\n'{}' is not a registered command", key), exit_code: 1 }))
    }
}

struct Harness {
    server: Server,
    backend: Arc<ScriptedBackend>,
    journal: Arc<MemorySink>,
}

fn harness(backend: ScriptedBackend, key_var: &str) -> Harness {
    let registry = Registry::new(parse_manifest(MANIFEST).unwrap(), builtin_handlers()).unwrap();
    let gate = SessionGate::new(CredentialSource::new(key_var, "DISPATCH_TEST_NO_REGION", None));
    let backend = Arc::new(backend);
    let journal = Arc::new(MemorySink::new());
    let server = Server::new(registry, backend.clone(), gate).with_journal(journal.clone());
    Harness { server, backend, journal }
}

/// Feed lines through the loop, return raw output lines
fn exchange(h: &Harness, input: &str) -> Vec<String> {
    let mut out = Vec::new();
    h.server.run(Cursor::new(input.as_bytes().to_vec()), &mut out).unwrap();
    String::from_utf8(out).unwrap().lines().map(str::to_string).collect()
}

fn parsed(lines: &[String]) -> Vec<Value> {
    lines.iter().map(|l| serde_json::from_str(l).unwrap()).collect()
}

#[test]
fn get_target_end_to_end_exact_bytes() {
    let h = harness(ScriptedBackend::logged_in(), "DISPATCH_TEST_KEY_1");
    let out = exchange(&h, "{\"jsonrpc\":\"2.0\",\"method\":\"tools/call\",\"params\":{\"name\":\"get_target\"},\"id\":7}\n");
    assert_eq!(out, vec![r#"{"jsonrpc":"2.0","result":"{\"account\":\"acct1\",\"region\":\"us-south\"}","id":7}"#]);
    assert_eq!(h.backend.calls(), vec!["target --output json", "target --output json"]);
}

#[test]
fn get_target_without_login_fails_closed() {
    let h = harness(ScriptedBackend::logged_out(), "DISPATCH_TEST_KEY_2");
    let out = parsed(&exchange(&h, r#"{"jsonrpc":"2.0","method":"tools/call","params":{"name":"get_target"},"id":7}"#));
    assert_eq!(out.len(), 1);
    assert_eq!(out[0]["id"], 7);
    assert_eq!(out[0]["error"]["code"], -32603);
    assert!(out[0]["error"]["data"].as_str().unwrap().contains("Not logged in"));
    assert!(out[0].get("result").is_none());
    // Probe only: no login without a credential, main query never ran
    assert_eq!(h.backend.calls(), vec!["target --output json"]);
}

#[test]
fn execute_command_safe_mode_denies_writes() {
    let h = harness(ScriptedBackend::logged_in(), "DISPATCH_TEST_KEY_3");
    let out = parsed(&exchange(
        &h,
        r#"{"jsonrpc":"2.0","method":"tools/call","params":{"name":"execute_command","arguments":{"command":"resource service-instance-create x","safe_mode":true}},"id":"c1"}"#,
    ));
    assert_eq!(out[0]["id"], "c1");
    assert_eq!(out[0]["error"]["code"], -32603);
    let data = out[0]["error"]["data"].as_str().unwrap();
    assert!(data.contains("resource service-instance-create x"));
    assert!(data.contains("not allowed in safe mode"));
    assert!(!h.backend.calls().iter().any(|c| c.contains("service-instance-create")));
}

#[test]
fn execute_command_unsafe_returns_backend_output() {
    let backend = ScriptedBackend::logged_in().on("resource service-instance-create x", "Service instance x was created.", 0);
    let h = harness(backend, "DISPATCH_TEST_KEY_4");
    let out = parsed(&exchange(
        &h,
        r#"{"jsonrpc":"2.0","method":"tools/call","params":{"name":"execute_command","arguments":{"command":"resource service-instance-create x","safe_mode":false}},"id":2}"#,
    ));
    assert_eq!(out[0], json!({"jsonrpc": "2.0", "result": "Service instance x was created.", "id": 2}));
}

#[test]
fn execute_command_without_command_is_handler_error() {
    let h = harness(ScriptedBackend::logged_in(), "DISPATCH_TEST_KEY_5");
    let out = parsed(&exchange(
        &h,
        r#"{"jsonrpc":"2.0","method":"tools/call","params":{"name":"execute_command","arguments":{}},"id":3}"#,
    ));
    assert_eq!(out[0]["error"]["code"], -32603);
    assert_eq!(out[0]["error"]["data"], "No command provided");
}

#[test]
fn unknown_tool_is_not_found_with_name() {
    let h = harness(ScriptedBackend::logged_in(), "DISPATCH_TEST_KEY_6");
    let out = parsed(&exchange(
        &h,
        r#"{"jsonrpc":"2.0","method":"tools/call","params":{"name":"does_not_exist"},"id":4}"#,
    ));
    assert_eq!(out[0]["error"]["code"], -32601);
    assert!(out[0]["error"]["message"].as_str().unwrap().contains("does_not_exist"));
    assert!(h.backend.calls().is_empty());
}

#[test]
fn unknown_method_is_not_found() {
    let h = harness(ScriptedBackend::logged_in(), "DISPATCH_TEST_KEY_7");
    let out = parsed(&exchange(&h, r#"{"jsonrpc":"2.0","method":"resources/list","id":5}"#));
    assert_eq!(out[0]["error"]["code"], -32601);
    assert!(out[0]["error"]["message"].as_str().unwrap().contains("resources/list"));
}

#[test]
fn every_id_answered_exactly_once_in_order() {
    let h = harness(ScriptedBackend::logged_in(), "DISPATCH_TEST_KEY_8");
    let input = [
        r#"{"jsonrpc":"2.0","method":"initialize","params":{},"id":1}"#,
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        "",
        "this is not json",
        r#"{"jsonrpc":"2.0","method":"tools/list","id":"two"}"#,
        r#"{"jsonrpc":"2.0","method":"tools/call","params":{"name":"nope"},"id":3}"#,
        r#"{"method":"initialize","id":4}"#,
        r#"{"jsonrpc":"2.0","method":"tools/call","params":{"name":"get_target"},"id":5}"#,
        r#"{"jsonrpc":"2.0","method":"ping","id":6}"#,
    ]
    .join("\n");

    let out = parsed(&exchange(&h, &input));
    let ids: Vec<Value> = out.iter().map(|r| r["id"].clone()).collect();
    assert_eq!(ids, vec![json!(1), Value::Null, json!("two"), json!(3), json!(4), json!(5), json!(6)]);

    // The unparseable line is a parse error, the loop kept going
    assert_eq!(out[1]["error"]["code"], -32700);
    assert_eq!(out[4]["error"]["code"], -32600);
    assert_eq!(out[5]["result"], TARGET_JSON);
    for r in &out {
        assert_eq!(r["jsonrpc"], "2.0");
        assert!(r.get("result").is_some() != r.get("error").is_some());
    }
}

#[test]
fn invalid_utf8_line_is_parse_error() {
    let h = harness(ScriptedBackend::logged_in(), "DISPATCH_TEST_KEY_9");
    let mut input = b"{\"jsonrpc\":\"2.0\",\"method\":\"ping\",\"id\":\xff}\n".to_vec();
    input.extend_from_slice(b"{\"jsonrpc\":\"2.0\",\"method\":\"ping\",\"id\":2}\n");
    let mut out = Vec::new();
    h.server.run(Cursor::new(input), &mut out).unwrap();
    let lines: Vec<Value> = String::from_utf8(out).unwrap().lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["error"]["code"], -32700);
    assert_eq!(lines[0]["id"], Value::Null);
    assert_eq!(lines[1]["id"], 2);
}

#[test]
fn tools_list_matches_handler_table() {
    let h = harness(ScriptedBackend::logged_in(), "DISPATCH_TEST_KEY_10");
    let out = parsed(&exchange(&h, r#"{"jsonrpc":"2.0","method":"tools/list","id":1}"#));
    let listed: HashSet<String> = out[0]["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect();
    let handlers: HashSet<String> = builtin_handlers().iter().map(|h| h.name().to_string()).collect();
    assert_eq!(listed, handlers);

    let exec = out[0]["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["name"] == "execute_command")
        .unwrap();
    assert_eq!(exec["parameters"]["type"], "object");
    assert_eq!(exec["parameters"]["required"], json!(["command"]));
    assert_eq!(exec["parameters"]["properties"]["safe_mode"]["default"], true);
}

#[test]
fn read_only_methods_are_idempotent() {
    let h = harness(ScriptedBackend::logged_in(), "DISPATCH_TEST_KEY_11");
    let input = [
        r#"{"jsonrpc":"2.0","method":"initialize","id":1}"#,
        r#"{"jsonrpc":"2.0","method":"tools/list","id":2}"#,
        r#"{"jsonrpc":"2.0","method":"initialize","id":1}"#,
        r#"{"jsonrpc":"2.0","method":"tools/list","id":2}"#,
    ]
    .join("\n");
    let out = exchange(&h, &input);
    assert_eq!(out.len(), 4);
    assert_eq!(out[0], out[2]);
    assert_eq!(out[1], out[3]);
    assert!(h.backend.calls().is_empty(), "initialize/tools/list must not touch the backend");
}

#[test]
fn metadata_tool_skips_session_gate() {
    let backend = ScriptedBackend::logged_out().on("version", "ibmcloud 2.30.0+abc-2024-10-01T00:00:00+00:00", 0);
    let h = harness(backend, "DISPATCH_TEST_KEY_12");
    let out = parsed(&exchange(&h, r#"{"jsonrpc":"2.0","method":"tools/call","params":{"name":"get_version","arguments":null},"id":1}"#));
    assert_eq!(out[0]["result"], "ibmcloud 2.30.0+abc-2024-10-01T00:00:00+00:00");
    assert_eq!(h.backend.calls(), vec!["version"]);
}

#[test]
fn env_credential_logs_in_then_runs_tool() {
    std::env::set_var("DISPATCH_TEST_KEY_13", "envApiKeyValue123456");
    // target fails until login; scripted by swapping on the login call
    struct LoginFlow {
        inner: ScriptedBackend,
        logged_in: Mutex<bool>,
    }
    impl Backend for LoginFlow {
        fn invoke(&self, inv: &Invocation) -> Result<CliOutput, BackendError> {
            let key = inv.display();
            if key == "login --no-region" {
                let ok = inv.env.iter().any(|(k, v)| k == "IBMCLOUD_API_KEY" && v == "envApiKeyValue123456");
                *self.logged_in.lock().unwrap() = ok;
                self.inner.calls.lock().unwrap().push(key);
                return Ok(CliOutput { output: "OK".into(), exit_code: if ok { 0 } else { 1 } });
            }
            if key == "target --output json" && *self.logged_in.lock().unwrap() {
                self.inner.calls.lock().unwrap().push(key);
                return Ok(CliOutput { output: TARGET_JSON.into(), exit_code: 0 });
            }
            self.inner.invoke(inv)
        }
    }

    let backend = Arc::new(LoginFlow {
        inner: ScriptedBackend::logged_out().on("resource groups --output json", r#"[{"name":"default"}]"#, 0),
        logged_in: Mutex::new(false),
    });
    let registry = Registry::new(parse_manifest(MANIFEST).unwrap(), builtin_handlers()).unwrap();
    let gate = SessionGate::new(CredentialSource::new("DISPATCH_TEST_KEY_13", "DISPATCH_TEST_NO_REGION", None));
    let journal = Arc::new(MemorySink::new());
    let server = Server::new(registry, backend.clone(), gate).with_journal(journal.clone());

    let mut out = Vec::new();
    server
        .run(
            Cursor::new(r#"{"jsonrpc":"2.0","method":"tools/call","params":{"name":"list_resource_groups"},"id":1}"#),
            &mut out,
        )
        .unwrap();
    let resp: Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(resp["result"], r#"[{"name":"default"}]"#);
    assert_eq!(
        backend.inner.calls(),
        vec!["target --output json", "login --no-region", "target --output json", "resource groups --output json"]
    );
    assert!(journal.lines().iter().all(|l| !l.contains("envApiKeyValue123456")));
    std::env::remove_var("DISPATCH_TEST_KEY_13");
}

#[test]
fn journal_records_each_request() {
    let h = harness(ScriptedBackend::logged_in(), "DISPATCH_TEST_KEY_14");
    exchange(
        &h,
        "{\"jsonrpc\":\"2.0\",\"method\":\"tools/call\",\"params\":{\"name\":\"list_vpcs\",\"arguments\":{\"region\":\"eu-de\"}},\"id\":1}\n",
    );
    let lines = h.journal.lines();
    assert!(lines.iter().any(|l| l == "RECV tools/call id=1"));
    assert!(lines.iter().any(|l| l == r#"CALL list_vpcs | {"region":"eu-de"}"#));
    // Neither the retarget nor `is vpcs` is scripted
    assert!(lines.iter().any(|l| l.starts_with("RETARGET FAIL list_vpcs")));
    assert!(lines.iter().any(|l| l.starts_with("FAIL list_vpcs | Error listing VPCs:")));
    assert_eq!(lines.last().map(String::as_str), Some("EOF | shutting down"));
}

#[test]
fn api_key_in_command_never_reaches_journal() {
    let h = harness(ScriptedBackend::logged_in(), "DISPATCH_TEST_KEY_15");
    let out = parsed(&exchange(
        &h,
        r#"{"jsonrpc":"2.0","method":"tools/call","params":{"name":"execute_command","arguments":{"command":"login --apikey SUPERSECRETAPIKEY123","safe_mode":false}},"id":1}"#,
    ));
    // The client still sees its own command in the error
    assert!(out[0]["error"]["data"].as_str().unwrap().contains("login --apikey SUPERSECRETAPIKEY123"));

    let lines = h.journal.lines();
    assert!(lines.iter().any(|l| l.starts_with("CALL execute_command | cmd=login --apikey len=20")));
    assert!(lines.iter().any(|l| l.starts_with("FAIL execute_command |")));
    assert!(lines.iter().all(|l| !l.contains("SUPERSECRETAPIKEY123")), "{:#?}", lines);
}
