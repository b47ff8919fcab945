// IBM Cloud MCP Server - JSON-RPC 2.0 Envelope
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Request decoding and response encoding for line-delimited JSON-RPC.
// Decoding never panics: every malformed line maps to an error response.

use serde::Serialize;
use serde_json::{Map, Value};

pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None }
    }

    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn parse_error(detail: impl std::fmt::Display) -> Self {
        Self::new(PARSE_ERROR, format!("Parse error: {}", detail))
    }

    pub fn invalid_request(detail: impl std::fmt::Display) -> Self {
        Self::new(INVALID_REQUEST, format!("Invalid request: {}", detail))
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("Method not found: {}", method))
    }

    pub fn tool_not_found(tool: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("Tool not found: {}", tool))
    }

    pub fn invalid_params(detail: impl std::fmt::Display) -> Self {
        Self::new(INVALID_PARAMS, format!("Invalid params: {}", detail))
    }

    pub fn execution_failed(detail: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, "Tool execution failed").with_data(detail.into())
    }
}

/// Wire response. Field order gives `{"jsonrpc", "result"|"error", "id"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Value,
}

impl Response {
    pub fn ok(id: Value, result: Value) -> Self {
        Self { jsonrpc: JSONRPC_VERSION, result: Some(result), error: None, id }
    }

    pub fn err(id: Value, error: RpcError) -> Self {
        Self { jsonrpc: JSONRPC_VERSION, result: None, error: Some(error), id }
    }

    pub fn to_line(&self) -> String {
        // Serializing plain Values and strings cannot fail; keep a valid line regardless
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"jsonrpc":"2.0","error":{{"code":{},"message":"serialization failed: {}"}},"id":null}}"#,
                INTERNAL_ERROR,
                e.to_string().replace('"', "'")
            )
        })
    }
}

/// A decoded request envelope
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: String,
    /// Null when absent; see `is_notification`
    pub id: Value,
    pub params: Map<String, Value>,
    /// True when the `id` member was absent entirely
    pub is_notification: bool,
}

/// Decode one input line. On failure returns the error response to send.
pub fn decode(line: &str) -> Result<Request, Response> {
    let msg: Value = serde_json::from_str(line)
        .map_err(|e| Response::err(Value::Null, RpcError::parse_error(e)))?;

    let obj = match msg {
        Value::Object(obj) => obj,
        Value::Array(_) => {
            return Err(Response::err(Value::Null, RpcError::invalid_request("batch requests are not supported")))
        }
        _ => return Err(Response::err(Value::Null, RpcError::invalid_request("expected a JSON object"))),
    };

    // Recover the id first so later errors can echo it
    let is_notification = !obj.contains_key("id");
    let id = match obj.get("id") {
        None | Some(Value::Null) => Value::Null,
        Some(v @ (Value::String(_) | Value::Number(_))) => v.clone(),
        Some(_) => {
            return Err(Response::err(Value::Null, RpcError::invalid_request("id must be a string, number or null")))
        }
    };

    match obj.get("jsonrpc") {
        Some(Value::String(v)) if v == JSONRPC_VERSION => {}
        Some(_) => return Err(Response::err(id, RpcError::invalid_request("jsonrpc must be \"2.0\""))),
        None => return Err(Response::err(id, RpcError::invalid_request("missing jsonrpc"))),
    }

    let method = match obj.get("method") {
        Some(Value::String(m)) => m.clone(),
        Some(_) => return Err(Response::err(id, RpcError::invalid_request("method must be a string"))),
        None => return Err(Response::err(id, RpcError::invalid_request("missing method"))),
    };

    let params = match obj.get("params") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(p)) => p.clone(),
        Some(_) => return Err(Response::err(id, RpcError::invalid_params("params must be an object"))),
    };

    Ok(Request { method, id, params, is_notification })
}

// ============================================================================
// TESTS
// ============================================================================
