#![allow(dead_code)]

use std::io::Read;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;

use serde_json::Value;
use tiny_http::{Header, Response, Server, StatusCode};

use house_wallet_adapters::WalletAdapterConfig;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub http_method: String,
    pub url: String,
    pub body: Value,
}

impl RecordedCall {
    /// JSON-RPC `method`, empty for non-RPC requests.
    pub fn rpc_method(&self) -> &str {
        self.body.get("method").and_then(Value::as_str).unwrap_or("")
    }

    pub fn params(&self) -> &Value {
        self.body.get("params").unwrap_or(&Value::Null)
    }
}

pub struct MockServer {
    pub url: String,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockServer {
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls").clone()
    }

    pub fn rpc_methods(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|c| c.rpc_method().to_owned())
            .collect()
    }
}

/// Serve every request with `handler` on a background thread.
pub fn spawn_mock<F>(handler: F) -> MockServer
where
    F: Fn(&RecordedCall) -> (u16, Value) + Send + 'static,
{
    let server = Server::http("127.0.0.1:0").expect("start server");
    let url = format!("http://{}", server.server_addr());
    let calls = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&calls);

    thread::spawn(move || {
        for mut req in server.incoming_requests() {
            let mut raw = String::new();
            let _ = req.as_reader().read_to_string(&mut raw);
            let call = RecordedCall {
                http_method: req.method().to_string(),
                url: req.url().to_owned(),
                body: serde_json::from_str(&raw).unwrap_or(Value::Null),
            };
            let (code, payload) = handler(&call);
            if let Ok(mut g) = recorded.lock() {
                g.push(call);
            }

            let header = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                .expect("content type header");
            let response = Response::from_string(payload.to_string())
                .with_status_code(StatusCode(code))
                .with_header(header);
            let _ = req.respond(response);
        }
    });

    MockServer { url, calls }
}

/// JSON-RPC success envelope echoing the request id.
pub fn rpc_result(call: &RecordedCall, result: Value) -> (u16, Value) {
    (
        200,
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": call.body.get("id").cloned().unwrap_or(Value::Null),
            "result": result,
        }),
    )
}

pub fn rpc_error(call: &RecordedCall, code: i64, message: &str) -> (u16, Value) {
    (
        200,
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": call.body.get("id").cloned().unwrap_or(Value::Null),
            "error": { "code": code, "message": message },
        }),
    )
}

pub fn test_config() -> WalletAdapterConfig {
    WalletAdapterConfig {
        rpc_timeout_ms: 5_000,
        price_timeout_ms: 5_000,
        ..WalletAdapterConfig::default()
    }
}

pub fn temp_path(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "house-wallet-{}-{name}.json",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);
    path
}
