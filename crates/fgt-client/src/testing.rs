//! Test utilities for fgt-client
//!
//! [`MockFortiGate`] serves the subset of the FortiOS REST API used by the
//! workflows. Devices are told apart by their bearer token, so one server
//! can stand in for a whole fleet.

use std::collections::{HashMap, VecDeque};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::config::ClientConfig;
use crate::error::{FgtError, Result};
use crate::prompt::Prompter;
use crate::FgtClient;

/// A test server that automatically shuts down when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Serve `router` on an ephemeral localhost port
    pub async fn start(router: Router) -> Result<Self> {
        // Bind to any available port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // Give server a moment to start
        tokio::time::sleep(Duration::from_millis(10)).await;

        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Client configuration that points device address `127.0.0.1` at this server
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::builder()
            .plain_http()
            .port(self.addr.port())
            .request_timeout_ms(5_000)
            .connect_timeout_ms(2_000)
            .build()
    }

    /// Client for the mock device registered under `token`
    pub fn client(&self, token: &str) -> Result<FgtClient> {
        FgtClient::new(Ipv4Addr::LOCALHOST, token, &self.client_config())
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

// =============================================================================
// Mock FortiGate
// =============================================================================

/// Behaviour of one mock device
#[derive(Debug, Clone)]
pub struct MockDevice {
    pub vdoms: Vec<String>,
    pub current_version: String,
    /// Raw entries of the firmware catalog's `available` list
    pub available: Vec<Value>,
    pub static_routes: Vec<(u64, String)>,
    pub backup_body: String,
    pub file_id: String,
    failures: HashMap<&'static str, u16>,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self {
            vdoms: vec!["root".to_string()],
            current_version: "v7.2.4".to_string(),
            available: Vec::new(),
            static_routes: Vec::new(),
            backup_body: "#config-version=FGT60F-7.2.4\nconfig system global\nend\n".to_string(),
            file_id: "fw-upload-1".to_string(),
            failures: HashMap::new(),
        }
    }
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vdoms<I, S>(mut self, vdoms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.vdoms = vdoms.into_iter().map(Into::into).collect();
        self
    }

    /// Offer complete GA candidates for the given versions
    pub fn offering(mut self, versions: &[&str]) -> Self {
        for (i, version) in versions.iter().enumerate() {
            self.available.push(json!({
                "version": version,
                "build": 1000 + i,
                "release-type": "GA",
                "maturity": "M",
            }));
        }
        self
    }

    pub fn with_route(mut self, seq_num: u64, dst: &str) -> Self {
        self.static_routes.push((seq_num, dst.to_string()));
        self
    }

    /// Make an endpoint answer with `status`
    ///
    /// Endpoints: `vdom`, `firmware`, `backup`, `upload`, `sdwan`, `routes`,
    /// `create_route`, `delete_route`.
    pub fn failing(mut self, endpoint: &'static str, status: u16) -> Self {
        self.failures.insert(endpoint, status);
        self
    }

    fn failure(&self, endpoint: &str) -> Option<Response> {
        self.failures.get(endpoint).map(|status| {
            let status = StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(json!({"status": "error", "http_status": status.as_u16()})))
                .into_response()
        })
    }
}

/// A request received by the mock
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub token: String,
    pub method: Method,
    /// Path below `/api/v2/`
    pub path: String,
    pub vdom: Option<String>,
    pub body: Option<Value>,
}

#[derive(Default)]
struct MockState {
    devices: Mutex<HashMap<String, MockDevice>>,
    calls: Mutex<Vec<RecordedCall>>,
}

/// In-process stand-in for a fleet of FortiGates
#[derive(Clone, Default)]
pub struct MockFortiGate {
    state: Arc<MockState>,
}

impl MockFortiGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device answering to `token`
    pub fn device(self, token: &str, device: MockDevice) -> Self {
        self.state.devices.lock().insert(token.to_string(), device);
        self
    }

    /// Current state of a device (routes change as the workflow runs)
    pub fn snapshot(&self, token: &str) -> Option<MockDevice> {
        self.state.devices.lock().get(token).cloned()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().clone()
    }

    pub fn calls_for(&self, token: &str) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| c.token == token).collect()
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/v2/cmdb/system/vdom", get(list_vdoms))
            .route("/api/v2/cmdb/system/sdwan", put(update_sdwan))
            .route(
                "/api/v2/cmdb/router/static",
                get(list_routes).post(create_route),
            )
            .route("/api/v2/cmdb/router/static/{seq}", delete(delete_route))
            .route("/api/v2/monitor/system/firmware", get(firmware))
            .route("/api/v2/monitor/system/firmware/upgrade", post(upload))
            .route("/api/v2/monitor/system/config/backup", post(backup))
            .with_state(self.state.clone())
    }

    /// Serve this mock on an ephemeral port
    pub async fn start(&self) -> Result<TestServer> {
        TestServer::start(self.router()).await
    }
}

type Shared = State<Arc<MockState>>;
type Params = Query<HashMap<String, String>>;

/// Record the call and resolve the device, or answer 401
fn authorize(
    state: &MockState,
    headers: &HeaderMap,
    method: Method,
    path: String,
    params: &HashMap<String, String>,
    body: &Bytes,
) -> std::result::Result<(String, MockDevice), Response> {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default()
        .to_string();

    state.calls.lock().push(RecordedCall {
        token: token.clone(),
        method,
        path,
        vdom: params.get("vdom").cloned(),
        body: serde_json::from_slice(body).ok(),
    });

    match state.devices.lock().get(&token) {
        Some(device) => Ok((token, device.clone())),
        None => Err((StatusCode::UNAUTHORIZED, "unknown token").into_response()),
    }
}

macro_rules! device_or_return {
    ($state:expr, $headers:expr, $method:expr, $path:expr, $params:expr, $body:expr, $endpoint:expr) => {
        match authorize(&$state, &$headers, $method, $path, &$params, &$body) {
            Ok((token, device)) => {
                if let Some(failure) = device.failure($endpoint) {
                    return failure;
                }
                (token, device)
            }
            Err(response) => return response,
        }
    };
}

async fn list_vdoms(State(state): Shared, headers: HeaderMap, Query(q): Params) -> Response {
    let (_, device) = device_or_return!(
        state, headers, Method::GET, "cmdb/system/vdom".into(), q, Bytes::new(), "vdom"
    );
    let results: Vec<Value> = device.vdoms.iter().map(|n| json!({"name": n})).collect();
    Json(json!({"http_method": "GET", "results": results, "status": "success"})).into_response()
}

async fn update_sdwan(
    State(state): Shared,
    headers: HeaderMap,
    Query(q): Params,
    body: Bytes,
) -> Response {
    device_or_return!(state, headers, Method::PUT, "cmdb/system/sdwan".into(), q, body, "sdwan");
    Json(json!({"http_method": "PUT", "status": "success"})).into_response()
}

async fn list_routes(State(state): Shared, headers: HeaderMap, Query(q): Params) -> Response {
    let (_, device) = device_or_return!(
        state, headers, Method::GET, "cmdb/router/static".into(), q, Bytes::new(), "routes"
    );
    let results: Vec<Value> = device
        .static_routes
        .iter()
        .map(|(seq, dst)| json!({"seq-num": seq, "dst": dst}))
        .collect();
    Json(json!({"http_method": "GET", "results": results, "status": "success"})).into_response()
}

async fn create_route(
    State(state): Shared,
    headers: HeaderMap,
    Query(q): Params,
    body: Bytes,
) -> Response {
    let (token, device) = device_or_return!(
        state, headers, Method::POST, "cmdb/router/static".into(), q, body, "create_route"
    );
    let dst = serde_json::from_slice::<Value>(&body)
        .ok()
        .and_then(|v| v["dst"].as_str().map(String::from))
        .unwrap_or_default();
    let seq = device.static_routes.iter().map(|(s, _)| *s).max().unwrap_or(0) + 1;
    if let Some(d) = state.devices.lock().get_mut(&token) {
        d.static_routes.push((seq, dst));
    }
    Json(json!({"http_method": "POST", "mkey": seq, "status": "success"})).into_response()
}

async fn delete_route(
    State(state): Shared,
    headers: HeaderMap,
    Path(seq): Path<u64>,
    Query(q): Params,
) -> Response {
    let (token, device) = device_or_return!(
        state, headers, Method::DELETE, format!("cmdb/router/static/{}", seq), q, Bytes::new(),
        "delete_route"
    );
    if !device.static_routes.iter().any(|(s, _)| *s == seq) {
        return (StatusCode::NOT_FOUND, Json(json!({"status": "error"}))).into_response();
    }
    if let Some(d) = state.devices.lock().get_mut(&token) {
        d.static_routes.retain(|(s, _)| *s != seq);
    }
    Json(json!({"http_method": "DELETE", "mkey": seq, "status": "success"})).into_response()
}

async fn firmware(State(state): Shared, headers: HeaderMap, Query(q): Params) -> Response {
    let (_, device) = device_or_return!(
        state, headers, Method::GET, "monitor/system/firmware".into(), q, Bytes::new(),
        "firmware"
    );
    Json(json!({
        "http_method": "GET",
        "results": {
            "current": {"version": device.current_version},
            "available": device.available,
        },
        "status": "success",
    }))
    .into_response()
}

async fn upload(
    State(state): Shared,
    headers: HeaderMap,
    Query(q): Params,
    body: Bytes,
) -> Response {
    let (_, device) = device_or_return!(
        state, headers, Method::POST, "monitor/system/firmware/upgrade".into(), q, body,
        "upload"
    );
    Json(json!({"status": "success", "file_id": device.file_id})).into_response()
}

async fn backup(
    State(state): Shared,
    headers: HeaderMap,
    Query(q): Params,
    body: Bytes,
) -> Response {
    let (_, device) = device_or_return!(
        state, headers, Method::POST, "monitor/system/config/backup".into(), q, body, "backup"
    );
    device.backup_body.into_response()
}

// =============================================================================
// Scripted Prompter
// =============================================================================

/// [`Prompter`] that replays canned answers and records what was shown
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    asked: Vec<String>,
    said: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Prompts shown, in order
    pub fn asked(&self) -> &[String] {
        &self.asked
    }

    /// Informational lines shown, in order
    pub fn said(&self) -> &[String] {
        &self.said
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, prompt: &str) -> Result<String> {
        self.asked.push(prompt.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| FgtError::input(format!("no scripted answer for '{}'", prompt)))
    }

    fn say(&mut self, line: &str) {
        self.said.push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_prompter_runs_dry() {
        let mut prompter = ScriptedPrompter::new(["one"]);
        assert_eq!(prompter.ask("first?").unwrap(), "one");
        assert!(prompter.ask("second?").is_err());
        assert_eq!(prompter.asked().len(), 2);
    }

    #[test]
    fn test_mock_device_offering() {
        let device = MockDevice::new().offering(&["v7.2.5", "v7.4.1"]);
        assert_eq!(device.available.len(), 2);
        assert_eq!(device.available[1]["version"], "v7.4.1");
        assert!(device.failure("firmware").is_none());
    }
}
