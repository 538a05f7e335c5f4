//! Mock server end-to-end tests: a real server on an ephemeral port,
//! exercised with a real HTTP client.

use mockoon_runtime::{EventSink, MockServer, ServerErrorCode, ServerEvent};
use mockoon_schema::Environment;
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

struct ChannelSink(mpsc::Sender<ServerEvent>);

impl EventSink for ChannelSink {
    fn emit(&mut self, event: ServerEvent) {
        let _ = self.0.send(event);
    }
}

struct Running {
    base: String,
    events: mpsc::Receiver<ServerEvent>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Running {
    fn start(env: serde_json::Value, base_dir: Option<PathBuf>, log_transaction: bool) -> Self {
        let env: Environment = serde_json::from_value(env).unwrap();
        let (tx, events) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = std::thread::spawn(move || {
            let server = MockServer::new(env, base_dir, log_transaction);
            let mut sink = ChannelSink(tx);
            server
                .run(&mut sink, &|| flag.load(Ordering::SeqCst))
                .unwrap();
        });
        let port = match events.recv_timeout(Duration::from_secs(5)).unwrap() {
            ServerEvent::Started { port, .. } => port,
            other => panic!("expected Started, got {other:?}"),
        };
        Running {
            base: format!("http://127.0.0.1:{port}"),
            events,
            stop,
            handle: Some(handle),
        }
    }

    fn transactions(&self) -> Vec<mockoon_runtime::Transaction> {
        self.events
            .try_iter()
            .filter_map(|e| match e {
                ServerEvent::TransactionComplete(t) => Some(t),
                _ => None,
            })
            .collect()
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

fn agent() -> ureq::Agent {
    ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .into()
}

fn environment(extra_routes: serde_json::Value) -> serde_json::Value {
    let mut routes = vec![
        json!({
            "method": "get",
            "endpoint": "users/:id",
            "responses": [{
                "statusCode": 200,
                "body": "{\"id\":1}",
                "headers": [{ "key": "X-Route", "value": "users" }]
            }]
        }),
        json!({
            "method": "post",
            "endpoint": "users",
            "responses": [{ "statusCode": 201, "body": "created" }]
        }),
    ];
    if let serde_json::Value::Array(more) = extra_routes {
        routes.extend(more);
    }
    json!({
        "lastMigration": 9,
        "name": "e2e",
        "port": 0,
        "hostname": "127.0.0.1",
        "endpointPrefix": "api",
        "headers": [{ "key": "Content-Type", "value": "application/json" }],
        "routes": routes
    })
}

#[test]
fn serves_matching_route_with_headers() {
    let server = Running::start(environment(json!([])), None, false);
    let mut resp = agent()
        .get(&format!("{}/api/users/7?x=1", server.base))
        .call()
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.headers().get("x-route").unwrap(), "users");
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/json"
    );
    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
    assert_eq!(resp.body_mut().read_to_string().unwrap(), "{\"id\":1}");
}

#[test]
fn unknown_route_is_404() {
    let server = Running::start(environment(json!([])), None, false);
    let mut resp = agent()
        .get(&format!("{}/users/7", server.base))
        .call()
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
    assert_eq!(
        resp.body_mut().read_to_string().unwrap(),
        "Cannot GET /users/7"
    );
}

#[test]
fn options_preflight_is_answered() {
    let server = Running::start(environment(json!([])), None, false);
    let resp = agent()
        .options(&format!("{}/api/anything", server.base))
        .call()
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert!(resp
        .headers()
        .get("access-control-allow-methods")
        .is_some());
}

#[test]
fn file_response_resolves_against_base_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("payload.txt"), "from disk").unwrap();
    let routes = json!([
        {
            "method": "get",
            "endpoint": "file",
            "responses": [{ "filePath": "payload.txt", "sendFileAsBody": true, "headers": [{ "key": "Content-Type", "value": "text/plain" }] }]
        },
        {
            "method": "get",
            "endpoint": "missing",
            "responses": [{ "filePath": "nope.txt" }]
        }
    ]);
    let server = Running::start(environment(routes), Some(dir.path().to_path_buf()), false);

    let mut resp = agent()
        .get(&format!("{}/api/file", server.base))
        .call()
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.body_mut().read_to_string().unwrap(), "from disk");

    let resp = agent()
        .get(&format!("{}/api/missing", server.base))
        .call()
        .unwrap();
    assert_eq!(resp.status().as_u16(), 500);

    std::thread::sleep(Duration::from_millis(50));
    let file_errors: Vec<_> = server
        .events
        .try_iter()
        .filter(|e| {
            matches!(
                e,
                ServerEvent::Error {
                    code: ServerErrorCode::RouteFileServingError,
                    ..
                }
            )
        })
        .collect();
    assert_eq!(file_errors.len(), 1);
}

#[test]
fn latency_delays_response() {
    let routes = json!([{
        "method": "get",
        "endpoint": "slow",
        "responses": [{ "latency": 200, "body": "late" }]
    }]);
    let server = Running::start(environment(routes), None, false);
    let started = Instant::now();
    let resp = agent()
        .get(&format!("{}/api/slow", server.base))
        .call()
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert!(started.elapsed() >= Duration::from_millis(200));
}

#[test]
fn transactions_carry_bodies_when_logging() {
    let server = Running::start(environment(json!([])), None, true);
    let resp = agent()
        .post(&format!("{}/api/users", server.base))
        .send("hello")
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);

    std::thread::sleep(Duration::from_millis(50));
    let transactions = server.transactions();
    assert_eq!(transactions.len(), 1);
    let t = &transactions[0];
    assert_eq!(t.to_string(), "POST /api/users | 201");
    assert_eq!(t.request_body.as_deref(), Some("hello"));
    assert_eq!(t.response_body.as_deref(), Some("created"));
}

#[test]
fn transactions_omit_bodies_by_default() {
    let server = Running::start(environment(json!([])), None, false);
    agent()
        .get(&format!("{}/api/users/1", server.base))
        .call()
        .unwrap();
    std::thread::sleep(Duration::from_millis(50));
    let transactions = server.transactions();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].request_body, None);
    assert_eq!(transactions[0].response_body, None);
}
