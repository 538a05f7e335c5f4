//! Minimal mock HTTP engine serving one environment.
//!
//! Responses are static: the first response of the matched route, with its
//! status, headers and body (or file). Rules, templating and proxying are
//! not evaluated.

use crate::routes::RouteTable;
use crate::RuntimeError;
use mockoon_schema::{Environment, Header as EnvHeader, RouteResponse};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tiny_http::{Header, Method, Request, Response, Server, SslConfig, StatusCode};
use tracing::debug;

const RECV_TIMEOUT: Duration = Duration::from_millis(100);

const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    (
        "Access-Control-Allow-Methods",
        "GET,POST,PUT,PATCH,DELETE,HEAD,OPTIONS",
    ),
    (
        "Access-Control-Allow-Headers",
        "Content-Type, Origin, Accept, Authorization, Content-Length, X-Requested-With",
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerErrorCode {
    PortAlreadyUsed,
    PortInvalid,
    TlsConfig,
    UnknownServerError,
    RequestBodyParse,
    RouteFileServingError,
    RouteServingError,
}

impl ServerErrorCode {
    /// Fatal codes abort the server run.
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            ServerErrorCode::PortAlreadyUsed
                | ServerErrorCode::PortInvalid
                | ServerErrorCode::TlsConfig
                | ServerErrorCode::UnknownServerError
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ServerErrorCode::PortAlreadyUsed => "PORT_ALREADY_USED",
            ServerErrorCode::PortInvalid => "PORT_INVALID",
            ServerErrorCode::TlsConfig => "TLS_CONFIG",
            ServerErrorCode::UnknownServerError => "UNKNOWN_SERVER_ERROR",
            ServerErrorCode::RequestBodyParse => "REQUEST_BODY_PARSE",
            ServerErrorCode::RouteFileServingError => "ROUTE_FILE_SERVING_ERROR",
            ServerErrorCode::RouteServingError => "ROUTE_SERVING_ERROR",
        }
    }
}

impl fmt::Display for ServerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub method: String,
    pub path: String,
    pub status: u16,
    pub proxied: bool,
    /// Request and response bodies, captured only with transaction logging on.
    pub request_body: Option<String>,
    pub response_body: Option<String>,
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} | {}", self.method, self.path, self.status)?;
        if self.proxied {
            write!(f, " | proxied")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    Started {
        protocol: &'static str,
        hostname: String,
        port: u16,
    },
    Stopped,
    Error {
        code: ServerErrorCode,
        message: String,
    },
    TransactionComplete(Transaction),
}

pub trait EventSink {
    fn emit(&mut self, event: ServerEvent);
}

impl EventSink for Vec<ServerEvent> {
    fn emit(&mut self, event: ServerEvent) {
        self.push(event);
    }
}

pub struct MockServer {
    env: Environment,
    base_dir: Option<PathBuf>,
    log_transaction: bool,
    routes: RouteTable,
}

impl MockServer {
    pub fn new(env: Environment, base_dir: Option<PathBuf>, log_transaction: bool) -> Self {
        let routes = RouteTable::new(&env);
        Self {
            env,
            base_dir,
            log_transaction,
            routes,
        }
    }

    /// Bind and serve until `should_stop` returns true.
    ///
    /// Fatal errors are emitted as [`ServerEvent::Error`] and returned;
    /// per-request errors are emitted and serving continues.
    pub fn run(
        &self,
        sink: &mut dyn EventSink,
        should_stop: &dyn Fn() -> bool,
    ) -> Result<(), RuntimeError> {
        let server = match self.bind() {
            Ok(server) => server,
            Err((code, message)) => return Err(fatal(sink, code, message)),
        };

        let port = server
            .server_addr()
            .to_ip()
            .map_or(0, |addr| addr.port());
        sink.emit(ServerEvent::Started {
            protocol: self.env.protocol(),
            hostname: self.env.hostname.clone(),
            port,
        });

        while !should_stop() {
            match server.recv_timeout(RECV_TIMEOUT) {
                Ok(Some(request)) => self.handle(request, sink),
                Ok(None) => {}
                Err(e) => {
                    return Err(fatal(
                        sink,
                        ServerErrorCode::UnknownServerError,
                        e.to_string(),
                    ))
                }
            }
        }

        drop(server);
        sink.emit(ServerEvent::Stopped);
        Ok(())
    }

    fn bind(&self) -> Result<Server, (ServerErrorCode, String)> {
        let Some(port) = self.env.tcp_port() else {
            return Err((
                ServerErrorCode::PortInvalid,
                format!("Port \"{}\" is invalid", self.env.port),
            ));
        };
        let host = &self.env.hostname;
        let addr = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]:{port}")
        } else {
            format!("{host}:{port}")
        };

        let bound = if self.env.tls_options.enabled {
            let ssl = self.tls_config()?;
            Server::https(addr.as_str(), ssl)
        } else {
            Server::http(addr.as_str())
        };

        bound.map_err(|e| {
            let code = match e.downcast_ref::<std::io::Error>().map(std::io::Error::kind) {
                Some(std::io::ErrorKind::AddrInUse) => ServerErrorCode::PortAlreadyUsed,
                Some(std::io::ErrorKind::PermissionDenied) => ServerErrorCode::PortInvalid,
                _ => ServerErrorCode::UnknownServerError,
            };
            let message = match code {
                ServerErrorCode::PortAlreadyUsed => format!("Port \"{port}\" is already in use"),
                ServerErrorCode::PortInvalid => format!("Port \"{port}\" is invalid: {e}"),
                _ => format!("cannot listen on {addr}: {e}"),
            };
            (code, message)
        })
    }

    fn tls_config(&self) -> Result<SslConfig, (ServerErrorCode, String)> {
        let tls = &self.env.tls_options;
        if !tls.pfx_path.is_empty() && tls.cert_path.is_empty() {
            return Err((
                ServerErrorCode::TlsConfig,
                "PFX certificates are not supported; set certPath and keyPath".to_owned(),
            ));
        }
        if tls.cert_path.is_empty() || tls.key_path.is_empty() {
            return Err((
                ServerErrorCode::TlsConfig,
                "TLS is enabled but certPath or keyPath is empty".to_owned(),
            ));
        }
        let read = |p: &str| {
            let path = self.resolve_path(p);
            std::fs::read(&path).map_err(|e| {
                (
                    ServerErrorCode::TlsConfig,
                    format!("cannot read {}: {e}", path.display()),
                )
            })
        };
        Ok(SslConfig {
            certificate: read(&tls.cert_path)?,
            private_key: read(&tls.key_path)?,
        })
    }

    fn resolve_path(&self, p: &str) -> PathBuf {
        let path = Path::new(p);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    fn handle(&self, mut request: Request, sink: &mut dyn EventSink) {
        let method = request.method().to_string().to_uppercase();
        let url = request.url().to_owned();
        let path = url.split(['?', '#']).next().unwrap_or("/").to_owned();
        debug!("{method} {url}");

        let mut request_body = String::new();
        if let Err(e) = request.as_reader().read_to_string(&mut request_body) {
            sink.emit(ServerEvent::Error {
                code: ServerErrorCode::RequestBodyParse,
                message: format!("{method} {path}: {e}"),
            });
            request_body.clear();
        }

        let (status, headers, body) = if self.env.cors && *request.method() == Method::Options {
            (200, self.base_headers(&[]), Vec::new())
        } else if let Some(route) = self.routes.find(&self.env, &method, &path) {
            match route.responses.first() {
                Some(response) => self.render(response, &method, &path, sink),
                None => (
                    404,
                    self.base_headers(&[]),
                    format!("Cannot {method} {path}").into_bytes(),
                ),
            }
        } else {
            (
                404,
                self.base_headers(&[]),
                format!("Cannot {method} {path}").into_bytes(),
            )
        };

        let response_body = self
            .log_transaction
            .then(|| String::from_utf8_lossy(&body).into_owned());
        let mut response = Response::from_data(body).with_status_code(StatusCode(status));
        for (key, value) in &headers {
            match Header::from_bytes(key.as_bytes(), value.as_bytes()) {
                Ok(h) => response.add_header(h),
                Err(()) => sink.emit(ServerEvent::Error {
                    code: ServerErrorCode::RouteServingError,
                    message: format!("invalid header '{key}' on {method} {path}"),
                }),
            }
        }

        if let Err(e) = request.respond(response) {
            sink.emit(ServerEvent::Error {
                code: ServerErrorCode::RouteServingError,
                message: format!("{method} {path}: {e}"),
            });
        }

        sink.emit(ServerEvent::TransactionComplete(Transaction {
            method,
            path,
            status,
            proxied: false,
            request_body: self.log_transaction.then_some(request_body),
            response_body,
        }));
    }

    fn render(
        &self,
        response: &RouteResponse,
        method: &str,
        path: &str,
        sink: &mut dyn EventSink,
    ) -> (u16, Vec<(String, String)>, Vec<u8>) {
        let delay = self.env.latency + response.latency;
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }

        let mut headers = self.base_headers(&response.headers);
        if response.file_path.is_empty() {
            return (response.status_code, headers, response.body.clone().into_bytes());
        }

        let file = self.resolve_path(&response.file_path);
        match std::fs::read(&file) {
            Ok(content) => {
                if !has_header(&headers, "Content-Type") {
                    if let Some(mime) = mime_for(&file) {
                        headers.push(("Content-Type".to_owned(), mime.to_owned()));
                    }
                }
                if !response.send_file_as_body {
                    if let Some(name) = file.file_name().and_then(|n| n.to_str()) {
                        headers.push((
                            "Content-Disposition".to_owned(),
                            format!("inline; filename=\"{name}\""),
                        ));
                    }
                }
                (response.status_code, headers, content)
            }
            Err(e) => {
                let message = format!(
                    "Error while serving the file content for {method} {path}: {} ({e})",
                    file.display()
                );
                sink.emit(ServerEvent::Error {
                    code: ServerErrorCode::RouteFileServingError,
                    message: message.clone(),
                });
                (500, headers, message.into_bytes())
            }
        }
    }

    /// Environment headers, overridden by route headers, then CORS headers.
    fn base_headers(&self, route_headers: &[EnvHeader]) -> Vec<(String, String)> {
        let mut headers: Vec<(String, String)> = Vec::new();
        for h in self.env.headers.iter().chain(route_headers) {
            if h.key.is_empty() {
                continue;
            }
            headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&h.key));
            headers.push((h.key.clone(), h.value.clone()));
        }
        if self.env.cors {
            for (key, value) in CORS_HEADERS {
                if !has_header(&headers, key) {
                    headers.push((key.to_owned(), value.to_owned()));
                }
            }
        }
        headers
    }
}

fn has_header(headers: &[(String, String)], key: &str) -> bool {
    headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(key))
}

fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    Some(match ext.as_str() {
        "json" => "application/json",
        "html" | "htm" => "text/html",
        "txt" => "text/plain",
        "xml" => "application/xml",
        "csv" => "text/csv",
        "css" => "text/css",
        "js" => "application/javascript",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        _ => return None,
    })
}

fn fatal(sink: &mut dyn EventSink, code: ServerErrorCode, message: String) -> RuntimeError {
    sink.emit(ServerEvent::Error {
        code,
        message: message.clone(),
    });
    RuntimeError::Server { code, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(port: i64) -> Environment {
        serde_json::from_value(json!({
            "lastMigration": 9,
            "name": "unit",
            "port": port,
            "hostname": "127.0.0.1",
            "headers": [{ "key": "Content-Type", "value": "application/json" }],
            "routes": []
        }))
        .unwrap()
    }

    #[test]
    fn fatal_codes() {
        assert!(ServerErrorCode::PortAlreadyUsed.is_fatal());
        assert!(ServerErrorCode::PortInvalid.is_fatal());
        assert!(ServerErrorCode::TlsConfig.is_fatal());
        assert!(ServerErrorCode::UnknownServerError.is_fatal());
        assert!(!ServerErrorCode::RequestBodyParse.is_fatal());
        assert!(!ServerErrorCode::RouteFileServingError.is_fatal());
        assert!(!ServerErrorCode::RouteServingError.is_fatal());
    }

    #[test]
    fn transaction_display() {
        let t = Transaction {
            method: "GET".to_owned(),
            path: "/users".to_owned(),
            status: 200,
            proxied: false,
            request_body: None,
            response_body: None,
        };
        assert_eq!(t.to_string(), "GET /users | 200");
    }

    #[test]
    fn invalid_port_is_fatal_before_bind() {
        let server = MockServer::new(env(70_000), None, false);
        let mut events = Vec::new();
        let err = server.run(&mut events, &|| true).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Server {
                code: ServerErrorCode::PortInvalid,
                ..
            }
        ));
        assert!(matches!(
            events.as_slice(),
            [ServerEvent::Error {
                code: ServerErrorCode::PortInvalid,
                ..
            }]
        ));
    }

    #[test]
    fn port_in_use_is_fatal() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = MockServer::new(env(i64::from(port)), None, false);
        let mut events = Vec::new();
        let err = server.run(&mut events, &|| true).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Server {
                code: ServerErrorCode::PortAlreadyUsed,
                ..
            }
        ));
    }

    #[test]
    fn tls_without_cert_is_fatal() {
        let mut e = env(0);
        e.tls_options.enabled = true;
        let server = MockServer::new(e, None, false);
        let mut events = Vec::new();
        let err = server.run(&mut events, &|| true).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Server {
                code: ServerErrorCode::TlsConfig,
                ..
            }
        ));
    }

    #[test]
    fn stop_flag_emits_started_then_stopped() {
        let server = MockServer::new(env(0), None, false);
        let mut events = Vec::new();
        server.run(&mut events, &|| true).unwrap();
        assert!(matches!(events[0], ServerEvent::Started { .. }));
        assert_eq!(events[1], ServerEvent::Stopped);
    }

    #[test]
    fn route_headers_override_environment_headers() {
        let server = MockServer::new(env(0), None, false);
        let headers = server.base_headers(&[EnvHeader::new("content-type", "text/plain")]);
        let content_types: Vec<_> = headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            .collect();
        assert_eq!(content_types.len(), 1);
        assert_eq!(content_types[0].1, "text/plain");
        assert!(has_header(&headers, "Access-Control-Allow-Origin"));
    }

    #[test]
    fn relative_paths_use_base_dir() {
        let server = MockServer::new(env(0), Some(PathBuf::from("/data/mocks")), false);
        assert_eq!(
            server.resolve_path("files/a.json"),
            PathBuf::from("/data/mocks/files/a.json")
        );
        assert_eq!(server.resolve_path("/abs.json"), PathBuf::from("/abs.json"));
    }
}
