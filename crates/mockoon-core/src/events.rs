use crate::engine::StartedProcess;
use mockoon_runtime::{EventSink, ServerEvent};
use tracing::{error, info, warn};

/// Forwards mock server events to `tracing`.
pub struct LogSink {
    name: String,
    log_transaction: bool,
    announce: Option<(StartedProcess, fn(&StartedProcess))>,
}

impl LogSink {
    pub fn new(name: impl Into<String>, log_transaction: bool) -> Self {
        Self {
            name: name.into(),
            log_transaction,
            announce: None,
        }
    }

    /// Call `hook` with `process` once the server is listening. The port is
    /// the one actually bound.
    #[must_use]
    pub fn announcing(mut self, process: StartedProcess, hook: fn(&StartedProcess)) -> Self {
        self.announce = Some((process, hook));
        self
    }
}

impl EventSink for LogSink {
    fn emit(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Started {
                protocol,
                hostname,
                port,
            } => {
                info!(
                    "{}: server started at {protocol}://{hostname}:{port}",
                    self.name
                );
                if let Some((process, hook)) = &mut self.announce {
                    process.port = port;
                    hook(process);
                }
            }
            ServerEvent::Stopped => info!("{}: server stopped", self.name),
            ServerEvent::Error { code, message } if code.is_fatal() => {
                error!("{}: {code}: {message}", self.name);
            }
            ServerEvent::Error { code, message } => {
                warn!("{}: {code}: {message}", self.name);
            }
            ServerEvent::TransactionComplete(t) => {
                if self.log_transaction {
                    info!(
                        request_body = t.request_body.as_deref().unwrap_or(""),
                        response_body = t.response_body.as_deref().unwrap_or(""),
                        "{}: transaction {t}",
                        self.name
                    );
                } else {
                    info!("{}: transaction {t}", self.name);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockoon_schema::ProcessName;
    use std::sync::Mutex;

    static ANNOUNCED: Mutex<Vec<String>> = Mutex::new(Vec::new());

    fn record(process: &StartedProcess) {
        ANNOUNCED.lock().unwrap().push(process.confirmation());
    }

    #[test]
    fn started_event_announces_bound_port() {
        let process = StartedProcess {
            name: ProcessName::canonical("shop"),
            id: None,
            protocol: "http",
            hostname: "0.0.0.0".to_owned(),
            port: 0,
            endpoint_prefix: String::new(),
        };
        let mut sink = LogSink::new("mockoon-shop", false).announcing(process, record);
        sink.emit(ServerEvent::Stopped);
        assert!(ANNOUNCED.lock().unwrap().is_empty());

        sink.emit(ServerEvent::Started {
            protocol: "http",
            hostname: "0.0.0.0".to_owned(),
            port: 41234,
        });
        assert_eq!(
            *ANNOUNCED.lock().unwrap(),
            ["Mock started at http://localhost:41234 (name: mockoon-shop)"]
        );
    }
}
