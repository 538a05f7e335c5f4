use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default bind address for environments that do not name one.
pub const DEFAULT_HOSTNAME: &str = "0.0.0.0";

/// Schema marker key inside an environment object.
pub const SCHEMA_VERSION_KEY: &str = "lastMigration";

/// A single environment definition as found in a data file, before any
/// migration or validation. Keeps every key, known or not.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct RawEnvironment(Map<String, Value>);

impl RawEnvironment {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Display name, if the definition carries a string `name`.
    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    /// Schema marker. A marker that is not a non-negative integer counts as absent.
    pub fn schema_version(&self) -> Option<u32> {
        self.0
            .get(SCHEMA_VERSION_KEY)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
    }

    pub fn set_schema_version(&mut self, version: u32) {
        self.0
            .insert(SCHEMA_VERSION_KEY.to_owned(), Value::from(version));
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

/// Migrated, validated environment definition.
///
/// Fields the tooling acts on are typed; everything else (routes details,
/// templating settings, keys added by newer editors) survives in `extra` and
/// in the `extra` maps of nested types, so writing the definition back out
/// preserves it verbatim.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    pub last_migration: u32,
    pub name: String,
    #[serde(default)]
    pub endpoint_prefix: String,
    #[serde(default)]
    pub latency: u64,
    pub port: i64,
    #[serde(default = "default_hostname")]
    pub hostname: String,
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default)]
    pub proxy_mode: bool,
    #[serde(default)]
    pub proxy_host: String,
    #[serde(default)]
    pub proxy_remove_prefix: bool,
    #[serde(default)]
    pub tls_options: TlsOptions,
    #[serde(default = "default_true")]
    pub cors: bool,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub proxy_req_headers: Vec<Header>,
    #[serde(default)]
    pub proxy_res_headers: Vec<Header>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Environment {
    /// `https` when TLS is enabled, `http` otherwise.
    pub fn protocol(&self) -> &'static str {
        if self.tls_options.enabled {
            "https"
        } else {
            "http"
        }
    }

    /// Port as a TCP port number, `None` when outside `0..=65535`.
    pub fn tcp_port(&self) -> Option<u16> {
        u16::try_from(self.port).ok()
    }

    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default)]
    pub documentation: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub responses: Vec<RouteResponse>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default = "default_status")]
    pub status_code: u16,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub latency: u64,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub send_file_as_body: bool,
    #[serde(default)]
    pub rules: Vec<Value>,
    #[serde(default = "default_rules_operator")]
    pub rules_operator: String,
    #[serde(default)]
    pub disable_templating: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for RouteResponse {
    fn default() -> Self {
        Self {
            uuid: None,
            status_code: default_status(),
            label: String::new(),
            headers: Vec::new(),
            body: String::new(),
            latency: 0,
            file_path: String::new(),
            send_file_as_body: false,
            rules: Vec::new(),
            rules_operator: default_rules_operator(),
            disable_templating: false,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Header {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl Header {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsOptions {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_tls_kind", rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub pfx_path: String,
    #[serde(default)]
    pub cert_path: String,
    #[serde(default)]
    pub key_path: String,
    #[serde(default)]
    pub ca_path: String,
    #[serde(default)]
    pub passphrase: String,
}

impl Default for TlsOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            kind: default_tls_kind(),
            pfx_path: String::new(),
            cert_path: String::new(),
            key_path: String::new(),
            ca_path: String::new(),
            passphrase: String::new(),
        }
    }
}

fn default_hostname() -> String {
    DEFAULT_HOSTNAME.to_owned()
}

fn default_true() -> bool {
    true
}

fn default_method() -> String {
    "get".to_owned()
}

fn default_status() -> u16 {
    200
}

fn default_rules_operator() -> String {
    "OR".to_owned()
}

fn default_tls_kind() -> String {
    "CERT".to_owned()
}
