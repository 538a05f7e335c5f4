//! Environment schema migration engine.
//!
//! Each step is a pure transformation on the raw JSON object, registered in
//! [`MIGRATIONS`] in strictly increasing version order. [`migrate`] applies
//! every step whose version is above the definition's marker and then stamps
//! the marker with [`CURRENT_SCHEMA_VERSION`].

use crate::environment::{RawEnvironment, DEFAULT_HOSTNAME};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::debug;

/// Highest schema version this tooling understands.
pub const CURRENT_SCHEMA_VERSION: u32 = 9;

type StepFn = fn(&mut Map<String, Value>) -> Result<(), String>;

pub struct MigrationStep {
    pub version: u32,
    pub description: &'static str,
    apply: StepFn,
}

pub static MIGRATIONS: &[MigrationStep] = &[
    MigrationStep {
        version: 1,
        description: "endpoint prefix and latency defaults",
        apply: add_prefix_and_latency,
    },
    MigrationStep {
        version: 2,
        description: "fold single-response routes into responses",
        apply: fold_route_responses,
    },
    MigrationStep {
        version: 3,
        description: "default environment headers",
        apply: add_environment_headers,
    },
    MigrationStep {
        version: 4,
        description: "proxy defaults",
        apply: add_proxy_defaults,
    },
    MigrationStep {
        version: 5,
        description: "https flag to tlsOptions",
        apply: convert_https_flag,
    },
    MigrationStep {
        version: 6,
        description: "default hostname",
        apply: add_hostname,
    },
    MigrationStep {
        version: 7,
        description: "proxy request/response headers",
        apply: add_proxy_headers,
    },
    MigrationStep {
        version: 8,
        description: "cors default",
        apply: add_cors,
    },
    MigrationStep {
        version: 9,
        description: "response rules defaults",
        apply: add_response_rules,
    },
];

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("environment '{name}' has no schema version and was not repaired (use --repair to migrate it)")]
    TooOld { name: String },
    #[error("environment '{name}' uses schema version {found}, newer than the supported {supported}; please upgrade mockoon")]
    TooRecent {
        name: String,
        found: u32,
        supported: u32,
    },
    #[error("migration step {version} failed: {reason}")]
    StepFailed { version: u32, reason: String },
}

/// Migrate a definition to [`CURRENT_SCHEMA_VERSION`].
///
/// A definition without a marker is refused with [`MigrationError::TooOld`];
/// callers that obtained repair consent stamp it with version `0` first.
pub fn migrate(mut env: RawEnvironment) -> Result<RawEnvironment, MigrationError> {
    let name = env.name().unwrap_or("<unnamed>").to_owned();
    let Some(current) = env.schema_version() else {
        return Err(MigrationError::TooOld { name });
    };
    if current > CURRENT_SCHEMA_VERSION {
        return Err(MigrationError::TooRecent {
            name,
            found: current,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }

    for step in MIGRATIONS.iter().filter(|s| s.version > current) {
        debug!("migrating '{name}' to v{}: {}", step.version, step.description);
        (step.apply)(env.as_map_mut()).map_err(|reason| MigrationError::StepFailed {
            version: step.version,
            reason,
        })?;
    }
    env.set_schema_version(CURRENT_SCHEMA_VERSION);
    Ok(env)
}

fn insert_default(map: &mut Map<String, Value>, key: &str, value: Value) {
    if !map.contains_key(key) {
        map.insert(key.to_owned(), value);
    }
}

/// Visit every route object. Routes that are not objects are a defect.
fn for_each_route(
    map: &mut Map<String, Value>,
    mut f: impl FnMut(&mut Map<String, Value>),
) -> Result<(), String> {
    let Some(Value::Array(routes)) = map.get_mut("routes") else {
        return Ok(());
    };
    for (i, route) in routes.iter_mut().enumerate() {
        let route = route
            .as_object_mut()
            .ok_or_else(|| format!("route {i} is not an object"))?;
        f(route);
    }
    Ok(())
}

fn add_prefix_and_latency(map: &mut Map<String, Value>) -> Result<(), String> {
    insert_default(map, "endpointPrefix", json!(""));
    insert_default(map, "latency", json!(0));
    Ok(())
}

fn fold_route_responses(map: &mut Map<String, Value>) -> Result<(), String> {
    for_each_route(map, |route| {
        if route.contains_key("responses") {
            return;
        }
        let mut response = Map::new();
        response.insert(
            "statusCode".to_owned(),
            route.remove("statusCode").unwrap_or_else(|| json!(200)),
        );
        response.insert(
            "body".to_owned(),
            route.remove("body").unwrap_or_else(|| json!("")),
        );
        response.insert(
            "headers".to_owned(),
            route.remove("headers").unwrap_or_else(|| json!([])),
        );
        response.insert(
            "latency".to_owned(),
            route.remove("latency").unwrap_or_else(|| json!(0)),
        );
        response.insert(
            "filePath".to_owned(),
            route.remove("filePath").unwrap_or_else(|| json!("")),
        );
        response.insert(
            "sendFileAsBody".to_owned(),
            route.remove("sendFileAsBody").unwrap_or_else(|| json!(false)),
        );
        route.insert("responses".to_owned(), json!([response]));
    })
}

fn add_environment_headers(map: &mut Map<String, Value>) -> Result<(), String> {
    insert_default(
        map,
        "headers",
        json!([{ "key": "Content-Type", "value": "application/json" }]),
    );
    Ok(())
}

fn add_proxy_defaults(map: &mut Map<String, Value>) -> Result<(), String> {
    insert_default(map, "proxyMode", json!(false));
    insert_default(map, "proxyHost", json!(""));
    insert_default(map, "proxyRemovePrefix", json!(false));
    Ok(())
}

fn convert_https_flag(map: &mut Map<String, Value>) -> Result<(), String> {
    let https = match map.remove("https") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => b,
        Some(other) => return Err(format!("'https' must be a boolean, got {other}")),
    };
    insert_default(
        map,
        "tlsOptions",
        json!({
            "enabled": https,
            "type": "CERT",
            "pfxPath": "",
            "certPath": "",
            "keyPath": "",
            "caPath": "",
            "passphrase": ""
        }),
    );
    Ok(())
}

fn add_hostname(map: &mut Map<String, Value>) -> Result<(), String> {
    insert_default(map, "hostname", json!(DEFAULT_HOSTNAME));
    Ok(())
}

fn add_proxy_headers(map: &mut Map<String, Value>) -> Result<(), String> {
    insert_default(map, "proxyReqHeaders", json!([]));
    insert_default(map, "proxyResHeaders", json!([]));
    Ok(())
}

fn add_cors(map: &mut Map<String, Value>) -> Result<(), String> {
    insert_default(map, "cors", json!(true));
    Ok(())
}

fn add_response_rules(map: &mut Map<String, Value>) -> Result<(), String> {
    for_each_route(map, |route| {
        if let Some(Value::Array(responses)) = route.get_mut("responses") {
            for response in responses.iter_mut().filter_map(Value::as_object_mut) {
                insert_default(response, "rules", json!([]));
                insert_default(response, "rulesOperator", json!("OR"));
            }
        }
    })
}
