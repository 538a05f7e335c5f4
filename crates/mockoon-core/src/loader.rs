use crate::CoreError;
use mockoon_remote::{fetch_text, is_remote, RemoteConfig};
use mockoon_schema::{parse_data_file, parse_data_str, RawEnvironment};
use std::path::PathBuf;
use tracing::debug;

/// Environments read from one data source.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub environments: Vec<RawEnvironment>,
    /// Directory relative `filePath` resources resolve against. `None` for
    /// remote sources.
    pub base_dir: Option<PathBuf>,
}

/// Load a data file from a local path or an `http(s)://` URL.
pub fn load(source: &str, remote: &RemoteConfig) -> Result<LoadedData, CoreError> {
    if is_remote(source) {
        debug!("fetching remote data from {source}");
        let body = fetch_text(source, remote)?;
        let environments = parse_data_str(&body)?;
        return Ok(LoadedData {
            environments,
            base_dir: None,
        });
    }

    let path = PathBuf::from(source);
    debug!("reading data file {}", path.display());
    let environments = parse_data_file(&path)?;
    let base_dir = std::fs::canonicalize(&path)
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from));
    Ok(LoadedData {
        environments,
        base_dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockoon_schema::DataError;
    use std::fs;

    #[test]
    fn local_file_records_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("env.json");
        fs::write(&path, r#"{"lastMigration": 9, "name": "a", "port": 3000}"#).unwrap();

        let loaded = load(path.to_str().unwrap(), &RemoteConfig::default()).unwrap();
        assert_eq!(loaded.environments.len(), 1);
        assert_eq!(
            loaded.base_dir.unwrap(),
            fs::canonicalize(dir.path()).unwrap()
        );
    }

    #[test]
    fn missing_local_file_is_io_error() {
        let err = load("/nonexistent/mockoon/env.json", &RemoteConfig::default()).unwrap_err();
        assert!(matches!(err, CoreError::Data(DataError::Io { .. })));
        assert!(err.to_string().contains("/nonexistent/mockoon/env.json"));
    }

    #[test]
    fn malformed_local_file_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("env.json");
        fs::write(&path, "{ not json").unwrap();
        let err = load(path.to_str().unwrap(), &RemoteConfig::default()).unwrap_err();
        assert!(matches!(err, CoreError::Data(DataError::Malformed(_))));
    }

    #[test]
    fn bundle_without_environments_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        fs::write(
            &path,
            r#"{"source": "mockoon:1.0", "data": [{"type": "route", "item": {}}]}"#,
        )
        .unwrap();
        let err = load(path.to_str().unwrap(), &RemoteConfig::default()).unwrap_err();
        assert_eq!(err.to_string(), "No environments exist in specified file");
    }

    #[test]
    fn unreachable_remote_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let err = load(
            &format!("http://127.0.0.1:{port}/env.json"),
            &RemoteConfig::with_timeout_secs(2),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Remote(mockoon_remote::RemoteError::Transport { .. })
        ));
    }
}
