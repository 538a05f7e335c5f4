use crate::{RemoteConfig, RemoteError};
use std::io::Read;

/// Bounded HTTP GET client for data files.
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new(config: &RemoteConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .build()
            .into();
        Self { agent }
    }

    /// GET `url` and return the body as text. Any status >= 400 is an error.
    pub fn get_text(&self, url: &str) -> Result<String, RemoteError> {
        tracing::debug!("GET {url}");
        let resp = match self.agent.get(url).call() {
            Ok(r) => r,
            Err(ureq::Error::StatusCode(status)) => {
                return Err(RemoteError::Http {
                    status,
                    url: url.to_owned(),
                });
            }
            Err(e) => {
                return Err(RemoteError::Transport {
                    url: url.to_owned(),
                    reason: e.to_string(),
                });
            }
        };

        let status = resp.status().as_u16();
        if status >= 400 {
            return Err(RemoteError::Http {
                status,
                url: url.to_owned(),
            });
        }

        let mut body = String::new();
        resp.into_body()
            .into_reader()
            .read_to_string(&mut body)
            .map_err(|e| RemoteError::Body {
                url: url.to_owned(),
                reason: e.to_string(),
            })?;
        tracing::debug!("fetched {} bytes from {url}", body.len());
        Ok(body)
    }
}

/// One-shot fetch with the given configuration.
pub fn fetch_text(url: &str, config: &RemoteConfig) -> Result<String, RemoteError> {
    HttpFetcher::new(config).get_text(url)
}
