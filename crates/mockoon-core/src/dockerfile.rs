/// Values substituted into the Dockerfile template.
#[derive(Debug, Clone)]
pub struct DockerfileParams {
    /// Working file name next to the Dockerfile.
    pub data_file: String,
    pub port: u16,
    pub log_transaction: bool,
}

const TEMPLATE: &str = r#"FROM rust:1-slim AS builder
RUN cargo install --locked mockoon-cli --version {version}

FROM debian:bookworm-slim
RUN useradd --create-home --shell /usr/sbin/nologin mockoon
COPY --from=builder /usr/local/cargo/bin/mockoon /usr/local/bin/mockoon

WORKDIR /home/mockoon
COPY {data_file} ./data
RUN chown mockoon:mockoon ./data
USER mockoon

EXPOSE {port}

ENTRYPOINT [{entrypoint}]

# Usage: docker run -p <host_port>:{port} mockoon-test
"#;

/// Render the container build file for one environment.
pub fn render_dockerfile(params: &DockerfileParams) -> String {
    let mut entrypoint = vec![
        "mockoon", "start", "--data", "data", "--container", "--hostname", "0.0.0.0",
    ];
    if params.log_transaction {
        entrypoint.push("--log-transaction");
    }
    let entrypoint = entrypoint
        .iter()
        .map(|arg| format!("\"{arg}\""))
        .collect::<Vec<_>>()
        .join(", ");

    TEMPLATE
        .replace("{version}", env!("CARGO_PKG_VERSION"))
        .replace("{data_file}", &params.data_file)
        .replace("{port}", &params.port.to_string())
        .replace("{entrypoint}", &entrypoint)
}
