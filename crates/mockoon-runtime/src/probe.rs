use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

pub const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Host to connect to when probing a bind address. Wildcard binds are
/// reachable through loopback.
pub fn probe_host(hostname: &str) -> &str {
    match hostname {
        "" | "0.0.0.0" => "127.0.0.1",
        "::" | "[::]" => "::1",
        other => other,
    }
}

/// Whether something accepts TCP connections on `{hostname, port}`.
///
/// Unresolvable hosts count as not in use; the bind will report the real
/// problem.
pub fn port_in_use(hostname: &str, port: u16) -> bool {
    can_connect(hostname, port, PROBE_TIMEOUT)
}

pub fn can_connect(hostname: &str, port: u16, timeout: Duration) -> bool {
    let host = probe_host(hostname).trim_start_matches('[').trim_end_matches(']');
    let addrs: Vec<SocketAddr> = match (host, port).to_socket_addrs() {
        Ok(addrs) => addrs.collect(),
        Err(e) => {
            tracing::debug!("cannot resolve {host}: {e}");
            return false;
        }
    };
    addrs
        .iter()
        .any(|addr| TcpStream::connect_timeout(addr, timeout).is_ok())
}
