//! Small helpers shared by both binaries: worker-address parsing and
//! host-port extraction. Neither needs a crate of its own the way the
//! monitoring system's checksum/URL-validation helpers did, since this
//! workspace carries no config-upload or URL-fetching surface.

use crate::Error;

/// Parses a `host:port` worker address, as given in a manager's worker
/// address list (§6).
pub fn parse_host_port(addr: &str) -> crate::Result<(String, u16)> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| Error::Config(format!("worker address '{addr}' is not host:port")))?;

    let port: u16 = port
        .parse()
        .map_err(|_| Error::Config(format!("worker address '{addr}' has an invalid port")))?;

    if host.is_empty() {
        return Err(Error::Config(format!("worker address '{addr}' has an empty host")));
    }

    Ok((host.to_string(), port))
}

/// Extracts the first host port from a task's observed `host_ports` map,
/// used by the manager's health check (§4.5: "the first published host
/// port"). Iteration order over a `HashMap` is unspecified, matching the
/// `range`-over-map behavior of the original's `getHostPort`.
pub fn first_host_port(host_ports: &std::collections::HashMap<String, String>) -> Option<String> {
    host_ports.values().next().cloned()
}
