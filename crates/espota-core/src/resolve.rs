//! Hostname resolution for the update target.

use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("error resolving IP address of '{host}': {message}")]
    Lookup { host: String, message: String },

    #[error("'{host}' did not resolve to any address")]
    NoAddress { host: String },
}

/// Resolve `host` to a socket address. Numeric IP literals bypass the
/// resolver entirely; IPv4 results are preferred when a name resolves to
/// several addresses.
pub fn resolve_host(host: &str, port: u16) -> Result<SocketAddr, ResolveError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    info!(host, "Resolving IP address");
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| ResolveError::Lookup {
            host: host.to_string(),
            message: e.to_string(),
        })?
        .collect();

    let addr = addrs
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| ResolveError::NoAddress {
            host: host.to_string(),
        })?;
    info!(%addr, "Resolved");
    Ok(addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_host_bypasses_resolution() {
        let addr = resolve_host("192.168.4.1", 3232).unwrap();
        assert_eq!(addr, "192.168.4.1:3232".parse().unwrap());
    }

    #[test]
    fn ipv6_literals_work_too() {
        let addr = resolve_host("::1", 3232).unwrap();
        assert_eq!(addr, "[::1]:3232".parse().unwrap());
    }

    #[test]
    fn unresolvable_host_is_classified() {
        let err = resolve_host("no-such-host.invalid", 3232).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Lookup { .. } | ResolveError::NoAddress { .. }
        ));
    }
}
