//! Bus endpoint addressing.
//!
//! An [`Endpoint`] is a validated ZeroMQ address. Config and CLI flags
//! supply the `tcp://host:port` or `ipc://name` forms; bare IPC names
//! resolve to socket files under `/tmp/wecker/`, while an absolute
//! `ipc:///path` is used as-is.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::GlockeError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Endpoint(String);

impl Endpoint {
    /// TCP endpoint for distributed deployment.
    pub fn tcp(host: &str, port: u16) -> Self {
        Self(format!("tcp://{host}:{port}"))
    }

    /// Named IPC endpoint under `/tmp/wecker/` — the fast option for
    /// same-host wiring.
    pub fn ipc(name: &str) -> Self {
        Self(format!("ipc:///tmp/wecker/{name}.sock"))
    }

    /// Parse a configured endpoint string.
    pub fn parse(raw: &str) -> Result<Self, GlockeError> {
        if let Some(rest) = raw.strip_prefix("tcp://") {
            let (host, port) = rest
                .rsplit_once(':')
                .ok_or_else(|| GlockeError::Endpoint(format!("missing port in {raw}")))?;
            let port: u16 = port
                .parse()
                .map_err(|_| GlockeError::Endpoint(format!("bad port in {raw}")))?;
            if host.is_empty() {
                return Err(GlockeError::Endpoint(format!("missing host in {raw}")));
            }
            Ok(Self::tcp(host, port))
        } else if let Some(rest) = raw.strip_prefix("ipc://") {
            if rest.is_empty() {
                Err(GlockeError::Endpoint(format!("missing socket in {raw}")))
            } else if rest.starts_with('/') {
                Ok(Self(raw.to_string()))
            } else {
                Ok(Self::ipc(rest))
            }
        } else {
            Err(GlockeError::Endpoint(format!(
                "unsupported endpoint: {raw}"
            )))
        }
    }

    /// The address string handed to ZeroMQ.
    pub fn as_zmq(&self) -> &str {
        &self.0
    }

    fn ipc_path(&self) -> Option<&Path> {
        self.0.strip_prefix("ipc://").map(Path::new)
    }

    /// Make an IPC endpoint bindable: create the socket directory and
    /// clear a stale socket file left by a previous run (ZeroMQ fails
    /// with `EADDRINUSE` on a leftover `.sock` file). No-op for TCP.
    pub fn prepare(&self) -> std::io::Result<()> {
        let Some(path) = self.ipc_path() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        match std::fs::remove_file(path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "removed stale IPC socket");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        Ok(())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tcp_constructor_and_parse_agree() {
        let built = Endpoint::tcp("10.0.0.2", 5556);
        let parsed = Endpoint::parse("tcp://10.0.0.2:5556").unwrap();
        assert_eq!(built, parsed);
        assert_eq!(parsed.as_zmq(), "tcp://10.0.0.2:5556");
    }

    #[test]
    fn bare_ipc_name_lands_under_wecker_dir() {
        let parsed = Endpoint::parse("ipc://bus-frontend").unwrap();
        assert_eq!(parsed.as_zmq(), "ipc:///tmp/wecker/bus-frontend.sock");
        assert_eq!(parsed, Endpoint::ipc("bus-frontend"));
    }

    #[test]
    fn absolute_ipc_path_is_kept() {
        let parsed = Endpoint::parse("ipc:///run/wecker/bus.sock").unwrap();
        assert_eq!(parsed.as_zmq(), "ipc:///run/wecker/bus.sock");
    }

    #[test]
    fn parse_rejects_malformed_endpoints() {
        for bad in [
            "redis://localhost:6379",
            "tcp://noport",
            "tcp://:5555",
            "tcp://host:notaport",
            "ipc://",
        ] {
            assert!(Endpoint::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn display_matches_zmq_address() {
        let e = Endpoint::tcp("localhost", 9090);
        assert_eq!(e.to_string(), e.as_zmq());
    }
}
