// Readiness probing for a launched mysqld

use crate::docker::container::DATABASE_NAME;
use crate::errors::{MysqlTestError, Result};
use mysql::prelude::Queryable;
use mysql::{Conn, Opts, OptsBuilder};
use std::fmt;
use std::io::Read;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Protocol version byte that opens a MySQL v10 handshake packet
const HANDSHAKE_V10: u8 = 0x0a;
/// First payload byte of a MySQL ERR packet
const ERR_PACKET: u8 = 0xff;

/// Account the container is started with (empty password allowed)
pub const DSN_USER: &str = "root";

/// Resolved address of a mysqld instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: String,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
        }
    }

    /// Connection descriptor in `user@tcp(host:port)/db` form
    pub fn dsn(&self) -> String {
        format!(
            "{}@tcp({}:{})/{}",
            DSN_USER, self.host, self.port, DATABASE_NAME
        )
    }

    /// The same descriptor as a URL for Rust MySQL clients
    pub fn url(&self) -> String {
        format!(
            "mysql://{}@{}:{}/{}",
            DSN_USER, self.host, self.port, DATABASE_NAME
        )
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Result of one successful probe attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The server answered; the instance can be handed out
    Ready,
    /// The client opened but the ping failed; try again on the next tick
    NotReady(String),
}

/// One readiness check against an endpoint.
///
/// Returning `Err` means the client could not even be opened. The poll loop
/// treats that as fatal and stops immediately, unlike `Ok(NotReady)`, which
/// is retried until the deadline.
pub trait Probe {
    fn probe(&self, endpoint: &Endpoint) -> Result<ProbeOutcome>;
}

/// Default probe: log in with the instance's connection URL and run `SELECT 1`.
///
/// An unparseable URL is an open failure. Refused connections, handshake or
/// authentication errors and a failed query all count as not ready yet,
/// since mysqld restarts once during first-boot initialisation.
#[derive(Debug, Clone)]
pub struct ClientProbe {
    timeout: Duration,
}

impl Default for ClientProbe {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
        }
    }
}

impl ClientProbe {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn open(&self, endpoint: &Endpoint) -> Result<OptsBuilder> {
        let opts = Opts::from_url(&endpoint.url())
            .map_err(|e| MysqlTestError::ProbeOpen(format!("{}: {}", endpoint.url(), e)))?;

        Ok(OptsBuilder::from_opts(opts)
            .tcp_connect_timeout(Some(self.timeout))
            .read_timeout(Some(self.timeout))
            .write_timeout(Some(self.timeout)))
    }
}

impl Probe for ClientProbe {
    fn probe(&self, endpoint: &Endpoint) -> Result<ProbeOutcome> {
        let opts = self.open(endpoint)?;

        let mut conn = match Conn::new(opts) {
            Ok(conn) => conn,
            Err(e) => return Ok(ProbeOutcome::NotReady(e.to_string())),
        };

        Ok(match conn.query_drop("SELECT 1") {
            Ok(()) => ProbeOutcome::Ready,
            Err(e) => ProbeOutcome::NotReady(e.to_string()),
        })
    }
}

/// Lighter probe: connect over TCP and wait for the server greeting.
///
/// mysqld sends its handshake packet unprompted as soon as it accepts a
/// connection. This does not log in, so the greeting can arrive before the
/// `test` database exists; prefer [`ClientProbe`] unless credentials differ
/// from the defaults.
#[derive(Debug, Clone)]
pub struct HandshakeProbe {
    timeout: Duration,
}

impl Default for HandshakeProbe {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
        }
    }
}

impl HandshakeProbe {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Resolve the endpoint; failure here is an open failure
    fn open(&self, endpoint: &Endpoint) -> Result<SocketAddr> {
        let port: u16 = endpoint.port.trim().parse().map_err(|_| {
            MysqlTestError::ProbeOpen(format!("invalid port '{}'", endpoint.port))
        })?;

        (endpoint.host.as_str(), port)
            .to_socket_addrs()
            .map_err(|e| MysqlTestError::ProbeOpen(format!("cannot resolve {}: {}", endpoint, e)))?
            .next()
            .ok_or_else(|| {
                MysqlTestError::ProbeOpen(format!("no address found for {}", endpoint))
            })
    }

    fn ping(&self, addr: &SocketAddr) -> std::io::Result<ProbeOutcome> {
        let mut stream = TcpStream::connect_timeout(addr, self.timeout)?;
        stream.set_read_timeout(Some(self.timeout))?;

        // 3-byte payload length, 1-byte sequence id, then the first payload byte
        let mut head = [0u8; 5];
        stream.read_exact(&mut head)?;

        Ok(match head[4] {
            HANDSHAKE_V10 => ProbeOutcome::Ready,
            ERR_PACKET => ProbeOutcome::NotReady("server answered with an error packet".to_string()),
            other => ProbeOutcome::NotReady(format!("unexpected protocol byte 0x{:02x}", other)),
        })
    }
}

impl Probe for HandshakeProbe {
    fn probe(&self, endpoint: &Endpoint) -> Result<ProbeOutcome> {
        let addr = self.open(endpoint)?;

        match self.ping(&addr) {
            Ok(outcome) => Ok(outcome),
            Err(e) => Ok(ProbeOutcome::NotReady(e.to_string())),
        }
    }
}
