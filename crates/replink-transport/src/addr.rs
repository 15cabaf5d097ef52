//! Device address classification.

use std::fmt;
use std::net::Ipv4Addr;

/// Where a device lives: a serial path or a network endpoint.
///
/// Selection is by address syntax, not a separate flag: anything with a
/// `host:port` shape or parsing as an IPv4 address is a network device,
/// everything else is a serial path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceAddr {
    /// A serial device path, e.g. `/dev/ttyACM0` or `COM3`.
    Serial { path: String },
    /// A network endpoint reached over TCP.
    Tcp { host: String, port: u16 },
}

impl DeviceAddr {
    /// Default port for bare-IP addresses (the board's telnet control
    /// plane).
    pub const DEFAULT_TCP_PORT: u16 = 23;

    /// Classify an address string.
    #[must_use]
    pub fn parse(addr: &str) -> Self {
        if addr.parse::<Ipv4Addr>().is_ok() {
            return Self::Tcp {
                host: addr.to_string(),
                port: Self::DEFAULT_TCP_PORT,
            };
        }
        if let Some((host, port)) = addr.rsplit_once(':') {
            if !host.is_empty() {
                if let Ok(port) = port.parse() {
                    return Self::Tcp {
                        host: host.to_string(),
                        port,
                    };
                }
            }
        }
        Self::Serial {
            path: addr.to_string(),
        }
    }
}

impl fmt::Display for DeviceAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial { path } => write!(f, "{path}"),
            Self::Tcp { host, port } => write!(f, "{host}:{port}"),
        }
    }
}
