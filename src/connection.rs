//! TCP connection establishment.

use std::convert::TryFrom;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::str::FromStr;
use std::time::Duration;

use log::{debug, info};
use strum_macros::{Display, EnumIter};

use crate::error::DiagnosticError;

pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_TIMEOUT_MILLIS: u32 = 30_000;

/// Protocol version requested from the peer.
///
/// The numeric codes are the ones accepted on the command line and in the
/// configuration file: 2, 3, 10, 11 and 12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum TlsVersion {
    #[strum(serialize = "SSLv2")]
    Ssl2,
    #[strum(serialize = "SSLv3")]
    Ssl3,
    #[strum(serialize = "TLS1.0")]
    Tls10,
    #[strum(serialize = "TLS1.1")]
    Tls11,
    #[strum(serialize = "TLS1.2")]
    Tls12,
}

impl TlsVersion {
    pub fn code(self) -> u16 {
        match self {
            TlsVersion::Ssl2 => 2,
            TlsVersion::Ssl3 => 3,
            TlsVersion::Tls10 => 10,
            TlsVersion::Tls11 => 11,
            TlsVersion::Tls12 => 12,
        }
    }
}

impl TryFrom<u16> for TlsVersion {
    type Error = DiagnosticError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            2 => Ok(TlsVersion::Ssl2),
            3 => Ok(TlsVersion::Ssl3),
            10 => Ok(TlsVersion::Tls10),
            11 => Ok(TlsVersion::Tls11),
            12 => Ok(TlsVersion::Tls12),
            _ => Err(DiagnosticError::UnsupportedVersion {
                code,
                reason: "expected one of 2, 3, 10, 11, 12".to_string(),
            }),
        }
    }
}

/// Accepts either a numeric code ("12") or a label ("tls1.2", "TLSv1.2", "sslv3").
impl FromStr for TlsVersion {
    type Err = DiagnosticError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<u16>() {
            return TlsVersion::try_from(code);
        }
        let label: String = trimmed
            .to_ascii_lowercase()
            .chars()
            .filter(|c| *c != 'v' && *c != '_' && *c != '-')
            .collect();
        match label.as_str() {
            "ssl2" => Ok(TlsVersion::Ssl2),
            "ssl3" => Ok(TlsVersion::Ssl3),
            "tls1" | "tls1.0" | "tls10" => Ok(TlsVersion::Tls10),
            "tls1.1" | "tls11" => Ok(TlsVersion::Tls11),
            "tls1.2" | "tls12" => Ok(TlsVersion::Tls12),
            _ => Err(DiagnosticError::UnsupportedVersion {
                code: 0,
                reason: format!("unknown version label '{}'", s),
            }),
        }
    }
}

/// Target of one diagnostic run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub requested_version: TlsVersion,
    pub connect_timeout_millis: u32,
}

impl ConnectionParams {
    pub fn new(host: &str, port: u16, requested_version: TlsVersion) -> Self {
        ConnectionParams {
            host: host.to_string(),
            port,
            requested_version,
            connect_timeout_millis: DEFAULT_TIMEOUT_MILLIS,
        }
    }

    /// `host:port`, with IPv6 literals bracketed.
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub fn timeout(&self) -> Result<Duration, DiagnosticError> {
        if self.connect_timeout_millis == 0 {
            return Err(DiagnosticError::TimeoutSetting {
                millis: 0,
                reason: "timeout must be greater than zero".to_string(),
            });
        }
        Ok(Duration::from_millis(u64::from(self.connect_timeout_millis)))
    }
}

/// Resolves the host and returns the first address. No retries.
pub fn resolve(params: &ConnectionParams) -> Result<SocketAddr, DiagnosticError> {
    let resolution_error = |reason: String| DiagnosticError::Resolution {
        host: params.host.clone(),
        reason,
    };
    let mut addresses = (params.host.as_str(), params.port)
        .to_socket_addrs()
        .map_err(|e| resolution_error(e.to_string()))?;
    let address = addresses
        .next()
        .ok_or_else(|| resolution_error("no addresses returned".to_string()))?;
    debug!("{} resolved to {}", params.host, address);
    Ok(address)
}

/// Opens a TCP connection to the first resolved address.
///
/// The same timeout bounds the connect and every later read and write on
/// the socket, including the TLS handshake.
pub fn establish(params: &ConnectionParams) -> Result<TcpStream, DiagnosticError> {
    info!("connecting to {}", params.address());
    let timeout = params.timeout()?;
    let address = resolve(params)?;

    let stream = TcpStream::connect_timeout(&address, timeout)
        .map_err(|e| connect_error(params.address(), e))?;

    let timeout_error = |e: std::io::Error| DiagnosticError::TimeoutSetting {
        millis: params.connect_timeout_millis,
        reason: e.to_string(),
    };
    stream.set_read_timeout(Some(timeout)).map_err(timeout_error)?;
    stream.set_write_timeout(Some(timeout)).map_err(timeout_error)?;

    info!("connected to {} on port {}", params.host, params.port);
    Ok(stream)
}

// std creates and connects the socket in one call; errors that can only come
// from socket(2) are reported as socket creation failures.
// std creates and connects the socket in one call, so socket creation
// failures can only be told apart by error kind.
fn connect_error(address: String, source: std::io::Error) -> DiagnosticError {
    match source.kind() {
        std::io::ErrorKind::Unsupported | std::io::ErrorKind::OutOfMemory => {
            DiagnosticError::SocketCreate { address, source }
        }
        _ => DiagnosticError::Connect { address, source },
    }
}
