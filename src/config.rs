//! Configuration file management for chainpeek.
//!
//! Settings come from three places, with clear precedence rules:
//!
//! 1. Default values (lowest priority)
//! 2. Configuration file (`chainpeek.toml` or specified with `--config`)
//! 3. Command-line arguments (highest priority)
//!
//! # Example Configuration File
//!
//! ```toml
//! host = "example.com"
//! port = 443
//! timeout_ms = 30000
//! log_level = "info"
//!
//! [tls]
//! version = 12
//! ciphers = "ALL:@SECLEVEL=0"
//! verify_depth = 20
//! sni = true
//! ```

use std::convert::TryFrom;
use std::fs;
use std::path::Path;

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::connection::{ConnectionParams, TlsVersion, DEFAULT_PORT, DEFAULT_TIMEOUT_MILLIS};
use crate::error::DiagnosticError;
use crate::session::{SessionOptions, DEFAULT_CIPHER_LIST, DEFAULT_VERIFY_DEPTH};

pub const DEFAULT_CONFIG_FILE: &str = "chainpeek.toml";

/// Main configuration structure.
///
/// All fields are optional to support partial configuration and merging.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Config {
    /// Host to inspect: `host`, `host:port` or an `https://` URL
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Bound for connect and for every read after it, in milliseconds
    pub timeout_ms: Option<u32>,
    /// Log filter level: error, warn, info, debug, trace
    pub log_level: Option<String>,
    pub tls: Option<TlsConfig>,
}

/// Client-side TLS settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    /// Protocol code: 2, 3, 10, 11 or 12
    pub version: Option<u16>,
    /// OpenSSL cipher list string
    pub ciphers: Option<String>,
    pub verify_depth: Option<u32>,
    /// Send the host name as SNI
    pub sni: Option<bool>,
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use chainpeek::config::Config;
    /// let config = Config::from_file("chainpeek.toml")?;
    /// # Ok::<(), chainpeek::config::ConfigError>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(config)
    }

    /// Creates a configuration holding every default.
    ///
    /// # Default Values
    ///
    /// - `host`: None (must be provided)
    /// - `port`: 443
    /// - `timeout_ms`: 30000
    /// - `log_level`: None (`RUST_LOG` applies, else "info")
    /// - `tls.version`: 12
    /// - `tls.ciphers`: "ALL:@SECLEVEL=0"
    /// - `tls.verify_depth`: 20
    /// - `tls.sni`: true
    pub fn defaults() -> Self {
        Config {
            host: None,
            port: Some(DEFAULT_PORT),
            timeout_ms: Some(DEFAULT_TIMEOUT_MILLIS),
            log_level: None,
            tls: Some(TlsConfig {
                version: Some(TlsVersion::Tls12.code()),
                ciphers: Some(DEFAULT_CIPHER_LIST.to_string()),
                verify_depth: Some(DEFAULT_VERIFY_DEPTH),
                sni: Some(true),
            }),
        }
    }

    /// Merges this configuration with another, prioritizing the other's values.
    ///
    /// For each field, a `Some` in `other` overrides this config's value and a
    /// `None` keeps it.
    pub fn merge_with(mut self, other: Config) -> Self {
        if other.host.is_some() {
            self.host = other.host;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.timeout_ms.is_some() {
            self.timeout_ms = other.timeout_ms;
        }
        if other.log_level.is_some() {
            self.log_level = other.log_level;
        }
        if let Some(other_tls) = other.tls {
            if let Some(ref mut self_tls) = self.tls {
                if other_tls.version.is_some() {
                    self_tls.version = other_tls.version;
                }
                if other_tls.ciphers.is_some() {
                    self_tls.ciphers = other_tls.ciphers;
                }
                if other_tls.verify_depth.is_some() {
                    self_tls.verify_depth = other_tls.verify_depth;
                }
                if other_tls.sni.is_some() {
                    self_tls.sni = other_tls.sni;
                }
            } else {
                self.tls = Some(other_tls);
            }
        }
        self
    }

    /// Creates a Config from command-line arguments for merging.
    ///
    /// Only provided arguments (Some values) override other configurations.
    pub fn from_cli_args(
        host: Option<String>,
        port: Option<u16>,
        timeout_ms: Option<u32>,
        log_level: Option<String>,
        version: Option<TlsVersion>,
        ciphers: Option<String>,
        sni: Option<bool>,
    ) -> Self {
        Config {
            host,
            port,
            timeout_ms,
            log_level,
            tls: Some(TlsConfig {
                version: version.map(TlsVersion::code),
                ciphers,
                verify_depth: None,
                sni,
            }),
        }
    }

    /// The explicitly configured log level, if any.
    ///
    /// `None` leaves filtering to `RUST_LOG`.
    pub fn log_filter(&self) -> Result<Option<LevelFilter>, ConfigError> {
        match self.log_level.as_deref() {
            Some(level) => level.trim().parse::<LevelFilter>().map(Some).map_err(|_| {
                ConfigError::Validation(format!(
                    "invalid log level '{}': expected off, error, warn, info, debug or trace",
                    level
                ))
            }),
            None => Ok(None),
        }
    }

    /// Turns a merged configuration into the inputs of one diagnostic run.
    ///
    /// A port given in the host (`host:8443`) wins over the `port` key.
    /// An unknown version code fails as [`DiagnosticError::UnsupportedVersion`].
    pub fn resolve(&self) -> Result<(ConnectionParams, SessionOptions), DiagnosticError> {
        let target = self
            .host
            .as_deref()
            .ok_or_else(|| ConfigError::Validation("no host given".to_string()))?;
        let (host, target_port) = parse_target(target)?;

        let tls = self.tls.clone().unwrap_or(TlsConfig {
            version: None,
            ciphers: None,
            verify_depth: None,
            sni: None,
        });
        let code = tls.version.unwrap_or_else(|| TlsVersion::Tls12.code());
        let version = TlsVersion::try_from(code)?;

        let params = ConnectionParams {
            host,
            port: target_port.or(self.port).unwrap_or(DEFAULT_PORT),
            requested_version: version,
            connect_timeout_millis: self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MILLIS),
        };
        let options = SessionOptions {
            cipher_list: tls
                .ciphers
                .unwrap_or_else(|| DEFAULT_CIPHER_LIST.to_string()),
            verify_depth: tls.verify_depth.unwrap_or(DEFAULT_VERIFY_DEPTH),
            send_sni: tls.sni.unwrap_or(true),
        };
        Ok((params, options))
    }

    /// Generates an example configuration file in TOML format.
    pub fn example_toml() -> String {
        let example = Config {
            host: Some("example.com".to_string()),
            port: Some(443),
            timeout_ms: Some(10_000),
            log_level: Some("info".to_string()),
            tls: Some(TlsConfig {
                version: Some(12),
                ciphers: Some(DEFAULT_CIPHER_LIST.to_string()),
                verify_depth: Some(DEFAULT_VERIFY_DEPTH),
                sni: Some(true),
            }),
        };

        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| "# Error generating example".to_string())
    }
}

/// Splits `host`, `host:port`, `[v6]:port` or `https://host:port/` into host and port.
pub fn parse_target(target: &str) -> Result<(String, Option<u16>), ConfigError> {
    let target = target.trim();
    if target.is_empty() {
        return Err(ConfigError::Validation("host cannot be empty".to_string()));
    }
    // bare IPv6 literal, no port
    if target.parse::<std::net::Ipv6Addr>().is_ok() {
        return Ok((target.to_string(), None));
    }

    let with_scheme = if target.contains("://") {
        target.to_string()
    } else {
        format!("https://{}", target)
    };
    let url = Url::parse(&with_scheme)
        .map_err(|e| ConfigError::Validation(format!("invalid host '{}': {}", target, e)))?;
    if url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "only the https:// scheme is supported, got '{}'",
            url.scheme()
        )));
    }
    let host = url
        .host_str()
        .ok_or_else(|| ConfigError::Validation(format!("no host in '{}'", target)))?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();
    let explicit_port = target_has_port(target);
    let port = if explicit_port {
        url.port_or_known_default()
    } else {
        None
    };
    Ok((host, port))
}

// Url drops a port equal to the scheme default, so look at the text itself.
fn target_has_port(target: &str) -> bool {
    let authority = target.split("://").last().unwrap_or(target);
    let authority = authority.split('/').next().unwrap_or(authority);
    match authority.rfind(']') {
        Some(end) => authority[end..].contains(':'),
        None => authority.contains(':'),
    }
}

/// Errors that can occur during configuration loading and parsing.
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error (file not found, permission denied, etc.)
    Io(String),
    /// TOML parsing error (invalid syntax, type mismatch, etc.)
    Parse(String),
    /// Validation error (missing required fields, invalid values, etc.)
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "IO Error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Parse Error: {}", msg),
            ConfigError::Validation(msg) => write!(f, "Validation Error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
