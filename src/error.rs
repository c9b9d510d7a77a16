//! Error types for the certificate chain diagnostic.
//!
//! Every pipeline stage fails with its own error kind so the caller can tell
//! which step broke. Each kind also carries a stable process exit code.

use std::io;

use strum_macros::Display;
use thiserror::Error;

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Stage {
    #[strum(serialize = "configuration")]
    Configuration,
    #[strum(serialize = "connection")]
    Connection,
    #[strum(serialize = "tls session")]
    Session,
    #[strum(serialize = "chain extraction")]
    Extraction,
    #[strum(serialize = "extension decoding")]
    Decoding,
    #[strum(serialize = "report rendering")]
    Rendering,
}

/// Error type for a single diagnostic run.
///
/// Stages are fail-fast: the first error aborts the rest of the pipeline.
#[derive(Debug, Error)]
pub enum DiagnosticError {
    /// Invalid configuration file or command-line input
    #[error("Invalid configuration: {reason}")]
    Config {
        /// What was wrong
        reason: String,
    },

    /// Name lookup failed for the given host
    #[error("Failed to resolve hostname: {host} ({reason}). Check the spelling and your DNS configuration.")]
    Resolution {
        /// The host that failed to resolve
        host: String,
        /// Resolver message
        reason: String,
    },

    /// The stream socket could not be created
    #[error("Failed to create a socket for {address}: {source}")]
    SocketCreate {
        address: String,
        #[source]
        source: io::Error,
    },

    /// The receive timeout could not be applied
    #[error("Failed to set the timeout of {millis} ms: {reason}")]
    TimeoutSetting { millis: u32, reason: String },

    /// TCP connect failed or timed out
    #[error("Connection failed to: {address}. Verify the host is running a TLS service and is reachable.")]
    Connect {
        /// The address (host:port) that connection failed to
        address: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The requested protocol code has no negotiation mode
    #[error("Unsupported SSL/TLS version {code}: {reason}")]
    UnsupportedVersion { code: u16, reason: String },

    /// No cipher matched the configured cipher policy
    #[error("No valid ciphers in \"{policy}\": {details}")]
    CipherPolicy { policy: String, details: String },

    /// TLS handshake failed
    #[error("TLS handshake failed: {details}")]
    Handshake { details: String },

    /// The peer did not present a leaf certificate
    #[error("No peer certificate found in the TLS session")]
    NoLeafCertificate,

    /// The session yielded no presented chain
    #[error("No peer certificate chain found in the TLS session")]
    NoChain,

    /// A presented certificate could not be parsed
    #[error("Certificate {index} of the presented chain could not be parsed: {reason}")]
    CertificateParse { index: usize, reason: String },

    /// A registered extension decoder rejected the extension bytes
    #[error("Failed to decode extension {identifier}: {reason}")]
    ExtensionDecode { identifier: String, reason: String },

    /// Report formatting failed
    #[error("Failed to render the report: {details}")]
    Render { details: String },
}

impl DiagnosticError {
    /// The pipeline stage that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Config { .. } => Stage::Configuration,
            Self::Resolution { .. }
            | Self::SocketCreate { .. }
            | Self::TimeoutSetting { .. }
            | Self::Connect { .. } => Stage::Connection,
            Self::UnsupportedVersion { .. }
            | Self::CipherPolicy { .. }
            | Self::Handshake { .. } => Stage::Session,
            Self::NoLeafCertificate | Self::NoChain | Self::CertificateParse { .. } => {
                Stage::Extraction
            }
            Self::ExtensionDecode { .. } => Stage::Decoding,
            Self::Render { .. } => Stage::Rendering,
        }
    }

    /// Process exit code for this error. Codes are stable across releases.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 2,
            Self::Resolution { .. } => 10,
            Self::SocketCreate { .. } => 11,
            Self::TimeoutSetting { .. } => 12,
            Self::Connect { .. } => 13,
            Self::UnsupportedVersion { .. } => 20,
            Self::CipherPolicy { .. } => 21,
            Self::Handshake { .. } => 22,
            Self::NoLeafCertificate => 30,
            Self::NoChain => 31,
            Self::CertificateParse { .. } => 32,
            Self::ExtensionDecode { .. } => 40,
            Self::Render { .. } => 50,
        }
    }
}

impl From<std::fmt::Error> for DiagnosticError {
    fn from(e: std::fmt::Error) -> Self {
        Self::Render {
            details: e.to_string(),
        }
    }
}

impl From<crate::config::ConfigError> for DiagnosticError {
    fn from(e: crate::config::ConfigError) -> Self {
        Self::Config {
            reason: e.to_string(),
        }
    }
}

impl<S: std::fmt::Debug> From<openssl::ssl::HandshakeError<S>> for DiagnosticError {
    fn from(e: openssl::ssl::HandshakeError<S>) -> Self {
        Self::Handshake {
            details: format!("{}", e),
        }
    }
}
