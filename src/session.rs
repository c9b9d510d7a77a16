//! TLS session negotiation over an established TCP connection.
//!
//! The session never validates the peer: verification is disabled so that
//! broken, expired and self-signed chains can still be shown.

use std::net::{IpAddr, SocketAddr, TcpStream};

use log::{debug, info, warn};
use openssl::ssl::{
    Ssl, SslContext, SslContextBuilder, SslMethod, SslOptions, SslRef, SslStream, SslVerifyMode,
    SslVersion,
};

use crate::connection::TlsVersion;
use crate::error::DiagnosticError;

pub const DEFAULT_CIPHER_LIST: &str = "ALL:@SECLEVEL=0";
pub const DEFAULT_VERIFY_DEPTH: u32 = 20;

/// Knobs for the client context that do not depend on the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub cipher_list: String,
    pub verify_depth: u32,
    pub send_sni: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            cipher_list: DEFAULT_CIPHER_LIST.to_string(),
            verify_depth: DEFAULT_VERIFY_DEPTH,
            send_sni: true,
        }
    }
}

/// Builds a client context pinned to the requested protocol version.
pub fn build_context(
    version: TlsVersion,
    options: &SessionOptions,
) -> Result<SslContext, DiagnosticError> {
    let unsupported = |e: openssl::error::ErrorStack| DiagnosticError::UnsupportedVersion {
        code: version.code(),
        reason: e.to_string(),
    };

    let mut builder = SslContextBuilder::new(SslMethod::tls_client()).map_err(unsupported)?;
    match version {
        TlsVersion::Ssl2 => {
            builder.set_options(SslOptions::ALL | SslOptions::NO_SSLV3);
        }
        TlsVersion::Ssl3 => {
            builder.set_options(SslOptions::ALL | SslOptions::NO_SSLV2);
            pin_version(&mut builder, SslVersion::SSL3).map_err(unsupported)?;
        }
        TlsVersion::Tls10 => pin_version(&mut builder, SslVersion::TLS1).map_err(unsupported)?,
        TlsVersion::Tls11 => pin_version(&mut builder, SslVersion::TLS1_1).map_err(unsupported)?,
        TlsVersion::Tls12 => pin_version(&mut builder, SslVersion::TLS1_2).map_err(unsupported)?,
    }

    builder.set_verify(SslVerifyMode::NONE);
    builder.set_verify_depth(options.verify_depth);
    builder
        .set_cipher_list(&options.cipher_list)
        .map_err(|e| DiagnosticError::CipherPolicy {
            policy: options.cipher_list.clone(),
            details: e.to_string(),
        })?;

    debug!(
        "client context ready for {} with ciphers \"{}\"",
        version, options.cipher_list
    );
    Ok(builder.build())
}

fn pin_version(
    builder: &mut SslContextBuilder,
    version: SslVersion,
) -> Result<(), openssl::error::ErrorStack> {
    builder.set_min_proto_version(Some(version))?;
    builder.set_max_proto_version(Some(version))
}

/// Connection facts captured once the handshake completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub peer_address: Option<SocketAddr>,
    pub socket_id: Option<i64>,
    pub negotiated_protocol: String,
    pub cipher: Option<String>,
}

/// A completed handshake. Owns the underlying socket.
pub struct TlsSession {
    stream: SslStream<TcpStream>,
    summary: SessionSummary,
}

impl TlsSession {
    /// Runs the handshake over `tcp`. On failure the partial session is dropped.
    pub fn handshake(
        context: &SslContext,
        tcp: TcpStream,
        host: &str,
        options: &SessionOptions,
    ) -> Result<TlsSession, DiagnosticError> {
        info!("starting TLS handshake with {}", host);
        let peer_address = tcp.peer_addr().ok();
        let socket_id = socket_id(&tcp);

        let mut ssl = Ssl::new(context).map_err(|e| DiagnosticError::Handshake {
            details: e.to_string(),
        })?;
        if options.send_sni && host.parse::<IpAddr>().is_err() {
            ssl.set_hostname(host).map_err(|e| DiagnosticError::Handshake {
                details: format!("cannot set SNI to {}: {}", host, e),
            })?;
        }

        let stream = ssl.connect(tcp)?;
        let summary = SessionSummary {
            peer_address,
            socket_id,
            negotiated_protocol: stream.ssl().version_str().to_string(),
            cipher: stream
                .ssl()
                .current_cipher()
                .map(|cipher| cipher.name().to_string()),
        };
        info!(
            "TLS session opened ({}, {})",
            summary.negotiated_protocol,
            summary.cipher.as_deref().unwrap_or("no cipher")
        );
        Ok(TlsSession { stream, summary })
    }

    pub fn ssl(&self) -> &SslRef {
        self.stream.ssl()
    }

    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    /// Sends close_notify. A failed shutdown does not fail the run.
    pub fn shutdown(mut self) {
        match self.stream.shutdown() {
            Ok(_) => info!("TLS session closed"),
            Err(e) => warn!("TLS shutdown did not complete: {}", e),
        }
    }
}

#[cfg(unix)]
fn socket_id(tcp: &TcpStream) -> Option<i64> {
    use std::os::unix::io::AsRawFd;
    Some(i64::from(tcp.as_raw_fd()))
}

#[cfg(not(unix))]
fn socket_id(_tcp: &TcpStream) -> Option<i64> {
    None
}
