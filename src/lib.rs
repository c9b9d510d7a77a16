//! Inspect the certificate chain a TLS server presents.
//!
//! A run connects to one host, negotiates the requested protocol version
//! without validating the peer, copies out the presented chain and reports
//! its subject/issuer names, the leaf's Subject Alternative Names and Common
//! Name, whether the leaf is a CA and whether the chain contains a
//! self-signed certificate.
//!
//! ```no_run
//! use chainpeek::{diagnose, initialize, ConnectionParams, SessionOptions, TlsVersion};
//!
//! initialize();
//! let params = ConnectionParams::new("example.com", 443, TlsVersion::Tls12);
//! let diagnosis = diagnose(&params, &SessionOptions::default())?;
//! print!("{}", diagnosis.render()?);
//! # Ok::<(), chainpeek::DiagnosticError>(())
//! ```

use std::sync::Once;

use log::debug;

pub mod analysis;
pub mod chain;
pub mod config;
pub mod connection;
pub mod error;
pub mod extensions;
pub mod purpose;
pub mod report;
pub mod session;

pub use analysis::CertificateInfo;
pub use chain::{CertificateRecord, Chain, DistinguishedName, RawExtension};
pub use connection::{ConnectionParams, TlsVersion};
pub use error::{DiagnosticError, Stage};
pub use extensions::{ExtensionRegistry, SanKind, SubjectAltNameEntry};
pub use session::{SessionOptions, SessionSummary, TlsSession};

static INIT: Once = Once::new();

/// Initializes the TLS library. Safe to call any number of times.
pub fn initialize() {
    INIT.call_once(|| {
        openssl::init();
        debug!("{} initialized", openssl::version::version());
    });
}

/// Result of one successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnosis {
    pub params: ConnectionParams,
    pub session: SessionSummary,
    pub info: CertificateInfo,
}

impl Diagnosis {
    pub fn render(&self) -> Result<String, DiagnosticError> {
        report::render(&self.params, &self.session, &self.info)
    }
}

/// Runs the whole pipeline against one host.
///
/// Stages run in order and the first failure aborts the run: context setup,
/// TCP connect, handshake, chain extraction, analysis. Every stage uses its
/// own instances, so concurrent runs share nothing.
pub fn diagnose(
    params: &ConnectionParams,
    options: &SessionOptions,
) -> Result<Diagnosis, DiagnosticError> {
    initialize();
    let registry = ExtensionRegistry::with_defaults();

    let context = session::build_context(params.requested_version, options)?;
    let tcp = connection::establish(params)?;
    let tls = TlsSession::handshake(&context, tcp, &params.host, options)?;

    let peer = chain::extract(&tls)?;
    let summary = tls.summary().clone();
    tls.shutdown();

    let info = analysis::analyze(&registry, peer)?;
    Ok(Diagnosis {
        params: params.clone(),
        session: summary,
        info,
    })
}
