//! Derives the report facts from the extracted chain.

use log::{debug, info};

use crate::chain::{CertificateRecord, Chain, PeerCertificates};
use crate::error::DiagnosticError;
use crate::extensions::{subject_alt_names, ExtensionRegistry, SubjectAltNameEntry};
use crate::purpose::{is_ssl_client_ca, UsageProfile};

/// Everything learned about the peer's certificates in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    /// `None` when the leaf subject has no commonName attribute.
    pub common_name: Option<String>,
    /// The leaf passes the SSL client purpose check with the CA check enabled.
    pub is_ca: bool,
    /// Some certificate in the chain has identical subject and issuer names.
    pub chain_has_self_signed_anchor: bool,
    /// Leaf Subject Alternative Names in decode order.
    pub sans: Vec<SubjectAltNameEntry>,
    pub chain: Chain,
}

/// First commonName of the subject, if any.
pub fn common_name(cert: &CertificateRecord) -> Option<String> {
    cert.subject.attribute("CN").map(str::to_string)
}

/// True iff any element of the chain is self-issued.
pub fn has_self_signed_anchor(chain: &Chain) -> bool {
    chain.iter().any(CertificateRecord::is_self_issued)
}

/// Decodes the leaf SANs and classifies the leaf and chain.
///
/// Fails only when the leaf carries a SAN extension that cannot be decoded.
pub fn analyze(
    registry: &ExtensionRegistry,
    peer: PeerCertificates,
) -> Result<CertificateInfo, DiagnosticError> {
    info!("analyzing the presented chain");
    let PeerCertificates { leaf, chain } = peer;

    let sans = subject_alt_names(registry, &leaf)?;
    let common_name = common_name(&leaf);
    let is_ca = is_ssl_client_ca(&UsageProfile::from_record(registry, &leaf));
    let chain_has_self_signed_anchor = has_self_signed_anchor(&chain);

    debug!(
        "common name {:?}, leaf is CA: {}, self-signed anchor: {}",
        common_name, is_ca, chain_has_self_signed_anchor
    );
    Ok(CertificateInfo {
        common_name,
        is_ca,
        chain_has_self_signed_anchor,
        sans,
        chain,
    })
}
