//! Peer certificate chain extraction.
//!
//! Certificates are copied out of the TLS session into owned records so the
//! rest of the pipeline never touches the session again.

use log::{debug, info};
use openssl::x509::X509Ref;
use x509_parser::certificate::X509CertificateParser;
use x509_parser::nom::Parser;
use x509_parser::objects::{oid2abbrev, oid_registry};
use x509_parser::x509::X509Name;

use crate::error::DiagnosticError;
use crate::extensions::ExtensionKind;
use crate::session::TlsSession;

/// A subject or issuer distinguished name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistinguishedName {
    /// `(short name, value)` pairs in encoding order, e.g. `("CN", "example.com")`.
    pub entries: Vec<(String, String)>,
    /// DER encoding of the name exactly as it appears in the certificate.
    pub der: Vec<u8>,
}

impl DistinguishedName {
    /// First value of the attribute with the given short name.
    pub fn attribute(&self, short_name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == short_name)
            .map(|(_, value)| value.as_str())
    }

    /// Slash-separated form, e.g. `/C=NL/O=Example/CN=www.example.com`.
    pub fn oneline(&self) -> String {
        self.entries
            .iter()
            .map(|(name, value)| format!("/{}={}", name, value))
            .collect()
    }

    /// Attribute types without a registered abbreviation keep their dotted
    /// OID. Values are kept whole, embedded NUL bytes included.
    fn from_parsed(name: &X509Name<'_>) -> Self {
        let registry = oid_registry();
        let entries = name
            .iter_attributes()
            .map(|attr| {
                let oid = attr.attr_type();
                let key = match oid2abbrev(oid, registry) {
                    Ok(abbrev) => abbrev.to_string(),
                    Err(_) => oid.to_id_string(),
                };
                let value = match attr.as_str() {
                    Ok(text) => text.to_string(),
                    Err(_) => String::from_utf8_lossy(attr.attr_value().as_bytes()).into_owned(),
                };
                (key, value)
            })
            .collect();
        DistinguishedName {
            entries,
            der: name.as_raw().to_vec(),
        }
    }
}

/// One extension of a certificate, undecoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawExtension {
    /// Dotted object identifier, e.g. `2.5.29.17`.
    pub identifier: String,
    pub critical: bool,
    /// Contents of the extnValue OCTET STRING.
    pub value: Vec<u8>,
}

impl RawExtension {
    pub fn kind(&self) -> ExtensionKind {
        ExtensionKind::from_identifier(&self.identifier)
    }
}

/// One element of the presented chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRecord {
    /// X.509 version as displayed (1, 2 or 3).
    pub version: u32,
    pub subject: DistinguishedName,
    pub issuer: DistinguishedName,
    /// Extensions in storage order.
    pub extensions: Vec<RawExtension>,
}

impl CertificateRecord {
    /// Copies the fields the analysis needs out of an OpenSSL certificate.
    ///
    /// `index` is the position in the presented chain and only appears in errors.
    pub fn from_x509(cert: &X509Ref, index: usize) -> Result<CertificateRecord, DiagnosticError> {
        let parse_error = |reason: String| DiagnosticError::CertificateParse { index, reason };

        let der = cert.to_der().map_err(|e| parse_error(e.to_string()))?;
        // extension contents are decoded later, through the registry
        let mut parser = X509CertificateParser::new().with_deep_parse_extensions(false);
        let (_, parsed) = parser
            .parse(der.as_slice())
            .map_err(|e| parse_error(e.to_string()))?;

        let extensions = parsed
            .extensions()
            .iter()
            .map(|ext| RawExtension {
                identifier: ext.oid.to_id_string(),
                critical: ext.critical,
                value: ext.value.to_vec(),
            })
            .collect();

        Ok(CertificateRecord {
            version: parsed.version().0 + 1,
            subject: DistinguishedName::from_parsed(parsed.subject()),
            issuer: DistinguishedName::from_parsed(parsed.issuer()),
            extensions,
        })
    }

    /// Subject and issuer names are byte-for-byte identical.
    pub fn is_self_issued(&self) -> bool {
        self.subject.der == self.issuer.der
    }
}

/// The chain exactly as the peer presented it, leaf first.
///
/// Never empty once extracted; order and duplicates are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    certificates: Vec<CertificateRecord>,
}

impl Chain {
    /// Returns `None` for an empty list.
    pub fn new(certificates: Vec<CertificateRecord>) -> Option<Chain> {
        if certificates.is_empty() {
            None
        } else {
            Some(Chain { certificates })
        }
    }

    pub fn leaf(&self) -> &CertificateRecord {
        &self.certificates[0]
    }

    pub fn depth(&self) -> usize {
        self.certificates.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CertificateRecord> {
        self.certificates.iter()
    }
}

impl<'a> IntoIterator for &'a Chain {
    type Item = &'a CertificateRecord;
    type IntoIter = std::slice::Iter<'a, CertificateRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// What the peer presented: its own certificate and the full chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerCertificates {
    pub leaf: CertificateRecord,
    pub chain: Chain,
}

/// Reads the leaf and the presented chain from a completed session.
pub fn extract(session: &TlsSession) -> Result<PeerCertificates, DiagnosticError> {
    info!("extracting peer certificates");
    let ssl = session.ssl();

    let leaf = ssl
        .peer_certificate()
        .ok_or(DiagnosticError::NoLeafCertificate)?;
    let stack = ssl.peer_cert_chain().ok_or(DiagnosticError::NoChain)?;

    let records = stack
        .iter()
        .enumerate()
        .map(|(index, cert)| CertificateRecord::from_x509(cert, index))
        .collect::<Result<Vec<_>, _>>()?;
    let chain = Chain::new(records).ok_or(DiagnosticError::NoChain)?;
    let leaf = CertificateRecord::from_x509(&leaf, 0)?;

    debug!("peer presented {} certificate(s)", chain.depth());
    Ok(PeerCertificates { leaf, chain })
}
