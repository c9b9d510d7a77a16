//! Certificate purpose classification.
//!
//! Answers "may this certificate act as a CA for SSL clients", following the
//! rules OpenSSL applies for the `sslclient` purpose with the CA check
//! enabled.

use crate::chain::CertificateRecord;
use crate::extensions::{DecodedExtension, ExtensionKind, ExtensionRegistry, NetscapeCertType};

/// The extensions that feed the purpose check, already decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageProfile {
    pub basic_constraints_ca: Option<bool>,
    pub key_cert_sign: Option<bool>,
    pub client_auth: Option<bool>,
    pub netscape_cert_type: Option<NetscapeCertType>,
    pub v1_self_issued: bool,
}

impl UsageProfile {
    pub fn from_record(registry: &ExtensionRegistry, cert: &CertificateRecord) -> Self {
        let mut profile = UsageProfile {
            v1_self_issued: cert.version == 1 && cert.is_self_issued(),
            ..UsageProfile::default()
        };

        if let Some(DecodedExtension::BasicConstraints { ca, .. }) =
            registry.decode_lenient(cert, ExtensionKind::BasicConstraints)
        {
            profile.basic_constraints_ca = Some(ca);
        }
        if let Some(DecodedExtension::KeyUsage { key_cert_sign, .. }) =
            registry.decode_lenient(cert, ExtensionKind::KeyUsage)
        {
            profile.key_cert_sign = Some(key_cert_sign);
        }
        if let Some(DecodedExtension::ExtendedKeyUsage { client_auth, .. }) =
            registry.decode_lenient(cert, ExtensionKind::ExtendedKeyUsage)
        {
            profile.client_auth = Some(client_auth);
        }
        if let Some(DecodedExtension::NetscapeCertType(cert_type)) =
            registry.decode_lenient(cert, ExtensionKind::NetscapeCertType)
        {
            profile.netscape_cert_type = Some(cert_type);
        }
        profile
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaEvidence {
    NotCa,
    BasicConstraints,
    V1Root,
    KeyUsage,
    NetscapeOnly,
}

fn ca_evidence(profile: &UsageProfile) -> CaEvidence {
    // keyUsage, when present, must allow certificate signing
    if profile.key_cert_sign == Some(false) {
        return CaEvidence::NotCa;
    }
    match profile.basic_constraints_ca {
        Some(true) => CaEvidence::BasicConstraints,
        Some(false) => CaEvidence::NotCa,
        None if profile.v1_self_issued => CaEvidence::V1Root,
        None if profile.key_cert_sign.is_some() => CaEvidence::KeyUsage,
        None => match profile.netscape_cert_type {
            Some(cert_type) if cert_type.has(NetscapeCertType::ANY_CA) => CaEvidence::NetscapeOnly,
            _ => CaEvidence::NotCa,
        },
    }
}

/// SSL client purpose with the CA check.
pub fn is_ssl_client_ca(profile: &UsageProfile) -> bool {
    if profile.client_auth == Some(false) {
        return false;
    }
    match ca_evidence(profile) {
        CaEvidence::NotCa => false,
        // Netscape-only evidence must name an SSL CA specifically
        CaEvidence::NetscapeOnly => profile
            .netscape_cert_type
            .map_or(false, |cert_type| cert_type.has(NetscapeCertType::SSL_CA)),
        CaEvidence::BasicConstraints | CaEvidence::V1Root | CaEvidence::KeyUsage => true,
    }
}
