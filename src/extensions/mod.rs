//! Generic X.509v3 extension decoding.
//!
//! Extensions arrive as an identifier plus opaque bytes. Each extension type
//! has its own encoding, so decoding goes through an [`ExtensionRegistry`]
//! that maps the identifier to a decode function. Decoders return an owned
//! [`DecodedExtension`] which can also be flattened into ordered
//! `(name, value)` pairs.

mod general_names;
mod usage;

use std::collections::HashMap;
use std::fmt;

use log::{debug, warn};
use strum_macros::{Display, EnumIter};
use thiserror::Error;

use crate::chain::{CertificateRecord, RawExtension};
use crate::error::DiagnosticError;

pub use general_names::{decode_issuer_alt_name, decode_subject_alt_name};
pub use usage::{
    decode_basic_constraints, decode_extended_key_usage, decode_key_usage,
    decode_netscape_cert_type, NetscapeCertType,
};

/// Extension types the decoder knows by identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum ExtensionKind {
    #[strum(serialize = "subjectAltName")]
    SubjectAltName,
    #[strum(serialize = "issuerAltName")]
    IssuerAltName,
    #[strum(serialize = "basicConstraints")]
    BasicConstraints,
    #[strum(serialize = "keyUsage")]
    KeyUsage,
    #[strum(serialize = "extendedKeyUsage")]
    ExtendedKeyUsage,
    #[strum(serialize = "nsCertType")]
    NetscapeCertType,
    #[strum(serialize = "other")]
    Other,
}

impl ExtensionKind {
    pub fn from_identifier(identifier: &str) -> ExtensionKind {
        match identifier {
            "2.5.29.17" => ExtensionKind::SubjectAltName,
            "2.5.29.18" => ExtensionKind::IssuerAltName,
            "2.5.29.19" => ExtensionKind::BasicConstraints,
            "2.5.29.15" => ExtensionKind::KeyUsage,
            "2.5.29.37" => ExtensionKind::ExtendedKeyUsage,
            "2.16.840.1.113730.1.1" => ExtensionKind::NetscapeCertType,
            _ => ExtensionKind::Other,
        }
    }
}

/// Why a decoder rejected an extension value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DecodeError(pub String);

/// One `(name, value)` entry of a decoded extension, e.g. `("DNS", "example.com")`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameValue {
    pub name: String,
    pub value: String,
}

impl NameValue {
    pub fn new(name: &str, value: impl Into<String>) -> Self {
        NameValue {
            name: name.to_string(),
            value: value.into(),
        }
    }
}

/// Owned result of decoding one extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedExtension {
    /// subjectAltName / issuerAltName entries in encoding order
    GeneralNames(Vec<NameValue>),
    BasicConstraints {
        ca: bool,
        path_len: Option<u32>,
    },
    KeyUsage {
        key_cert_sign: bool,
        usages: Vec<String>,
    },
    ExtendedKeyUsage {
        client_auth: bool,
        purposes: Vec<String>,
    },
    NetscapeCertType(NetscapeCertType),
}

impl DecodedExtension {
    /// Flattens the decoded value into ordered `(name, value)` pairs.
    pub fn name_values(&self) -> Vec<NameValue> {
        match self {
            DecodedExtension::GeneralNames(names) => names.clone(),
            DecodedExtension::BasicConstraints { ca, path_len } => {
                let mut values = vec![NameValue::new("CA", if *ca { "TRUE" } else { "FALSE" })];
                if let Some(len) = path_len {
                    values.push(NameValue::new("pathlen", len.to_string()));
                }
                values
            }
            DecodedExtension::KeyUsage { usages, .. } => usages
                .iter()
                .map(|usage| NameValue::new(usage, ""))
                .collect(),
            DecodedExtension::ExtendedKeyUsage { purposes, .. } => purposes
                .iter()
                .map(|purpose| NameValue::new(purpose, ""))
                .collect(),
            DecodedExtension::NetscapeCertType(cert_type) => cert_type
                .names()
                .into_iter()
                .map(|name| NameValue::new(name, ""))
                .collect(),
        }
    }
}

/// Decode routine for one extension type. Works on the extnValue contents.
pub type DecodeFn = fn(&[u8]) -> Result<DecodedExtension, DecodeError>;

/// Maps extension identifiers to decode functions.
///
/// Each diagnostic run builds its own registry; nothing is shared globally.
#[derive(Clone)]
pub struct ExtensionRegistry {
    decoders: HashMap<ExtensionKind, DecodeFn>,
}

impl ExtensionRegistry {
    /// A registry with no decoders.
    pub fn empty() -> Self {
        ExtensionRegistry {
            decoders: HashMap::new(),
        }
    }

    /// A registry with decoders for every known [`ExtensionKind`].
    pub fn with_defaults() -> Self {
        let mut registry = ExtensionRegistry::empty();
        registry.register(ExtensionKind::SubjectAltName, decode_subject_alt_name);
        registry.register(ExtensionKind::IssuerAltName, decode_issuer_alt_name);
        registry.register(ExtensionKind::BasicConstraints, decode_basic_constraints);
        registry.register(ExtensionKind::KeyUsage, decode_key_usage);
        registry.register(ExtensionKind::ExtendedKeyUsage, decode_extended_key_usage);
        registry.register(ExtensionKind::NetscapeCertType, decode_netscape_cert_type);
        registry
    }

    /// Registers `decoder` for `kind`, replacing any earlier one.
    pub fn register(&mut self, kind: ExtensionKind, decoder: DecodeFn) {
        self.decoders.insert(kind, decoder);
    }

    pub fn lookup(&self, kind: ExtensionKind) -> Option<DecodeFn> {
        self.decoders.get(&kind).copied()
    }

    /// Decodes one extension. `Ok(None)` means no decoder is registered for it.
    pub fn decode(
        &self,
        extension: &RawExtension,
    ) -> Result<Option<DecodedExtension>, DiagnosticError> {
        let kind = extension.kind();
        let decoder = match self.lookup(kind) {
            Some(decoder) => decoder,
            None => return Ok(None),
        };
        decoder(&extension.value)
            .map(Some)
            .map_err(|e| DiagnosticError::ExtensionDecode {
                identifier: format!("{} ({})", kind, extension.identifier),
                reason: e.to_string(),
            })
    }

    /// Decodes the first extension of `kind` in `cert`.
    ///
    /// Used for the usage extensions, where a bad encoding is reported and
    /// treated as if the extension were absent.
    pub fn decode_lenient(
        &self,
        cert: &CertificateRecord,
        kind: ExtensionKind,
    ) -> Option<DecodedExtension> {
        let extension = cert.extensions.iter().find(|ext| ext.kind() == kind)?;
        match self.decode(extension) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("ignoring undecodable extension: {}", e);
                None
            }
        }
    }
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        ExtensionRegistry::with_defaults()
    }
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<String> = self.decoders.keys().map(|k| k.to_string()).collect();
        kinds.sort();
        f.debug_struct("ExtensionRegistry")
            .field("decoders", &kinds)
            .finish()
    }
}

/// Classification of a Subject Alternative Name entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SanKind {
    #[strum(serialize = "DNS")]
    Dns,
    #[strum(serialize = "IP")]
    Ip,
    #[strum(serialize = "EMAIL")]
    Email,
    #[strum(serialize = "UNKNOWN")]
    Unknown,
}

impl SanKind {
    /// Case-insensitive classification of a decoded entry name.
    pub fn classify(name: &str) -> SanKind {
        if name.eq_ignore_ascii_case("DNS") {
            SanKind::Dns
        } else if name.eq_ignore_ascii_case("iPAddress") {
            SanKind::Ip
        } else if name.eq_ignore_ascii_case("email") {
            SanKind::Email
        } else {
            SanKind::Unknown
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectAltNameEntry {
    pub kind: SanKind,
    pub value: String,
}

impl fmt::Display for SubjectAltNameEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

/// Collects the Subject Alternative Names of `cert` in decode order.
///
/// No SAN extension yields an empty list. Several SAN extensions are all
/// decoded and concatenated in storage order. Any undecodable SAN fails the
/// whole call; no partial list is returned.
pub fn subject_alt_names(
    registry: &ExtensionRegistry,
    cert: &CertificateRecord,
) -> Result<Vec<SubjectAltNameEntry>, DiagnosticError> {
    let mut entries = Vec::new();
    for extension in &cert.extensions {
        if extension.kind() != ExtensionKind::SubjectAltName {
            continue;
        }
        let decoded = registry
            .decode(extension)?
            .ok_or_else(|| DiagnosticError::ExtensionDecode {
                identifier: extension.identifier.clone(),
                reason: "no decoder registered".to_string(),
            })?;
        for pair in decoded.name_values() {
            entries.push(SubjectAltNameEntry {
                kind: SanKind::classify(&pair.name),
                value: pair.value,
            });
        }
    }
    debug!("found {} subject alternative name(s)", entries.len());
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::DistinguishedName;
    use strum::IntoEnumIterator;

    // SEQUENCE { dNSName "a.example", dNSName "b.example", iPAddress 1.2.3.4 }
    const SAN_DNS_DNS_IP: &[u8] = &[
        0x30, 0x1c, 0x82, 0x09, b'a', b'.', b'e', b'x', b'a', b'm', b'p', b'l', b'e', 0x82, 0x09,
        b'b', b'.', b'e', b'x', b'a', b'm', b'p', b'l', b'e', 0x87, 0x04, 1, 2, 3, 4,
    ];

    // SEQUENCE { uniformResourceIdentifier "https://x" }
    const SAN_URI: &[u8] = &[
        0x30, 0x0b, 0x86, 0x09, b'h', b't', b't', b'p', b's', b':', b'/', b'/', b'x',
    ];

    // SEQUENCE claims 5 content bytes, only 2 follow
    const SAN_TRUNCATED: &[u8] = &[0x30, 0x05, 0x82, 0x10];

    fn extension(identifier: &str, value: &[u8]) -> RawExtension {
        RawExtension {
            identifier: identifier.to_string(),
            critical: false,
            value: value.to_vec(),
        }
    }

    fn record(extensions: Vec<RawExtension>) -> CertificateRecord {
        let dn = DistinguishedName {
            entries: vec![("CN".to_string(), "leaf".to_string())],
            der: b"leaf".to_vec(),
        };
        CertificateRecord {
            version: 3,
            subject: dn.clone(),
            issuer: dn,
            extensions,
        }
    }

    #[test]
    fn test_classify_is_case_insensitive() {
        assert_eq!(SanKind::classify("dns"), SanKind::Dns);
        assert_eq!(SanKind::classify("IPADDRESS"), SanKind::Ip);
        assert_eq!(SanKind::classify("Email"), SanKind::Email);
        assert_eq!(SanKind::classify("URI"), SanKind::Unknown);
        assert_eq!(SanKind::classify("IP Address"), SanKind::Unknown);
    }

    #[test]
    fn test_kind_from_identifier() {
        assert_eq!(
            ExtensionKind::from_identifier("2.5.29.17"),
            ExtensionKind::SubjectAltName
        );
        assert_eq!(
            ExtensionKind::from_identifier("1.3.6.1.5.5.7.1.1"),
            ExtensionKind::Other
        );
    }

    #[test]
    fn test_default_registry_covers_known_kinds() {
        let registry = ExtensionRegistry::with_defaults();
        for kind in ExtensionKind::iter() {
            assert_eq!(
                registry.lookup(kind).is_some(),
                kind != ExtensionKind::Other,
                "{}",
                kind
            );
        }
    }

    #[test]
    fn test_sans_in_decode_order() {
        let registry = ExtensionRegistry::with_defaults();
        let cert = record(vec![extension("2.5.29.17", SAN_DNS_DNS_IP)]);
        let sans = subject_alt_names(&registry, &cert).unwrap();
        assert_eq!(
            sans,
            vec![
                SubjectAltNameEntry {
                    kind: SanKind::Dns,
                    value: "a.example".to_string()
                },
                SubjectAltNameEntry {
                    kind: SanKind::Dns,
                    value: "b.example".to_string()
                },
                SubjectAltNameEntry {
                    kind: SanKind::Ip,
                    value: "1.2.3.4".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_decoding_is_deterministic() {
        let registry = ExtensionRegistry::with_defaults();
        let cert = record(vec![extension("2.5.29.17", SAN_DNS_DNS_IP)]);
        let first = subject_alt_names(&registry, &cert).unwrap();
        let second = subject_alt_names(&registry, &cert).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_uri_is_unknown() {
        let registry = ExtensionRegistry::with_defaults();
        let cert = record(vec![extension("2.5.29.17", SAN_URI)]);
        let sans = subject_alt_names(&registry, &cert).unwrap();
        assert_eq!(
            sans,
            vec![SubjectAltNameEntry {
                kind: SanKind::Unknown,
                value: "https://x".to_string()
            }]
        );
        assert_eq!(sans[0].to_string(), "UNKNOWN:https://x");
    }

    #[test]
    fn test_missing_san_is_empty() {
        let registry = ExtensionRegistry::with_defaults();
        // basicConstraints: SEQUENCE { BOOLEAN TRUE }
        let cert = record(vec![extension("2.5.29.19", &[0x30, 0x03, 0x01, 0x01, 0xff])]);
        assert!(subject_alt_names(&registry, &cert).unwrap().is_empty());
        assert!(subject_alt_names(&registry, &record(Vec::new()))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_truncated_san_fails() {
        let registry = ExtensionRegistry::with_defaults();
        let cert = record(vec![
            extension("2.5.29.17", SAN_DNS_DNS_IP),
            extension("2.5.29.17", SAN_TRUNCATED),
        ]);
        match subject_alt_names(&registry, &cert) {
            Err(DiagnosticError::ExtensionDecode { identifier, .. }) => {
                assert!(identifier.contains("2.5.29.17"))
            }
            other => panic!("expected ExtensionDecode, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_error_is_std_error() {
        let err: Box<dyn std::error::Error> = Box::new(DecodeError("bad length".to_string()));
        assert_eq!(err.to_string(), "bad length");
    }

    #[test]
    fn test_wrong_tag_san_fails() {
        let registry = ExtensionRegistry::with_defaults();
        let cert = record(vec![extension("2.5.29.17", &[0x04, 0x00])]);
        assert!(subject_alt_names(&registry, &cert).is_err());
    }

    #[test]
    fn test_multiple_san_extensions_concatenate() {
        let registry = ExtensionRegistry::with_defaults();
        let cert = record(vec![
            extension("2.5.29.17", SAN_URI),
            extension("2.5.29.17", SAN_DNS_DNS_IP),
        ]);
        let values: Vec<String> = subject_alt_names(&registry, &cert)
            .unwrap()
            .into_iter()
            .map(|entry| entry.value)
            .collect();
        assert_eq!(values, vec!["https://x", "a.example", "b.example", "1.2.3.4"]);
    }

    #[test]
    fn test_san_without_decoder_fails() {
        let registry = ExtensionRegistry::empty();
        let cert = record(vec![extension("2.5.29.17", SAN_URI)]);
        assert!(matches!(
            subject_alt_names(&registry, &cert),
            Err(DiagnosticError::ExtensionDecode { .. })
        ));
    }

    #[test]
    fn test_custom_decoder_replaces_default() {
        fn fixed(_: &[u8]) -> Result<DecodedExtension, DecodeError> {
            Ok(DecodedExtension::GeneralNames(vec![NameValue::new(
                "email",
                "ops@example.com",
            )]))
        }
        let mut registry = ExtensionRegistry::with_defaults();
        registry.register(ExtensionKind::SubjectAltName, fixed);
        let cert = record(vec![extension("2.5.29.17", SAN_TRUNCATED)]);
        let sans = subject_alt_names(&registry, &cert).unwrap();
        assert_eq!(sans[0].kind, SanKind::Email);
    }

    #[test]
    fn test_basic_constraints_name_values() {
        let decoded = DecodedExtension::BasicConstraints {
            ca: true,
            path_len: Some(0),
        };
        assert_eq!(
            decoded.name_values(),
            vec![NameValue::new("CA", "TRUE"), NameValue::new("pathlen", "0")]
        );
    }

    #[test]
    fn test_lenient_decode_ignores_garbage() {
        let registry = ExtensionRegistry::with_defaults();
        let cert = record(vec![extension("2.5.29.19", &[0xff, 0x01])]);
        assert_eq!(
            registry.decode_lenient(&cert, ExtensionKind::BasicConstraints),
            None
        );
    }
}
