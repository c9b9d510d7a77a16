//! Decoders for the extensions that drive the certificate purpose check.

use x509_parser::der_parser::ber::BerObjectContent;
use x509_parser::der_parser::der::parse_der_bitstring;
use x509_parser::extensions::{BasicConstraints, ExtendedKeyUsage, KeyUsage};
use x509_parser::prelude::FromDer;

use super::{DecodeError, DecodedExtension};

const KEY_USAGE_NAMES: [&str; 9] = [
    "Digital Signature",
    "Non Repudiation",
    "Key Encipherment",
    "Data Encipherment",
    "Key Agreement",
    "Certificate Sign",
    "CRL Sign",
    "Encipher Only",
    "Decipher Only",
];

pub fn decode_basic_constraints(bytes: &[u8]) -> Result<DecodedExtension, DecodeError> {
    let (rest, constraints) = BasicConstraints::from_der(bytes)
        .map_err(|e| DecodeError(format!("invalid BasicConstraints: {}", e)))?;
    ensure_consumed(rest)?;
    Ok(DecodedExtension::BasicConstraints {
        ca: constraints.ca,
        path_len: constraints.path_len_constraint,
    })
}

pub fn decode_key_usage(bytes: &[u8]) -> Result<DecodedExtension, DecodeError> {
    let (rest, usage) = KeyUsage::from_der(bytes)
        .map_err(|e| DecodeError(format!("invalid KeyUsage: {}", e)))?;
    ensure_consumed(rest)?;
    let usages = KEY_USAGE_NAMES
        .iter()
        .enumerate()
        .filter(|(bit, _)| usage.flags & (1 << bit) != 0)
        .map(|(_, name)| name.to_string())
        .collect();
    Ok(DecodedExtension::KeyUsage {
        key_cert_sign: usage.key_cert_sign(),
        usages,
    })
}

pub fn decode_extended_key_usage(bytes: &[u8]) -> Result<DecodedExtension, DecodeError> {
    let (rest, eku) = ExtendedKeyUsage::from_der(bytes)
        .map_err(|e| DecodeError(format!("invalid ExtendedKeyUsage: {}", e)))?;
    ensure_consumed(rest)?;

    let known = [
        (eku.server_auth, "serverAuth"),
        (eku.client_auth, "clientAuth"),
        (eku.code_signing, "codeSigning"),
        (eku.email_protection, "emailProtection"),
        (eku.time_stamping, "timeStamping"),
        (eku.ocsp_signing, "OCSPSigning"),
        (eku.any, "anyExtendedKeyUsage"),
    ];
    let mut purposes: Vec<String> = known
        .iter()
        .filter(|(present, _)| *present)
        .map(|(_, name)| name.to_string())
        .collect();
    purposes.extend(eku.other.iter().map(|oid| oid.to_id_string()));

    Ok(DecodedExtension::ExtendedKeyUsage {
        client_auth: eku.client_auth,
        purposes,
    })
}

/// Netscape certificate type bits, first byte of the BIT STRING (MSB first).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetscapeCertType(pub u8);

impl NetscapeCertType {
    pub const SSL_CLIENT: u8 = 0x80;
    pub const SSL_SERVER: u8 = 0x40;
    pub const SMIME: u8 = 0x20;
    pub const OBJECT_SIGNING: u8 = 0x10;
    pub const SSL_CA: u8 = 0x04;
    pub const SMIME_CA: u8 = 0x02;
    pub const OBJECT_SIGNING_CA: u8 = 0x01;
    pub const ANY_CA: u8 = Self::SSL_CA | Self::SMIME_CA | Self::OBJECT_SIGNING_CA;

    pub fn has(self, bits: u8) -> bool {
        self.0 & bits != 0
    }

    pub fn names(self) -> Vec<&'static str> {
        [
            (Self::SSL_CLIENT, "SSL Client"),
            (Self::SSL_SERVER, "SSL Server"),
            (Self::SMIME, "S/MIME"),
            (Self::OBJECT_SIGNING, "Object Signing"),
            (Self::SSL_CA, "SSL CA"),
            (Self::SMIME_CA, "S/MIME CA"),
            (Self::OBJECT_SIGNING_CA, "Object Signing CA"),
        ]
        .iter()
        .filter(|(bit, _)| self.has(*bit))
        .map(|(_, name)| *name)
        .collect()
    }
}

pub fn decode_netscape_cert_type(bytes: &[u8]) -> Result<DecodedExtension, DecodeError> {
    let (rest, object) = parse_der_bitstring(bytes)
        .map_err(|e| DecodeError(format!("invalid nsCertType: {}", e)))?;
    ensure_consumed(rest)?;
    let flags = match object.content {
        BerObjectContent::BitString(_, bits) => bits.data.first().copied().unwrap_or(0),
        _ => return Err(DecodeError("nsCertType is not a BIT STRING".to_string())),
    };
    Ok(DecodedExtension::NetscapeCertType(NetscapeCertType(flags)))
}

fn ensure_consumed(rest: &[u8]) -> Result<(), DecodeError> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(DecodeError(format!("{} trailing byte(s)", rest.len())))
    }
}
