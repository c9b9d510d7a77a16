//! Certificate fixtures built with OpenSSL.

#![allow(dead_code)]

use openssl::asn1::{Asn1Object, Asn1OctetString, Asn1Time};
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::x509::extension::{BasicConstraints, KeyUsage, SubjectAlternativeName};
use openssl::x509::{X509Builder, X509Extension, X509Name, X509NameBuilder, X509NameRef, X509};

pub struct Issued {
    pub cert: X509,
    pub key: PKey<Private>,
}

pub enum San<'a> {
    Dns(&'a str),
    Ip(&'a str),
    Email(&'a str),
    Uri(&'a str),
}

pub fn ec_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

pub fn name(cn: &str) -> X509Name {
    let mut builder = X509NameBuilder::new().unwrap();
    builder.append_entry_by_nid(Nid::COUNTRYNAME, "NL").unwrap();
    builder
        .append_entry_by_nid(Nid::ORGANIZATIONNAME, "Example")
        .unwrap();
    builder.append_entry_by_nid(Nid::COMMONNAME, cn).unwrap();
    builder.build()
}

fn builder(
    serial: u32,
    subject: &X509NameRef,
    issuer: &X509NameRef,
    key: &PKey<Private>,
) -> X509Builder {
    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(serial).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(subject).unwrap();
    builder.set_issuer_name(issuer).unwrap();
    builder.set_pubkey(key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(30).unwrap())
        .unwrap();
    builder
}

/// A self-signed CA certificate.
pub fn root(cn: &str) -> Issued {
    let key = ec_key();
    let subject = name(cn);
    let mut builder = builder(1, &subject, &subject, &key);
    builder
        .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
        .unwrap();
    builder
        .append_extension(
            KeyUsage::new()
                .critical()
                .key_cert_sign()
                .crl_sign()
                .build()
                .unwrap(),
        )
        .unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();
    Issued {
        cert: builder.build(),
        key,
    }
}

/// An end-entity certificate signed by `issuer`, with the given SANs (none
/// means no SAN extension at all).
pub fn leaf(cn: &str, sans: &[San<'_>], issuer: &Issued) -> Issued {
    let key = ec_key();
    let mut builder = builder(2, &name(cn), issuer.cert.subject_name(), &key);
    builder
        .append_extension(BasicConstraints::new().build().unwrap())
        .unwrap();
    builder
        .append_extension(
            KeyUsage::new()
                .critical()
                .digital_signature()
                .build()
                .unwrap(),
        )
        .unwrap();
    if !sans.is_empty() {
        let mut san = SubjectAlternativeName::new();
        for entry in sans {
            match entry {
                San::Dns(value) => san.dns(value),
                San::Ip(value) => san.ip(value),
                San::Email(value) => san.email(value),
                San::Uri(value) => san.uri(value),
            };
        }
        let extension = san
            .build(&builder.x509v3_context(Some(&*issuer.cert), None))
            .unwrap();
        builder.append_extension(extension).unwrap();
    }
    builder.sign(&issuer.key, MessageDigest::sha256()).unwrap();
    Issued {
        cert: builder.build(),
        key,
    }
}

/// A certificate whose subjectAltName extension holds `value` verbatim.
pub fn with_raw_san(cn: &str, value: &[u8], issuer: &Issued) -> Issued {
    let key = ec_key();
    let mut builder = builder(3, &name(cn), issuer.cert.subject_name(), &key);
    let oid = Asn1Object::from_str("2.5.29.17").unwrap();
    let contents = Asn1OctetString::new_from_bytes(value).unwrap();
    builder
        .append_extension(X509Extension::new_from_der(&oid, false, &contents).unwrap())
        .unwrap();
    builder.sign(&issuer.key, MessageDigest::sha256()).unwrap();
    Issued {
        cert: builder.build(),
        key,
    }
}

/// A certificate with an arbitrary subject and no extensions.
pub fn with_subject(subject: &X509NameRef, issuer: &Issued) -> Issued {
    let key = ec_key();
    let mut builder = builder(4, subject, issuer.cert.subject_name(), &key);
    builder.sign(&issuer.key, MessageDigest::sha256()).unwrap();
    Issued {
        cert: builder.build(),
        key,
    }
}
