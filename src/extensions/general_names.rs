use std::net::{Ipv4Addr, Ipv6Addr};

use x509_parser::extensions::{GeneralName, IssuerAlternativeName, SubjectAlternativeName};
use x509_parser::prelude::FromDer;

use super::{DecodeError, DecodedExtension, NameValue};

/// Decodes a subjectAltName value (a GeneralNames SEQUENCE).
pub fn decode_subject_alt_name(bytes: &[u8]) -> Result<DecodedExtension, DecodeError> {
    let (rest, san) = SubjectAlternativeName::from_der(bytes)
        .map_err(|e| DecodeError(format!("invalid GeneralNames: {}", e)))?;
    ensure_consumed(rest)?;
    Ok(DecodedExtension::GeneralNames(
        san.general_names.iter().map(name_value).collect(),
    ))
}

/// Decodes an issuerAltName value. Same encoding as subjectAltName.
pub fn decode_issuer_alt_name(bytes: &[u8]) -> Result<DecodedExtension, DecodeError> {
    let (rest, ian) = IssuerAlternativeName::from_der(bytes)
        .map_err(|e| DecodeError(format!("invalid GeneralNames: {}", e)))?;
    ensure_consumed(rest)?;
    Ok(DecodedExtension::GeneralNames(
        ian.general_names.iter().map(name_value).collect(),
    ))
}

fn ensure_consumed(rest: &[u8]) -> Result<(), DecodeError> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(DecodeError(format!(
            "{} trailing byte(s) after GeneralNames",
            rest.len()
        )))
    }
}

fn name_value(name: &GeneralName<'_>) -> NameValue {
    match name {
        GeneralName::OtherName(oid, _) => NameValue::new("othername", oid.to_id_string()),
        GeneralName::RFC822Name(email) => NameValue::new("email", *email),
        GeneralName::DNSName(dns) => NameValue::new("DNS", *dns),
        GeneralName::X400Address(_) => NameValue::new("X400Name", "<unsupported>"),
        GeneralName::DirectoryName(dn) => NameValue::new("DirName", dn.to_string()),
        GeneralName::EDIPartyName(_) => NameValue::new("EdiPartyName", "<unsupported>"),
        GeneralName::URI(uri) => NameValue::new("URI", *uri),
        GeneralName::IPAddress(ip) => NameValue::new("iPAddress", format_ip(ip)),
        GeneralName::RegisteredID(oid) => NameValue::new("Registered ID", oid.to_id_string()),
    }
}

fn format_ip(bytes: &[u8]) -> String {
    match bytes.len() {
        4 => Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]).to_string(),
        16 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(bytes);
            Ipv6Addr::from(octets).to_string()
        }
        _ => bytes
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(":"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_ip() {
        assert_eq!(format_ip(&[10, 0, 0, 1]), "10.0.0.1");
        let mut v6 = [0u8; 16];
        v6[15] = 1;
        assert_eq!(format_ip(&v6), "::1");
        // address/mask pair as seen in name constraints
        assert_eq!(format_ip(&[10, 0, 0, 0, 255, 0, 0, 0]), "0A:00:00:00:FF:00:00:00");
    }

    #[test]
    fn test_email_and_ipv6() {
        // SEQUENCE { rfc822Name "a@b.c", iPAddress ::1 }
        let mut bytes = vec![0x30, 0x19, 0x81, 0x05, b'a', b'@', b'b', b'.', b'c', 0x87, 0x10];
        let mut v6 = [0u8; 16];
        v6[15] = 1;
        bytes.extend_from_slice(&v6);

        let decoded = decode_subject_alt_name(&bytes).unwrap();
        assert_eq!(
            decoded,
            DecodedExtension::GeneralNames(vec![
                NameValue::new("email", "a@b.c"),
                NameValue::new("iPAddress", "::1"),
            ])
        );
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        // SEQUENCE { dNSName "x" } followed by a stray byte
        let bytes = [0x30, 0x03, 0x82, 0x01, b'x', 0x00];
        assert!(decode_subject_alt_name(&bytes).is_err());
    }

    #[test]
    fn test_uri_and_registered_id() {
        // SEQUENCE { uniformResourceIdentifier "u:x", registeredID 1.2.3 }
        let bytes = [
            0x30, 0x09, 0x86, 0x03, b'u', b':', b'x', 0x88, 0x02, 0x2A, 0x03,
        ];
        assert_eq!(
            decode_subject_alt_name(&bytes).unwrap(),
            DecodedExtension::GeneralNames(vec![
                NameValue::new("URI", "u:x"),
                NameValue::new("Registered ID", "1.2.3"),
            ])
        );
    }

    #[test]
    fn test_issuer_alt_name() {
        let bytes = [0x30, 0x03, 0x82, 0x01, b'x'];
        assert_eq!(
            decode_issuer_alt_name(&bytes).unwrap(),
            DecodedExtension::GeneralNames(vec![NameValue::new("DNS", "x")])
        );
    }
}
