//! Text report of a diagnostic run.

use std::fmt::Write;

use crate::analysis::CertificateInfo;
use crate::connection::ConnectionParams;
use crate::error::DiagnosticError;
use crate::session::SessionSummary;

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

/// Renders the report. Identical inputs always produce identical text.
pub fn render(
    params: &ConnectionParams,
    session: &SessionSummary,
    info: &CertificateInfo,
) -> Result<String, DiagnosticError> {
    let mut out = String::new();

    writeln!(out, ": Host/IP           : {}", params.host)?;
    writeln!(out, ": Port              : {}", params.port)?;
    match session.peer_address {
        Some(address) => writeln!(out, ": Peer address      : {}", address)?,
        None => writeln!(out, ": Peer address      : unknown")?,
    }
    match session.socket_id {
        Some(id) => writeln!(out, ": Socket no         : {}", id)?,
        None => writeln!(out, ": Socket no         : n/a")?,
    }
    writeln!(out, ": SSL/TLS version   : {}", params.requested_version)?;
    writeln!(out, ": Negotiated        : {}", session.negotiated_protocol)?;
    writeln!(
        out,
        ": Cipher            : {}",
        session.cipher.as_deref().unwrap_or("none")
    )?;

    // a CertificateInfo only exists once both were extracted
    writeln!(out, ": Certificate?      : Yes")?;
    writeln!(out, ": Stack?            : Yes")?;
    writeln!(out, ": Chain depth       : {}", info.chain.depth())?;
    writeln!(
        out,
        ": Root CA in stack? : {}",
        yes_no(info.chain_has_self_signed_anchor)
    )?;
    writeln!(out, ": Peer is a CA?     : {}", yes_no(info.is_ca))?;

    for (level, cert) in info.chain.iter().enumerate() {
        writeln!(
            out,
            ": Subject DN        : {:2}{:>width$} {}",
            level,
            "-|",
            cert.subject.oneline(),
            width = level + 2
        )?;
        writeln!(
            out,
            ": Issuer DN         : {:2}{:>width$} {}",
            level,
            "-|",
            cert.issuer.oneline(),
            width = level + 2
        )?;
    }

    if info.sans.is_empty() {
        writeln!(out, ": Subject Alt Name  : (none)")?;
    }
    for san in &info.sans {
        writeln!(out, ": Subject Alt Name  : {}", san)?;
    }
    match &info.common_name {
        Some(cn) => writeln!(out, ": Common name       : {}", cn)?,
        None => writeln!(out, ": Common name       : (none)")?,
    }

    Ok(out)
}
