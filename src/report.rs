//! Plain-text alert report.
//!
//! Rendering is pure: the generation time is passed in, and the output
//! depends only on the arguments. Expiry instants are shown in fixed UTC+7
//! (ICT, Phnom Penh).

use std::fmt::Write;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};

use crate::evaluation::{DomainEvaluation, ExpiryStatus};

/// Offset from UTC used for every expiry instant in the report.
pub const REPORT_UTC_OFFSET_HOURS: i64 = 7;

const EXPIRY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render the report for one run.
pub fn format_report(
    unreachable: &[DomainEvaluation],
    expiring_soon: &[DomainEvaluation],
    generated_at: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    out.push_str("🔍 SSL and Domain Expiry Report 📅\n\n");
    let _ = writeln!(
        out,
        "Date: {}",
        generated_at.to_rfc3339_opts(SecondsFormat::Nanos, true)
    );
    out.push_str("---\n\n");

    out.push_str("❌ Domains Unreachable\n\n");
    for record in unreachable {
        let _ = writeln!(out, "🔴 {}", record.domain);
        write_ownership(&mut out, record);
        out.push_str("\n\n");
    }

    out.push_str("✅ Active Domains (Expiring Soon)\n\n");
    for record in expiring_soon.iter().filter(|r| r.is_newsworthy()) {
        let _ = writeln!(out, "🟢 {}", record.domain);
        write_ownership(&mut out, record);
        if record.certificate.in_window {
            write_expiry(&mut out, "SSL", &record.certificate);
        }
        if let Some(registration) = record.registration.filter(|r| r.in_window) {
            write_expiry(&mut out, "Domain", &registration);
        }
        out.push('\n');
    }

    out
}

fn write_ownership(out: &mut String, record: &DomainEvaluation) {
    let _ = writeln!(out, "  - 📍 Namespace: {}", record.namespace);
    if let Some(secret) = record.secret.as_deref().filter(|s| !s.is_empty()) {
        let _ = writeln!(out, "  - 🔑 Secret: {secret}");
    }
    match record.ingresses.as_slice() {
        [] => {}
        [only] => {
            let _ = writeln!(out, "  - 🚀 Ingress: {only}");
        }
        many => {
            out.push_str("  - 🚀 Ingress: \n");
            for name in many {
                let _ = writeln!(out, "    - {name}");
            }
        }
    }
}

fn write_expiry(out: &mut String, label: &str, status: &ExpiryStatus) {
    let local = status.expires_at.naive_utc() + TimeDelta::hours(REPORT_UTC_OFFSET_HOURS);
    let _ = writeln!(
        out,
        "  - ⏳ {label} Expires in {} Days, Until (ICT - Phnom Penh): {}",
        status.days,
        local.format(EXPIRY_FORMAT)
    );
}
