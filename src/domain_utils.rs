//! Domain utilities with Public Suffix List integration.
//!
//! WHOIS registration data is keyed on the registrable domain (eTLD+1), so
//! every hostname is reduced through the Public Suffix List before it reaches
//! the registration resolver:
//! - shop.example.com -> example.com
//! - shop.example.co.uk -> example.co.uk
//! - mysite.github.io -> mysite.github.io (github.io is a public suffix)

use psl::domain_str;

use crate::errors::{CheckerError, Result};

/// Literal marker of a wildcard label.
pub const WILDCARD_MARKER: &str = "*.";

/// True when the hostname contains a wildcard label anywhere.
pub fn is_wildcard(domain: &str) -> bool {
    domain.contains(WILDCARD_MARKER)
}

/// Drop the first wildcard label so the remaining name can be probed.
pub fn strip_wildcard(domain: &str) -> String {
    domain.replacen(WILDCARD_MARKER, "", 1)
}

/// Reduce a hostname to its registrable domain.
pub fn registrable_domain(domain: &str) -> Result<String> {
    let clean = clean_domain_input(domain);
    domain_str(&clean)
        .map(str::to_string)
        .ok_or_else(|| CheckerError::UnknownRegistrableSuffix {
            domain: domain.to_string(),
        })
}

/// Normalize a hostname: trim whitespace and a trailing dot, lowercase.
pub fn clean_domain_input(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_lowercase()
}
