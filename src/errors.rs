//! Unified error handling.
//!
//! Every per-domain failure in the evaluation pipeline is a `CheckerError`
//! variant. Failures are contained at the worker boundary: they are logged
//! with namespace / owner context and the domain is dropped from the report.
//! Only inventory listing failures abort a run.
//!
//! Categories are coarse on purpose so log lines can be grouped:
//!   - Input: domains the pipeline refuses to look up (wildcards, bare suffixes)
//!   - Network: TLS / WHOIS / inventory / notification transport problems
//!   - Parse: PEM, X.509 and WHOIS response decoding issues
//!   - Registry: the registry answered but has no usable registration
//!   - Internal: configuration and logic errors
//!
//! Transport failures of the WHOIS client are a separate, cloneable
//! `TransportError` so the retry executor can classify them by kind instead
//! of by message text.

use std::io;

use thiserror::Error;

/// High-level classification for log grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Network,
    Parse,
    Registry,
    Internal,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCategory::Input => "input",
            ErrorCategory::Network => "network",
            ErrorCategory::Parse => "parse",
            ErrorCategory::Registry => "registry",
            ErrorCategory::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Kind of a low-level transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The peer reset or aborted the connection.
    ConnectionReset,
    /// Connect, write or read did not finish in time.
    Timeout,
    /// Anything else (refused, DNS failure, protocol garbage, ...).
    Other,
}

/// Failure of a single WHOIS exchange.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} {server}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub server: String,
    pub operation: &'static str,
    pub message: String,
}

impl TransportError {
    pub fn new(
        kind: TransportErrorKind,
        server: impl Into<String>,
        operation: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            server: server.into(),
            operation,
            message: message.into(),
        }
    }

    pub fn timeout(server: impl Into<String>, operation: &'static str) -> Self {
        Self::new(TransportErrorKind::Timeout, server, operation, "timed out")
    }

    /// Classify an I/O error by its kind.
    pub fn from_io(server: impl Into<String>, operation: &'static str, e: &io::Error) -> Self {
        let kind = match e.kind() {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => TransportErrorKind::ConnectionReset,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportErrorKind::Timeout,
            _ => TransportErrorKind::Other,
        };
        Self::new(kind, server, operation, e.to_string())
    }

    /// Only resets and timeouts are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            TransportErrorKind::ConnectionReset | TransportErrorKind::Timeout
        )
    }
}

/// Primary error type of the expiry pipeline.
#[derive(Error, Debug)]
pub enum CheckerError {
    // ------------------------ Input / Skipped ---------------------------------
    #[error("skipping wildcard domain: {domain}")]
    SkippedWildcard { domain: String },

    #[error("no registrable domain under a known public suffix: {domain}")]
    UnknownRegistrableSuffix { domain: String },

    // ---------------------------- Parsing -------------------------------------
    #[error("could not decode PEM data from {origin}: {reason}")]
    Decode { origin: String, reason: String },

    #[error("failed to parse {what} for {target}: {reason}")]
    Parse {
        what: &'static str,
        target: String,
        reason: String,
    },

    #[error("no expiry field in WHOIS response for {domain}")]
    FieldMissing { domain: String },

    // ---------------------------- Registry ------------------------------------
    #[error("domain not found in registry: {domain}")]
    NotFound { domain: String },

    // ----------------------------- Network ------------------------------------
    #[error("TLS connection to {host} failed: {reason}")]
    Connect { host: String, reason: String },

    #[error("no peer certificate presented by {host}")]
    NoCertificate { host: String },

    #[error("WHOIS lookup for {domain} failed after {attempts} attempt(s): {source}")]
    Lookup {
        domain: String,
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("unable to list {resource}: {source}")]
    Inventory {
        resource: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("notification delivery failed: {reason}")]
    Notification { reason: String },

    // ---------------------------- Internal ------------------------------------
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl CheckerError {
    /// Categorize the error for log grouping.
    pub fn category(&self) -> ErrorCategory {
        use CheckerError::*;
        match self {
            SkippedWildcard { .. } | UnknownRegistrableSuffix { .. } => ErrorCategory::Input,

            Decode { .. } | Parse { .. } | FieldMissing { .. } => ErrorCategory::Parse,

            NotFound { .. } => ErrorCategory::Registry,

            Connect { .. }
            | NoCertificate { .. }
            | Lookup { .. }
            | Inventory { .. }
            | Notification { .. } => ErrorCategory::Network,

            Configuration { .. } => ErrorCategory::Internal,
        }
    }

    // ---------------------------- Constructors -------------------------------

    pub fn decode(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    pub fn parse(what: &'static str, target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            what,
            target: target.into(),
            reason: reason.into(),
        }
    }

    pub fn connect(host: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Connect {
            host: host.into(),
            reason: reason.into(),
        }
    }

    pub fn inventory(
        resource: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Inventory {
            resource,
            source: source.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Public result alias.
pub type Result<T> = std::result::Result<T, CheckerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_mapping() {
        assert_eq!(
            CheckerError::SkippedWildcard {
                domain: "*.example.com".into()
            }
            .category(),
            ErrorCategory::Input
        );
        assert_eq!(
            CheckerError::connect("example.com", "refused").category(),
            ErrorCategory::Network
        );
        assert_eq!(
            CheckerError::decode("secret default/web", "no PEM block").category(),
            ErrorCategory::Parse
        );
        assert_eq!(
            CheckerError::NotFound {
                domain: "nope.com".into()
            }
            .category(),
            ErrorCategory::Registry
        );
    }

    #[test]
    fn transient_classification_by_io_kind() {
        let reset = io::Error::new(io::ErrorKind::ConnectionReset, "whatever wording");
        assert!(TransportError::from_io("whois.x", "read", &reset).is_transient());

        let timed_out = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert!(TransportError::from_io("whois.x", "connect", &timed_out).is_transient());

        // Message text mentioning a timeout does not make it transient.
        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "timeout-ish refusal");
        assert!(!TransportError::from_io("whois.x", "connect", &refused).is_transient());

        assert!(TransportError::timeout("whois.x", "read").is_transient());
    }

    #[test]
    fn display_snippets() {
        let e = CheckerError::Lookup {
            domain: "example.com".into(),
            attempts: 3,
            source: TransportError::timeout("whois.verisign-grs.com", "read"),
        };
        let s = e.to_string();
        assert!(s.contains("example.com"));
        assert!(s.contains("3 attempt"));
        assert!(s.contains("whois.verisign-grs.com"));
    }
}
