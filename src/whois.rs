use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::errors::{CheckerError, Result, TransportError, TransportErrorKind};

/// WHOIS TCP port.
const WHOIS_PORT: u16 = 43;

/// Root of the referral chain; answers which server is authoritative for a TLD.
const IANA_SERVER: &str = "whois.iana.org";

/// Default per-operation timeout (connect, write and read each).
pub const DEFAULT_WHOIS_TIMEOUT: Duration = Duration::from_secs(10);

/// `whois:` (IANA TLD record) or `refer:` line.
static RE_TLD_SERVER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^[ \t]*(?:whois|refer):[ \t]*([A-Z0-9._\-]+)[ \t]*\r?$").unwrap());

/// Thin-registry pointer to the registrar's own WHOIS server.
static RE_REGISTRAR_SERVER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[ \t]*Registrar WHOIS Server:[ \t]*(?:whois://)?([A-Z0-9._\-]+)[ \t]*\r?$").unwrap()
});

static RE_EXPIRY_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)^[ \t]*(?:registry expiry date|registrar registration expiration date|expiration date|expiry date|expire date|expiration time|expires on|expires|expire|paid-till|valid until|renewal date)[ \t]*:[ \t]*(\S.*?)[ \t]*\r?$",
    )
    .unwrap()
});

static RE_NOT_FOUND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)^\s*(?:%\s*)?(?:no match for|not found|no data found|no entries found|domain not found|no object found|the queried object does not exist|status:\s*(?:free|available)\b)",
    )
    .unwrap()
});

/// Any `key: value` shaped line.
static RE_FIELD_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*[A-Za-z][A-Za-z0-9 /_\-]*:\s*\S").unwrap());

/// Raw registration lookup: `lookup(domain) -> raw text`.
#[async_trait]
pub trait WhoisTransport: Send + Sync {
    async fn lookup(&self, domain: &str) -> std::result::Result<String, TransportError>;
}

/// Perform a basic WHOIS query (over TCP 43) with a timeout on each step.
///
/// Returns the raw textual response.
pub async fn simple_whois(
    server: &str,
    query: &str,
    to: Duration,
) -> std::result::Result<String, TransportError> {
    let mut stream = match timeout(to, TcpStream::connect((server, WHOIS_PORT))).await {
        Ok(Ok(s)) => s,
        Ok(Err(e)) => return Err(TransportError::from_io(server, "connect", &e)),
        Err(_) => return Err(TransportError::timeout(server, "connect")),
    };

    // Canonical WHOIS: "<query>\r\n"
    let line = format!("{query}\r\n");
    match timeout(to, stream.write_all(line.as_bytes())).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(TransportError::from_io(server, "write", &e)),
        Err(_) => return Err(TransportError::timeout(server, "write")),
    }

    let mut buf = Vec::new();
    match timeout(to, stream.read_to_end(&mut buf)).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => return Err(TransportError::from_io(server, "read", &e)),
        Err(_) => return Err(TransportError::timeout(server, "read")),
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// WHOIS client following IANA -> registry -> registrar referrals.
///
/// The authoritative server per TLD is remembered for the client's lifetime.
#[derive(Debug)]
pub struct WhoisClient {
    timeout: Duration,
    tld_servers: Mutex<HashMap<String, String>>,
}

impl Default for WhoisClient {
    fn default() -> Self {
        Self::new(DEFAULT_WHOIS_TIMEOUT)
    }
}

impl WhoisClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            tld_servers: Mutex::new(HashMap::new()),
        }
    }

    async fn server_for_tld(&self, tld: &str) -> std::result::Result<String, TransportError> {
        let cached = self
            .tld_servers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(tld)
            .cloned();
        if let Some(server) = cached {
            return Ok(server);
        }

        let iana = simple_whois(IANA_SERVER, tld, self.timeout).await?;
        let server = extract_tld_server(&iana).ok_or_else(|| {
            TransportError::new(
                TransportErrorKind::Other,
                IANA_SERVER,
                "referral",
                format!("no WHOIS server listed for .{tld}"),
            )
        })?;

        self.tld_servers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(tld.to_string(), server.clone());
        Ok(server)
    }
}

#[async_trait]
impl WhoisTransport for WhoisClient {
    async fn lookup(&self, domain: &str) -> std::result::Result<String, TransportError> {
        let tld = domain.rsplit('.').next().unwrap_or(domain);
        let server = self.server_for_tld(tld).await?;
        tracing::debug!(%domain, %server, "querying registry WHOIS");

        let mut response = simple_whois(&server, domain, self.timeout).await?;

        if let Some(registrar) = extract_registrar_server(&response)
            && !registrar.eq_ignore_ascii_case(&server)
        {
            match simple_whois(&registrar, domain, self.timeout).await {
                Ok(extra) if !extra.trim().is_empty() => {
                    response.push('\n');
                    response.push_str(&extra);
                }
                Ok(_) => {}
                Err(e) => {
                    // Registry data alone is enough to read the expiry.
                    tracing::debug!(%domain, %registrar, error = %e, "registrar WHOIS unavailable");
                }
            }
        }

        Ok(response)
    }
}

/// Authoritative server named in an IANA TLD record.
pub fn extract_tld_server(iana: &str) -> Option<String> {
    RE_TLD_SERVER
        .captures(iana)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
}

/// Registrar WHOIS server named in a thin-registry response.
pub fn extract_registrar_server(response: &str) -> Option<String> {
    RE_REGISTRAR_SERVER
        .captures(response)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
}

/// Parse the registration expiry out of a raw WHOIS response.
pub fn parse_registration_expiry(domain: &str, raw: &str) -> Result<DateTime<Utc>> {
    if raw.trim().is_empty() {
        return Err(CheckerError::parse("WHOIS response", domain, "empty response"));
    }

    let field = RE_EXPIRY_FIELD
        .captures_iter(raw)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .find(|v| !v.is_empty());

    match field {
        Some(value) => parse_expiry_date(value).ok_or_else(|| {
            CheckerError::parse(
                "WHOIS expiry date",
                domain,
                format!("unrecognized date format: {value}"),
            )
        }),
        None if RE_NOT_FOUND.is_match(raw) => Err(CheckerError::NotFound {
            domain: domain.to_string(),
        }),
        None if !RE_FIELD_LINE.is_match(raw) => Err(CheckerError::parse(
            "WHOIS response",
            domain,
            "no registration fields in response",
        )),
        None => Err(CheckerError::FieldMissing {
            domain: domain.to_string(),
        }),
    }
}

/// Date layouts seen in registry responses, tried in order.
#[derive(Debug, Clone, Copy)]
enum Layout {
    Rfc3339,
    DateTime(&'static str),
    /// `YYYY-MM-DD hh:mm:ss TZ`; the abbreviation is read as UTC.
    DateTimeZoneName,
    Date(&'static str),
}

const LAYOUTS: [Layout; 8] = [
    Layout::Rfc3339,
    Layout::DateTime("%Y-%m-%dT%H:%M:%SZ"),
    Layout::DateTimeZoneName,
    Layout::DateTime("%Y-%m-%d %H:%M:%S"),
    Layout::Date("%Y-%m-%d"),
    Layout::Date("%Y.%m.%d"),
    Layout::Date("%d-%b-%Y"),
    Layout::Date("%Y/%m/%d"),
];

impl Layout {
    fn parse(self, s: &str) -> Option<DateTime<Utc>> {
        match self {
            Layout::Rfc3339 => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Layout::DateTime(fmt) => NaiveDateTime::parse_from_str(s, fmt)
                .ok()
                .map(|dt| dt.and_utc()),
            Layout::DateTimeZoneName => {
                let (stamp, zone) = s.rsplit_once(' ')?;
                if zone.is_empty() || zone.len() > 5 || !zone.bytes().all(|b| b.is_ascii_alphabetic())
                {
                    return None;
                }
                NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|dt| dt.and_utc())
            }
            Layout::Date(fmt) => NaiveDate::parse_from_str(s, fmt)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc()),
        }
    }
}

/// Try every known layout until one parses.
pub fn parse_expiry_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    LAYOUTS.iter().find_map(|layout| layout.parse(value))
}
