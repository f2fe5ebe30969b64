// src/core/lookup/whois.rs

//! Registration data for the audited host's registrable domain, through the
//! `whois-service` client (RDAP where the registry offers it, WHOIS otherwise).

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::debug;
use whois_service::{WhoisClient, WhoisResponse};

use crate::core::lookup::LookupError;
use crate::core::models::Registration;

/// Looks up the registration of the domain `host` belongs to.
pub async fn lookup_registration(host: &str) -> Result<Registration, LookupError> {
    let domain = registrable_domain(host).ok_or_else(|| LookupError::Unsupported(host.to_string()))?;
    debug!(host, %domain, "Querying registration data.");

    let client = WhoisClient::new()
        .await
        .map_err(|e| LookupError::Whois(format!("could not create WHOIS client: {}", e)))?;
    let response = client
        .lookup(&domain)
        .await
        .map_err(|e| LookupError::Whois(format!("{}: {}", domain, e)))?;

    registration_from_response(&response).ok_or(LookupError::Unparseable(domain))
}

/// The domain a registrant actually owns, per the Public Suffix List
/// (`www.bbc.co.uk` is `bbc.co.uk`). `None` for IP addresses and bare suffixes.
pub fn registrable_domain(host: &str) -> Option<String> {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    if host.starts_with('[') || host.parse::<std::net::IpAddr>().is_ok() {
        return None;
    }
    psl::domain_str(&host).map(str::to_string)
}

fn registration_from_response(response: &WhoisResponse) -> Option<Registration> {
    let parsed = response.parsed_data.as_ref()?;
    registration_from_fields(
        parsed.creation_date.as_deref(),
        parsed.expiration_date.as_deref(),
        parsed.registrar.as_deref(),
    )
}

/// Builds a registration from the raw fields of a lookup answer. `None` when
/// none of them yields anything usable.
fn registration_from_fields(
    created: Option<&str>,
    expires: Option<&str>,
    registrar: Option<&str>,
) -> Option<Registration> {
    let registration = Registration {
        registrar: registrar.map(str::trim).filter(|r| !r.is_empty()).map(str::to_string),
        created: created.and_then(parse_date_string),
        expires: expires.and_then(parse_date_string),
    };
    let empty = registration.created.is_none() && registration.expires.is_none() && registration.registrar.is_none();
    (!empty).then_some(registration)
}

fn parse_date_string(raw: &str) -> Option<DateTime<Utc>> {
    // Some registries append a zone name after the timestamp.
    let value = raw.split_whitespace().take(2).collect::<Vec<_>>();
    let candidates = [raw.trim().to_string(), value.join(" "), value.first().map(|v| v.to_string()).unwrap_or_default()];

    const ZONED: &[&str] = &["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%.f%z"];
    const NAIVE: &[&str] = &["%Y-%m-%dT%H:%M:%S%.fZ", "%Y-%m-%dT%H:%M:%SZ", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
    const DATES: &[&str] = &["%Y-%m-%d", "%d-%b-%Y", "%d/%m/%Y", "%Y.%m.%d", "%d.%m.%Y"];

    for candidate in candidates.iter().filter(|c| !c.is_empty()) {
        if let Ok(dt) = DateTime::parse_from_rfc3339(candidate) {
            return Some(dt.with_timezone(&Utc));
        }
        for format in ZONED {
            if let Ok(dt) = DateTime::parse_from_str(candidate, format) {
                return Some(dt.with_timezone(&Utc));
            }
        }
        for format in NAIVE {
            if let Ok(dt) = NaiveDateTime::parse_from_str(candidate, format) {
                return Some(dt.and_utc());
            }
        }
        for format in DATES {
            if let Ok(date) = NaiveDate::parse_from_str(candidate, format) {
                return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
            }
        }
    }
    None
}
