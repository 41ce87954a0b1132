//! Entity extraction from raw message text
//!
//! Pure functions mapping a message's raw headers and plain-text body to
//! the structured signals the decision engine works with: sender address
//! and domain, display name, addresses embedded in the body, and
//! compensation-range substrings.
//!
//! Extraction failures never abort a thread; callers record the affected
//! field as absent and keep going.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::MalformedAddressError;

/// Addresses embedded in body text
static BODY_EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9+._-]+@[A-Za-z0-9._-]+\.[A-Za-z0-9_-]+")
        .expect("body email pattern is valid")
});

/// Compensation ranges and single values, 3-digit numbers in [100, 299]
///
/// Matches `$150-180`, `150-180`, `150 180` and bare `150k`. The literal
/// matched text is kept; numeric interpretation is a separate step.
static COMPENSATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$[12]\d{2}[\- ][12]\d{2}|[12]\d{2}[\- ][12]\d{2}|[12]\d{2}k")
        .expect("compensation pattern is valid")
});

/// Sender identity extracted from a From header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedSender {
    /// The address between the angle brackets
    pub email: String,
    /// Everything from `@` onward, lower-cased (e.g. "@example.com")
    pub domain: String,
    /// Display name preceding the `<`, trimmed; empty when absent
    pub name: String,
}

/// Extract the sender from a `"Display Name <address>"`-shaped header.
///
/// Fails with [`MalformedAddressError`] when no angle-bracketed address is
/// present; the caller records the sender fields as absent.
pub fn parse_sender(from_raw: &str) -> Result<ExtractedSender, MalformedAddressError> {
    let open = from_raw.find('<');
    let close = from_raw.rfind('>');

    let (Some(open), Some(close)) = (open, close) else {
        return Err(MalformedAddressError(from_raw.to_string()));
    };
    if close <= open + 1 {
        return Err(MalformedAddressError(from_raw.to_string()));
    }

    let email = from_raw[open + 1..close].trim().to_string();
    let domain = address_domain(&email).ok_or_else(|| {
        MalformedAddressError(from_raw.to_string())
    })?;
    let name = from_raw[..open].trim().to_string();

    Ok(ExtractedSender {
        email,
        domain,
        name,
    })
}

/// The domain portion of an address, `@` included, lower-cased
pub fn address_domain(email: &str) -> Option<String> {
    email.find('@').map(|at| email[at..].to_lowercase())
}

/// The display name preceding the first `<`, trimmed; empty when absent
pub fn person_name(from_raw: &str) -> String {
    match from_raw.find('<') {
        Some(open) => from_raw[..open].trim().to_string(),
        None => String::new(),
    }
}

/// All addresses embedded in the body, deduplicated in first-seen order
pub fn body_emails(body: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut emails = Vec::new();
    for m in BODY_EMAIL_RE.find_iter(body) {
        if seen.insert(m.as_str().to_string()) {
            emails.push(m.as_str().to_string());
        }
    }
    emails
}

/// First compensation-shaped substring in the body, literal matched text
pub fn compensation_span(body: &str) -> Option<String> {
    COMPENSATION_RE.find(body).map(|m| m.as_str().to_string())
}

/// Numeric reading of a matched compensation substring, in thousands.
///
/// Strips the `$` and `k` decorations, parses both endpoints of a range
/// and returns their integer midpoint; single values return themselves.
/// Endpoints outside [100, 299] yield None. Reported in run statistics
/// only, never persisted.
pub fn compensation_midpoint(span: &str) -> Option<u32> {
    let cleaned = span.trim_start_matches('$').trim_end_matches('k');

    let endpoints: Vec<u32> = cleaned
        .split(['-', ' '])
        .map(|part| part.parse::<u32>().ok())
        .collect::<Option<Vec<_>>>()?;

    let in_range = |n: &u32| (100..=299).contains(n);
    match endpoints.as_slice() {
        [single] if in_range(single) => Some(*single),
        [low, high] if in_range(low) && in_range(high) => Some((low + high) / 2),
        _ => None,
    }
}
