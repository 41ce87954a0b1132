//! Run configuration
//!
//! Settings are a flat key-value JSON file in the config directory,
//! written by `jobscan init` and edited by hand. [`RunConfig`] is the
//! validated, typed view the core reads once at the start of a run;
//! missing required keys fail fast before any scan begins.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::MissingSettingError;
use crate::extract;

/// Settings filename in the jobscan config directory
pub const SETTINGS_FILE: &str = "settings.json";

/// Default body for outbound autoresponses; `{name}` is replaced with the
/// recipient's person name when one was extracted.
const DEFAULT_RESPONSE_BODY: &str = "Hi {name},\n\n\
Thanks for reaching out. I'm currently tracking new opportunities and \
will follow up if this looks like a fit.\n";

/// Raw settings as stored on disk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// The user's own address; also defines the own-domain used for
    /// auto-response detection
    pub email: String,
    /// Display name used when composing outbound mail
    pub name_for_email: String,
    /// Label whose threads get scanned
    pub label_to_search: String,
    /// Subject line for composed new messages
    pub subject: String,
    /// Optional body template for autoresponses; `{name}` is substituted
    pub response_body: String,
    /// Optional regex overriding the own-address auto-response detection
    pub auto_response_pattern: String,
}

impl Settings {
    /// Load settings from the config directory
    pub fn load() -> Result<Self> {
        config::load_json(SETTINGS_FILE)
            .with_context(|| format!("Failed to load {}", SETTINGS_FILE))
    }

    /// Save settings to the config directory
    pub fn save(&self) -> Result<()> {
        config::save_json(SETTINGS_FILE, self)
    }

    /// A skeleton settings file for `jobscan init`
    pub fn skeleton() -> Self {
        Self {
            email: "you@yourdomain.com".to_string(),
            name_for_email: "Your Name".to_string(),
            label_to_search: "job-search".to_string(),
            subject: "Regarding your outreach".to_string(),
            ..Self::default()
        }
    }
}

/// Validated configuration for one run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// The user's own address, lower-cased
    pub own_email: String,
    /// Own domain, `@` included, lower-cased
    pub own_domain: String,
    pub name_for_email: String,
    /// Label to scan
    pub label: String,
    /// Subject for composed new messages
    pub subject: String,
    response_body: String,
    auto_response_pattern: Option<Regex>,
}

impl RunConfig {
    /// Validate raw settings into a typed config.
    ///
    /// Returns [`MissingSettingError`] (wrapped) naming the first absent
    /// required key.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let email = require(&settings.email, "email")?.to_lowercase();
        let label = require(&settings.label_to_search, "labelToSearch")?;
        let subject = require(&settings.subject, "subject")?;
        let name_for_email = require(&settings.name_for_email, "nameForEmail")?;

        let own_domain = extract::address_domain(&email)
            .with_context(|| format!("setting 'email' is not a valid address: '{}'", email))?;

        let auto_response_pattern = if settings.auto_response_pattern.is_empty() {
            None
        } else {
            Some(
                Regex::new(&settings.auto_response_pattern)
                    .context("setting 'autoResponsePattern' is not a valid regex")?,
            )
        };

        let response_body = if settings.response_body.is_empty() {
            DEFAULT_RESPONSE_BODY.to_string()
        } else {
            settings.response_body.clone()
        };

        Ok(Self {
            own_email: email,
            own_domain,
            name_for_email,
            label,
            subject,
            response_body,
            auto_response_pattern,
        })
    }

    /// Whether a raw From header looks like the user's own auto-response
    /// address (the auto-response signature).
    ///
    /// With no configured pattern, a sender matching the own address or
    /// own domain counts.
    pub fn is_auto_responder(&self, from_raw: &str) -> bool {
        if let Some(pattern) = &self.auto_response_pattern {
            return pattern.is_match(from_raw);
        }
        match extract::parse_sender(from_raw) {
            Ok(sender) => {
                sender.email.eq_ignore_ascii_case(&self.own_email)
                    || sender.domain == self.own_domain
            }
            // Malformed From header on our own outbound mail is unlikely;
            // fall back to a substring check on the domain
            Err(_) => from_raw.to_lowercase().contains(&self.own_domain),
        }
    }

    /// Whether an address is the user's own
    pub fn is_own_address(&self, email: &str) -> bool {
        email.eq_ignore_ascii_case(&self.own_email)
    }

    /// Compose the autoresponse body for a recipient
    pub fn compose_response(&self, person_name: &str) -> String {
        let name = if person_name.is_empty() {
            "there"
        } else {
            person_name
        };
        self.response_body.replace("{name}", name)
    }
}

fn require(value: &str, key: &'static str) -> Result<String> {
    if value.trim().is_empty() {
        return Err(MissingSettingError { key }.into());
    }
    Ok(value.trim().to_string())
}
