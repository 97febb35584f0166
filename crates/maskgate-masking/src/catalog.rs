//! Declarative catalog of sensitive-content categories and their matchers
//!
//! Adding a detection category is a data change: extend [`Category`], give it
//! a canonical token, and register its matchers in [`PatternCatalog::new`].

use maskgate_core::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Closed set of sensitive-content categories.
///
/// The enum order is the catalog evaluation order; it is part of the engine's
/// contract because per-category counts depend on which rule claims a span
/// first. Organizations and addresses are scanned before names so that
/// "Acme Technologies" masks as one organization rather than a name pair.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Credentials,
    Passwords,
    Urls,
    IpAddresses,
    FilePaths,
    Emails,
    PhoneNumbers,
    Organizations,
    Addresses,
    Names,
    PaymentCards,
    NationalIds,
}

impl Category {
    /// All categories in catalog evaluation order
    pub const ALL: [Category; 12] = [
        Category::Credentials,
        Category::Passwords,
        Category::Urls,
        Category::IpAddresses,
        Category::FilePaths,
        Category::Emails,
        Category::PhoneNumbers,
        Category::Organizations,
        Category::Addresses,
        Category::Names,
        Category::PaymentCards,
        Category::NationalIds,
    ];

    /// The canonical replacement token for this category.
    ///
    /// Tokens must never match any catalog matcher; that property is what
    /// makes redaction idempotent and it is asserted by test below.
    pub fn token(self) -> &'static str {
        match self {
            Category::Credentials => "<API_KEY>",
            Category::Passwords => "<PASSWORD>",
            Category::Urls => "<URL>",
            Category::IpAddresses => "<IP_ADDRESS>",
            Category::FilePaths => "<FILE_PATH>",
            Category::Emails => "<EMAIL>",
            Category::PhoneNumbers => "<PHONE>",
            Category::Organizations => "<ORGANIZATION>",
            Category::Addresses => "<ADDRESS>",
            Category::Names => "<NAME>",
            Category::PaymentCards => "<CREDIT_CARD>",
            Category::NationalIds => "<SSN>",
        }
    }

    /// Stable snake_case identifier, used for logging and the masking sink
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Credentials => "credentials",
            Category::Passwords => "passwords",
            Category::Urls => "urls",
            Category::IpAddresses => "ip_addresses",
            Category::FilePaths => "file_paths",
            Category::Emails => "emails",
            Category::PhoneNumbers => "phone_numbers",
            Category::Organizations => "organizations",
            Category::Addresses => "addresses",
            Category::Names => "names",
            Category::PaymentCards => "payment_cards",
            Category::NationalIds => "national_ids",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single detection rule: one compiled matcher feeding one category
#[derive(Debug)]
pub struct PatternRule {
    /// Category this rule feeds
    pub category: Category,

    /// Compiled matcher
    pub matcher: Regex,
}

/// The full ordered set of detection rules.
///
/// Multiple rules may feed the same category; each category still maps to a
/// single canonical token.
#[derive(Debug)]
pub struct PatternCatalog {
    rules: Vec<PatternRule>,
}

impl PatternCatalog {
    /// Compile the built-in rule set
    pub fn new() -> Result<Self> {
        let table: &[(Category, &str)] = &[
            // Credentials: key/value assignments, vendor key shapes, and long
            // bare alphanumeric runs (hashes, raw tokens)
            (
                Category::Credentials,
                r#"(?i)\b(?:api_key|api_token|access_token|auth_token|secret_key|private_key|token)["']?\s*[:=]\s*["']?[A-Za-z0-9_\-]{16,}["']?"#,
            ),
            (Category::Credentials, r"\bsk-[A-Za-z0-9_\-]{20,}\b"),
            (Category::Credentials, r"\bpk_[A-Za-z0-9]{20,}\b"),
            (Category::Credentials, r"\b[A-Za-z0-9]{32,}\b"),
            // Passwords: the whole assignment is replaced, key included
            (
                Category::Passwords,
                r#"(?i)\b(?:password|passwd|pwd)["']?\s*[:=]\s*["']?[^\s"']+["']?"#,
            ),
            // URLs before IPs and paths so a URL masks as one token
            (Category::Urls, r#"(?i)\b(?:https?|ftp|ssh)://[^\s"']+"#),
            (Category::IpAddresses, r"\b(?:\d{1,3}\.){3}\d{1,3}\b"),
            (Category::IpAddresses, r"(?i)\blocalhost\b"),
            // Filesystem paths require at least two segments; a lone slash is
            // too common in prose to treat as a path
            (Category::FilePaths, r#"~/[^\s"']+"#),
            (
                Category::FilePaths,
                r#"\b[A-Za-z]:\\(?:[^\\\s"']+\\)*[^\\\s"']+"#,
            ),
            (
                Category::FilePaths,
                r"/(?:[A-Za-z0-9_.\-]+/)+[A-Za-z0-9_.\-]+",
            ),
            (
                Category::Emails,
                r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            ),
            (Category::PhoneNumbers, r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b"),
            (
                Category::PhoneNumbers,
                r"\+\d{1,3}[-.\s]?\d{1,4}[-.\s]?\d{1,4}[-.\s]?\d{1,9}\b",
            ),
            (Category::PhoneNumbers, r"\(\d{3}\)\s*\d{3}[-.]?\d{4}"),
            // Organization and address shapes are case-sensitive on purpose:
            // they rely on capitalization to stay selective
            (
                Category::Organizations,
                r"\b(?:[A-Z][A-Za-z]+\s+)+(?:Inc|Corp|LLC|Ltd|Company|Corporation|Limited|Partnership|Associates)\b",
            ),
            (
                Category::Organizations,
                r"\b[A-Z][a-z]+\s+(?:Technologies|Systems|Solutions|Services|Group|Industries|International|Global)\b",
            ),
            (
                Category::Organizations,
                r"\b(?:[Cc]ompany|[Oo]rganization|[Ee]nterprise|[Bb]usiness)\s+[A-Z][a-z]+\b",
            ),
            (
                Category::Addresses,
                r"\b\d+\s+(?:[A-Z][a-z]+\s+)+(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Drive|Dr|Lane|Ln|Court|Ct|Place|Pl|Way|Terrace|Ter)\b",
            ),
            (
                Category::Names,
                r"\b[A-Z][a-z]+\s+[A-Z]\.\s*[A-Z][a-z]+\b",
            ),
            (
                Category::Names,
                r"\b[A-Z][a-z]+\s+[A-Z][a-z]+\s+[A-Z][a-z]+\b",
            ),
            (Category::Names, r"\b[A-Z][a-z]+\s+[A-Z][a-z]+\b"),
            (
                Category::PaymentCards,
                r"\b\d{4}[-\s]?\d{4}[-\s]?\d{4}[-\s]?\d{4}\b",
            ),
            (Category::NationalIds, r"\b\d{3}-\d{2}-\d{4}\b"),
            (Category::NationalIds, r"\b\d{9}\b"),
        ];

        let mut rules = Vec::with_capacity(table.len());
        for (category, pattern) in table {
            rules.push(PatternRule {
                category: *category,
                matcher: compile(pattern)?,
            });
        }

        Ok(Self { rules })
    }

    /// Rules in catalog evaluation order
    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }
}

/// Compile a pattern, mapping failures into the gateway error taxonomy
pub(crate) fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| Error::pattern(format!("failed to compile {pattern:?}: {e}")))
}
