//! The redaction engine
//!
//! Three phases per input:
//! 1. the always-on catalog scan (every rule, catalog order, span-based
//!    replacement),
//! 2. content-specific masking gated on the [`ContentProfile`],
//! 3. context-clue extraction.
//!
//! Replacement is applied by match span, never by re-searching the matched
//! substring: identical substrings can recur in unrelated places, and a
//! literal text-search replacement would clobber all of them.
//!
//! The engine is idempotent: masking already-masked text changes nothing,
//! because no canonical token matches any matcher (asserted in the catalog
//! tests) and every rule consumes the span it replaces.

use std::collections::BTreeMap;

use maskgate_core::Result;
use regex::Regex;
use serde::Serialize;

use crate::catalog::{compile, Category, PatternCatalog};
use crate::clues::ClueExtractor;
use crate::profile::{ContentProfile, ContentProfiler};

/// Result of one redaction run
#[derive(Debug, Clone, Serialize)]
pub struct MaskingOutcome {
    /// Text with every matched span replaced by its category token
    pub masked_text: String,

    /// Non-overlapping match count per category (phase 1 only)
    pub category_counts: BTreeMap<Category, usize>,

    /// Category of each replacement, in the order they were applied
    pub findings: Vec<Category>,

    /// Structure clues extracted from the raw text
    pub context_clues: Vec<String>,

    /// The classifier verdict this run was gated on
    pub profile: ContentProfile,
}

impl MaskingOutcome {
    /// Total number of catalog replacements across all categories
    pub fn total_masked(&self) -> usize {
        self.category_counts.values().sum()
    }
}

/// Replacement tokens for the content-specific phase
const IMPORT_TOKEN: &str = "<IMPORT_STATEMENT>";
const QUOTED_PATH_TOKEN: &str = "\"<FILE_PATH>\"";
const CONFIG_VALUE_TOKEN: &str = "<CONFIG_VALUE>";
const COMPANY_TOKEN: &str = "<COMPANY_NAME>";
const FINANCIAL_TOKEN: &str = "<FINANCIAL_AMOUNT>";
const PROJECT_TOKEN: &str = "<PROJECT_NAME>";

/// The redaction engine. Stateless with respect to requests; compile once,
/// share behind an `Arc`, call from any task.
#[derive(Debug)]
pub struct Masker {
    catalog: PatternCatalog,
    profiler: ContentProfiler,
    clues: ClueExtractor,

    // code-profile rules
    import_lines: Regex,
    quoted_ext_paths: Regex,
    quoted_unix_paths: Regex,
    quoted_windows_paths: Regex,
    config_string_values: Regex,
    config_numeric_values: Regex,

    // business-profile rules
    company_names: Vec<Regex>,
    financial_amounts: Vec<Regex>,
    project_names: Vec<Regex>,
}

impl Masker {
    pub fn new() -> Result<Self> {
        Ok(Self {
            catalog: PatternCatalog::new()?,
            profiler: ContentProfiler::new()?,
            clues: ClueExtractor::new()?,

            import_lines: compile(
                r"(?m)^[ \t]*(?:import|from|using|require|include)\s+[^\n]+",
            )?,
            quoted_ext_paths: compile(
                r#"["'][^"'\n]*\.(?:py|js|ts|java|cpp|cs|php|rb|go|rs|swift|kt|scala|sh|bash|sql|html|css|xml|json|yaml|yml|toml|ini|cfg|conf)["']"#,
            )?,
            quoted_unix_paths: compile(r#"["'][^"'\n]*/(?:[^/"'\n]+/)*[^/"'\n]*["']"#)?,
            quoted_windows_paths: compile(r#"["'][A-Za-z]:\\[^"'\n]*["']"#)?,
            config_string_values: compile(r#"\b(\w+)\s*[:=]\s*["'][^"'\n]+["']"#)?,
            config_numeric_values: compile(r"\b(\w+)\s*[:=]\s*\d+(?:\.\d+)?\b")?,

            company_names: vec![
                compile(
                    r"\b(?:[A-Z][A-Za-z]+\s+)+(?:Inc|Corp|LLC|Ltd|Company|Corporation)\b",
                )?,
                compile(r"\b(?:[Cc]ompany|[Oo]rganization|[Ee]nterprise|[Bb]usiness)\s+[A-Z][a-z]+\b")?,
            ],
            financial_amounts: vec![
                compile(r"\$\d+(?:,\d{3})*(?:\.\d{2})?")?,
                compile(r"(?i)\b\d+(?:,\d{3})*(?:\.\d{2})?\s*(?:dollars?|USD|EUR|GBP)\b")?,
                compile(r"(?i)\b(?:revenue|profit|margin|cost|budget)\s*[:=]\s*\$?\d+(?:,\d{3})*(?:\.\d{2})?")?,
            ],
            project_names: vec![
                compile(r"\b(?:[Pp]roject|[Ii]nitiative|[Ss]trategy|[Rr]oadmap)\s+[A-Z][A-Za-z]+\b")?,
                compile(r"\b[A-Z][A-Za-z]+(?:\s+[A-Z][A-Za-z]+)*\s+(?:Project|Initiative|Strategy|Roadmap)\b")?,
            ],
        })
    }

    /// Classify a text without masking it
    pub fn profile(&self, text: &str) -> ContentProfile {
        self.profiler.profile(text)
    }

    /// Classify and mask in one call
    pub fn mask(&self, text: &str) -> MaskingOutcome {
        let profile = self.profiler.profile(text);
        self.mask_with_profile(text, profile)
    }

    /// Mask a text whose profile the caller already derived
    pub fn mask_with_profile(&self, text: &str, profile: ContentProfile) -> MaskingOutcome {
        let mut category_counts = BTreeMap::new();
        let mut findings = Vec::new();

        // Phase 1: always-on catalog scan, rules in catalog order
        let mut masked = text.to_string();
        for rule in self.catalog.rules() {
            let (next, count) = replace_spans(&masked, &rule.matcher, rule.category.token());
            if count > 0 {
                masked = next;
                *category_counts.entry(rule.category).or_insert(0) += count;
                findings.extend(std::iter::repeat(rule.category).take(count));
            }
        }

        // Phase 2: content-specific masking
        if profile.is_code {
            masked = self.mask_code(&masked);
        }
        if profile.is_business_document {
            masked = self.mask_business(&masked);
        }

        // Phase 3: clues come from the raw text; they carry counts and
        // declared identifiers only
        let context_clues = self.clues.extract(text);

        MaskingOutcome {
            masked_text: masked,
            category_counts,
            findings,
            context_clues,
            profile,
        }
    }

    fn mask_code(&self, text: &str) -> String {
        let (text, _) = replace_spans(text, &self.import_lines, IMPORT_TOKEN);
        let (text, _) = replace_spans(&text, &self.quoted_ext_paths, QUOTED_PATH_TOKEN);
        let (text, _) = replace_spans(&text, &self.quoted_unix_paths, QUOTED_PATH_TOKEN);
        let (text, _) = replace_spans(&text, &self.quoted_windows_paths, QUOTED_PATH_TOKEN);
        let (text, _) = replace_config_values(&text, &self.config_string_values);
        let (text, _) = replace_config_values(&text, &self.config_numeric_values);
        text
    }

    fn mask_business(&self, text: &str) -> String {
        let mut masked = text.to_string();
        for re in &self.company_names {
            masked = replace_spans(&masked, re, COMPANY_TOKEN).0;
        }
        for re in &self.financial_amounts {
            masked = replace_spans(&masked, re, FINANCIAL_TOKEN).0;
        }
        for re in &self.project_names {
            masked = replace_spans(&masked, re, PROJECT_TOKEN).0;
        }
        masked
    }
}

/// Replace every match span with `token`, returning the rewritten text and
/// the number of replacements.
fn replace_spans(text: &str, re: &Regex, token: &str) -> (String, usize) {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut count = 0;
    for m in re.find_iter(text) {
        out.push_str(&text[last..m.start()]);
        out.push_str(token);
        last = m.end();
        count += 1;
    }
    if count == 0 {
        return (text.to_string(), 0);
    }
    out.push_str(&text[last..]);
    (out, count)
}

/// Replace `key: value` / `key = value` spans, keeping the key and masking
/// only the value.
fn replace_config_values(text: &str, re: &Regex) -> (String, usize) {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut count = 0;
    for cap in re.captures_iter(text) {
        let Some(whole) = cap.get(0) else { continue };
        let key = cap.get(1).map(|m| m.as_str()).unwrap_or_default();
        out.push_str(&text[last..whole.start()]);
        out.push_str(key);
        out.push_str(" = ");
        out.push_str(CONFIG_VALUE_TOKEN);
        last = whole.end();
        count += 1;
    }
    if count == 0 {
        return (text.to_string(), 0);
    }
    out.push_str(&text[last..]);
    (out, count)
}

/// Render the advisory preamble that accompanies masked content upstream.
///
/// The preamble explains what was redacted and passes along the context
/// clues; it never contains matched values.
pub fn advisory_preamble(outcome: &MaskingOutcome) -> String {
    let mut lines = vec![
        "SECURITY NOTICE: this content was automatically redacted to protect sensitive information.".to_string(),
    ];

    if outcome.profile.is_code {
        lines.push("Content type: source code. Focus on structure, logic flow, and architectural patterns.".to_string());
    } else if outcome.profile.is_business_document {
        lines.push("Content type: business document. Focus on document structure and process flows.".to_string());
    } else if outcome.profile.is_technical_document {
        lines.push("Content type: technical documentation. Focus on specifications and system architecture.".to_string());
    }

    let total = outcome.total_masked();
    if total > 0 {
        lines.push(format!("{total} sensitive element(s) were masked."));
    }

    if !outcome.context_clues.is_empty() {
        lines.push("Context clues:".to_string());
        for clue in &outcome.context_clues {
            lines.push(format!("  - {clue}"));
        }
    }

    lines.push(String::new());
    lines.push(
        "Analyze the structure and logic of the content; masked tokens stand in for redacted values.".to_string(),
    );
    lines.push(String::new());

    lines.join("\n")
}

/// Notice used when the caller disabled secure filtering
pub fn personal_mode_notice() -> String {
    "PERSONAL MODE: content is being processed without security filtering.\n\n".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn masker() -> Masker {
        Masker::new().unwrap()
    }

    #[test]
    fn test_email_and_password_scenario() {
        let outcome = masker().mask("My email is foo@bar.com and my password: hunter2");

        assert_eq!(
            outcome.masked_text,
            "My email is <EMAIL> and my <PASSWORD>"
        );
        assert_eq!(outcome.category_counts[&Category::Emails], 1);
        assert_eq!(outcome.category_counts[&Category::Passwords], 1);
        assert_eq!(outcome.total_masked(), 2);
    }

    #[test]
    fn test_counts_equal_match_counts() {
        let outcome = masker().mask("write to a@b.com or c@d.org, never e@f.net");
        assert_eq!(outcome.category_counts[&Category::Emails], 3);
        assert_eq!(
            outcome.findings,
            vec![Category::Emails, Category::Emails, Category::Emails]
        );
    }

    #[test]
    fn test_span_replacement_not_literal_search() {
        // the same literal recurs; each occurrence is replaced exactly once
        // because replacement walks match spans, not substring searches
        let outcome = masker().mask("ping 10.0.0.1 then ping 10.0.0.1 again");
        assert_eq!(
            outcome.masked_text,
            "ping <IP_ADDRESS> then ping <IP_ADDRESS> again"
        );
        assert_eq!(outcome.category_counts[&Category::IpAddresses], 2);
    }

    #[test]
    fn test_idempotence() {
        let inputs = [
            "My email is foo@bar.com and my password: hunter2",
            "server 192.168.1.10 mirrors https://example.com/a/b",
            "card 4111 1111 1111 1111 expires soon, ssn 123-45-6789",
            "import os\nimport sys\napi_key = \"sk-abcdefghijklmnopqrstuv\"\ndef main():\n    pass\n",
            "This confidential proposal budgets $1,200.00 for Project Falcon.",
        ];

        let m = masker();
        for input in inputs {
            let first = m.mask(input);
            assert!(first.total_masked() > 0, "expected matches in {input:?}");

            let second = m.mask(&first.masked_text);
            assert_eq!(
                second.masked_text, first.masked_text,
                "re-masking changed output for {input:?}"
            );
            assert_eq!(
                second.total_masked(),
                0,
                "re-masking found new matches for {input:?}"
            );
        }
    }

    #[test]
    fn test_code_phase_masks_imports_and_config() {
        let text = "import os\nimport requests\n\ndef run():\n    retries = 3\n    mode = \"fast\"\n";
        let m = masker();
        let profile = m.profile(text);
        assert!(profile.is_code);

        let outcome = m.mask_with_profile(text, profile);
        assert!(outcome.masked_text.contains("<IMPORT_STATEMENT>"));
        assert!(outcome.masked_text.contains("retries = <CONFIG_VALUE>"));
        assert!(outcome.masked_text.contains("mode = <CONFIG_VALUE>"));
        assert!(!outcome.masked_text.contains("import os"));
    }

    #[test]
    fn test_code_phase_not_applied_to_prose() {
        let text = "the timeout is retries: 3 in our settings";
        let m = masker();
        let outcome = m.mask(text);
        // not code, so the key/value shape survives
        assert!(outcome.masked_text.contains("retries: 3"));
    }

    #[test]
    fn test_business_phase_masks_financials_and_projects() {
        let text =
            "Confidential budget report: the client owes $45,000.00 under project Atlas.";
        let m = masker();
        let profile = m.profile(text);
        assert!(profile.is_business_document);

        let outcome = m.mask_with_profile(text, profile);
        assert!(outcome.masked_text.contains(FINANCIAL_TOKEN));
        assert!(outcome.masked_text.contains(PROJECT_TOKEN));
        assert!(!outcome.masked_text.contains("$45,000.00"));
        assert!(!outcome.masked_text.contains("Atlas"));
    }

    #[test]
    fn test_preamble_reports_without_leaking() {
        let m = masker();
        let outcome = m.mask("mail hunter@example.com, password: swordfish99");
        let preamble = advisory_preamble(&outcome);

        assert!(preamble.contains("2 sensitive element(s)"));
        assert!(!preamble.contains("hunter@example.com"));
        assert!(!preamble.contains("swordfish99"));
    }

    #[test]
    fn test_preamble_names_content_type() {
        let m = masker();
        let outcome = m.mask("import os\ndef main():\n    pass\nclass App:\n    pass\n");
        let preamble = advisory_preamble(&outcome);
        assert!(preamble.contains("source code"));
        assert!(preamble.contains("Context clues:"));
    }

    #[test]
    fn test_url_masks_before_ip_and_path() {
        let outcome = masker().mask("fetch https://10.0.0.8/admin/config today");
        assert_eq!(outcome.masked_text, "fetch <URL> today");
        assert_eq!(outcome.category_counts[&Category::Urls], 1);
        assert!(!outcome.category_counts.contains_key(&Category::IpAddresses));
    }
}
