//! Content classification: code vs business document vs technical document

use maskgate_core::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::catalog::compile;

/// The classifier's verdict for one input text.
///
/// Derived once per request and immutable afterwards; the redaction engine
/// uses it to decide which content-specific masking phase applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentProfile {
    pub is_code: bool,
    pub is_business_document: bool,
    pub is_technical_document: bool,
}

/// Threshold of distinct code signals for the code verdict
const CODE_THRESHOLD: usize = 3;

/// Threshold of matched business signal groups
const BUSINESS_THRESHOLD: usize = 2;

/// Threshold of distinct technical terms
const TECHNICAL_THRESHOLD: usize = 3;

/// Pure text classifier with precompiled signal matchers.
///
/// Each signal counts at most once per input, so the scores measure breadth
/// of evidence rather than repetition. Ties go toward "not classified".
#[derive(Debug)]
pub struct ContentProfiler {
    code_signals: Vec<Regex>,
    business_signals: Vec<Regex>,
    technical_terms: Vec<Regex>,
}

impl ContentProfiler {
    pub fn new() -> Result<Self> {
        // The prominent keywords each count as their own signal; a text that
        // mentions three of them reads as code even without line structure.
        let code_signals = [
            r"\bfunction\b",
            r"\bdef\b",
            r"\bclass\b",
            r"\bimport\b",
            r"\b(?:export|require|include|package|namespace|module)\b",
            r"\b(?:if|else|for|while|switch|case|try|catch|finally|throw)\b",
            r"\b(?:var|let|const|int|string|boolean|float|double|void|return)\b",
            r"\b(?:public|private|protected|static|final|abstract|interface|extends|implements)\b",
            // import-statement line shape
            r"(?m)^\s*(?:import|from|using|require|include)\s+\S",
            // known file-extension mentions
            r"(?i)\.(?:py|js|ts|java|cpp|cs|php|rb|go|rs|swift|kt|scala|sh|bash|sql|html|css|xml|json|yaml|yml|toml|ini|cfg|conf)\b",
            // fenced and inline code spans
            r"```[\s\S]*?```",
            r"`[^`\n]+`",
        ];

        let business_signals = [
            r"(?i)\b(?:confidential|secret|private|internal|proprietary|classified|restricted)\b",
            r"(?i)\b(?:nda|non-disclosure|trade\s+secret|intellectual\s+property)\b",
            r"(?i)\b(?:revenue|profit|margin|cost|budget|financial|accounting|billing)\b",
            r"(?i)\b(?:employee|hr|human\s+resources|salary|compensation|benefits)\b",
            r"(?i)\b(?:customer|client|vendor|supplier|partner|stakeholder)\b",
            r"(?i)\b(?:project|initiative|strategy|roadmap|milestone|deadline)\b",
            r"\b(?:[A-Z][A-Za-z]+\s+)+(?:Inc|Corp|LLC|Ltd|Company|Corporation)\b",
            r"\b(?:[Cc]ompany|[Oo]rganization|[Ee]nterprise|[Bb]usiness)\s+[A-Z][a-z]+\b",
            r"(?i)\b(?:contract|agreement|proposal|report|memo|brief|presentation|deck)\b",
            r"(?i)\b(?:manual|guide|documentation|specification|requirements|design)\b",
            r"(?i)\b(?:policy|procedure|process|workflow|standard|protocol)\b",
        ];

        let technical_terms = [
            r"(?i)\bapi\b",
            r"(?i)\bendpoint\b",
            r"(?i)\bdatabase\b",
            r"(?i)\bserver\b",
            r"(?i)\bclient\b",
            r"(?i)\bprotocol\b",
            r"(?i)\binterface\b",
        ];

        Ok(Self {
            code_signals: compile_all(&code_signals)?,
            business_signals: compile_all(&business_signals)?,
            technical_terms: compile_all(&technical_terms)?,
        })
    }

    /// Classify one input text. Pure; no side effects.
    pub fn profile(&self, text: &str) -> ContentProfile {
        let code_score = count_matching(&self.code_signals, text);
        let business_score = count_matching(&self.business_signals, text);
        let technical_score = count_matching(&self.technical_terms, text);

        ContentProfile {
            is_code: code_score >= CODE_THRESHOLD,
            is_business_document: business_score >= BUSINESS_THRESHOLD,
            is_technical_document: technical_score >= TECHNICAL_THRESHOLD,
        }
    }
}

fn compile_all(patterns: &[&str]) -> Result<Vec<Regex>> {
    patterns.iter().map(|p| compile(p)).collect()
}

fn count_matching(signals: &[Regex], text: &str) -> usize {
    signals.iter().filter(|re| re.is_match(text)).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profiler() -> ContentProfiler {
        ContentProfiler::new().unwrap()
    }

    #[test]
    fn test_three_code_markers_is_code() {
        let profile = profiler().profile("def greet plus class Greeter plus import os");
        assert!(profile.is_code);
    }

    #[test]
    fn test_two_code_markers_is_not_code() {
        let profile = profiler().profile("a def here and a class there");
        assert!(!profile.is_code);
    }

    #[test]
    fn test_python_snippet_is_code() {
        let text = "import os\n\ndef main():\n    return os.getcwd()\n";
        assert!(profiler().profile(text).is_code);
    }

    #[test]
    fn test_business_document() {
        let text = "This confidential proposal covers the Q3 budget.";
        let profile = profiler().profile(text);
        assert!(profile.is_business_document);
    }

    #[test]
    fn test_single_business_term_not_enough() {
        let profile = profiler().profile("Our budget is tight this year.");
        assert!(!profile.is_business_document);
    }

    #[test]
    fn test_technical_document() {
        let text = "The API exposes an endpoint backed by the database.";
        let profile = profiler().profile(text);
        assert!(profile.is_technical_document);
        assert!(!profile.is_code);
    }

    #[test]
    fn test_two_technical_terms_not_enough() {
        let profile = profiler().profile("The server talks to the client.");
        assert!(!profile.is_technical_document);
    }

    #[test]
    fn test_plain_prose_is_nothing() {
        let profile = profiler().profile("We went hiking on Saturday morning.");
        assert_eq!(profile, ContentProfile::default());
    }
}
