//! Context-clue extraction for masked content
//!
//! Clues summarize structure (comment counts, declared identifiers, file
//! types, a language guess) so the upstream model can still reason about the
//! text after redaction. Clues carry counts and identifier names only, never
//! the matched sensitive values themselves.

use maskgate_core::Result;
use regex::Regex;

use crate::catalog::compile;

/// Maximum declared identifiers quoted in a clue
const IDENTIFIER_SAMPLE: usize = 3;

/// Keyword co-occurrence tables for the single language guess; first
/// language with any indicator present wins.
const LANGUAGE_INDICATORS: &[(&str, &[&str])] = &[
    ("python", &["def ", "import ", "self.", "if __name__", "elif "]),
    ("javascript", &["function ", "const ", "let ", "=>", "console.log"]),
    ("java", &["public class", "public static", "import java", "System.out"]),
    ("sql", &["SELECT", "INSERT INTO", "UPDATE", "CREATE TABLE"]),
];

#[derive(Debug)]
pub struct ClueExtractor {
    comments: Regex,
    declarations: Regex,
    extensions: Regex,
}

impl ClueExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            comments: compile(r"(?m)#.*|//.*|/\*[\s\S]*?\*/|<!--[\s\S]*?-->")?,
            declarations: compile(r"\b(?:def|function|class)\s+([A-Za-z_][A-Za-z0-9_]*)")?,
            extensions: compile(
                r"(?i)\.(py|js|ts|java|cpp|cs|php|rb|go|rs|swift|kt|scala|sh|bash|sql|html|css|xml|json|yaml|yml|toml|ini|cfg|conf)\b",
            )?,
        })
    }

    /// Extract ordered clues from the raw (pre-masking) text
    pub fn extract(&self, text: &str) -> Vec<String> {
        let mut clues = Vec::new();

        let comment_count = self.comments.find_iter(text).count();
        if comment_count > 0 {
            clues.push(format!(
                "found {comment_count} comment span(s) describing the structure"
            ));
        }

        let identifiers: Vec<&str> = self
            .declarations
            .captures_iter(text)
            .filter_map(|cap| cap.get(1).map(|m| m.as_str()))
            .collect();
        if !identifiers.is_empty() {
            clues.push(format!(
                "declares {} function/class identifier(s): {}",
                identifiers.len(),
                identifiers[..identifiers.len().min(IDENTIFIER_SAMPLE)].join(", ")
            ));
        }

        let mut extensions: Vec<String> = Vec::new();
        for cap in self.extensions.captures_iter(text) {
            if let Some(ext) = cap.get(1) {
                let ext = ext.as_str().to_ascii_lowercase();
                if !extensions.contains(&ext) {
                    extensions.push(ext);
                }
            }
        }
        if !extensions.is_empty() {
            clues.push(format!("references file types: {}", extensions.join(", ")));
        }

        if let Some(language) = guess_language(text) {
            clues.push(format!("appears to be {language} code"));
        }

        clues
    }
}

/// Best-effort single language guess from keyword co-occurrence
fn guess_language(text: &str) -> Option<&'static str> {
    LANGUAGE_INDICATORS
        .iter()
        .find(|(_, indicators)| indicators.iter().any(|needle| text.contains(needle)))
        .map(|(language, _)| *language)
}
