//! Risk classifier
//!
//! Risk levels are a triage hint for investigators, not a security verdict.
//! A `LOW` artifact can still be malicious and a `HIGH` one can be an
//! innocent compressed archive; human review decides.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::patterns::SuspiciousPattern;

/// Entropy above which a payload is scored as compressed or encrypted
pub const HIGH_ENTROPY_THRESHOLD: f64 = 7.5;

/// Sensitive keywords counted in extracted text (matched case-insensitively)
pub const SENSITIVE_KEYWORDS: [&str; 8] = [
    "password",
    "login",
    "credential",
    "bitcoin",
    "wallet",
    "private key",
    "social security",
    "bank account",
];

/// Coarse triage level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "LOW" => Some(RiskLevel::Low),
            "MEDIUM" => Some(RiskLevel::Medium),
            "HIGH" => Some(RiskLevel::High),
            _ => None,
        }
    }

    /// Score mapping: >= 5 HIGH, 2..5 MEDIUM, otherwise LOW
    pub fn from_score(score: u32) -> Self {
        if score >= 5 {
            RiskLevel::High
        } else if score >= 2 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: u32,
    pub level: RiskLevel,
}

/// Sensitive keywords present in `text`, in keyword-list order
pub fn keyword_hits(text: &str) -> Vec<&'static str> {
    let lowered = text.to_lowercase();
    SENSITIVE_KEYWORDS
        .into_iter()
        .filter(|keyword| lowered.contains(keyword))
        .collect()
}

/// Score an artifact
///
/// +2 when entropy exceeds 7.5, +1 per distinct pattern tag, +1 per distinct
/// keyword. An embedded executable header never rates below `MEDIUM`,
/// whatever the score.
pub fn classify<K: AsRef<str>>(
    entropy: f64,
    suspicious_patterns: &[SuspiciousPattern],
    keyword_hits: &[K],
) -> RiskAssessment {
    let mut score = 0u32;

    if entropy > HIGH_ENTROPY_THRESHOLD {
        score += 2;
    }

    let patterns: BTreeSet<_> = suspicious_patterns.iter().collect();
    score += patterns.len() as u32;

    let keywords: BTreeSet<String> = keyword_hits
        .iter()
        .map(|k| k.as_ref().to_lowercase())
        .collect();
    score += keywords.len() as u32;

    let mut level = RiskLevel::from_score(score);
    if patterns.contains(&SuspiciousPattern::EmbeddedExecutable) {
        level = level.max(RiskLevel::Medium);
    }

    RiskAssessment { score, level }
}

// =============================================================================
// Text Extraction Collaborator
// =============================================================================

/// Supplies searchable text for keyword scoring
///
/// Without an extractor keyword hits are always empty and only entropy and
/// patterns contribute to the score.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, data: &[u8], declared_mime_type: &str) -> Option<String>;
}

/// Extracts text from artifacts that declare a `text/*` type and are valid UTF-8
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract_text(&self, data: &[u8], declared_mime_type: &str) -> Option<String> {
        if !declared_mime_type.trim().to_ascii_lowercase().starts_with("text/") {
            return None;
        }
        std::str::from_utf8(data).ok().map(str::to_owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forensics::patterns::SuspiciousPattern::*;

    const NONE: [&str; 0] = [];

    #[test]
    fn test_high_entropy_alone_is_medium() {
        let result = classify(7.6, &[], &NONE);
        assert_eq!(result.score, 2);
        assert_eq!(result.level, RiskLevel::Medium);
    }

    #[test]
    fn test_boundary_progression() {
        let one = classify(7.6, &[SuspiciousDomain], &NONE);
        assert_eq!((one.score, one.level), (3, RiskLevel::Medium));

        let three = classify(7.6, &[SuspiciousDomain, Base64Blob, CryptoAddress], &NONE);
        assert_eq!((three.score, three.level), (5, RiskLevel::High));
    }

    #[test]
    fn test_threshold_is_strict() {
        assert_eq!(classify(7.5, &[], &NONE).score, 0);
        assert_eq!(classify(7.500001, &[], &NONE).score, 2);
    }

    #[test]
    fn test_duplicates_count_once() {
        let result = classify(1.0, &[Base64Blob, Base64Blob], &["Password", "password"]);
        assert_eq!(result.score, 2);
        assert_eq!(result.level, RiskLevel::Medium);
    }

    #[test]
    fn test_executable_floor() {
        let result = classify(2.0, &[EmbeddedExecutable], &NONE);
        assert_eq!(result.score, 1);
        assert_eq!(result.level, RiskLevel::Medium);

        let plain = classify(2.0, &[CryptoAddress], &NONE);
        assert_eq!(plain.level, RiskLevel::Low);
    }

    #[test]
    fn test_keyword_hits() {
        let hits = keyword_hits("Forgot my PASSWORD, the Bank Account and private  key are in the wallet");
        assert_eq!(hits, vec!["password", "wallet", "bank account"]);
        assert!(keyword_hits("").is_empty());
    }

    #[test]
    fn test_keywords_contribute() {
        let hits = keyword_hits("login credential bitcoin wallet password");
        let result = classify(4.0, &[], hits.as_slice());
        assert_eq!(result.score, 5);
        assert_eq!(result.level, RiskLevel::High);
    }

    #[test]
    fn test_plain_text_extractor() {
        let extractor = PlainTextExtractor;
        assert_eq!(extractor.extract_text(b"login here", "text/plain").as_deref(), Some("login here"));
        assert_eq!(extractor.extract_text(b"login here", "application/pdf"), None);
        assert_eq!(extractor.extract_text(&[0xFF, 0xFE, 0x00], "text/plain"), None);
    }

    #[test]
    fn test_level_tags() {
        assert_eq!(RiskLevel::parse("HIGH"), Some(RiskLevel::High));
        assert_eq!(RiskLevel::Medium.to_string(), "MEDIUM");
        assert!(RiskLevel::High > RiskLevel::Medium && RiskLevel::Medium > RiskLevel::Low);
    }
}
