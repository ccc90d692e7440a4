//! Signature and suspicious-pattern scanner
//!
//! Patterns are matched on raw bytes with `regex::bytes` and Unicode
//! disabled, so binary evidence (images, executables) never has to decode
//! as UTF-8.

use std::fmt;
use std::sync::OnceLock;

use regex::bytes::Regex;
use serde::{Deserialize, Serialize};

use crate::common::magic::{detect_signature, SignatureMatch};

/// Suspicious content tags, declared in check order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuspiciousPattern {
    EmbeddedExecutable,
    SuspiciousDomain,
    Base64Blob,
    CryptoAddress,
}

impl SuspiciousPattern {
    pub const ALL: [SuspiciousPattern; 4] = [
        SuspiciousPattern::EmbeddedExecutable,
        SuspiciousPattern::SuspiciousDomain,
        SuspiciousPattern::Base64Blob,
        SuspiciousPattern::CryptoAddress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SuspiciousPattern::EmbeddedExecutable => "EMBEDDED_EXECUTABLE",
            SuspiciousPattern::SuspiciousDomain => "SUSPICIOUS_DOMAIN",
            SuspiciousPattern::Base64Blob => "BASE64_BLOB",
            SuspiciousPattern::CryptoAddress => "CRYPTO_ADDRESS",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == tag)
    }

    fn regex(&self) -> &'static Regex {
        static EXECUTABLE: OnceLock<Regex> = OnceLock::new();
        static DOMAIN: OnceLock<Regex> = OnceLock::new();
        static BASE64: OnceLock<Regex> = OnceLock::new();
        static CRYPTO: OnceLock<Regex> = OnceLock::new();

        match self {
            // DOS header at the start, a DOS stub anywhere, or ELF magic anywhere
            SuspiciousPattern::EmbeddedExecutable => EXECUTABLE.get_or_init(|| {
                Regex::new(r"(?-u)\AMZ|\x7FELF|This program cannot be run in DOS mode")
                    .expect("Invalid executable regex")
            }),
            // Host must end in the TLD: a port, path, quote, space or end of input follows
            SuspiciousPattern::SuspiciousDomain => DOMAIN.get_or_init(|| {
                Regex::new(
                    r#"(?i-u)\bhttps?://(?:[a-z0-9-]+\.)+(?:tk|ml|ga|cf|gq|xyz|top|pw|zip|click)(?:[:/?#\s"'<>),;\]]|\.(?:[^a-z0-9-]|\z)|\z)"#,
                )
                .expect("Invalid domain regex")
            }),
            SuspiciousPattern::Base64Blob => BASE64.get_or_init(|| {
                Regex::new(r"(?-u)[A-Za-z0-9+/]{100,}={0,2}").expect("Invalid base64 regex")
            }),
            // Legacy/P2SH bitcoin, bech32 bitcoin, ethereum
            SuspiciousPattern::CryptoAddress => CRYPTO.get_or_init(|| {
                Regex::new(
                    r"(?-u)\b(?:[13][a-km-zA-HJ-NP-Z1-9]{25,34}|bc1[a-z0-9]{39,59}|0x[a-fA-F0-9]{40})\b",
                )
                .expect("Invalid crypto address regex")
            }),
        }
    }

    /// Run this check against raw bytes
    pub fn matches(&self, data: &[u8]) -> bool {
        self.regex().is_match(data)
    }
}

impl fmt::Display for SuspiciousPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scanner output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub signature: SignatureMatch,
    /// Tags in check order, each at most once
    pub suspicious_patterns: Vec<SuspiciousPattern>,
}

/// Run every pattern check, in definition order
pub fn scan_patterns(data: &[u8]) -> Vec<SuspiciousPattern> {
    SuspiciousPattern::ALL
        .into_iter()
        .filter(|pattern| pattern.matches(data))
        .collect()
}

/// Detect the file signature and suspicious patterns of an artifact
pub fn scan(data: &[u8], declared_mime_type: &str) -> ScanReport {
    ScanReport {
        signature: detect_signature(data, declared_mime_type),
        suspicious_patterns: scan_patterns(data),
    }
}
