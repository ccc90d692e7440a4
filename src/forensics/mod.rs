//! Forensic analysis pipeline: digest, scan, classify
//!
//! Every stage is a pure function of its inputs, so profiles can be computed
//! on any worker thread and recomputed later for verification.

pub mod digest;
pub mod patterns;
pub mod risk;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use digest::{digest, DigestEngine, DigestReport, DigestSet};
pub use patterns::{scan, ScanReport, SuspiciousPattern};
pub use risk::{classify, keyword_hits, PlainTextExtractor, RiskAssessment, RiskLevel, TextExtractor};

/// Everything the pipeline derives from an artifact's bytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForensicProfile {
    pub digest: DigestReport,
    pub scan: ScanReport,
    /// Sensitive keywords found in extracted text; empty without an extractor
    pub keyword_hits: Vec<String>,
    pub risk: RiskAssessment,
}

/// Run digest, scan and classification over one artifact
pub fn analyze(
    data: &[u8],
    declared_mime_type: &str,
    extractor: Option<&dyn TextExtractor>,
) -> ForensicProfile {
    let digest = digest::digest(data);
    let scan = patterns::scan(data, declared_mime_type);

    let keyword_hits: Vec<String> = extractor
        .and_then(|e| e.extract_text(data, declared_mime_type))
        .map(|text| risk::keyword_hits(&text).into_iter().map(str::to_owned).collect())
        .unwrap_or_default();

    let risk = risk::classify(digest.entropy, &scan.suspicious_patterns, keyword_hits.as_slice());

    debug!(
        sha256 = %digest.digests.sha256,
        entropy = digest.entropy,
        signature = %scan.signature.signature,
        patterns = scan.suspicious_patterns.len(),
        score = risk.score,
        "Forensic profile computed"
    );

    ForensicProfile {
        digest,
        scan,
        keyword_hits,
        risk,
    }
}
