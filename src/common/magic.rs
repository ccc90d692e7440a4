//! File type detection via magic signatures
//!
//! Detects file types from header bytes without relying on the uploader's
//! declared MIME type. The declared type is only consulted when no magic
//! prefix matches, and such a result is reported with low confidence.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Signature Types
// =============================================================================

/// Symbolic file-type tag recorded on evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileSignature {
    Jpeg,
    Png,
    Gif,
    Pdf,
    Zip,
    Mp3,
    Mp4,
    Unknown,
}

impl FileSignature {
    /// Stable tag used in records and persisted rows
    pub fn as_str(&self) -> &'static str {
        match self {
            FileSignature::Jpeg => "JPEG",
            FileSignature::Png => "PNG",
            FileSignature::Gif => "GIF",
            FileSignature::Pdf => "PDF",
            FileSignature::Zip => "ZIP",
            FileSignature::Mp3 => "MP3",
            FileSignature::Mp4 => "MP4",
            FileSignature::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "JPEG" => Some(FileSignature::Jpeg),
            "PNG" => Some(FileSignature::Png),
            "GIF" => Some(FileSignature::Gif),
            "PDF" => Some(FileSignature::Pdf),
            "ZIP" => Some(FileSignature::Zip),
            "MP3" => Some(FileSignature::Mp3),
            "MP4" => Some(FileSignature::Mp4),
            "UNKNOWN" => Some(FileSignature::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for FileSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detection confidence level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    /// Magic signature match
    High,
    /// Derived from the declared MIME type only
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "HIGH",
            Confidence::Low => "LOW",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "HIGH" => Some(Confidence::High),
            "LOW" => Some(Confidence::Low),
            _ => None,
        }
    }
}

/// Outcome of signature detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureMatch {
    pub signature: FileSignature,
    pub confidence: Confidence,
    /// Magic matched and the declared MIME type names something else
    pub declared_mismatch: bool,
}

// =============================================================================
// Magic Detection
// =============================================================================

struct MagicEntry {
    offset: usize,
    magic: &'static [u8],
    signature: FileSignature,
}

/// Magic prefix table, checked in order
const MAGIC_TABLE: &[MagicEntry] = &[
    // JPEG: FF D8 FF
    MagicEntry { offset: 0, magic: &[0xFF, 0xD8, 0xFF], signature: FileSignature::Jpeg },
    // PNG: 89 50 4E 47
    MagicEntry { offset: 0, magic: &[0x89, 0x50, 0x4E, 0x47], signature: FileSignature::Png },
    // GIF: GIF8
    MagicEntry { offset: 0, magic: b"GIF8", signature: FileSignature::Gif },
    // PDF: %PDF
    MagicEntry { offset: 0, magic: b"%PDF", signature: FileSignature::Pdf },
    // ZIP: PK\x03\x04
    MagicEntry { offset: 0, magic: &[0x50, 0x4B, 0x03, 0x04], signature: FileSignature::Zip },
    // MP3 with ID3 tag
    MagicEntry { offset: 0, magic: b"ID3", signature: FileSignature::Mp3 },
    // ISO base media: ftyp box after the 4-byte size
    MagicEntry { offset: 4, magic: b"ftyp", signature: FileSignature::Mp4 },
];

/// Detect a signature from magic bytes only
pub fn detect_magic(header: &[u8]) -> FileSignature {
    MAGIC_TABLE
        .iter()
        .find(|entry| {
            header.len() >= entry.offset + entry.magic.len()
                && &header[entry.offset..entry.offset + entry.magic.len()] == entry.magic
        })
        .map(|entry| entry.signature)
        .unwrap_or(FileSignature::Unknown)
}

/// Map a declared MIME type onto the signature table
pub fn signature_from_mime(mime: &str) -> FileSignature {
    let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    match essence.as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => FileSignature::Jpeg,
        "image/png" => FileSignature::Png,
        "image/gif" => FileSignature::Gif,
        "application/pdf" => FileSignature::Pdf,
        "application/zip" | "application/x-zip-compressed" => FileSignature::Zip,
        "audio/mpeg" | "audio/mp3" => FileSignature::Mp3,
        "video/mp4" | "audio/mp4" => FileSignature::Mp4,
        _ => FileSignature::Unknown,
    }
}

/// Detect file type, falling back to the declared MIME type as a hint
pub fn detect_signature(data: &[u8], declared_mime_type: &str) -> SignatureMatch {
    let declared = signature_from_mime(declared_mime_type);
    let detected = detect_magic(data);

    if detected != FileSignature::Unknown {
        return SignatureMatch {
            signature: detected,
            confidence: Confidence::High,
            declared_mismatch: declared != FileSignature::Unknown && declared != detected,
        };
    }

    SignatureMatch {
        signature: declared,
        confidence: if declared == FileSignature::Unknown { Confidence::High } else { Confidence::Low },
        declared_mismatch: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_jpeg() {
        let header = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        assert_eq!(detect_magic(&header), FileSignature::Jpeg);
    }

    #[test]
    fn test_detect_png() {
        let header = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        assert_eq!(detect_magic(&header), FileSignature::Png);
    }

    #[test]
    fn test_detect_pdf_and_mp3() {
        assert_eq!(detect_magic(b"%PDF-1.7\n"), FileSignature::Pdf);
        assert_eq!(detect_magic(b"ID3\x04\x00"), FileSignature::Mp3);
    }

    #[test]
    fn test_detect_mp4_at_offset() {
        let header = b"\x00\x00\x00\x18ftypmp42";
        assert_eq!(detect_magic(header), FileSignature::Mp4);
        // ftyp at offset 0 is not an ISO box header
        assert_eq!(detect_magic(b"ftypmp42"), FileSignature::Unknown);
    }

    #[test]
    fn test_short_or_unknown() {
        assert_eq!(detect_magic(&[]), FileSignature::Unknown);
        assert_eq!(detect_magic(&[0xFF, 0xD8]), FileSignature::Unknown);
        assert_eq!(detect_magic(b"MZ\x00\x00\x00\x00"), FileSignature::Unknown);
    }

    #[test]
    fn test_magic_wins_over_declared() {
        let result = detect_signature(b"%PDF-1.4", "image/png");
        assert_eq!(result.signature, FileSignature::Pdf);
        assert_eq!(result.confidence, Confidence::High);
        assert!(result.declared_mismatch);
    }

    #[test]
    fn test_declared_fallback_is_low_confidence() {
        let result = detect_signature(b"not really a jpeg", "image/jpeg; charset=binary");
        assert_eq!(result.signature, FileSignature::Jpeg);
        assert_eq!(result.confidence, Confidence::Low);

        let result = detect_signature(b"opaque", "application/octet-stream");
        assert_eq!(result.signature, FileSignature::Unknown);
        assert!(!result.declared_mismatch);
    }

    #[test]
    fn test_tag_round_trip() {
        for sig in [FileSignature::Jpeg, FileSignature::Mp4, FileSignature::Unknown] {
            assert_eq!(FileSignature::parse(sig.as_str()), Some(sig));
        }
    }
}
