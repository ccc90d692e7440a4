//! Digest engine
//!
//! One pass over the artifact feeds MD5, SHA-1, SHA-256 and the entropy
//! histogram together, so a large file is only read once.

use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::common::entropy::EntropyAccumulator;
use crate::common::hash::{HashAlgorithm, StreamingHasher};
use crate::common::BUFFER_SIZE;
use crate::error::CustodyResult;

/// Hex digests recorded on every evidence record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DigestSet {
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
}

impl DigestSet {
    pub fn get(&self, algorithm: HashAlgorithm) -> &str {
        match algorithm {
            HashAlgorithm::Md5 => &self.md5,
            HashAlgorithm::Sha1 => &self.sha1,
            HashAlgorithm::Sha256 => &self.sha256,
        }
    }
}

/// Output of a single digest pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestReport {
    pub digests: DigestSet,
    /// Shannon entropy in bits per byte, 0.0 - 8.0
    pub entropy: f64,
    pub size_bytes: u64,
}

/// Incremental digest engine
///
/// Every chunk passed to [`update`](Self::update) goes to all three hashers and
/// the histogram before the next chunk is read.
#[derive(Clone)]
pub struct DigestEngine {
    md5: StreamingHasher,
    sha1: StreamingHasher,
    sha256: StreamingHasher,
    histogram: EntropyAccumulator,
}

impl Default for DigestEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DigestEngine {
    pub fn new() -> Self {
        Self {
            md5: StreamingHasher::new(HashAlgorithm::Md5),
            sha1: StreamingHasher::new(HashAlgorithm::Sha1),
            sha256: StreamingHasher::new(HashAlgorithm::Sha256),
            histogram: EntropyAccumulator::new(),
        }
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.md5.update(chunk);
        self.sha1.update(chunk);
        self.sha256.update(chunk);
        self.histogram.update(chunk);
    }

    pub fn finalize(self) -> DigestReport {
        DigestReport {
            entropy: self.histogram.entropy(),
            size_bytes: self.histogram.total(),
            digests: DigestSet {
                md5: self.md5.finalize(),
                sha1: self.sha1.finalize(),
                sha256: self.sha256.finalize(),
            },
        }
    }
}

/// Digest an in-memory artifact
pub fn digest(data: &[u8]) -> DigestReport {
    let mut engine = DigestEngine::new();
    for chunk in data.chunks(BUFFER_SIZE) {
        engine.update(chunk);
    }
    engine.finalize()
}

/// Digest a stream without buffering it whole
#[instrument(skip(reader))]
pub fn digest_reader<R: Read>(reader: R) -> CustodyResult<DigestReport> {
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, reader);
    let mut engine = DigestEngine::new();

    loop {
        let buf = match reader.fill_buf() {
            Ok(buf) => buf,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        let len = buf.len();
        if len == 0 {
            break;
        }
        engine.update(buf);
        reader.consume(len);
    }

    let report = engine.finalize();
    debug!(size = report.size_bytes, sha256 = %report.digests.sha256, "Stream digest complete");
    Ok(report)
}

/// Digest a file on disk
pub fn digest_file(path: &Path) -> CustodyResult<DigestReport> {
    let file = File::open(path)?;
    digest_reader(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::pseudo_random;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_known_digests() {
        let report = digest(b"hello world");
        assert_eq!(report.digests.md5, "5eb63bbbe01eeed093cb22bb8f5acdc3");
        assert_eq!(report.digests.sha1, "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed");
        assert_eq!(
            report.digests.sha256,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(report.size_bytes, 11);
    }

    #[test]
    fn test_empty_input() {
        let report = digest(&[]);
        assert_eq!(report.size_bytes, 0);
        assert_eq!(report.entropy, 0.0);
        assert_eq!(report.digests.md5, "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            report.digests.sha256,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_deterministic() {
        let data = pseudo_random(10_000);
        let first = digest(&data);
        let second = digest(&data);
        assert_eq!(first.digests, second.digests);
        assert_eq!(first.entropy.to_bits(), second.entropy.to_bits());
    }

    #[test]
    fn test_entropy_bounds() {
        assert_eq!(digest(&[0x41; 4096]).entropy, 0.0);

        let random = digest(&pseudo_random(64 * 1024));
        assert!(random.entropy > 7.9 && random.entropy <= 8.0, "got {}", random.entropy);

        let text = digest(b"Suspect messaged the victim twice on Tuesday.");
        assert!(text.entropy >= 0.0 && text.entropy <= 8.0);
    }

    #[test]
    fn test_streaming_matches_one_shot() {
        let data = pseudo_random(3000);
        let mut engine = DigestEngine::new();
        for chunk in data.chunks(7) {
            engine.update(chunk);
        }
        assert_eq!(engine.finalize(), digest(&data));
    }

    #[test]
    fn test_digest_file() {
        let data = pseudo_random(50_000);
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();
        file.flush().unwrap();

        let report = digest_file(file.path()).unwrap();
        assert_eq!(report, digest(&data));
    }

    /// Fails with `Interrupted` before every real read
    struct FlakyReader<'a> {
        data: &'a [u8],
        interrupt: bool,
    }

    impl Read for FlakyReader<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.interrupt = !self.interrupt;
            if self.interrupt {
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.read(buf)
        }
    }

    #[test]
    fn test_reader_retries_interrupted() {
        let data = pseudo_random(20_000);
        let reader = FlakyReader { data: &data, interrupt: false };
        assert_eq!(digest_reader(reader).unwrap(), digest(&data));
    }

    #[test]
    fn test_digest_missing_file() {
        assert!(digest_file(Path::new("/nonexistent/evidence.bin")).is_err());
    }
}
