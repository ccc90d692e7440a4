//! Entropy analysis utilities
//!
//! Calculates Shannon entropy of data to flag encrypted, compressed
//! or random payloads. The accumulator form lets the digest engine build the
//! byte histogram in the same pass that feeds the hashers.

// =============================================================================
// Entropy Calculation
// =============================================================================

/// Incremental byte histogram for Shannon entropy
#[derive(Clone)]
pub struct EntropyAccumulator {
    counts: [u64; 256],
    total: u64,
}

impl Default for EntropyAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl EntropyAccumulator {
    pub fn new() -> Self {
        Self {
            counts: [0u64; 256],
            total: 0,
        }
    }

    /// Add a chunk of bytes to the histogram
    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.counts[byte as usize] += 1;
        }
        self.total += data.len() as u64;
    }

    /// Number of bytes observed so far
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Shannon entropy in bits per byte (0.0 - 8.0)
    ///
    /// Bins are visited in byte-value order so the floating point sum is
    /// identical for identical histograms.
    pub fn entropy(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }

        let len = self.total as f64;
        let mut entropy = 0.0;

        for &count in &self.counts {
            if count > 0 {
                let probability = count as f64 / len;
                entropy -= probability * probability.log2();
            }
        }

        // keep float drift inside [0, 8]
        entropy.clamp(0.0, 8.0)
    }
}

/// Calculate Shannon entropy of data (0.0 - 8.0 bits per byte)
///
/// - 0.0 = All bytes identical (e.g., all zeros)
/// - ~4.5 = English text
/// - ~7.5 = Compressed data
/// - ~7.9+ = Encrypted or truly random data
pub fn calculate_entropy(data: &[u8]) -> f64 {
    let mut acc = EntropyAccumulator::new();
    acc.update(data);
    acc.entropy()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entropy_zeros() {
        let data = vec![0u8; 1000];
        assert_eq!(calculate_entropy(&data), 0.0);
    }

    #[test]
    fn test_entropy_single_repeated_value() {
        assert_eq!(calculate_entropy(&[0xAB; 77]), 0.0);
        assert_eq!(calculate_entropy(b"M"), 0.0);
    }

    #[test]
    fn test_entropy_all_byte_values() {
        let data: Vec<u8> = (0u8..=255).collect();
        let entropy = calculate_entropy(&data);
        assert!((entropy - 8.0).abs() < 1e-9, "uniform histogram should be 8 bits, got {}", entropy);
    }

    #[test]
    fn test_entropy_text() {
        let data = b"The quick brown fox jumps over the lazy dog. This is sample English text.";
        let entropy = calculate_entropy(data);
        assert!(entropy > 3.5 && entropy < 5.5, "English text entropy ~4.5, got {}", entropy);
    }

    #[test]
    fn test_accumulator_chunking_is_irrelevant() {
        let data: Vec<u8> = (0..5000u32).map(|i| (i * 31 % 251) as u8).collect();
        let mut acc = EntropyAccumulator::new();
        for chunk in data.chunks(333) {
            acc.update(chunk);
        }
        assert_eq!(acc.total(), 5000);
        assert_eq!(acc.entropy().to_bits(), calculate_entropy(&data).to_bits());
    }

    #[test]
    fn test_empty_data() {
        assert_eq!(calculate_entropy(&[]), 0.0);
    }
}
