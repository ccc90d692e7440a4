// Common utilities shared by the forensic pipeline and the content store

pub mod audit;
pub mod entropy;
pub mod hash;
pub mod magic;

// Re-exports for convenience
pub use entropy::{calculate_entropy, EntropyAccumulator};
pub use hash::{compute_hash, HashAlgorithm, StreamingHasher};
pub use magic::{detect_signature, FileSignature, SignatureMatch};

// Shared constants
pub const BUFFER_SIZE: usize = 8 * 1024 * 1024; // 8MB buffer for optimal throughput
