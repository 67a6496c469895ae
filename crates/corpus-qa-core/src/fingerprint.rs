//! Question normalization and cache-key fingerprinting.
//!
//! Every cache read and write goes through [`fingerprint`], so questions
//! that differ only by case or whitespace share one cache entry. The
//! mapping is deliberately lossy.

use sha2::{Digest, Sha256};

/// Lower-case, trim, and collapse internal whitespace runs to one space.
///
/// # Example
///
/// ```rust
/// use corpus_qa_core::normalize_question;
///
/// assert_eq!(normalize_question("  What\tIs   VAT? "), "what is vat?");
/// ```
pub fn normalize_question(question: &str) -> String {
    question
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// SHA-256 of the normalized question as 64 lowercase hex characters.
pub fn fingerprint(question: &str) -> String {
    let normalized = normalize_question(question);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}
