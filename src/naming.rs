//! Deterministic placeholder naming for rehomed assets.
//!
//! Every asset reference is identified by a digest of its exact source URL
//! string — byte for byte, including the signed query string. The same URL
//! always maps to the same placeholder, within a run and across runs, which
//! is what makes rehosting idempotent: a re-run derives the same blob name,
//! finds the blob already in durable storage, and skips the upload.
//!
//! The digest is SHA-256, base64-encoded, stripped to `[A-Za-z0-9]`, and
//! truncated to 32 characters — safe in filenames, URLs, and markdown
//! without escaping.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

/// Prefix shared by every image placeholder in sanitized markup.
pub const PLACEHOLDER_PREFIX: &str = "image-placeholder-";

/// Length of the hash portion of a placeholder.
pub const HASH_LEN: usize = 32;

/// Digest an arbitrary string into a filesystem/URL-safe identifier.
///
/// Total function: never fails, any input string is acceptable.
pub fn placeholder_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    STANDARD
        .encode(digest)
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(HASH_LEN)
        .collect()
}

/// Full placeholder token for a source URL: `image-placeholder-<hash>`.
pub fn placeholder_for(source_url: &str) -> String {
    format!("{PLACEHOLDER_PREFIX}{}", placeholder_hash(source_url))
}

/// Reduce an opaque external identifier to a single safe path component:
/// anything outside `[A-Za-z0-9-]` becomes `_`. Document ids come from the
/// workspace API and must never carry path syntax into the filesystem.
pub fn safe_path_component(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}
