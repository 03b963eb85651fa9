use sha1::{Digest, Sha1};

/// Content-hash service consumed by `File` (spec.md §6): `sha1(text) -> String`.
pub fn sha1(text: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
