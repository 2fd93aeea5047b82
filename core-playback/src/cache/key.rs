//! Identifier to file-name mapping.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Longest extension carried over to hashed file names.
const MAX_EXTENSION_LEN: usize = 8;

/// How a remote identifier is turned into a cache file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKeyStrategy {
    /// The identifier's last path segment (`.../ep01.mp4?sig=x` -> `ep01.mp4`).
    ///
    /// Distinct identifiers sharing a file name map to the same entry.
    #[default]
    LastPathSegment,
    /// SHA-256 of the full identifier plus the original extension.
    HashedIdentifier,
}

impl CacheKeyStrategy {
    /// File name for `identifier` inside the cache root.
    ///
    /// Segments that cannot be used as a plain file name (empty, hidden or
    /// relative) fall back to the hashed form.
    pub fn file_name(&self, identifier: &str) -> String {
        match self {
            CacheKeyStrategy::LastPathSegment => match last_path_segment(identifier) {
                Some(segment) if is_plain_file_name(segment) => segment.to_string(),
                _ => hashed_name(identifier),
            },
            CacheKeyStrategy::HashedIdentifier => hashed_name(identifier),
        }
    }
}

/// Last `/`-separated segment of the identifier's path, ignoring query and
/// fragment.
pub fn last_path_segment(identifier: &str) -> Option<&str> {
    let end = identifier.find(['?', '#']).unwrap_or(identifier.len());
    let path = &identifier[..end];
    path.rsplit('/').next().filter(|segment| !segment.is_empty())
}

fn is_plain_file_name(segment: &str) -> bool {
    !segment.starts_with('.') && !segment.contains('\\') && !segment.ends_with(".part")
}

fn hashed_name(identifier: &str) -> String {
    let digest = hex::encode(Sha256::digest(identifier.as_bytes()));
    match last_path_segment(identifier).and_then(extension) {
        Some(ext) => format!("{}.{}", digest, ext),
        None => digest,
    }
}

fn extension(segment: &str) -> Option<&str> {
    let (stem, ext) = segment.rsplit_once('.')?;
    let usable = !stem.is_empty()
        && !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    usable.then_some(ext)
}
