//! Result cache for batch runs.
//!
//! A size search costs a dozen encodes per image. Re-running `downsize batch`
//! over a directory where most files are unchanged should not pay that again,
//! so batch mode records every result it writes and skips the search when the
//! source and the settings are the same as last time.
//!
//! ## Cache keys
//!
//! The cache is **content-addressed**: lookups are by `source_hash` plus
//! `params_hash`, not by output path. Renaming or moving a source file does
//! not invalidate its entry.
//!
//! - **`source_hash`**: SHA-256 of the source file bytes. Content-based
//!   rather than mtime-based so it survives `git checkout` and copies.
//! - **`params_hash`**: SHA-256 of everything that changes the output:
//!   target size, output format, JPEG quality and GIF speed.
//!
//! A hit requires a matching entry **and** the previously written output
//! still on disk. When the stored output lives at a different path (the
//! source was moved), the caller copies it instead of re-encoding.
//!
//! ## Storage
//!
//! The manifest is `<output_dir>/.downsize-cache.json`. Pass `--no-cache` to
//! start from an empty manifest; outputs are overwritten naturally.

use crate::imaging::EncodeConfig;
use crate::search::TargetSize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::Path;

/// Name of the cache manifest file within the output directory.
const MANIFEST_FILENAME: &str = ".downsize-cache.json";

/// Bump to invalidate all existing caches when the key computation changes.
const MANIFEST_VERSION: u32 = 1;

/// A single cached output file.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub source_hash: String,
    pub params_hash: String,
    /// Encoded size, reported again on a hit.
    pub size: u64,
}

/// On-disk manifest mapping output paths (relative to the output directory)
/// to their cache entries.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CacheManifest {
    pub version: u32,
    pub entries: HashMap<String, CacheEntry>,
    /// Runtime reverse index: `"{source_hash}:{params_hash}"` → output path.
    /// Built at load time, maintained on insert. Never serialized.
    #[serde(skip)]
    content_index: HashMap<String, String>,
}

fn content_key(source_hash: &str, params_hash: &str) -> String {
    format!("{source_hash}:{params_hash}")
}

impl CacheManifest {
    /// Create an empty manifest (used for `--no-cache` or first run).
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: HashMap::new(),
            content_index: HashMap::new(),
        }
    }

    /// Load from the output directory. Returns an empty manifest if the
    /// file doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(output_dir: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(output_dir.join(MANIFEST_FILENAME)) else {
            return Self::empty();
        };
        let Ok(mut manifest) = serde_json::from_str::<Self>(&content) else {
            tracing::warn!("ignoring unreadable cache manifest in {}", output_dir.display());
            return Self::empty();
        };
        if manifest.version != MANIFEST_VERSION {
            return Self::empty();
        }
        manifest.content_index = manifest
            .entries
            .iter()
            .map(|(path, e)| (content_key(&e.source_hash, &e.params_hash), path.clone()))
            .collect();
        manifest
    }

    /// Save to the output directory.
    pub fn save(&self, output_dir: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(output_dir.join(MANIFEST_FILENAME), json)
    }

    /// Look up a cached output by content hashes.
    ///
    /// Returns the stored relative path and entry if the output file is still
    /// on disk. The path may differ from the caller's expected output path.
    pub fn find_cached(
        &self,
        source_hash: &str,
        params_hash: &str,
        output_dir: &Path,
    ) -> Option<(&str, &CacheEntry)> {
        let stored = self.content_index.get(&content_key(source_hash, params_hash))?;
        if !output_dir.join(stored).exists() {
            return None;
        }
        let entry = self.entries.get(stored)?;
        Some((stored.as_str(), entry))
    }

    /// Record a result. A previous entry for the same content under another
    /// path is dropped.
    pub fn insert(&mut self, output_path: String, entry: CacheEntry) {
        let key = content_key(&entry.source_hash, &entry.params_hash);
        if let Some(old_path) = self.content_index.get(&key)
            && *old_path != output_path
        {
            self.entries.remove(old_path.as_str());
        }
        self.content_index.insert(key, output_path.clone());
        self.entries.insert(output_path, entry);
    }
}

/// SHA-256 of a byte slice as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// SHA-256 of the settings that determine the output bytes.
pub fn hash_params(target: TargetSize, config: &EncodeConfig) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"downsize\0");
    match target {
        TargetSize::Unlimited => hasher.update(b"\x00"),
        TargetSize::Bytes(n) => {
            hasher.update(b"\x01");
            hasher.update(n.to_le_bytes());
        }
    }
    hasher.update(config.format().as_str().as_bytes());
    hasher.update(b"\0");
    match config {
        EncodeConfig::Jpeg { quality } => hasher.update([quality.value()]),
        EncodeConfig::Png => {}
        EncodeConfig::Gif(options) => hasher.update(options.speed.to_le_bytes()),
    }
    format!("{:x}", hasher.finalize())
}

/// Summary of cache performance for a batch run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub copies: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn total(&self) -> u32 {
        self.hits + self.copies + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.copies > 0 {
            write!(
                f,
                "{} cached, {} copied, {} encoded ({} total)",
                self.hits,
                self.copies,
                self.misses,
                self.total()
            )
        } else if self.hits > 0 {
            write!(
                f,
                "{} cached, {} encoded ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} encoded", self.misses)
        }
    }
}
