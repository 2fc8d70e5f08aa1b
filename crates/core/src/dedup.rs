// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ledger keys for processed source items.
//!
//! A key is `<slug>~<digest>`: the slug keeps keys readable when listing the
//! ledger, the digest (first 16 hex chars of SHA-256 over the exact path)
//! keeps distinct paths apart when their slugs collide. Slugs never start
//! with `_`, so keys cannot clash with document metadata entries.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const DIGEST_HEX_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DedupKey(String);

impl DedupKey {
    /// Derive the key for a source path.
    pub fn for_path(path: &str) -> Self {
        let slug: String = path
            .chars()
            .map(|c| if c == '/' || c == '\\' || c.is_whitespace() { '_' } else { c })
            .collect();
        let slug = slug.trim_start_matches('_');
        let digest = format!("{:x}", Sha256::digest(path.as_bytes()));
        let short = digest.get(..DIGEST_HEX_LEN).unwrap_or(&digest);
        Self(format!("{}~{}", slug, short))
    }

    /// Wrap a key read back from the ledger.
    pub fn from_string(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DedupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DedupKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[path = "dedup_tests.rs"]
mod tests;
