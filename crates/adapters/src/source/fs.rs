// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Change feed over a local directory tree, driven by change times.
//!
//! A file's change time is the later of its modification time and, on Unix,
//! its inode change time, so files moved or copied in with an older
//! modification time still count as new.
//!
//! Cursors have the form `fs1:<epoch_ms>:<seen>:<source_key>`: a watermark of
//! the newest change time seen so far, plus comma-separated path digests of
//! the files already reported at exactly that millisecond. Deletions are not
//! reported.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_core::ChangedEntry;
use sha2::{Digest, Sha256};

use super::{ChangeBatch, ChangeSource, ChangeSourceError};

const CURSOR_VERSION: &str = "fs1";

#[derive(Debug, Clone)]
pub struct FsChangeSource {
    root: PathBuf,
}

impl FsChangeSource {
    /// Source keys are paths relative to `root` (leading `/` allowed).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn folder(&self, source_key: &str) -> PathBuf {
        self.root.join(source_key.trim_start_matches('/'))
    }

    /// Every file under `source_key` with its change time in epoch ms.
    async fn scan(&self, source_key: &str) -> Result<Vec<(ChangedEntry, u64)>, ChangeSourceError> {
        let folder = self.folder(source_key);
        match tokio::fs::metadata(&folder).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(ChangeSourceError::NotFound(source_key.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ChangeSourceError::NotFound(source_key.to_string()))
            }
            Err(e) => return Err(io_error(&folder, e)),
        }

        let mut found = Vec::new();
        let mut pending = vec![folder];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| io_error(&dir, e))?;
            while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(&dir, e))? {
                let path = entry.path();
                let meta = match entry.metadata().await {
                    Ok(meta) => meta,
                    // Removed between read_dir and stat
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(e) => return Err(io_error(&path, e)),
                };
                if meta.is_dir() {
                    pending.push(path);
                    continue;
                }
                if !meta.is_file() {
                    continue;
                }
                let modified = meta.modified().ok();
                let changed_ms = changed_ms(&meta);
                found.push((
                    ChangedEntry {
                        name: entry.file_name().to_string_lossy().into_owned(),
                        path: self.display_path(&path),
                        size: meta.len(),
                        modified_at: modified.map(DateTime::<Utc>::from),
                        is_deleted: false,
                    },
                    changed_ms,
                ));
            }
        }
        found.sort_by(|a, b| a.0.path.cmp(&b.0.path));
        Ok(found)
    }

    /// `/`-separated path relative to the root, with a leading `/`.
    fn display_path(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let parts: Vec<_> =
            relative.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect();
        format!("/{}", parts.join("/"))
    }
}

fn io_error(path: &Path, e: std::io::Error) -> ChangeSourceError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        return ChangeSourceError::Auth(format!("{}: {}", path.display(), e));
    }
    ChangeSourceError::Unavailable(format!("{}: {}", path.display(), e))
}

fn modified_ms(meta: &std::fs::Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Renames and copies that preserve mtime still bump ctime.
#[cfg(unix)]
fn changed_ms(meta: &std::fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    let secs = u64::try_from(meta.ctime()).unwrap_or(0);
    let nanos = u64::try_from(meta.ctime_nsec()).unwrap_or(0);
    let ctime_ms = secs.saturating_mul(1000).saturating_add(nanos / 1_000_000);
    modified_ms(meta).max(ctime_ms)
}

#[cfg(not(unix))]
fn changed_ms(meta: &std::fs::Metadata) -> u64 {
    modified_ms(meta)
}

fn path_digest(path: &str) -> String {
    let digest = Sha256::digest(path.as_bytes());
    digest.iter().take(8).map(|b| format!("{:02x}", b)).collect()
}

/// Watermark and the digests of files already reported at it.
#[derive(Debug, PartialEq, Eq)]
struct Position {
    watermark: u64,
    seen: BTreeSet<String>,
}

impl Position {
    fn of(found: &[(ChangedEntry, u64)], floor: Option<&Position>) -> Self {
        let newest = found.iter().map(|(_, ms)| *ms).max().unwrap_or(0);
        match floor {
            Some(floor) if floor.watermark > newest => {
                Self { watermark: floor.watermark, seen: floor.seen.clone() }
            }
            _ => Self {
                watermark: newest,
                seen: found
                    .iter()
                    .filter(|(_, ms)| *ms == newest)
                    .map(|(entry, _)| path_digest(&entry.path))
                    .collect(),
            },
        }
    }

    /// Changed after the watermark, or at it without having been reported.
    fn is_new(&self, entry: &ChangedEntry, ms: u64) -> bool {
        ms > self.watermark || (ms == self.watermark && !self.seen.contains(&path_digest(&entry.path)))
    }
}

fn encode_cursor(position: &Position, source_key: &str) -> String {
    let seen: Vec<&str> = position.seen.iter().map(String::as_str).collect();
    format!("{}:{}:{}:{}", CURSOR_VERSION, position.watermark, seen.join(","), source_key)
}

fn decode_cursor(cursor: &str) -> Option<(Position, &str)> {
    let rest = cursor.strip_prefix(CURSOR_VERSION)?.strip_prefix(':')?;
    let (ms, rest) = rest.split_once(':')?;
    let (seen, key) = rest.split_once(':')?;
    if !seen.chars().all(|c| c == ',' || c.is_ascii_hexdigit()) {
        return None;
    }
    let seen = seen.split(',').filter(|d| !d.is_empty()).map(String::from).collect();
    Some((Position { watermark: ms.parse().ok()?, seen }, key))
}

#[async_trait]
impl ChangeSource for FsChangeSource {
    async fn list_initial(&self, source_key: &str) -> Result<ChangeBatch, ChangeSourceError> {
        let found = self.scan(source_key).await?;
        let position = Position::of(&found, None);
        tracing::debug!(source_key, files = found.len(), watermark = position.watermark, "initial listing");
        Ok(ChangeBatch {
            cursor: encode_cursor(&position, source_key),
            entries: found.into_iter().map(|(entry, _)| entry).collect(),
        })
    }

    async fn list_since(&self, cursor: &str) -> Result<ChangeBatch, ChangeSourceError> {
        let Some((since, source_key)) = decode_cursor(cursor) else {
            tracing::warn!(cursor, "unrecognized cursor");
            return Err(ChangeSourceError::CursorExpired);
        };
        let found = self.scan(source_key).await?;
        let position = Position::of(&found, Some(&since));
        let entries: Vec<_> =
            found.into_iter().filter(|(entry, ms)| since.is_new(entry, *ms)).map(|(entry, _)| entry).collect();
        tracing::debug!(
            source_key,
            changed = entries.len(),
            since = since.watermark,
            watermark = position.watermark,
            "listed changes"
        );
        Ok(ChangeBatch { cursor: encode_cursor(&position, source_key), entries })
    }
}

#[cfg(test)]
#[path = "fs_tests.rs"]
mod tests;
