//! Local filesystem blob store for uploaded coursebooks.
//!
//! Files are stored under `[storage] root` at a storage path of the form
//! `public/<unix-millis>-<file name>`. Storage paths are always relative and
//! are checked on every access so they cannot escape the root.

use anyhow::{bail, Context, Result};
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;

const PREFIX: &str = "public";
const DEFAULT_FILE_NAME: &str = "untitled.pdf";

#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write bytes under a fresh storage path and return that path.
    ///
    /// The file is created exclusively, so concurrent uploads of the same
    /// name never share a path.
    pub async fn put(&self, file_name: &str, bytes: &[u8]) -> Result<String> {
        let millis = chrono::Utc::now().timestamp_millis();
        let dir = self.root.join(PREFIX);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let mut attempt = 0;
        loop {
            let storage_path = if attempt == 0 {
                format!("{}/{}-{}", PREFIX, millis, file_name)
            } else {
                format!("{}/{}-{}-{}", PREFIX, millis, attempt, file_name)
            };
            let full = self.resolve(&storage_path)?;
            let opened = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&full)
                .await;
            let mut file = match opened {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    attempt += 1;
                    continue;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to create {}", full.display()))
                }
            };

            let written = async {
                file.write_all(bytes).await?;
                file.flush().await
            }
            .await;
            if let Err(e) = written {
                drop(file);
                tokio::fs::remove_file(&full).await.ok();
                return Err(e).with_context(|| format!("Failed to write {}", full.display()));
            }
            return Ok(storage_path);
        }
    }

    pub async fn get(&self, storage_path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(storage_path)?;
        tokio::fs::read(&full)
            .await
            .with_context(|| format!("Failed to read stored file {}", storage_path))
    }

    /// Remove a stored file. Missing files are not an error.
    pub async fn delete(&self, storage_path: &str) -> Result<()> {
        let full = self.resolve(storage_path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", storage_path)),
        }
    }

    fn resolve(&self, storage_path: &str) -> Result<PathBuf> {
        let rel = Path::new(storage_path);
        if !rel
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            bail!("invalid storage path: {}", storage_path);
        }
        Ok(self.root.join(rel))
    }
}

/// Turn a client-supplied (possibly percent-encoded) file name into a safe
/// single path segment.
pub fn sanitize_file_name(raw: &str) -> String {
    let decoded = percent_decode(raw);
    let base = decoded
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .trim_start_matches('.')
        .to_string();
    if cleaned.is_empty() {
        DEFAULT_FILE_NAME.to_string()
    } else {
        cleaned
    }
}

fn percent_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
