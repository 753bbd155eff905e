//! Append-only JSON-lines files (snapshot history, audit trail, traces).

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Append one record as a single line, creating the file and its parent
/// directory as needed.
pub async fn append<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut line = serde_json::to_vec(record).context("Failed to serialize record")?;
    line.push(b'\n');

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    file.write_all(&line)
        .await
        .with_context(|| format!("Failed to append to {}", path.display()))?;
    file.flush().await?;
    Ok(())
}

/// Read every parseable record. Unparseable lines are skipped with a warning;
/// a missing file reads as empty.
pub async fn read_all<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };

    let mut records = Vec::new();
    for (n, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(r) => records.push(r),
            Err(e) => tracing::warn!("Skipping bad line {} in {}: {}", n + 1, path.display(), e),
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        n: u32,
    }

    #[tokio::test]
    async fn test_append_and_read_skips_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a").join("log.jsonl");
        append(&path, &Row { n: 1 }).await.unwrap();
        tokio::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .await
            .unwrap()
            .write_all(b"{truncated\n")
            .await
            .unwrap();
        append(&path, &Row { n: 2 }).await.unwrap();

        let rows: Vec<Row> = read_all(&path).await.unwrap();
        assert_eq!(rows, vec![Row { n: 1 }, Row { n: 2 }]);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let rows: Vec<Row> = read_all(&dir.path().join("none.jsonl")).await.unwrap();
        assert!(rows.is_empty());
    }
}
