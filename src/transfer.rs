use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::error::{ClipError, ClipResult};
use crate::history::clamp_capacity;
use crate::models::ClipboardEntry;

/// How imported entries combine with the current history.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ImportPolicy {
    Replace,
    #[default]
    Merge,
}

#[derive(Debug, Serialize)]
pub struct ExportResult {
    pub count: usize,
    pub path: String,
}

fn resolve_export_path(path: &Path) -> PathBuf {
    let mut output = path.to_path_buf();
    if output.is_dir() {
        let filename = format!(
            "clipshelf-history-{}.json",
            chrono::Local::now().format("%Y%m%d-%H%M%S")
        );
        output.push(filename);
    } else if output.extension().is_none() {
        output.set_extension("json");
    }
    output
}

/// Writes the same JSON entry array the store keeps under `clipboard_history`.
pub fn export_to_path(entries: &[ClipboardEntry], path: &Path) -> ClipResult<ExportResult> {
    if path.as_os_str().is_empty() {
        return Err(ClipError::InvalidInput("path is empty".to_string()));
    }

    let output = resolve_export_path(path);
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_string_pretty(entries)?;
    std::fs::write(&output, json)?;
    info!(count = entries.len(), path = %output.display(), "history exported");
    Ok(ExportResult {
        count: entries.len(),
        path: output.to_string_lossy().to_string(),
    })
}

pub fn parse_entries(payload: &str) -> ClipResult<Vec<ClipboardEntry>> {
    let parsed: Vec<ClipboardEntry> = serde_json::from_str(payload)?;
    Ok(parsed
        .into_iter()
        .filter(|entry| !entry.content.trim().is_empty())
        .collect())
}

pub fn import_from_path(path: &Path) -> ClipResult<Vec<ClipboardEntry>> {
    if path.as_os_str().is_empty() {
        return Err(ClipError::InvalidInput("path is empty".to_string()));
    }
    let json = std::fs::read_to_string(path)?;
    parse_entries(&json)
}

/// Combines `existing` and `imported` into a newest-first sequence no longer
/// than `capacity`, whatever order the file listed its entries in.
///
/// Both policies keep one entry per id and drop adjacent duplicates left over
/// after sorting. `Merge` also keeps one entry per content (the newest copy
/// wins).
pub fn merge(
    existing: Vec<ClipboardEntry>,
    imported: Vec<ClipboardEntry>,
    policy: ImportPolicy,
    capacity: usize,
) -> Vec<ClipboardEntry> {
    let capacity = clamp_capacity(capacity);
    let mut combined = match policy {
        ImportPolicy::Replace => imported,
        ImportPolicy::Merge => {
            let mut all = existing;
            all.extend(imported);
            all
        }
    };
    // Stable sort keeps existing entries ahead of imported ones on ties.
    combined.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut seen_ids = HashSet::new();
    let mut seen_content = HashSet::new();
    combined.retain(|entry| {
        seen_ids.insert(entry.id)
            && (policy == ImportPolicy::Replace || seen_content.insert(entry.content.clone()))
    });
    combined.dedup_by(|later, earlier| later.content == earlier.content);
    combined.truncate(capacity);
    combined
}
