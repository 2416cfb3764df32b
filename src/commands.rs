use std::path::Path;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::clipboard::{ClipboardBackend, ClipboardManager};
use crate::database::{
    load_history, load_modifiers, load_settings, save_history, save_modifiers, save_settings,
    KeyValueStore,
};
use crate::detect::{classify_kind, detect_language_if};
use crate::error::{ClipError, ClipResult};
use crate::highlight::render_ansi;
use crate::history::{History, HistoryFilter};
use crate::models::{ClipboardEntry, ContentKind, HotkeyModifiers, Language, Settings};
use crate::transfer::{export_to_path, import_from_path, merge, ExportResult, ImportPolicy};

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub total: usize,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Detection {
    pub kind: ContentKind,
    pub language: Language,
}

/// Positions are 1-based, matching the digit hotkeys.
fn slot_index(position: usize) -> ClipResult<usize> {
    position
        .checked_sub(1)
        .ok_or_else(|| ClipError::InvalidInput("positions start at 1".to_string()))
}

fn load_full_history(store: &impl KeyValueStore) -> History {
    let settings = load_settings(store);
    History::from_entries(load_history(store), settings.max_history_size)
}

pub fn list_entries(
    store: &impl KeyValueStore,
    filter: &HistoryFilter,
    limit: Option<usize>,
) -> ClipResult<Vec<ClipboardEntry>> {
    let history = load_full_history(store);
    Ok(history
        .filter(filter)
        .take(limit.unwrap_or(usize::MAX))
        .cloned()
        .collect())
}

pub fn entry_at(store: &impl KeyValueStore, position: usize) -> ClipResult<ClipboardEntry> {
    let index = slot_index(position)?;
    load_full_history(store)
        .get(index)
        .cloned()
        .ok_or_else(|| ClipError::NotFound(format!("no history entry at position {}", position)))
}

/// Entry body for the terminal, highlighted unless `plain` is set.
pub fn render_entry(entry: &ClipboardEntry, settings: &Settings, plain: bool) -> String {
    if plain {
        return entry.content.clone();
    }
    render_ansi(
        &entry.content,
        entry.language,
        settings.theme,
        settings.show_line_numbers,
    )
}

/// Writes the entry at `position` to the clipboard.
pub fn copy_entry<B, S>(backend: B, store: S, position: usize) -> ClipResult<ClipboardEntry>
where
    B: ClipboardBackend,
    S: KeyValueStore,
{
    let index = slot_index(position)?;
    let settings = load_settings(&store);
    let mut manager = ClipboardManager::load(backend, store, settings);
    manager.activate_index(index)
}

pub fn delete_entry(store: &impl KeyValueStore, id: Uuid) -> ClipResult<ClipboardEntry> {
    let mut history = load_full_history(store);
    let removed = history
        .remove(id)
        .ok_or_else(|| ClipError::NotFound(format!("entry {}", id)))?;
    save_history(store, &history.to_vec())?;
    info!(%id, "entry deleted");
    Ok(removed)
}

pub fn clear_history(store: &impl KeyValueStore) -> ClipResult<usize> {
    let cleared = load_history(store).len();
    save_history(store, &[])?;
    info!(cleared, "history cleared");
    Ok(cleared)
}

pub fn export_history(store: &impl KeyValueStore, path: &Path) -> ClipResult<ExportResult> {
    export_to_path(&load_full_history(store).to_vec(), path)
}

pub fn import_history(
    store: &impl KeyValueStore,
    path: &Path,
    policy: ImportPolicy,
) -> ClipResult<ImportSummary> {
    let imported = import_from_path(path)?;
    let count = imported.len();
    let settings = load_settings(store);
    let combined = merge(load_history(store), imported, policy, settings.max_history_size);
    save_history(store, &combined)?;
    info!(imported = count, total = combined.len(), ?policy, "history imported");
    Ok(ImportSummary {
        imported: count,
        total: combined.len(),
    })
}

pub fn get_settings(store: &impl KeyValueStore) -> Settings {
    load_settings(store)
}

/// Updates one field and returns the stored (sanitized) settings.
pub fn set_setting(store: &impl KeyValueStore, key: &str, value: &str) -> ClipResult<Settings> {
    let mut settings = load_settings(store);
    settings.set_field(key, value).map_err(ClipError::InvalidInput)?;
    let saved = save_settings(store, &settings)?;

    // A smaller capacity applies to the stored history right away.
    let stored = load_history(store);
    if stored.len() > saved.max_history_size {
        save_history(store, &stored[..saved.max_history_size])?;
    }
    Ok(saved)
}

pub fn reset_settings(store: &impl KeyValueStore) -> ClipResult<Settings> {
    save_settings(store, &Settings::default())
}

pub fn get_modifiers(store: &impl KeyValueStore) -> HotkeyModifiers {
    load_modifiers(store)
}

/// `none` unbinds the digit hotkeys.
pub fn set_modifiers(store: &impl KeyValueStore, spec: &str) -> ClipResult<HotkeyModifiers> {
    let modifiers = if spec.trim().eq_ignore_ascii_case("none") {
        HotkeyModifiers::NONE
    } else {
        spec.parse().map_err(ClipError::InvalidInput)?
    };
    save_modifiers(store, &modifiers)?;
    Ok(modifiers)
}

pub fn detect_text(text: &str, settings: &Settings) -> Detection {
    Detection {
        kind: classify_kind(text),
        language: detect_language_if(text, settings.enable_language_detection),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::MemoryClipboard;
    use crate::database::MemoryStore;
    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;

    fn seeded<T: AsRef<str>>(contents: &[T]) -> MemoryStore {
        let store = MemoryStore::new();
        let entries: Vec<_> = contents
            .iter()
            .map(|content| content.as_ref())
            .enumerate()
            .map(|(i, content)| {
                ClipboardEntry::with_timestamp(
                    content.to_string(),
                    classify_kind(content),
                    Language::Plain,
                    Utc::now() - Duration::minutes(i as i64),
                )
            })
            .collect();
        save_history(&store, &entries).unwrap();
        store
    }

    #[test]
    fn list_applies_filter_and_limit() {
        let store = seeded(&["https://a.example", "hello", "https://b.example"]);
        let filter = HistoryFilter {
            kind: Some(ContentKind::Url),
            ..HistoryFilter::default()
        };
        let urls = list_entries(&store, &filter, Some(1)).unwrap();
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].content, "https://a.example");
    }

    #[test]
    fn positions_are_one_based() {
        let store = seeded(&["newest", "older"]);
        assert_eq!(entry_at(&store, 2).unwrap().content, "older");
        assert!(matches!(entry_at(&store, 0), Err(ClipError::InvalidInput(_))));
        assert!(matches!(entry_at(&store, 3), Err(ClipError::NotFound(_))));
    }

    #[test]
    fn copy_writes_entry_to_clipboard() {
        let store = seeded(&["newest", "older"]);
        let clipboard = MemoryClipboard::new();
        let copied = copy_entry(clipboard.clone(), &store, 2).unwrap();
        assert_eq!(copied.content, "older");
        assert_eq!(clipboard.contents().as_deref(), Some("older"));
        assert_eq!(load_history(&store).len(), 2);
    }

    #[test]
    fn delete_and_clear_persist() {
        let store = seeded(&["a", "b", "c"]);
        let id = entry_at(&store, 2).unwrap().id;
        assert_eq!(delete_entry(&store, id).unwrap().content, "b");
        assert!(matches!(delete_entry(&store, id), Err(ClipError::NotFound(_))));
        assert_eq!(clear_history(&store).unwrap(), 2);
        assert!(load_history(&store).is_empty());
    }

    #[test]
    fn setting_changes_are_validated_and_applied() {
        let contents: Vec<String> = (0..20).map(|i| format!("e{i}")).collect();
        let store = seeded(&contents);
        let saved = set_setting(&store, "max_history_size", "12").unwrap();
        assert_eq!(saved.max_history_size, 12);
        assert_eq!(load_history(&store).len(), 12);

        assert!(matches!(set_setting(&store, "font_size", "big"), Err(ClipError::InvalidInput(_))));
        assert!(matches!(set_setting(&store, "nope", "1"), Err(ClipError::InvalidInput(_))));
        assert_eq!(reset_settings(&store).unwrap(), Settings::default());
    }

    #[test]
    fn modifiers_can_be_set_and_unbound() {
        let store = MemoryStore::new();
        assert_eq!(get_modifiers(&store), HotkeyModifiers::recommended());
        let set = set_modifiers(&store, "cmd+shift").unwrap();
        assert!(set.command && set.shift);
        assert_eq!(set_modifiers(&store, "none").unwrap(), HotkeyModifiers::NONE);
        assert!(set_modifiers(&store, "hyper").is_err());
    }

    #[test]
    fn detect_reports_kind_and_language() {
        let detection = detect_text("def f():\n    pass", &Settings::default());
        assert_eq!(detection.language, Language::Python);

        let off = Settings {
            enable_language_detection: false,
            ..Settings::default()
        };
        assert_eq!(detect_text("def f():\n    pass", &off).language, Language::Plain);
    }
}
