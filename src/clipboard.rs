use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use arboard::Clipboard;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::database::{
    load_history, load_settings, save_history, save_settings, sanitize_settings, KeyValueStore,
};
use crate::detect::{classify_kind, detect_language_if};
use crate::error::{ClipError, ClipResult};
use crate::history::{Admission, History, HistoryEvent};
use crate::models::{ClipboardEntry, Settings};

pub const POLL_INTERVAL: Duration = Duration::from_millis(500);
const LOG_PREVIEW_CHARS: usize = 48;

/// The OS clipboard as seen by the manager.
///
/// `change_count` is an opaque marker: it only has to differ after the
/// clipboard content changes, so the manager can skip reading unchanged state.
pub trait ClipboardBackend {
    fn change_count(&mut self) -> u64;
    fn read_text(&mut self) -> Option<String>;
    fn write_text(&mut self, text: &str) -> ClipResult<()>;
}

/// Change counter derived from content signatures, for clipboards that do
/// not expose one.
#[derive(Clone, Debug, Default)]
pub struct ChangeTracker {
    last_signature: Option<String>,
    counter: u64,
}

impl ChangeTracker {
    /// Starts with `text` already seen.
    pub fn seeded(text: Option<&str>) -> Self {
        Self {
            last_signature: text.map(signature),
            counter: 0,
        }
    }

    /// Bumps the counter when the observed content differs from the last one.
    pub fn observe(&mut self, text: Option<&str>) -> u64 {
        let current = text.map(signature);
        if current != self.last_signature {
            self.last_signature = current;
            self.counter = self.counter.wrapping_add(1);
        }
        self.counter
    }
}

fn signature(text: &str) -> String {
    format!("text:{}", text)
}

/// arboard-backed clipboard.
pub struct SystemClipboard {
    clipboard: Clipboard,
    tracker: ChangeTracker,
}

impl SystemClipboard {
    pub fn new() -> ClipResult<Self> {
        let mut clipboard = Clipboard::new()?;
        let tracker = ChangeTracker::seeded(clipboard.get_text().ok().as_deref());
        Ok(Self { clipboard, tracker })
    }
}

impl ClipboardBackend for SystemClipboard {
    fn change_count(&mut self) -> u64 {
        let current = self.clipboard.get_text().ok();
        self.tracker.observe(current.as_deref())
    }

    fn read_text(&mut self) -> Option<String> {
        self.clipboard.get_text().ok()
    }

    fn write_text(&mut self, text: &str) -> ClipResult<()> {
        self.clipboard.set_text(text.to_string())?;
        self.tracker.observe(Some(text));
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryClipboardState {
    text: Option<String>,
    counter: u64,
}

/// In-process clipboard. Clones share state, so a test can keep one handle
/// to play the part of another application copying text.
#[derive(Clone, Debug, Default)]
pub struct MemoryClipboard {
    state: Arc<Mutex<MemoryClipboardState>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates another application writing to the clipboard.
    pub fn copy(&self, text: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.text = Some(text.to_string());
            state.counter += 1;
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.state.lock().ok().and_then(|state| state.text.clone())
    }
}

impl ClipboardBackend for MemoryClipboard {
    fn change_count(&mut self) -> u64 {
        self.state.lock().map(|state| state.counter).unwrap_or_default()
    }

    fn read_text(&mut self) -> Option<String> {
        self.contents()
    }

    fn write_text(&mut self, text: &str) -> ClipResult<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ClipError::Clipboard("memory clipboard lock poisoned".to_string()))?;
        state.text = Some(text.to_string());
        state.counter += 1;
        Ok(())
    }
}

/// Owns the history and keeps it in sync with the clipboard and the store.
pub struct ClipboardManager<B, S> {
    backend: B,
    store: S,
    history: History,
    settings: Settings,
    last_change: u64,
    store_revision: u64,
}

impl<B: ClipboardBackend, S: KeyValueStore> ClipboardManager<B, S> {
    /// Restores persisted history. The payload already on the clipboard at
    /// startup is treated as seen and is not captured.
    pub fn load(mut backend: B, store: S, settings: Settings) -> Self {
        let settings = sanitize_settings(&settings);
        let store_revision = store.revision().unwrap_or_default();
        let entries = load_history(&store);
        let history = History::from_entries(entries, settings.max_history_size);
        let last_change = backend.change_count();
        debug!(entries = history.len(), capacity = history.capacity(), "history loaded");
        Self {
            backend,
            store,
            history,
            settings,
            last_change,
            store_revision,
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn subscribe(&mut self) -> std::sync::mpsc::Receiver<HistoryEvent> {
        self.history.subscribe()
    }

    /// One observation cycle. Returns the id of a newly captured entry.
    pub fn poll(&mut self) -> Option<Uuid> {
        let change = self.backend.change_count();
        if change == self.last_change {
            return None;
        }
        self.last_change = change;

        let text = self.backend.read_text()?;
        self.capture(text)
    }

    /// Classifies `text` and admits it at the head of the history.
    pub fn capture(&mut self, text: String) -> Option<Uuid> {
        if text.trim().is_empty() || self.history.is_duplicate_of_newest(&text) {
            return None;
        }

        let kind = classify_kind(&text);
        let language = detect_language_if(&text, self.settings.enable_language_detection);
        let entry = ClipboardEntry::new(text, kind, language);
        let id = entry.id;
        trace!(
            len = entry.content.len(),
            preview = %entry.preview(LOG_PREVIEW_CHARS),
            "clipboard payload"
        );

        match self.history.admit(entry) {
            Admission::Added { evicted } => {
                info!(%id, %kind, %language, evicted, "captured clipboard entry");
                self.persist();
                Some(id)
            }
            Admission::Duplicate | Admission::Blank => None,
        }
    }

    pub fn retrieve(&self, index: usize) -> ClipResult<&ClipboardEntry> {
        self.history
            .get(index)
            .ok_or_else(|| ClipError::NotFound(format!("no history entry at index {}", index)))
    }

    /// Writes the entry back to the clipboard without re-capturing it.
    pub fn activate(&mut self, id: Uuid) -> ClipResult<()> {
        let content = self
            .history
            .find(id)
            .map(|entry| entry.content.clone())
            .ok_or_else(|| ClipError::NotFound(format!("entry {}", id)))?;

        self.backend.write_text(&content)?;
        self.last_change = self.backend.change_count();
        debug!(%id, "entry copied back to clipboard");
        Ok(())
    }

    pub fn activate_index(&mut self, index: usize) -> ClipResult<ClipboardEntry> {
        let entry = self.retrieve(index)?.clone();
        self.activate(entry.id)?;
        Ok(entry)
    }

    pub fn delete(&mut self, id: Uuid) -> ClipResult<ClipboardEntry> {
        let removed = self
            .history
            .remove(id)
            .ok_or_else(|| ClipError::NotFound(format!("entry {}", id)))?;
        self.persist();
        Ok(removed)
    }

    pub fn clear_all(&mut self) -> usize {
        let cleared = self.history.clear();
        self.persist();
        info!(cleared, "history cleared");
        cleared
    }

    /// Applies and stores `settings`, truncating the history to the new capacity.
    pub fn apply_settings(&mut self, settings: Settings) {
        self.settings = sanitize_settings(&settings);
        let dropped = self.history.set_capacity(self.settings.max_history_size);
        if dropped > 0 {
            debug!(dropped, "history truncated to new capacity");
        }
        if let Err(err) = save_settings(&self.store, &self.settings) {
            warn!(error = %err, "failed to persist settings");
        }
        self.persist();
    }

    /// Reloads settings and history when another handle wrote to the store
    /// since this manager last read or wrote it. Returns `true` on reload.
    pub fn refresh_from_store(&mut self) -> bool {
        let revision = match self.store.revision() {
            Ok(revision) => revision,
            Err(err) => {
                warn!(error = %err, "failed to read store revision");
                return false;
            }
        };
        if revision == self.store_revision {
            return false;
        }

        self.settings = load_settings(&self.store);
        self.history.set_capacity(self.settings.max_history_size);
        self.history.replace(load_history(&self.store));
        self.store_revision = revision;
        info!(revision, entries = self.history.len(), "reloaded external store changes");
        true
    }

    /// Records the current store revision as already seen, after this
    /// process wrote something it does not need to reload.
    pub fn mark_synced(&mut self) {
        match self.store.revision() {
            Ok(revision) => self.store_revision = revision,
            Err(err) => warn!(error = %err, "failed to read store revision"),
        }
    }

    /// Write failures leave the in-memory history authoritative.
    fn persist(&mut self) {
        if let Err(err) = save_history(&self.store, &self.history.to_vec()) {
            warn!(error = %err, "failed to persist clipboard history");
            return;
        }
        self.mark_synced();
    }
}

/// Fixed-interval ticker driving `ClipboardManager::poll` from another thread.
#[derive(Clone, Debug, Default)]
pub struct Monitor {
    running: Arc<AtomicBool>,
    session: Arc<AtomicU64>,
}

impl Monitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawns the ticker. `tick` returning `false` ends the session. Calling
    /// `start` while running is a no-op.
    pub fn start<F>(&self, interval: Duration, mut tick: F) -> bool
    where
        F: FnMut() -> bool + Send + 'static,
    {
        if self.running.swap(true, Ordering::SeqCst) {
            return false;
        }
        let session_id = self.session.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        let running = Arc::clone(&self.running);
        let session = Arc::clone(&self.session);
        let owns_session = move || session.load(Ordering::SeqCst) == session_id;

        thread::spawn(move || {
            while running.load(Ordering::SeqCst) && owns_session() {
                thread::sleep(interval);
                if !running.load(Ordering::SeqCst) || !owns_session() {
                    break;
                }
                if !tick() {
                    // A later `start` owns the flag once the session moved on.
                    if owns_session() {
                        running.store(false, Ordering::SeqCst);
                    }
                    break;
                }
            }
            debug!(session_id, "clipboard monitor stopped");
        });
        info!(session_id, interval_ms = interval.as_millis() as u64, "clipboard monitor started");
        true
    }

    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.session.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{MemoryStore, HISTORY_KEY};
    use crate::models::{ContentKind, Language};
    use pretty_assertions::assert_eq;
    use std::sync::mpsc;

    fn manager(clipboard: &MemoryClipboard) -> ClipboardManager<MemoryClipboard, MemoryStore> {
        ClipboardManager::load(clipboard.clone(), MemoryStore::new(), Settings::default())
    }

    #[test]
    fn poll_captures_external_copies() {
        let clipboard = MemoryClipboard::new();
        let mut manager = manager(&clipboard);
        assert_eq!(manager.poll(), None);

        clipboard.copy("fn main() {\n println!(\"hi\");\n}");
        let id = manager.poll().expect("captured");
        let entry = manager.retrieve(0).unwrap();
        assert_eq!(entry.id, id);
        assert_eq!(entry.kind, ContentKind::Code);
        assert_eq!(entry.language, Language::Rust);
    }

    #[test]
    fn startup_payload_is_not_captured() {
        let clipboard = MemoryClipboard::new();
        clipboard.copy("already there");
        let mut manager = manager(&clipboard);
        assert_eq!(manager.poll(), None);
        assert!(manager.history().is_empty());
    }

    #[test]
    fn poll_ignores_blank_and_repeated_payloads() {
        let clipboard = MemoryClipboard::new();
        let mut manager = manager(&clipboard);

        clipboard.copy("   ");
        assert_eq!(manager.poll(), None);
        clipboard.copy("hello");
        assert!(manager.poll().is_some());
        clipboard.copy("hello");
        assert_eq!(manager.poll(), None);
        assert_eq!(manager.history().len(), 1);
    }

    #[test]
    fn activate_does_not_feed_back() {
        let clipboard = MemoryClipboard::new();
        let mut manager = manager(&clipboard);
        clipboard.copy("first");
        manager.poll();
        clipboard.copy("second");
        manager.poll();

        let older = manager.retrieve(1).unwrap().id;
        manager.activate(older).unwrap();
        assert_eq!(clipboard.contents().as_deref(), Some("first"));
        assert_eq!(manager.poll(), None);
        assert_eq!(manager.history().len(), 2);
        assert_eq!(manager.retrieve(0).unwrap().content, "second");
    }

    #[test]
    fn retrieve_out_of_range_is_not_found() {
        let clipboard = MemoryClipboard::new();
        let mut manager = manager(&clipboard);
        assert!(matches!(manager.retrieve(3), Err(ClipError::NotFound(_))));
        assert!(matches!(manager.activate_index(0), Err(ClipError::NotFound(_))));
    }

    #[test]
    fn mutations_are_persisted() {
        let clipboard = MemoryClipboard::new();
        let mut manager = manager(&clipboard);
        clipboard.copy("keep");
        manager.poll();
        clipboard.copy("drop");
        let dropped = manager.poll().unwrap();
        manager.delete(dropped).unwrap();

        let raw = manager.store().get(HISTORY_KEY).unwrap().unwrap();
        let stored: Vec<ClipboardEntry> = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].content, "keep");

        manager.clear_all();
        let raw = manager.store().get(HISTORY_KEY).unwrap().unwrap();
        assert_eq!(raw, "[]");
    }

    #[test]
    fn language_detection_can_be_disabled() {
        let clipboard = MemoryClipboard::new();
        let settings = Settings {
            enable_language_detection: false,
            ..Settings::default()
        };
        let mut manager = ClipboardManager::load(clipboard.clone(), MemoryStore::new(), settings);
        clipboard.copy("def f():\n    pass");
        manager.poll();
        assert_eq!(manager.retrieve(0).unwrap().language, Language::Plain);
        assert_eq!(manager.retrieve(0).unwrap().kind, ContentKind::Code);
    }

    #[test]
    fn apply_settings_shrinks_history() {
        let clipboard = MemoryClipboard::new();
        let mut manager = manager(&clipboard);
        for i in 0..40 {
            manager.capture(format!("entry {i}"));
        }
        manager.apply_settings(Settings {
            max_history_size: 10,
            ..Settings::default()
        });
        assert_eq!(manager.history().len(), 10);
        assert_eq!(manager.retrieve(0).unwrap().content, "entry 39");
        assert_eq!(load_settings(manager.store()).max_history_size, 10);
        assert!(!manager.refresh_from_store());
    }

    #[test]
    fn change_tracker_counts_content_changes_only() {
        let mut tracker = ChangeTracker::seeded(Some("startup"));
        assert_eq!(tracker.observe(Some("startup")), 0);
        assert_eq!(tracker.observe(Some("next")), 1);
        assert_eq!(tracker.observe(Some("next")), 1);
        assert_eq!(tracker.observe(None), 2);
        assert_eq!(tracker.observe(None), 2);
        assert_eq!(tracker.observe(Some("next")), 3);
    }

    #[test]
    fn refresh_picks_up_writes_from_another_handle() {
        let clipboard = MemoryClipboard::new();
        let store = MemoryStore::new();
        let mut manager = ClipboardManager::load(clipboard.clone(), store.clone(), Settings::default());
        clipboard.copy("secret");
        manager.poll();
        assert!(!manager.refresh_from_store());

        save_history(&store, &[]).unwrap();
        save_settings(
            &store,
            &Settings {
                max_history_size: 10,
                ..Settings::default()
            },
        )
        .unwrap();
        assert!(manager.refresh_from_store());
        assert!(manager.history().is_empty());
        assert_eq!(manager.history().capacity(), 10);
        assert_eq!(manager.settings().max_history_size, 10);

        clipboard.copy("after");
        manager.poll();
        assert_eq!(load_history(&store).len(), 1);
        assert!(!manager.refresh_from_store());
    }

    #[test]
    fn monitor_ticks_until_stopped() {
        let monitor = Monitor::new();
        let (tx, rx) = mpsc::channel();
        assert!(monitor.start(Duration::from_millis(5), move || tx.send(()).is_ok()));
        assert!(!monitor.start(Duration::from_millis(5), || true));
        rx.recv_timeout(Duration::from_secs(2)).expect("tick");
        monitor.stop();
        assert!(!monitor.is_running());
    }

    #[test]
    fn monitor_can_restart_after_tick_ends_the_session() {
        let monitor = Monitor::new();
        assert!(monitor.start(Duration::from_millis(1), || false));
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while monitor.is_running() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!monitor.is_running());

        let (tx, rx) = mpsc::channel();
        assert!(monitor.start(Duration::from_millis(1), move || tx.send(()).is_ok()));
        rx.recv_timeout(Duration::from_secs(2)).expect("tick after restart");
        monitor.stop();
    }
}
