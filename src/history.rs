use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};

use uuid::Uuid;

use crate::models::{
    ClipboardEntry, ContentKind, Language, DEFAULT_MAX_HISTORY, MAX_MAX_HISTORY, MIN_MAX_HISTORY,
};

/// Notification sent to every subscriber after the history changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HistoryEvent {
    Added(Uuid),
    Removed(Uuid),
    Cleared,
    Replaced(usize),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Admission {
    Added { evicted: usize },
    Duplicate,
    Blank,
}

impl Admission {
    pub fn is_added(&self) -> bool {
        matches!(self, Admission::Added { .. })
    }
}

#[derive(Clone, Debug, Default)]
pub struct HistoryFilter {
    pub query: Option<String>,
    pub kind: Option<ContentKind>,
    pub language: Option<Language>,
}

impl HistoryFilter {
    pub fn matches(&self, entry: &ClipboardEntry) -> bool {
        if self.kind.is_some_and(|kind| kind != entry.kind) {
            return false;
        }
        if self.language.is_some_and(|language| language != entry.language) {
            return false;
        }
        match self.query.as_deref().map(str::trim) {
            Some(query) if !query.is_empty() => entry
                .content
                .to_lowercase()
                .contains(&query.to_lowercase()),
            _ => true,
        }
    }
}

pub fn clamp_capacity(capacity: usize) -> usize {
    capacity.clamp(MIN_MAX_HISTORY, MAX_MAX_HISTORY)
}

/// Bounded, newest-first list of clipboard entries.
#[derive(Debug)]
pub struct History {
    entries: VecDeque<ClipboardEntry>,
    capacity: usize,
    subscribers: Vec<Sender<HistoryEvent>>,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: clamp_capacity(capacity),
            subscribers: Vec::new(),
        }
    }

    /// Restores a persisted sequence. Entries are expected newest first.
    pub fn from_entries(entries: Vec<ClipboardEntry>, capacity: usize) -> Self {
        let mut history = Self::new(capacity);
        history.entries = entries.into();
        history.entries.truncate(history.capacity);
        history
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn newest(&self) -> Option<&ClipboardEntry> {
        self.entries.front()
    }

    pub fn get(&self, index: usize) -> Option<&ClipboardEntry> {
        self.entries.get(index)
    }

    pub fn find(&self, id: Uuid) -> Option<&ClipboardEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClipboardEntry> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<ClipboardEntry> {
        self.entries.iter().cloned().collect()
    }

    /// True when `content` would be dropped as a repeat of the newest entry.
    pub fn is_duplicate_of_newest(&self, content: &str) -> bool {
        self.newest().is_some_and(|newest| newest.content == content)
    }

    pub fn admit(&mut self, entry: ClipboardEntry) -> Admission {
        if entry.content.trim().is_empty() {
            return Admission::Blank;
        }
        if self.is_duplicate_of_newest(&entry.content) {
            return Admission::Duplicate;
        }

        let id = entry.id;
        self.entries.push_front(entry);
        let evicted = self.entries.len().saturating_sub(self.capacity);
        self.entries.truncate(self.capacity);
        self.emit(HistoryEvent::Added(id));
        Admission::Added { evicted }
    }

    pub fn remove(&mut self, id: Uuid) -> Option<ClipboardEntry> {
        let position = self.entries.iter().position(|entry| entry.id == id)?;
        let removed = self.entries.remove(position);
        if removed.is_some() {
            self.emit(HistoryEvent::Removed(id));
        }
        removed
    }

    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.emit(HistoryEvent::Cleared);
        count
    }

    /// Returns how many entries were dropped by the new bound.
    pub fn set_capacity(&mut self, capacity: usize) -> usize {
        self.capacity = clamp_capacity(capacity);
        let dropped = self.entries.len().saturating_sub(self.capacity);
        if dropped > 0 {
            self.entries.truncate(self.capacity);
            self.emit(HistoryEvent::Replaced(self.entries.len()));
        }
        dropped
    }

    pub fn replace(&mut self, entries: Vec<ClipboardEntry>) {
        self.entries = entries.into();
        self.entries.truncate(self.capacity);
        self.emit(HistoryEvent::Replaced(self.entries.len()));
    }

    pub fn filter<'a>(&'a self, filter: &'a HistoryFilter) -> impl Iterator<Item = &'a ClipboardEntry> {
        self.entries.iter().filter(move |entry| filter.matches(entry))
    }

    pub fn subscribe(&mut self) -> Receiver<HistoryEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, event: HistoryEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}
