use std::sync::{Arc, Mutex};

use tracing::{info, trace};

pub trait Notifier {
    fn notify(&mut self, title: &str, body: &str);
}

/// Writes notifications to the log instead of the OS notification centre.
/// Bodies quote clipboard text, so they only appear at trace level.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, title: &str, body: &str) {
        info!(target: "clipshelf::notify", title, chars = body.chars().count(), "notification");
        trace!(target: "clipshelf::notify", body, "notification body");
    }
}

/// Collects notifications in memory. Clones share the same record, so a test
/// can hand one to the app and read from the other.
#[derive(Clone, Debug, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&mut self, title: &str, body: &str) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((title.to_string(), body.to_string()));
        }
    }
}
