//! Clipboard history with content classification, syntax highlighting and
//! digit hotkeys that copy (and optionally paste) recent entries.

pub mod app;
pub mod clipboard;
pub mod commands;
pub mod database;
pub mod detect;
pub mod error;
pub mod highlight;
pub mod history;
pub mod hotkey;
pub mod logging;
pub mod models;
pub mod notify;
pub mod transfer;

pub use app::{App, AppEvent, Rebind, RunOptions};
pub use clipboard::{
    ChangeTracker, ClipboardBackend, ClipboardManager, MemoryClipboard, Monitor, SystemClipboard,
};
pub use database::{KeyValueStore, MemoryStore, SqliteStore};
pub use error::{ClipError, ClipResult};
pub use history::{History, HistoryEvent, HistoryFilter};
pub use hotkey::{Dispatch, HotkeyDispatcher, KeyEvent};
pub use models::{ClipboardEntry, ContentKind, HotkeyModifiers, Language, Settings, Theme};
