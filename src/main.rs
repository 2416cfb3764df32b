use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use clipshelf::app::{self, RunOptions};
use clipshelf::commands;
use clipshelf::database::{default_db_path, SqliteStore};
use clipshelf::history::HistoryFilter;
use clipshelf::logging::init_logging;
use clipshelf::models::{ContentKind, Language};
use clipshelf::transfer::ImportPolicy;
use clipshelf::SystemClipboard;

const LIST_PREVIEW_CHARS: usize = 72;

/// Clipboard history with language detection and digit hotkeys
#[derive(Debug, Parser)]
#[command(name = "clipshelf", version, about)]
struct Cli {
    /// Database file (defaults to the platform data directory, or $CLIPSHELF_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Verbosity level for logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Watch the clipboard and listen for digit hotkeys
    Run {
        #[arg(long)]
        no_hotkeys: bool,
        #[arg(long)]
        no_monitor: bool,
    },
    /// List history entries, newest first
    List {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, short)]
        query: Option<String>,
        #[arg(long)]
        kind: Option<ContentKind>,
        #[arg(long)]
        language: Option<Language>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print one entry (1 = newest)
    Show {
        position: usize,
        #[arg(long)]
        plain: bool,
    },
    /// Copy an entry (1 = newest) back to the clipboard
    Copy { position: usize },
    /// Delete an entry by id
    Delete { id: Uuid },
    /// Remove every entry
    Clear,
    /// Write the history to a JSON file or directory
    Export { path: PathBuf },
    /// Read entries from a JSON export
    Import {
        path: PathBuf,
        /// Discard the current history instead of merging
        #[arg(long)]
        replace: bool,
    },
    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },
    /// Show or change the hotkey modifiers, e.g. `--set ⌃⌥` or `--set cmd+shift`
    Hotkeys {
        #[arg(long)]
        set: Option<String>,
    },
    /// Classify text read from stdin
    Detect,
}

#[derive(Debug, Subcommand)]
enum SettingsAction {
    Get,
    Set { key: String, value: String },
    Reset,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let db_path = cli.db.unwrap_or_else(default_db_path);
    let open_store = || {
        SqliteStore::open(&db_path)
            .with_context(|| format!("failed to open database at {}", db_path.display()))
    };

    match cli.command {
        Command::Run {
            no_hotkeys,
            no_monitor,
        } => {
            app::run(RunOptions {
                db_path: db_path.clone(),
                hotkeys: !no_hotkeys,
                monitor: !no_monitor,
            })?;
        }
        Command::List {
            limit,
            query,
            kind,
            language,
            json,
        } => {
            let store = open_store()?;
            let filter = HistoryFilter {
                query,
                kind,
                language,
            };
            let entries = commands::list_entries(&store, &filter, limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for (position, entry) in entries.iter().enumerate() {
                    println!(
                        "{:>3}  {:<5} {:<11} {}  {}",
                        position + 1,
                        entry.kind.as_str(),
                        entry.language.as_str(),
                        entry.created_at.with_timezone(&chrono::Local).format("%m-%d %H:%M"),
                        entry.preview(LIST_PREVIEW_CHARS)
                    );
                }
            }
        }
        Command::Show { position, plain } => {
            let store = open_store()?;
            let entry = commands::entry_at(&store, position)?;
            let settings = commands::get_settings(&store);
            println!("# {} · {} · {}", entry.id, entry.kind.display_name(), entry.language.display_name());
            println!("{}", commands::render_entry(&entry, &settings, plain));
        }
        Command::Copy { position } => {
            let store = open_store()?;
            let clipboard = SystemClipboard::new().context("clipboard unavailable")?;
            let entry = commands::copy_entry(clipboard, store, position)?;
            println!("copied {}", entry.preview(LIST_PREVIEW_CHARS));
        }
        Command::Delete { id } => {
            let store = open_store()?;
            commands::delete_entry(&store, id)?;
            println!("deleted {}", id);
        }
        Command::Clear => {
            let store = open_store()?;
            let cleared = commands::clear_history(&store)?;
            println!("cleared {} entries", cleared);
        }
        Command::Export { path } => {
            let store = open_store()?;
            let result = commands::export_history(&store, &path)?;
            println!("exported {} entries to {}", result.count, result.path);
        }
        Command::Import { path, replace } => {
            let store = open_store()?;
            let policy = if replace {
                ImportPolicy::Replace
            } else {
                ImportPolicy::Merge
            };
            let summary = commands::import_history(&store, &path, policy)?;
            println!("imported {} entries, history now holds {}", summary.imported, summary.total);
        }
        Command::Settings { action } => {
            let store = open_store()?;
            let settings = match action.unwrap_or(SettingsAction::Get) {
                SettingsAction::Get => commands::get_settings(&store),
                SettingsAction::Set { key, value } => commands::set_setting(&store, &key, &value)?,
                SettingsAction::Reset => commands::reset_settings(&store)?,
            };
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        Command::Hotkeys { set } => {
            let store = open_store()?;
            let modifiers = match set {
                Some(spec) => commands::set_modifiers(&store, &spec)?,
                None => commands::get_modifiers(&store),
            };
            if modifiers.is_empty() {
                println!("digit hotkeys are unbound");
            } else {
                println!("{}1 … {}9  ({})", modifiers, modifiers, modifiers.describe());
            }
        }
        Command::Detect => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read stdin")?;
            let store = open_store()?;
            let detection = commands::detect_text(&text, &commands::get_settings(&store));
            println!("{}", serde_json::to_string(&detection)?);
        }
    }

    Ok(())
}
