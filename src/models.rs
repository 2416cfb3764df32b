use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_MAX_HISTORY: usize = 50;
pub const MIN_MAX_HISTORY: usize = 10;
pub const MAX_MAX_HISTORY: usize = 500;
pub const DEFAULT_FONT_SIZE: u32 = 13;
pub const MIN_FONT_SIZE: u32 = 9;
pub const MAX_FONT_SIZE: u32 = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Code,
    Url,
    Email,
}

impl ContentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Code => "code",
            ContentKind::Url => "url",
            ContentKind::Email => "email",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ContentKind::Text => "Text",
            ContentKind::Code => "Code",
            ContentKind::Url => "URL",
            ContentKind::Email => "Email",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "plain" => Ok(ContentKind::Text),
            "code" => Ok(ContentKind::Code),
            "url" | "link" => Ok(ContentKind::Url),
            "email" | "mail" => Ok(ContentKind::Email),
            other => Err(format!("unknown content kind '{}'", other)),
        }
    }
}

/// Detected programming or markup language of an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Swift,
    Python,
    JavaScript,
    TypeScript,
    Java,
    Kotlin,
    C,
    Cpp,
    CSharp,
    Go,
    Rust,
    Ruby,
    Php,
    Html,
    Css,
    Scss,
    Sql,
    Shell,
    Json,
    Yaml,
    Xml,
    Markdown,
    Dockerfile,
    ObjectiveC,
    Perl,
    Lua,
    R,
    Dart,
    Plain,
}

impl Language {
    pub const ALL: [Language; 29] = [
        Language::Swift,
        Language::Python,
        Language::JavaScript,
        Language::TypeScript,
        Language::Java,
        Language::Kotlin,
        Language::C,
        Language::Cpp,
        Language::CSharp,
        Language::Go,
        Language::Rust,
        Language::Ruby,
        Language::Php,
        Language::Html,
        Language::Css,
        Language::Scss,
        Language::Sql,
        Language::Shell,
        Language::Json,
        Language::Yaml,
        Language::Xml,
        Language::Markdown,
        Language::Dockerfile,
        Language::ObjectiveC,
        Language::Perl,
        Language::Lua,
        Language::R,
        Language::Dart,
        Language::Plain,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Language::Swift => "swift",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Java => "java",
            Language::Kotlin => "kotlin",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Ruby => "ruby",
            Language::Php => "php",
            Language::Html => "html",
            Language::Css => "css",
            Language::Scss => "scss",
            Language::Sql => "sql",
            Language::Shell => "shell",
            Language::Json => "json",
            Language::Yaml => "yaml",
            Language::Xml => "xml",
            Language::Markdown => "markdown",
            Language::Dockerfile => "dockerfile",
            Language::ObjectiveC => "objectivec",
            Language::Perl => "perl",
            Language::Lua => "lua",
            Language::R => "r",
            Language::Dart => "dart",
            Language::Plain => "plain",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Language::Swift => "Swift",
            Language::Python => "Python",
            Language::JavaScript => "JavaScript",
            Language::TypeScript => "TypeScript",
            Language::Java => "Java",
            Language::Kotlin => "Kotlin",
            Language::C => "C",
            Language::Cpp => "C++",
            Language::CSharp => "C#",
            Language::Go => "Go",
            Language::Rust => "Rust",
            Language::Ruby => "Ruby",
            Language::Php => "PHP",
            Language::Html => "HTML",
            Language::Css => "CSS",
            Language::Scss => "SCSS",
            Language::Sql => "SQL",
            Language::Shell => "Shell",
            Language::Json => "JSON",
            Language::Yaml => "YAML",
            Language::Xml => "XML",
            Language::Markdown => "Markdown",
            Language::Dockerfile => "Dockerfile",
            Language::ObjectiveC => "Objective-C",
            Language::Perl => "Perl",
            Language::Lua => "Lua",
            Language::R => "R",
            Language::Dart => "Dart",
            Language::Plain => "Plain Text",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let alias = match lowered.as_str() {
            "js" | "node" => Some(Language::JavaScript),
            "ts" => Some(Language::TypeScript),
            "c++" | "cxx" => Some(Language::Cpp),
            "c#" | "cs" => Some(Language::CSharp),
            "sh" | "bash" | "zsh" => Some(Language::Shell),
            "yml" => Some(Language::Yaml),
            "objc" | "objective-c" => Some(Language::ObjectiveC),
            "md" => Some(Language::Markdown),
            "py" => Some(Language::Python),
            "rb" => Some(Language::Ruby),
            "rs" => Some(Language::Rust),
            "text" | "txt" => Some(Language::Plain),
            _ => None,
        };
        if let Some(language) = alias {
            return Ok(language);
        }
        Language::ALL
            .iter()
            .copied()
            .find(|language| language.as_str() == lowered)
            .ok_or_else(|| format!("unknown language '{}'", s.trim()))
    }
}

/// One captured clipboard snapshot. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardEntry {
    pub id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub kind: ContentKind,
    pub language: Language,
}

impl ClipboardEntry {
    pub fn new(content: String, kind: ContentKind, language: Language) -> Self {
        Self::with_timestamp(content, kind, language, Utc::now())
    }

    pub fn with_timestamp(
        content: String,
        kind: ContentKind,
        language: Language,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            content,
            created_at,
            kind,
            language,
        }
    }

    /// First line of the content, cut to `max_chars` characters.
    pub fn preview(&self, max_chars: usize) -> String {
        let first_line = self.content.trim().lines().next().unwrap_or_default();
        let mut preview: String = first_line.chars().take(max_chars).collect();
        let truncated = first_line.chars().count() > max_chars || self.content.trim().lines().nth(1).is_some();
        if truncated {
            preview.push('…');
        }
        preview
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    System,
    Light,
    Dark,
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" | "auto" => Ok(Theme::System),
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme '{}'", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub max_history_size: usize,
    pub enable_language_detection: bool,
    pub notify_on_capture: bool,
    pub notify_on_hotkey: bool,
    pub hotkeys_enabled: bool,
    pub auto_paste: bool,
    pub monitor_on_launch: bool,
    pub theme: Theme,
    pub font_size: u32,
    pub show_line_numbers: bool,
    pub onboarding_completed: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_history_size: DEFAULT_MAX_HISTORY,
            enable_language_detection: true,
            notify_on_capture: false,
            notify_on_hotkey: true,
            hotkeys_enabled: true,
            auto_paste: true,
            monitor_on_launch: true,
            theme: Theme::System,
            font_size: DEFAULT_FONT_SIZE,
            show_line_numbers: true,
            onboarding_completed: false,
        }
    }
}

impl Settings {
    /// Sets a single field from its textual key, as used by `settings set`.
    pub fn set_field(&mut self, key: &str, value: &str) -> Result<(), String> {
        fn parse_bool(value: &str) -> Result<bool, String> {
            match value.trim().to_ascii_lowercase().as_str() {
                "true" | "on" | "yes" | "1" => Ok(true),
                "false" | "off" | "no" | "0" => Ok(false),
                other => Err(format!("expected a boolean, got '{}'", other)),
            }
        }
        fn parse_number<T: FromStr>(value: &str) -> Result<T, String> {
            value
                .trim()
                .parse()
                .map_err(|_| format!("expected a number, got '{}'", value.trim()))
        }

        match key.trim() {
            "max_history_size" => self.max_history_size = parse_number(value)?,
            "enable_language_detection" => self.enable_language_detection = parse_bool(value)?,
            "notify_on_capture" => self.notify_on_capture = parse_bool(value)?,
            "notify_on_hotkey" => self.notify_on_hotkey = parse_bool(value)?,
            "hotkeys_enabled" => self.hotkeys_enabled = parse_bool(value)?,
            "auto_paste" => self.auto_paste = parse_bool(value)?,
            "monitor_on_launch" => self.monitor_on_launch = parse_bool(value)?,
            "theme" => self.theme = value.parse()?,
            "font_size" => self.font_size = parse_number(value)?,
            "show_line_numbers" => self.show_line_numbers = parse_bool(value)?,
            "onboarding_completed" => self.onboarding_completed = parse_bool(value)?,
            other => return Err(format!("unknown setting '{}'", other)),
        }
        Ok(())
    }
}

/// Modifier half of a digit hotkey chord.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeyModifiers {
    pub command: bool,
    pub option: bool,
    pub control: bool,
    pub shift: bool,
}

impl HotkeyModifiers {
    pub const NONE: HotkeyModifiers = HotkeyModifiers {
        command: false,
        option: false,
        control: false,
        shift: false,
    };

    pub fn recommended() -> Self {
        Self {
            control: true,
            option: true,
            ..Self::NONE
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }

    /// Plain-text rendering such as `Ctrl+Alt`.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if self.command {
            parts.push("Cmd");
        }
        if self.option {
            parts.push("Alt");
        }
        if self.control {
            parts.push("Ctrl");
        }
        if self.shift {
            parts.push("Shift");
        }
        parts.join("+")
    }
}

impl fmt::Display for HotkeyModifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.command {
            f.write_str("⌘")?;
        }
        if self.option {
            f.write_str("⌥")?;
        }
        if self.control {
            f.write_str("⌃")?;
        }
        if self.shift {
            f.write_str("⇧")?;
        }
        Ok(())
    }
}

impl FromStr for HotkeyModifiers {
    type Err = String;

    /// Accepts symbol strings (`⌃⌥`) or `+`-separated names (`ctrl+alt`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut modifiers = HotkeyModifiers::NONE;
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("empty modifier set".to_string());
        }

        if trimmed.chars().all(|c| matches!(c, '⌘' | '⌥' | '⌃' | '⇧')) {
            for c in trimmed.chars() {
                match c {
                    '⌘' => modifiers.command = true,
                    '⌥' => modifiers.option = true,
                    '⌃' => modifiers.control = true,
                    _ => modifiers.shift = true,
                }
            }
            return Ok(modifiers);
        }

        for part in trimmed.split('+') {
            match part.trim().to_ascii_lowercase().as_str() {
                "cmd" | "command" | "super" | "meta" | "win" => modifiers.command = true,
                "alt" | "opt" | "option" => modifiers.option = true,
                "ctrl" | "control" => modifiers.control = true,
                "shift" => modifiers.shift = true,
                other => return Err(format!("unknown modifier '{}'", other)),
            }
        }
        Ok(modifiers)
    }
}
