//! Regex-based syntax highlighting.
//!
//! Purely presentational: spans index into the original text and never alter
//! it. Passes run strings → comments → numbers → keywords, and a later pass
//! overwrites an earlier one where their matches overlap.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{Language, Theme};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Plain,
    String,
    Comment,
    Number,
    Keyword,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Span {
    pub range: Range<usize>,
    pub token: TokenKind,
}

#[derive(Clone, Copy)]
enum Comments {
    None,
    CLike,
    Hash,
    DoubleDash,
    Markup,
    CLikeAndHash,
}

impl Comments {
    fn pattern(self) -> Option<&'static str> {
        match self {
            Comments::None => None,
            Comments::CLike => Some(r"//[^\n]*|/\*[\s\S]*?\*/"),
            Comments::Hash => Some(r"#[^\n]*"),
            Comments::DoubleDash => Some(r"--[^\n]*"),
            Comments::Markup => Some(r"<!--[\s\S]*?-->"),
            Comments::CLikeAndHash => Some(r"//[^\n]*|/\*[\s\S]*?\*/|#[^\n]*"),
        }
    }
}

struct Grammar {
    keywords: &'static [&'static str],
    comments: Comments,
    backtick_strings: bool,
}

fn table(keywords: &'static [&'static str], comments: Comments, backtick_strings: bool) -> Grammar {
    Grammar {
        keywords,
        comments,
        backtick_strings,
    }
}

fn grammar(language: Language) -> Grammar {
    match language {
        Language::Swift => table(
            &["func", "let", "var", "if", "else", "guard", "return", "struct", "class", "enum", "protocol", "extension", "import", "for", "in", "while", "switch", "case", "default", "self", "init", "nil", "true", "false", "private", "public", "static", "some", "async", "await", "try", "throws"],
            Comments::CLike,
            false,
        ),
        Language::Python => table(
            &["def", "class", "return", "if", "elif", "else", "for", "while", "in", "import", "from", "as", "with", "try", "except", "finally", "raise", "lambda", "yield", "pass", "break", "continue", "None", "True", "False", "and", "or", "not", "is", "async", "await", "self"],
            Comments::Hash,
            false,
        ),
        Language::JavaScript | Language::TypeScript => table(
            &["function", "const", "let", "var", "return", "if", "else", "for", "while", "class", "extends", "new", "this", "import", "export", "from", "default", "async", "await", "try", "catch", "throw", "null", "undefined", "true", "false", "typeof", "interface", "type", "switch", "case"],
            Comments::CLike,
            true,
        ),
        Language::Java | Language::Kotlin | Language::CSharp | Language::Dart => table(
            &["class", "public", "private", "protected", "static", "final", "void", "int", "new", "return", "if", "else", "for", "while", "import", "package", "extends", "implements", "interface", "this", "null", "true", "false", "try", "catch", "throw", "fun", "val", "var", "using", "namespace", "async", "await"],
            Comments::CLike,
            false,
        ),
        Language::C | Language::Cpp | Language::ObjectiveC => table(
            &["int", "char", "float", "double", "void", "long", "short", "unsigned", "const", "static", "struct", "enum", "typedef", "return", "if", "else", "for", "while", "switch", "case", "break", "continue", "sizeof", "class", "public", "private", "namespace", "template", "nullptr", "auto", "include", "define"],
            Comments::CLike,
            false,
        ),
        Language::Go => table(
            &["package", "import", "func", "var", "const", "type", "struct", "interface", "return", "if", "else", "for", "range", "go", "defer", "chan", "select", "switch", "case", "map", "nil", "true", "false"],
            Comments::CLike,
            true,
        ),
        Language::Rust => table(
            &["fn", "let", "mut", "pub", "use", "mod", "struct", "enum", "impl", "trait", "for", "in", "if", "else", "match", "return", "self", "Self", "const", "static", "where", "loop", "while", "async", "await", "move", "ref", "true", "false", "crate", "super", "dyn"],
            Comments::CLike,
            false,
        ),
        Language::Ruby => table(
            &["def", "end", "class", "module", "if", "elsif", "else", "unless", "do", "while", "return", "require", "puts", "nil", "true", "false", "self", "yield", "begin", "rescue"],
            Comments::Hash,
            false,
        ),
        Language::Php => table(
            &["function", "echo", "return", "if", "else", "foreach", "as", "class", "public", "private", "new", "null", "true", "false", "namespace", "use", "array"],
            Comments::CLikeAndHash,
            false,
        ),
        Language::Sql => table(
            &["SELECT", "FROM", "WHERE", "INSERT", "INTO", "VALUES", "UPDATE", "SET", "DELETE", "CREATE", "TABLE", "DROP", "ALTER", "JOIN", "LEFT", "RIGHT", "INNER", "ON", "AND", "OR", "NOT", "NULL", "ORDER", "BY", "GROUP", "LIMIT", "AS", "PRIMARY", "KEY"],
            Comments::DoubleDash,
            false,
        ),
        Language::Shell | Language::Dockerfile => table(
            &["if", "then", "else", "elif", "fi", "for", "in", "do", "done", "case", "esac", "while", "function", "echo", "export", "local", "return", "FROM", "RUN", "COPY", "CMD", "ENTRYPOINT", "WORKDIR", "ENV", "ADD", "EXPOSE"],
            Comments::Hash,
            true,
        ),
        Language::Lua => table(
            &["local", "function", "end", "if", "then", "else", "elseif", "for", "in", "do", "while", "return", "nil", "true", "false", "and", "or", "not"],
            Comments::DoubleDash,
            false,
        ),
        Language::Perl => table(
            &["my", "our", "sub", "use", "strict", "warnings", "if", "elsif", "else", "foreach", "while", "return", "print"],
            Comments::Hash,
            false,
        ),
        Language::R => table(
            &["function", "if", "else", "for", "while", "return", "library", "TRUE", "FALSE", "NULL", "in"],
            Comments::Hash,
            false,
        ),
        Language::Yaml => table(&["true", "false", "null", "yes", "no"], Comments::Hash, false),
        Language::Json => table(&["true", "false", "null"], Comments::None, false),
        Language::Css | Language::Scss => table(
            &["important", "media", "import", "mixin", "include", "extend"],
            Comments::CLike,
            false,
        ),
        Language::Html | Language::Xml => table(&[], Comments::Markup, false),
        Language::Markdown | Language::Plain => table(&[], Comments::None, false),
    }
}

struct CompiledGrammar {
    strings: Regex,
    comments: Option<Regex>,
    keywords: Option<Regex>,
}

static NUMBERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:0x[0-9a-fA-F]+|\d+(?:\.\d+)?)\b").expect("number pattern"));

static GRAMMARS: Lazy<HashMap<Language, CompiledGrammar>> = Lazy::new(|| {
    Language::ALL
        .iter()
        .map(|&language| (language, compile(grammar(language))))
        .collect()
});

fn compile(grammar: Grammar) -> CompiledGrammar {
    let strings = if grammar.backtick_strings {
        r#""(?:[^"\\\n]|\\.)*"|'(?:[^'\\\n]|\\.)*'|`(?:[^`\\]|\\.)*`"#
    } else {
        r#""(?:[^"\\\n]|\\.)*"|'(?:[^'\\\n]|\\.)*'"#
    };
    let keywords = (!grammar.keywords.is_empty()).then(|| {
        let alternation = grammar
            .keywords
            .iter()
            .map(|keyword| regex::escape(keyword))
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&format!(r"\b(?:{})\b", alternation)).expect("keyword pattern")
    });
    CompiledGrammar {
        strings: Regex::new(strings).expect("string pattern"),
        comments: grammar
            .comments
            .pattern()
            .map(|pattern| Regex::new(pattern).expect("comment pattern")),
        keywords,
    }
}

fn paint(classes: &mut [TokenKind], regex: &Regex, text: &str, token: TokenKind) {
    for found in regex.find_iter(text) {
        classes[found.range()].fill(token);
    }
}

/// Spans covering all of `text`, in order, adjacent same-kind bytes merged.
pub fn highlight(text: &str, language: Language) -> Vec<Span> {
    if text.is_empty() {
        return Vec::new();
    }
    let mut classes = vec![TokenKind::Plain; text.len()];

    if language != Language::Plain && language != Language::Markdown {
        if let Some(grammar) = GRAMMARS.get(&language) {
            paint(&mut classes, &grammar.strings, text, TokenKind::String);
            if let Some(comments) = &grammar.comments {
                paint(&mut classes, comments, text, TokenKind::Comment);
            }
            paint(&mut classes, &NUMBERS, text, TokenKind::Number);
            if let Some(keywords) = &grammar.keywords {
                paint(&mut classes, keywords, text, TokenKind::Keyword);
            }
        }
    }

    let mut spans: Vec<Span> = Vec::new();
    for (offset, token) in classes.into_iter().enumerate() {
        match spans.last_mut() {
            Some(last) if last.token == token => last.range.end = offset + 1,
            _ => spans.push(Span {
                range: offset..offset + 1,
                token,
            }),
        }
    }
    spans
}

fn ansi_code(token: TokenKind, theme: Theme) -> Option<&'static str> {
    match (token, theme) {
        (TokenKind::Plain, _) => None,
        (TokenKind::String, Theme::Light) => Some("\x1b[32m"),
        (TokenKind::String, _) => Some("\x1b[92m"),
        (TokenKind::Comment, Theme::Light) => Some("\x1b[2;37m"),
        (TokenKind::Comment, _) => Some("\x1b[90m"),
        (TokenKind::Number, Theme::Light) => Some("\x1b[34m"),
        (TokenKind::Number, _) => Some("\x1b[93m"),
        (TokenKind::Keyword, Theme::Light) => Some("\x1b[1;35m"),
        (TokenKind::Keyword, _) => Some("\x1b[1;95m"),
    }
}

const RESET: &str = "\x1b[0m";

/// Terminal rendering with ANSI colours and optional line numbers.
pub fn render_ansi(text: &str, language: Language, theme: Theme, line_numbers: bool) -> String {
    let width = text.lines().count().max(1).to_string().len();
    let mut out = String::with_capacity(text.len() * 2);
    let mut line = 1usize;
    let gutter = |out: &mut String, line: usize| {
        if line_numbers {
            let _ = write!(out, "\x1b[2m{:>width$} │{} ", line, RESET, width = width);
        }
    };

    gutter(&mut out, line);
    for span in highlight(text, language) {
        let code = ansi_code(span.token, theme);
        let mut pieces = text[span.range.clone()].split('\n').peekable();
        while let Some(piece) = pieces.next() {
            match code {
                Some(code) if !piece.is_empty() => {
                    out.push_str(code);
                    out.push_str(piece);
                    out.push_str(RESET);
                }
                _ => out.push_str(piece),
            }
            if pieces.peek().is_some() {
                out.push('\n');
                line += 1;
                gutter(&mut out, line);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokens(text: &str, language: Language) -> Vec<(String, TokenKind)> {
        highlight(text, language)
            .into_iter()
            .filter(|span| span.token != TokenKind::Plain)
            .map(|span| (text[span.range].to_string(), span.token))
            .collect()
    }

    #[test]
    fn spans_cover_input_exactly() {
        let text = "fn main() {\n    let s = \"héllo\"; // 42 ünïcode\n}";
        let rebuilt: String = highlight(text, Language::Rust)
            .into_iter()
            .map(|span| &text[span.range])
            .collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn classifies_rust_tokens() {
        let found = tokens("let x = 42; // done", Language::Rust);
        assert_eq!(
            found,
            vec![
                ("let".to_string(), TokenKind::Keyword),
                ("42".to_string(), TokenKind::Number),
                ("// done".to_string(), TokenKind::Comment),
            ]
        );
    }

    #[test]
    fn later_passes_overwrite_earlier_ones() {
        // The keyword pass runs last, so `return` inside a comment is repainted.
        let found = tokens("# return here", Language::Python);
        assert_eq!(
            found,
            vec![
                ("# ".to_string(), TokenKind::Comment),
                ("return".to_string(), TokenKind::Keyword),
                (" here".to_string(), TokenKind::Comment),
            ]
        );
    }

    #[test]
    fn plain_text_is_a_single_span() {
        let spans = highlight("if 3 cats", Language::Plain);
        assert_eq!(
            spans,
            vec![Span {
                range: 0..9,
                token: TokenKind::Plain
            }]
        );
    }

    #[test]
    fn render_adds_line_numbers() {
        let rendered = render_ansi("a\nb", Language::Plain, Theme::Dark, true);
        assert!(rendered.contains("1 │"));
        assert!(rendered.contains("2 │"));
        let bare = render_ansi("a\nb", Language::Plain, Theme::Dark, false);
        assert_eq!(bare, "a\nb");
    }
}
