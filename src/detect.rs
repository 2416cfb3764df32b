//! Content-kind and language heuristics.
//!
//! Both classifiers are ordered rule lists: the first rule that matches wins.
//! Reordering rules changes outcomes for ambiguous input, so the order here is
//! part of the behaviour and is pinned by tests.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{ContentKind, Language};

const CODE_MARKERS: [&str; 13] = [
    "{", "}", "(", ")", "[", "]", "function", "class", "import", "def ", "var ", "let ", "const ",
];
const CODE_MIN_LINES: usize = 3;

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static detection pattern must compile")
}

static RUST_FN: Lazy<Regex> = Lazy::new(|| regex(r"\bfn\s+\w+\s*[<(]"));
static RUST_IMPL: Lazy<Regex> = Lazy::new(|| regex(r"(?m)^\s*impl\b"));
static GO_FUNC_ASSIGN: Lazy<Regex> = Lazy::new(|| regex(r"\bfunc\s+\w+\s*\([\s\S]*:="));
static SWIFT_FUNC: Lazy<Regex> = Lazy::new(|| regex(r"\bfunc\s+\w+\s*\("));
static KOTLIN_FUN: Lazy<Regex> = Lazy::new(|| regex(r"\bfun\s+\w+\s*\("));
static TS_INTERFACE: Lazy<Regex> = Lazy::new(|| regex(r"(?m)^\s*(export\s+)?(interface|type)\s+\w+\s*[={]"));
static TS_ANNOTATION: Lazy<Regex> = Lazy::new(|| regex(r":\s*(string|number|boolean|any|void|unknown)\b"));
static JS_FUNCTION: Lazy<Regex> = Lazy::new(|| regex(r"\bfunction\s*\w*\s*\("));
static JS_BINDING: Lazy<Regex> = Lazy::new(|| regex(r"\b(const|let|var)\s+\w+\s*="));
static PY_DEF: Lazy<Regex> = Lazy::new(|| regex(r"(?m)^\s*(async\s+)?def\s+\w+\s*\(.*\)\s*(->\s*[^:]+)?:\s*$"));
static PY_IMPORT: Lazy<Regex> = Lazy::new(|| {
    regex(r"(?m)^\s*(from\s+[\w.]+\s+import\s+[\w*]+|import\s+[\w.]+(\s+as\s+\w+)?\s*$)")
});
static PY_BLOCK: Lazy<Regex> = Lazy::new(|| regex(r"(?m)^\s*(elif|except|with|class)\b.*:\s*$"));
static CSHARP_NAMESPACE: Lazy<Regex> = Lazy::new(|| regex(r"\bnamespace\s+[\w.]+\s*[{;]?"));
static C_MAIN: Lazy<Regex> = Lazy::new(|| regex(r"\bint\s+main\s*\("));
static RUBY_DEF: Lazy<Regex> = Lazy::new(|| regex(r"(?m)^\s*def\s+\w+"));
static BLOCK_END: Lazy<Regex> = Lazy::new(|| regex(r"(?m)^\s*end\s*$"));
static RUBY_PUTS: Lazy<Regex> = Lazy::new(|| regex(r"(?m)^\s*(puts|require)\s"));
static SQL_STATEMENT: Lazy<Regex> = Lazy::new(|| {
    regex(r"\bSELECT\b[\s\S]+\bFROM\b|\bINSERT\s+INTO\b|\bCREATE\s+(TABLE|INDEX|VIEW)\b|\bUPDATE\s+\w+\s+SET\b|\bDELETE\s+FROM\b|\bALTER\s+TABLE\b")
});
static SQL_LOWER: Lazy<Regex> = Lazy::new(|| regex(r"(?i)^\s*select\s[\s\S]+\sfrom\s[\s\S]+;\s*$"));
static SHELL_COMMAND: Lazy<Regex> = Lazy::new(|| {
    regex(r"(?m)^\s*(echo|export|sudo|cd|ls|grep|chmod|chown|mkdir|rm|cp|mv|apt|apt-get|brew|npm|yarn|pip|git|curl|wget|cargo|docker|kubectl)\s")
});
static SHELL_BLOCK: Lazy<Regex> = Lazy::new(|| regex(r"(?m)^\s*(fi|done|esac)\s*$|\$\(|\$\{\w+\}"));
static SCSS_MARKER: Lazy<Regex> = Lazy::new(|| regex(r"(?m)^\s*\$[\w-]+\s*:|@mixin\b|@include\b|&:|&\."));
static CSS_SELECTOR: Lazy<Regex> = Lazy::new(|| regex(r"(?m)^\s*[\w.#*\[\]:>~+=,\s-]+\{"));
static CSS_DECLARATION: Lazy<Regex> = Lazy::new(|| regex(r"(?m)^\s*[\w-]+\s*:\s*[^;{}]+;"));
static YAML_KEY: Lazy<Regex> = Lazy::new(|| regex(r"^\s*(-\s+)?[\w.-]+:(\s|$)"));
static YAML_ITEM: Lazy<Regex> = Lazy::new(|| regex(r"^\s*-\s+\S"));
static MARKDOWN: Lazy<Regex> = Lazy::new(|| {
    regex(r"(?m)^#{1,6}\s+\S|\*\*[^*\n]+\*\*|^```|\[[^\]\n]+\]\([^)\n]+\)|(?m)^\s*[-*]\s+\[[ xX]\]")
});
static LUA_LOCAL: Lazy<Regex> = Lazy::new(|| regex(r"(?m)^\s*local\s+(function\b|\w+\s+=\s)"));
static PERL_MY: Lazy<Regex> = Lazy::new(|| regex(r"\bmy\s+[$@%]\w+"));
static R_ASSIGN: Lazy<Regex> = Lazy::new(|| regex(r"(?m)^\s*[\w.]+\s*<-\s*\S"));

/// Coarse content category. Rules are tested in priority order.
pub fn classify_kind(text: &str) -> ContentKind {
    let trimmed = text.trim();

    if is_url(trimmed) {
        return ContentKind::Url;
    }
    if is_email(trimmed) {
        return ContentKind::Email;
    }
    if looks_like_code(trimmed) {
        return ContentKind::Code;
    }
    ContentKind::Text
}

/// Prefix check only; no scheme validation.
pub fn is_url(text: &str) -> bool {
    text.starts_with("http://") || text.starts_with("https://") || text.starts_with("www.")
}

pub fn is_email(text: &str) -> bool {
    text.contains('@') && text.contains('.') && !text.chars().any(char::is_whitespace)
}

fn looks_like_code(text: &str) -> bool {
    CODE_MARKERS.iter().any(|marker| text.contains(marker)) || text.lines().count() > CODE_MIN_LINES
}

struct Probe<'a> {
    text: &'a str,
    first_line: &'a str,
}

impl<'a> Probe<'a> {
    fn new(text: &'a str) -> Self {
        let text = text.trim();
        Self {
            text,
            first_line: text.lines().next().unwrap_or_default().trim(),
        }
    }

    fn has(&self, needle: &str) -> bool {
        self.text.contains(needle)
    }

    fn has_any(&self, needles: &[&str]) -> bool {
        needles.iter().any(|needle| self.text.contains(needle))
    }

    fn lines(&self) -> impl Iterator<Item = &'a str> {
        self.text.lines()
    }

    fn shebang(&self, interpreters: &[&str]) -> bool {
        self.first_line.starts_with("#!")
            && interpreters.iter().any(|name| self.first_line.contains(name))
    }
}

struct Rule {
    language: Language,
    matches: fn(&Probe<'_>) -> bool,
}

const RULES: &[Rule] = &[
    Rule { language: Language::Json, matches: is_json },
    Rule { language: Language::Python, matches: shebang_python },
    Rule { language: Language::Ruby, matches: shebang_ruby },
    Rule { language: Language::Perl, matches: shebang_perl },
    Rule { language: Language::JavaScript, matches: shebang_node },
    Rule { language: Language::Php, matches: shebang_php },
    Rule { language: Language::Shell, matches: shebang_shell },
    Rule { language: Language::Dockerfile, matches: is_dockerfile },
    Rule { language: Language::Php, matches: is_php },
    Rule { language: Language::Html, matches: is_html },
    Rule { language: Language::Xml, matches: is_xml },
    Rule { language: Language::Rust, matches: is_rust },
    Rule { language: Language::Go, matches: is_go },
    Rule { language: Language::Swift, matches: is_swift },
    Rule { language: Language::Kotlin, matches: is_kotlin },
    Rule { language: Language::Dart, matches: is_dart },
    Rule { language: Language::TypeScript, matches: is_typescript },
    Rule { language: Language::Lua, matches: is_lua },
    Rule { language: Language::JavaScript, matches: is_javascript },
    Rule { language: Language::Python, matches: is_python },
    Rule { language: Language::CSharp, matches: is_csharp },
    Rule { language: Language::Java, matches: is_java },
    Rule { language: Language::ObjectiveC, matches: is_objective_c },
    Rule { language: Language::Cpp, matches: is_cpp },
    Rule { language: Language::C, matches: is_c },
    Rule { language: Language::Ruby, matches: is_ruby },
    Rule { language: Language::Sql, matches: is_sql },
    Rule { language: Language::Shell, matches: is_shell },
    Rule { language: Language::Scss, matches: is_scss },
    Rule { language: Language::Css, matches: is_css },
    Rule { language: Language::Yaml, matches: is_yaml },
    Rule { language: Language::Markdown, matches: is_markdown },
    Rule { language: Language::Perl, matches: is_perl },
    Rule { language: Language::R, matches: is_r },
];

/// Runs the rule cascade. Returns `Language::Plain` when nothing matches.
pub fn detect_language(text: &str) -> Language {
    let probe = Probe::new(text);
    if probe.text.is_empty() {
        return Language::Plain;
    }
    RULES
        .iter()
        .find(|rule| (rule.matches)(&probe))
        .map(|rule| rule.language)
        .unwrap_or(Language::Plain)
}

pub fn detect_language_if(text: &str, enabled: bool) -> Language {
    if enabled {
        detect_language(text)
    } else {
        Language::Plain
    }
}

fn is_json(p: &Probe<'_>) -> bool {
    (p.text.starts_with('{') || p.text.starts_with('['))
        && serde_json::from_str::<serde_json::Value>(p.text).is_ok()
}

fn shebang_python(p: &Probe<'_>) -> bool {
    p.shebang(&["python"])
}

fn shebang_ruby(p: &Probe<'_>) -> bool {
    p.shebang(&["ruby"])
}

fn shebang_perl(p: &Probe<'_>) -> bool {
    p.shebang(&["perl"])
}

fn shebang_node(p: &Probe<'_>) -> bool {
    p.shebang(&["node", "deno"])
}

fn shebang_php(p: &Probe<'_>) -> bool {
    p.shebang(&["php"])
}

fn shebang_shell(p: &Probe<'_>) -> bool {
    p.shebang(&["sh", "bash", "zsh", "fish"])
}

fn is_dockerfile(p: &Probe<'_>) -> bool {
    let first_instruction = p
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'));
    let starts_with_from = first_instruction.is_some_and(|line| line.starts_with("FROM "));
    starts_with_from
        && p.lines().any(|line| {
            let line = line.trim_start();
            ["RUN ", "COPY ", "CMD ", "ENTRYPOINT ", "WORKDIR ", "ADD ", "ENV "]
                .iter()
                .any(|instruction| line.starts_with(instruction))
        })
}

fn is_php(p: &Probe<'_>) -> bool {
    p.has("<?php")
}

fn is_html(p: &Probe<'_>) -> bool {
    let lowered = p.text.to_ascii_lowercase();
    [
        "<!doctype html",
        "<html",
        "<head",
        "<body",
        "<div",
        "<span",
        "<a href",
        "<p>",
        "<ul>",
        "<table",
        "<script",
    ]
    .iter()
    .any(|tag| lowered.contains(tag))
}

fn is_xml(p: &Probe<'_>) -> bool {
    p.text.starts_with("<?xml")
        || (p.text.starts_with('<') && p.text.ends_with('>') && p.has("</"))
}

fn is_rust(p: &Probe<'_>) -> bool {
    p.has_any(&["println!", "let mut ", "pub fn ", "use std::", "#[derive", "macro_rules!", "&mut self", "&self"])
        || RUST_FN.is_match(p.text)
        || RUST_IMPL.is_match(p.text)
}

fn is_go(p: &Probe<'_>) -> bool {
    p.has_any(&["package main", "fmt.Print", "fmt.Sprintf", "go func", "chan "])
        || GO_FUNC_ASSIGN.is_match(p.text)
}

fn is_swift(p: &Probe<'_>) -> bool {
    p.has_any(&["import SwiftUI", "import Foundation", "import UIKit", "guard let ", "if let ", "@State"])
        || (SWIFT_FUNC.is_match(p.text) && p.has_any(&["->", "var ", "let "]))
}

fn is_kotlin(p: &Probe<'_>) -> bool {
    p.has_any(&["fun main", "data class "]) || KOTLIN_FUN.is_match(p.text)
}

fn is_dart(p: &Probe<'_>) -> bool {
    p.has_any(&["import 'package:", "Widget build("]) || (p.has("void main()") && p.has("print("))
}

fn is_typescript(p: &Probe<'_>) -> bool {
    TS_INTERFACE.is_match(p.text) || TS_ANNOTATION.is_match(p.text)
}

fn is_lua(p: &Probe<'_>) -> bool {
    LUA_LOCAL.is_match(p.text)
        || (p.has("function") && BLOCK_END.is_match(p.text) && !p.has("{"))
        || (p.has("elseif ") && p.has(" then"))
}

fn is_javascript(p: &Probe<'_>) -> bool {
    p.has_any(&["console.log", "require(", "module.exports", "document.", "=>"])
        || JS_FUNCTION.is_match(p.text)
        || JS_BINDING.is_match(p.text)
}

fn is_python(p: &Probe<'_>) -> bool {
    PY_DEF.is_match(p.text)
        || PY_IMPORT.is_match(p.text)
        || p.has_any(&["self.", "__name__", "elif "])
        || (PY_BLOCK.is_match(p.text) && !p.has("{"))
        || (p.first_line.starts_with("print(") && !p.has(";"))
}

fn is_csharp(p: &Probe<'_>) -> bool {
    p.has_any(&["using System", "Console.Write", "public async Task"])
        || (CSHARP_NAMESPACE.is_match(p.text) && p.has("{"))
}

fn is_java(p: &Probe<'_>) -> bool {
    p.has_any(&["public class ", "public static void main", "System.out.print", "import java.", "private final "])
}

fn is_objective_c(p: &Probe<'_>) -> bool {
    p.has_any(&["#import", "@interface", "@implementation", "NSString", "@property"])
}

fn is_cpp(p: &Probe<'_>) -> bool {
    p.has_any(&["#include <iostream>", "std::", "cout <<", "template<", "template <", "nullptr"])
}

fn is_c(p: &Probe<'_>) -> bool {
    p.has_any(&["#include", "printf(", "malloc("]) || C_MAIN.is_match(p.text)
}

fn is_ruby(p: &Probe<'_>) -> bool {
    (RUBY_DEF.is_match(p.text) && BLOCK_END.is_match(p.text))
        || RUBY_PUTS.is_match(p.text)
        || p.has_any(&[".each do", "attr_accessor"])
}

fn is_sql(p: &Probe<'_>) -> bool {
    SQL_STATEMENT.is_match(p.text) || SQL_LOWER.is_match(p.text)
}

fn is_shell(p: &Probe<'_>) -> bool {
    SHELL_COMMAND.is_match(p.text) || SHELL_BLOCK.is_match(p.text)
}

fn is_scss(p: &Probe<'_>) -> bool {
    SCSS_MARKER.is_match(p.text)
}

fn is_css(p: &Probe<'_>) -> bool {
    CSS_SELECTOR.is_match(p.text) && CSS_DECLARATION.is_match(p.text) && p.has("}")
}

fn is_yaml(p: &Probe<'_>) -> bool {
    if p.has_any(&[";", "{"]) {
        return false;
    }
    if p.first_line == "---" {
        return true;
    }
    let keys = p.lines().filter(|line| YAML_KEY.is_match(line)).count();
    let items = p.lines().filter(|line| YAML_ITEM.is_match(line)).count();
    keys >= 2 || (keys >= 1 && items >= 1)
}

fn is_markdown(p: &Probe<'_>) -> bool {
    MARKDOWN.is_match(p.text)
}

fn is_perl(p: &Probe<'_>) -> bool {
    PERL_MY.is_match(p.text) || p.has_any(&["use strict", "use warnings", "=~"])
}

fn is_r(p: &Probe<'_>) -> bool {
    R_ASSIGN.is_match(p.text) || p.has("library(")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn kind_url_takes_priority() {
        assert_eq!(classify_kind("https://example.com"), ContentKind::Url);
        assert_eq!(classify_kind("http://a.b/c?d=(1)"), ContentKind::Url);
        assert_eq!(classify_kind("www.rust-lang.org"), ContentKind::Url);
    }

    #[test]
    fn kind_email_requires_no_whitespace() {
        assert_eq!(classify_kind("user@example.com"), ContentKind::Email);
        assert_eq!(classify_kind("  user@example.com\n"), ContentKind::Email);
        assert_eq!(classify_kind("mail user@example.com"), ContentKind::Text);
    }

    #[test]
    fn kind_code_from_markers_or_line_count() {
        let snippet = "// helper\nfunction foo() {}\n\nfoo();\n// done";
        assert_eq!(classify_kind(snippet), ContentKind::Code);
        assert_eq!(classify_kind("one\ntwo\nthree\nfour"), ContentKind::Code);
        assert_eq!(classify_kind("one\ntwo\nthree"), ContentKind::Text);
        assert_eq!(classify_kind("let x = 1"), ContentKind::Code);
    }

    #[test]
    fn kind_plain_sentence_is_text() {
        assert_eq!(classify_kind("Meet me at noon tomorrow."), ContentKind::Text);
    }

    #[test]
    fn detects_reference_samples() {
        assert_eq!(detect_language("fn main() {\n println!(\"hi\");\n}"), Language::Rust);
        assert_eq!(detect_language("def f():\n    pass"), Language::Python);
        assert_eq!(detect_language("{\"a\": 1}"), Language::Json);
        assert_eq!(
            detect_language("The quick brown fox jumps over the lazy dog."),
            Language::Plain
        );
    }

    #[test]
    fn detects_common_languages() {
        let cases = [
            ("#!/usr/bin/env python3\nprint('x')", Language::Python),
            ("#!/bin/bash\nset -e", Language::Shell),
            ("FROM rust:1.80\nRUN cargo build", Language::Dockerfile),
            ("<?php echo 'hi'; ?>", Language::Php),
            ("<div class=\"a\">hi</div>", Language::Html),
            ("<?xml version=\"1.0\"?><a></a>", Language::Xml),
            ("package main\n\nfunc main() {}", Language::Go),
            ("import SwiftUI\nstruct A: View {}", Language::Swift),
            ("fun main() {\n  println(\"x\")\n}", Language::Kotlin),
            ("interface User {\n  name: string;\n}", Language::TypeScript),
            ("const add = (a, b) => a + b;", Language::JavaScript),
            ("using System;\nnamespace Demo {}", Language::CSharp),
            ("public class Main {\n}", Language::Java),
            ("#import <Foundation/Foundation.h>", Language::ObjectiveC),
            ("#include <iostream>\nint main() { std::cout << 1; }", Language::Cpp),
            ("#include <stdio.h>\nint main() { printf(\"x\"); }", Language::C),
            ("def greet(name)\n  puts name\nend", Language::Ruby),
            ("SELECT id FROM users WHERE id = 1", Language::Sql),
            ("echo hello\nexport PATH=/bin", Language::Shell),
            ("$primary: #333;\n.a { color: $primary; }", Language::Scss),
            (".btn {\n  color: red;\n}", Language::Css),
            ("name: demo\nversion: 2", Language::Yaml),
            ("# Title\n\nSome **bold** text", Language::Markdown),
            ("local x = 1\nprint(x)", Language::Lua),
            ("x <- c(1, 2, 3)", Language::R),
        ];
        for (text, expected) in cases {
            assert_eq!(detect_language(text), expected, "input: {text:?}");
        }
    }

    #[test]
    fn first_matching_rule_wins() {
        // Valid JSON that also looks like a JS array literal.
        assert_eq!(detect_language("[1, 2, 3]"), Language::Json);
        // A Python shebang beats the shell command heuristics below it.
        assert_eq!(detect_language("#!/usr/bin/python\necho = 1"), Language::Python);
    }

    #[test]
    fn disabled_detection_is_plain() {
        assert_eq!(detect_language_if("fn main() {}", false), Language::Plain);
        assert_eq!(detect_language_if("fn main() {}", true), Language::Rust);
    }

    #[test]
    fn empty_input_is_plain() {
        assert_eq!(detect_language("   \n"), Language::Plain);
    }
}
