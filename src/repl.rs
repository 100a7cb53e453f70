// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Interactive REPL over a single execution context.
//!
//! Every line is evaluated in the same context, so globals and `let`
//! bindings persist until the shell exits.

use crate::HOST_OBJECT;
use owo_colors::OwoColorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Config, Editor, Helper};
use spacey_embed::{BridgeError, ExecutionContext, HostValue, VERSION};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

const HISTORY_FILE: &str = ".spacey_shell_history";
const MAX_HISTORY_SIZE: usize = 1000;

/// Dot-prefixed shell commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Exit,
    Clear,
    Version,
    Load,
    Gc,
    Memory,
}

impl ReplCommand {
    /// Parse a command and its optional argument
    pub fn parse(input: &str) -> Option<(Self, Option<&str>)> {
        let rest = input.trim().strip_prefix('.')?;

        let mut parts = rest.splitn(2, char::is_whitespace);
        let cmd = parts.next()?.to_lowercase();
        let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());

        let command = match cmd.as_str() {
            "help" | "h" | "?" => ReplCommand::Help,
            "exit" | "quit" | "q" => ReplCommand::Exit,
            "clear" | "cls" => ReplCommand::Clear,
            "version" | "v" => ReplCommand::Version,
            "load" | "l" => ReplCommand::Load,
            "gc" => ReplCommand::Gc,
            "memory" | "mem" => ReplCommand::Memory,
            _ => return None,
        };
        Some((command, arg))
    }

    pub fn all_commands() -> &'static [(&'static str, &'static str)] {
        &[
            (".help", "Show this help message"),
            (".exit", "Exit the shell"),
            (".clear", "Clear the screen"),
            (".version", "Show version information"),
            (".load <file>", "Evaluate a JavaScript file in this context"),
            (".gc", "Run a garbage collection pass"),
            (".memory", "Show heap usage and configured ceilings"),
        ]
    }
}

/// Completion, hints and multi-line validation
struct ShellHelper {
    words: Vec<String>,
}

impl ShellHelper {
    fn new(host_functions: &[&str]) -> Self {
        let mut words: Vec<String> = JS_KEYWORDS
            .iter()
            .chain(JS_LITERALS)
            .chain(JS_BUILTINS)
            .map(|w| w.to_string())
            .collect();

        words.extend(
            host_functions
                .iter()
                .map(|name| format!("{}.{}", HOST_OBJECT, name)),
        );
        words.extend(ReplCommand::all_commands().iter().map(|(cmd, _)| {
            cmd.split_whitespace().next().unwrap_or(cmd).to_string()
        }));
        words.sort();
        words.dedup();

        Self { words }
    }

    fn current_word(line: &str) -> &str {
        let start = line
            .rfind(|c: char| !c.is_alphanumeric() && c != '_' && c != '.')
            .map(|i| i + 1)
            .unwrap_or(0);
        &line[start..]
    }
}

const JS_KEYWORDS: &[&str] = &[
    "async", "await", "break", "case", "catch", "class", "const", "continue", "default", "delete",
    "do", "else", "extends", "finally", "for", "function", "if", "in", "instanceof", "let", "new",
    "return", "switch", "throw", "try", "typeof", "var", "void", "while", "yield",
];

const JS_LITERALS: &[&str] = &["true", "false", "null", "undefined", "NaN", "Infinity", "this"];

const JS_BUILTINS: &[&str] = &[
    "Array", "Boolean", "Date", "Error", "JSON", "Map", "Math", "Number", "Object", "Promise",
    "RegExp", "Set", "String", "Symbol", HOST_OBJECT,
];

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let word = Self::current_word(&line[..pos]);
        if word.is_empty() {
            return Ok((pos, vec![]));
        }

        let matches = self
            .words
            .iter()
            .filter(|w| w.starts_with(word))
            .map(|w| Pair {
                display: w.clone(),
                replacement: w[word.len()..].to_string(),
            })
            .collect();

        Ok((pos, matches))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<Self::Hint> {
        if pos < line.len() {
            return None;
        }

        let word = Self::current_word(line);
        if word.len() < 2 {
            return None;
        }

        self.words
            .iter()
            .find(|w| w.starts_with(word) && w.len() > word.len())
            .map(|w| (&w[word.len()..]).dimmed().to_string())
    }
}

impl Highlighter for ShellHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.trim_start().starts_with('.') {
            return Cow::Owned(line.magenta().to_string());
        }

        let mut result = String::with_capacity(line.len() * 2);
        let mut word = String::new();

        for c in line.chars() {
            if c.is_alphanumeric() || c == '_' {
                word.push(c);
                continue;
            }
            if !word.is_empty() {
                result.push_str(&highlight_word(&word));
                word.clear();
            }
            let colored = match c {
                '(' | ')' | '[' | ']' | '{' | '}' => c.yellow().to_string(),
                '+' | '-' | '*' | '/' | '%' | '=' | '<' | '>' | '!' | '&' | '|' => {
                    c.cyan().to_string()
                }
                '"' | '\'' | '`' => c.green().to_string(),
                _ => c.to_string(),
            };
            result.push_str(&colored);
        }

        if !word.is_empty() {
            result.push_str(&highlight_word(&word));
        }

        Cow::Owned(result)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn highlight_word(word: &str) -> String {
    if JS_KEYWORDS.contains(&word) {
        word.magenta().bold().to_string()
    } else if JS_LITERALS.contains(&word) {
        word.blue().to_string()
    } else if word == HOST_OBJECT {
        word.bright_cyan().bold().to_string()
    } else if JS_BUILTINS.contains(&word) {
        word.cyan().to_string()
    } else if word.chars().all(|c| c.is_ascii_digit()) {
        word.yellow().to_string()
    } else {
        word.to_string()
    }
}

impl Validator for ShellHelper {
    fn validate(&self, ctx: &mut ValidationContext<'_>) -> rustyline::Result<ValidationResult> {
        let input = ctx.input();
        if input.trim_start().starts_with('.') {
            return Ok(ValidationResult::Valid(None));
        }
        if !is_balanced(input) {
            return Ok(ValidationResult::Incomplete);
        }

        // Trailing operators expect a continuation line
        let trimmed = input.trim_end();
        if trimmed.ends_with(['\\', '+', '-', '*', '/', '=', ',']) {
            return Ok(ValidationResult::Incomplete);
        }

        Ok(ValidationResult::Valid(None))
    }
}

impl Helper for ShellHelper {}

/// Returns false while brackets or a string literal are still open.
fn is_balanced(input: &str) -> bool {
    let mut open = Vec::new();
    let mut quote = None;
    let mut escaped = false;

    for c in input.chars() {
        if escaped {
            escaped = false;
            continue;
        }

        match quote {
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' | '`' => quote = Some(c),
                '(' => open.push(')'),
                '[' => open.push(']'),
                '{' => open.push('}'),
                // Mismatched closers are left for the parser to report
                ')' | ']' | '}' if open.pop() != Some(c) => return true,
                _ => {}
            },
        }
    }

    open.is_empty() && quote.is_none()
}

/// The interactive shell
pub struct Repl {
    context: ExecutionContext,
    editor: Editor<ShellHelper, DefaultHistory>,
    history_path: PathBuf,
}

impl Repl {
    /// Wrap `context` in a line editor with persistent history.
    pub fn new(context: ExecutionContext) -> rustyline::Result<Self> {
        let config = Config::builder()
            .history_ignore_dups(true)?
            .history_ignore_space(true)
            .max_history_size(MAX_HISTORY_SIZE)?
            .auto_add_history(true)
            .build();

        let mut editor = Editor::with_config(config)?;
        editor.set_helper(Some(ShellHelper::new(&context.registry().names())));

        let history_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("spacey")
            .join(HISTORY_FILE);

        if let Some(parent) = history_path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::debug!("History directory unavailable: {}", e);
            }
        }
        if editor.load_history(&history_path).is_err() {
            tracing::debug!("No history at {}", history_path.display());
        }

        Ok(Self {
            context,
            editor,
            history_path,
        })
    }

    /// Run until `.exit` or end of input.
    pub fn run(&mut self) -> rustyline::Result<()> {
        self.print_banner();

        loop {
            let prompt = format!("{} ", "spacey>".bright_green().bold());

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    if let Some((cmd, arg)) = ReplCommand::parse(trimmed) {
                        match self.execute_command(cmd, arg) {
                            CommandResult::Continue => continue,
                            CommandResult::Exit => break,
                        }
                    }

                    if trimmed.starts_with('.') {
                        eprintln!(
                            "{}: unknown command '{}', try {}",
                            "Error".red().bold(),
                            trimmed.cyan(),
                            ".help".cyan()
                        );
                        continue;
                    }

                    let result = self.context.eval(trimmed);
                    print_result(result);
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C".dimmed());
                }
                Err(ReadlineError::Eof) => {
                    println!("{}", "^D".dimmed());
                    break;
                }
                Err(err) => {
                    eprintln!("{}: {:?}", "Error".red().bold(), err);
                    break;
                }
            }
        }

        if let Err(e) = self.editor.save_history(&self.history_path) {
            tracing::warn!("Failed to save history: {}", e);
        }
        Ok(())
    }

    fn print_banner(&self) {
        println!(
            "{} {} (QuickJS)",
            "spacey-shell".cyan().bold(),
            VERSION.yellow()
        );
        println!(
            "Host library available as {}; type {} for help, {} to exit",
            HOST_OBJECT.bright_cyan(),
            ".help".green(),
            ".exit".green()
        );
        println!();
    }

    fn execute_command(&mut self, cmd: ReplCommand, arg: Option<&str>) -> CommandResult {
        match cmd {
            ReplCommand::Help => print_help(),
            ReplCommand::Exit => return CommandResult::Exit,
            ReplCommand::Clear => print!("\x1B[2J\x1B[H"),
            ReplCommand::Version => {
                println!("{}: {}", "spacey-shell".bright_cyan().bold(), VERSION.yellow());
                println!("{}: {}", "spacey-embed".dimmed(), spacey_embed::VERSION);
            }
            ReplCommand::Load => match arg {
                Some(path) => {
                    let result = self.context.eval_file(Path::new(path));
                    print_result(result);
                }
                None => eprintln!(
                    "{}: {} requires a file path",
                    "Error".red().bold(),
                    ".load".cyan()
                ),
            },
            ReplCommand::Gc => {
                let before = self.context.memory_usage();
                self.context.gc();
                let after = self.context.memory_usage();
                println!(
                    "{} {} -> {}",
                    "gc:".dimmed(),
                    format_bytes(before),
                    format_bytes(after).green()
                );
            }
            ReplCommand::Memory => self.print_memory(),
        }
        CommandResult::Continue
    }

    fn print_memory(&self) {
        let limits = self.context.limits();
        let ceiling = |limit: Option<usize>| {
            limit.map_or_else(|| "unlimited".to_string(), |b| format_bytes(b as u64))
        };

        println!("  {:8} {}", "used".cyan(), format_bytes(self.context.memory_usage()));
        println!("  {:8} {}", "heap".cyan(), ceiling(limits.heap_bytes));
        println!("  {:8} {}", "stack".cyan(), ceiling(limits.stack_bytes));
        println!("  {:8} {:?}", "state".cyan(), self.context.state());
    }
}

enum CommandResult {
    Continue,
    Exit,
}

fn print_help() {
    println!();
    println!("{}", "Shell Commands:".white().bold());
    for (cmd, desc) in ReplCommand::all_commands() {
        println!("  {:16} {}", cmd.cyan(), desc.dimmed());
    }
    println!();
    println!("{}", "Host Library:".white().bold());
    println!(
        "  {}   {}",
        format!("{}.upper('hi')", HOST_OBJECT).cyan(),
        "call a host function".dimmed()
    );
    println!();
}

fn print_result(result: spacey_embed::Result<HostValue>) {
    match result {
        Ok(value) => println!("{}", format_value(&value)),
        Err(e) => print_error(&e),
    }
}

/// Render a host value with syntax coloring
fn format_value(value: &HostValue) -> String {
    match value {
        HostValue::Null => "null".blue().to_string(),
        HostValue::Bool(_) | HostValue::Int(_) | HostValue::Float(_) => {
            value.to_string().yellow().to_string()
        }
        HostValue::String(_) => value.to_string().green().to_string(),
        HostValue::Sequence(items) => {
            let inner: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", inner.join(", "))
        }
        HostValue::Mapping(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", k, format_value(v)))
                .collect();
            format!("{{ {} }}", inner.join(", "))
        }
    }
}

fn print_error(error: &BridgeError) {
    let text = error.to_string();

    // Color the error kind when the message is "Kind: detail"
    match text.split_once(':') {
        Some((kind, detail)) if !kind.contains(' ') => {
            eprintln!("{}:{}", kind.red().bold(), detail)
        }
        _ => eprintln!("{}", text.red()),
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
