// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Interactive REPL (Read-Eval-Print Loop) for Cinder.
//!
//! Accepted input accumulates into a session program. Each new line is
//! compiled together with the session and run from scratch; only values
//! printed past the previous run's output are shown.

use std::borrow::Cow;
use std::path::PathBuf;

use cinder_engine::{Engine, EngineConfig, Error, Word};
use owo_colors::OwoColorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Config, Editor, Helper};

/// REPL configuration constants
const HISTORY_FILE: &str = ".cinder_history";
const MAX_HISTORY_SIZE: usize = 1000;

const KEYWORDS: &[&str] = &[
    "class", "else", "fn", "for", "if", "int", "print", "return", "struct", "this", "while",
];

/// REPL commands that can be executed with a dot prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Exit,
    Clear,
    Version,
    Load,
    Listing,
    Reset,
}

impl ReplCommand {
    /// Parse a REPL command from input string
    pub fn parse(input: &str) -> Option<(Self, Option<&str>)> {
        let input = input.trim().strip_prefix('.')?;

        let mut parts = input.splitn(2, char::is_whitespace);
        let cmd = parts.next()?.to_lowercase();
        let arg = parts.next().map(str::trim).filter(|arg| !arg.is_empty());

        let cmd = match cmd.as_str() {
            "help" | "h" | "?" => ReplCommand::Help,
            "exit" | "quit" | "q" => ReplCommand::Exit,
            "clear" | "cls" => ReplCommand::Clear,
            "version" | "v" => ReplCommand::Version,
            "load" | "l" => ReplCommand::Load,
            "listing" | "asm" => ReplCommand::Listing,
            "reset" => ReplCommand::Reset,
            _ => return None,
        };
        Some((cmd, arg))
    }

    /// Get all available commands for help/completion
    pub fn all_commands() -> &'static [(&'static str, &'static str)] {
        &[
            (".help", "Show this help message"),
            (".exit", "Exit the REPL"),
            (".clear", "Clear the screen"),
            (".version", "Show version information"),
            (".load <file>", "Add a source file to the session"),
            (".listing", "Show the bytecode of the session"),
            (".reset", "Forget everything entered so far"),
        ]
    }
}

/// Helper struct for rustyline that provides completion, hints, and validation
struct CinderHelper {
    /// Keywords and REPL commands for completion
    words: Vec<String>,
}

impl CinderHelper {
    fn new() -> Self {
        let commands = ReplCommand::all_commands()
            .iter()
            .filter_map(|(cmd, _)| cmd.split_whitespace().next());
        Self {
            words: KEYWORDS
                .iter()
                .copied()
                .chain(commands)
                .map(String::from)
                .collect(),
        }
    }
}

/// Start of the word ending at `pos`.
fn word_start(line: &str, pos: usize) -> usize {
    line[..pos]
        .rfind(|c: char| !c.is_alphanumeric() && c != '_' && c != '.')
        .map(|i| i + 1)
        .unwrap_or(0)
}

impl Completer for CinderHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let word = &line[word_start(line, pos)..pos];
        if word.is_empty() {
            return Ok((pos, vec![]));
        }

        let matches = self
            .words
            .iter()
            .filter(|kw| kw.starts_with(word))
            .map(|kw| Pair {
                display: kw.clone(),
                replacement: kw[word.len()..].to_string(),
            })
            .collect();

        Ok((pos, matches))
    }
}

impl Hinter for CinderHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<Self::Hint> {
        if pos < line.len() {
            return None;
        }

        let word = &line[word_start(line, pos)..];
        if word.len() < 2 {
            return None;
        }

        self.words
            .iter()
            .find(|kw| kw.starts_with(word) && kw.len() > word.len())
            .map(|kw| (&kw[word.len()..]).dimmed().to_string())
    }
}

impl Highlighter for CinderHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let mut result = String::with_capacity(line.len() * 2);
        let mut current_word = String::new();

        for c in line.chars() {
            if c.is_alphanumeric() || c == '_' {
                current_word.push(c);
                continue;
            }
            if !current_word.is_empty() {
                result.push_str(&highlight_word(&current_word));
                current_word.clear();
            }
            let colored = match c {
                '(' | ')' | '[' | ']' | '{' | '}' => c.yellow().to_string(),
                '+' | '-' | '*' | '/' | '=' | '<' | '>' | '!' | '&' => c.cyan().to_string(),
                '.' if line.starts_with('.') => c.magenta().to_string(),
                _ => c.to_string(),
            };
            result.push_str(&colored);
        }

        if !current_word.is_empty() {
            result.push_str(&highlight_word(&current_word));
        }

        Cow::Owned(result)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn highlight_word(word: &str) -> String {
    if KEYWORDS.contains(&word) {
        word.magenta().bold().to_string()
    } else if word.chars().all(|c| c.is_ascii_digit()) {
        word.yellow().to_string()
    } else {
        word.to_string()
    }
}

impl Validator for CinderHelper {
    fn validate(&self, ctx: &mut ValidationContext<'_>) -> rustyline::Result<ValidationResult> {
        let input = ctx.input();
        let trimmed = input.trim();

        if trimmed.starts_with('.') {
            return Ok(ValidationResult::Valid(None));
        }

        if !is_balanced(input) {
            return Ok(ValidationResult::Incomplete);
        }

        if trimmed.ends_with(['+', '-', '*', '/', '=', ',', '(', '[']) {
            return Ok(ValidationResult::Incomplete);
        }

        Ok(ValidationResult::Valid(None))
    }
}

/// Check if brackets, braces, and parentheses are balanced
fn is_balanced(input: &str) -> bool {
    let mut stack = Vec::new();

    for line in input.lines() {
        let code = line.split("//").next().unwrap_or(line);
        for c in code.chars() {
            match c {
                '(' => stack.push(')'),
                '[' => stack.push(']'),
                '{' => stack.push('}'),
                ')' | ']' | '}' => {
                    if stack.pop() != Some(c) {
                        return true; // Unbalanced but we should let the parser handle the error
                    }
                }
                _ => {}
            }
        }
    }

    stack.is_empty()
}

impl Helper for CinderHelper {}

/// Source accepted so far and how much of its output has been shown.
#[derive(Debug, Default)]
struct Session {
    source: String,
    shown: usize,
}

impl Session {
    /// Runs the session extended by `input`, keeping `input` on success.
    ///
    /// Returns the values printed by `input`.
    fn eval(&mut self, engine: &mut Engine, input: &str) -> Result<Vec<Word>, Error> {
        let candidate = self.extended(input);
        let printed = engine.eval(&candidate)?;
        let fresh = printed.get(self.shown..).unwrap_or_default().to_vec();
        self.source = candidate;
        self.shown = printed.len();
        Ok(fresh)
    }

    fn extended(&self, input: &str) -> String {
        let mut candidate = self.source.clone();
        candidate.push_str(input);
        if !input.ends_with('\n') {
            candidate.push('\n');
        }
        candidate
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// The interactive REPL for Cinder
pub struct Repl {
    engine: Engine,
    session: Session,
    editor: Editor<CinderHelper, DefaultHistory>,
    history_path: PathBuf,
}

impl Repl {
    /// Create a new REPL instance
    pub fn new(mut config: EngineConfig) -> rustyline::Result<Self> {
        let editor_config = Config::builder()
            .history_ignore_dups(true)?
            .history_ignore_space(true)
            .max_history_size(MAX_HISTORY_SIZE)?
            .auto_add_history(true)
            .build();

        let mut editor = Editor::with_config(editor_config)?;
        editor.set_helper(Some(CinderHelper::new()));

        let history_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cinder")
            .join(HISTORY_FILE);

        if let Some(parent) = history_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let _ = editor.load_history(&history_path);

        // The REPL shows new values itself; replaying the session must stay silent.
        config.unit = "<repl>".to_string();
        config.vm.echo_prints = false;

        Ok(Self {
            engine: Engine::with_config(config),
            session: Session::default(),
            editor,
            history_path,
        })
    }

    /// Run the REPL main loop
    pub fn run(&mut self) -> rustyline::Result<()> {
        self.print_banner();

        loop {
            let prompt = format!("{} ", "cinder>".bright_green().bold());

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

                    self.eval_and_print(&line);
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C".dimmed());
                    continue;
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

        let _ = self.editor.save_history(&self.history_path);

        println!();
        println!("{}", "Goodbye!".bright_cyan());
        Ok(())
    }

    fn print_banner(&self) {
        println!();
        println!(
            "  {} {} {}",
            "Cinder".bright_cyan().bold(),
            "v".dimmed(),
            env!("CARGO_PKG_VERSION").bright_yellow()
        );
        println!(
            "  {} {} {}",
            "Type".dimmed(),
            ".help".cyan(),
            "for available commands".dimmed()
        );
        println!();
    }

    fn execute_command(&mut self, cmd: ReplCommand, arg: Option<&str>) -> CommandResult {
        match cmd {
            ReplCommand::Help => self.print_help(),
            ReplCommand::Exit => return CommandResult::Exit,
            ReplCommand::Clear => print!("\x1B[2J\x1B[H"),
            ReplCommand::Version => {
                println!(
                    "{}: {}",
                    "Cinder".bright_cyan().bold(),
                    env!("CARGO_PKG_VERSION").yellow()
                );
            }
            ReplCommand::Load => match arg {
                Some(path) => self.load_file(path),
                None => eprintln!(
                    "{}: {} {}",
                    "Error".red().bold(),
                    ".load".cyan(),
                    "requires a file path".dimmed()
                ),
            },
            ReplCommand::Listing => match self.engine.compile(&self.session.source) {
                Ok(bytecode) => print!("{}", bytecode),
                Err(e) => print_error(&e),
            },
            ReplCommand::Reset => {
                self.session.reset();
                println!("{}", "Session cleared".dimmed());
            }
        }
        CommandResult::Continue
    }

    fn print_help(&self) {
        println!();
        println!("{}", "REPL Commands:".white().bold());
        println!();

        for (cmd, desc) in ReplCommand::all_commands() {
            println!("  {:16} {}", cmd.cyan(), desc.dimmed());
        }

        println!();
        println!("{}", "Keyboard Shortcuts:".white().bold());
        println!();
        println!(
            "  {:16} {}",
            "Ctrl+C".yellow(),
            "Cancel current input".dimmed()
        );
        println!("  {:16} {}", "Ctrl+D".yellow(), "Exit REPL".dimmed());
        println!("  {:16} {}", "Tab".yellow(), "Autocomplete".dimmed());
        println!();
    }

    fn load_file(&mut self, path: &str) {
        match std::fs::read_to_string(path) {
            Ok(source) => self.eval_and_print(&source),
            Err(e) => print_error(&Error::Io(format!("Failed to read {}: {}", path, e))),
        }
    }

    fn eval_and_print(&mut self, input: &str) {
        match self.session.eval(&mut self.engine, input) {
            Ok(values) => {
                for value in values {
                    println!("{}", value.yellow());
                }
            }
            Err(e) => print_error(&e),
        }
    }
}

/// Result of executing a REPL command
enum CommandResult {
    Continue,
    Exit,
}

/// Print a formatted error message
fn print_error(error: &Error) {
    let error_str = error.to_string();

    // Split the location and kind from the message
    if let Some(colon_pos) = error_str.rfind(": ") {
        let (error_type, message) = error_str.split_at(colon_pos);
        eprintln!("{}{}", error_type.red().bold(), message);
    } else {
        eprintln!("{}", error_str.red());
    }
}
