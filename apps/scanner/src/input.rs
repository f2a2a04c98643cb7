//! Console line parsing for interactive mode.
//!
//! Terminals paste dragged files as space-separated paths, quoted or with
//! backslash-escaped spaces. Several paths on one line are a drop payload.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Status,
    Cancel,
    Quit,
    Help,
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleLine {
    Empty,
    Command(ConsoleCommand),
    Paths(Vec<PathBuf>),
}

pub fn parse_console_line(line: &str) -> ConsoleLine {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ConsoleLine::Empty;
    }

    if let Some(command) = trimmed.strip_prefix(':') {
        let command = match command.trim().to_ascii_lowercase().as_str() {
            "status" | "s" => ConsoleCommand::Status,
            "cancel" | "c" => ConsoleCommand::Cancel,
            "quit" | "q" | "exit" => ConsoleCommand::Quit,
            "help" | "h" | "?" => ConsoleCommand::Help,
            other => ConsoleCommand::Unknown(other.to_string()),
        };
        return ConsoleLine::Command(command);
    }

    let paths = split_pasted_paths(trimmed);
    if paths.is_empty() {
        ConsoleLine::Empty
    } else {
        ConsoleLine::Paths(paths)
    }
}

pub fn split_pasted_paths(line: &str) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_token = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match (quote, ch) {
            (Some(open), c) if c == open => quote = None,
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(ch);
                in_token = true;
            }
            // Only escapes that a terminal would emit; keeps `C:\data\scan.bin` intact.
            (None, '\\') if chars.peek().is_some_and(|&next| is_escapable(next)) => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                in_token = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_token {
                    paths.push(PathBuf::from(std::mem::take(&mut current)));
                    in_token = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if in_token {
        paths.push(PathBuf::from(current));
    }
    paths
}

fn is_escapable(ch: char) -> bool {
    ch.is_whitespace() || matches!(ch, '\'' | '"' | '\\')
}
