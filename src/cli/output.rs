//! Shared CLI output helpers for consistent operator-facing text.

use std::fmt::Display;

use owo_colors::{OwoColorize, Stream};

const RULE_WIDTH: usize = 56;

/// Print the application header with name and version.
pub fn header(version: &str) {
    println!();
    println!(
        "{} {}",
        "rentsync".if_supports_color(Stream::Stdout, |t| t.bold()),
        version.if_supports_color(Stream::Stdout, |t| t.dimmed())
    );
}

/// Print a section header and separator.
pub fn section(title: &str) {
    println!();
    println!("{}", title.if_supports_color(Stream::Stdout, |t| t.bold()));
    println!("{}", "─".repeat(RULE_WIDTH));
}

/// Print a simple key/value line.
pub fn key_value(label: &str, value: impl Display) {
    println!("  {label:<22} {value}");
}

pub fn ok(message: &str) {
    println!("{} {message}", "✓".if_supports_color(Stream::Stdout, |t| t.green()));
}

pub fn warn(message: &str) {
    println!("{} {message}", "⚠".if_supports_color(Stream::Stdout, |t| t.yellow()));
}

pub fn error(message: &str) {
    eprintln!("{} {message}", "✗".if_supports_color(Stream::Stderr, |t| t.red()));
}

/// Print a rendered table indented under the current section.
pub fn table(rendered: &str) {
    for line in rendered.lines() {
        println!("  {line}");
    }
}

/// Emphasize a command or value inline.
#[must_use]
pub fn highlight(text: &str) -> String {
    text.if_supports_color(Stream::Stdout, |t| t.cyan()).to_string()
}
