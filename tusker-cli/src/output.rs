//! Styled terminal output utilities.
//!
//! Everything except [`sql`] goes to stderr so that `tusker diff > file.sql`
//! captures only SQL.

use owo_colors::OwoColorize;

/// Print generated SQL verbatim to stdout
pub fn sql(text: &str) {
    print!("{}", text);
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a success message
pub fn success(text: &str) {
    eprintln!("{} {}", "✔".green().bold(), text.green());
}

/// Print an info message
pub fn info(text: &str) {
    eprintln!("{} {}", "ℹ".blue().bold(), text);
}

/// Print an error message
pub fn error(text: &str) {
    eprintln!("{} {}", "✖".red().bold(), text.red());
}

/// Print a list item
pub fn list_item(text: &str) {
    eprintln!("  {} {}", "•".dimmed(), text);
}
