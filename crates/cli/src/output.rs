//! Terminal rendering for buildgen commands.
//!
//! Row formatters return plain strings so the layout is testable; the
//! `print_*` wrappers add color when the stream supports it.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

const OK: &str = "✓";
const FAILED: &str = "✗";
const NOTE: &str = "•";
const EDGE: &str = "→";

/// Hex digits of a rule hash shown in progress rows.
const SHORT_HASH_LEN: usize = 12;

// ============================================================================
// Row formatters
// ============================================================================

/// `  → //dir:name 0123456789ab` for a rewritten ninja file.
pub fn written_row(fullname: &str, hash: &str) -> String {
  let short = hash.get(..SHORT_HASH_LEN).unwrap_or(hash);
  format!("  {EDGE} {fullname} {short}")
}

/// `    → //dir:name` for one expanded dependency, marked when implicit.
pub fn dependency_row(fullname: &str, implicit: bool) -> String {
  let marker = if implicit { " (implicit)" } else { "" };
  format!("    {EDGE} {fullname}{marker}")
}

/// `//dir:name (type)` heading of a queried target.
pub fn target_heading(fullname: &str, type_name: &str) -> String {
  format!("{fullname} ({type_name})")
}

/// Milliseconds below one second, seconds with two decimals above.
pub fn elapsed(duration: Duration) -> String {
  if duration < Duration::from_secs(1) {
    format!("{}ms", duration.as_millis())
  } else {
    format!("{:.2}s", duration.as_secs_f64())
  }
}

/// Counters reported at the end of `gen`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenSummary {
  pub targets: usize,
  pub written: usize,
  pub unchanged: usize,
  pub elapsed: Duration,
}

impl GenSummary {
  pub fn fields(&self) -> [(&'static str, String); 4] {
    [
      ("Targets", self.targets.to_string()),
      ("Written", self.written.to_string()),
      ("Unchanged", self.unchanged.to_string()),
      ("Time", elapsed(self.elapsed)),
    ]
  }
}

// ============================================================================
// Printing
// ============================================================================

pub fn print_written(fullname: &str, hash: &str) {
  println!("{}", written_row(fullname, hash));
}

pub fn print_dependency(fullname: &str, implicit: bool) {
  let row = dependency_row(fullname, implicit);
  if implicit {
    println!("{}", row.if_supports_color(Stream::Stdout, |s| s.dimmed()));
  } else {
    println!("{row}");
  }
}

pub fn print_target_heading(fullname: &str, type_name: &str) {
  println!(
    "{} {}",
    NOTE.if_supports_color(Stream::Stdout, |s| s.blue()),
    target_heading(fullname, type_name)
  );
}

pub fn print_summary(headline: &str, summary: &GenSummary) {
  print_ok(headline);
  for (label, value) in summary.fields() {
    print_field(label, &value);
  }
}

pub fn print_ok(message: &str) {
  println!("{} {}", OK.if_supports_color(Stream::Stdout, |s| s.green()), message);
}

pub fn print_note(message: &str) {
  println!("{} {}", NOTE.if_supports_color(Stream::Stdout, |s| s.blue()), message);
}

pub fn print_field(label: &str, value: &str) {
  println!("  {}: {}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()), value);
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    FAILED.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize query output")?;
  println!("{json}");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  // ==========================================================================
  // Rows
  // ==========================================================================

  #[test]
  fn written_row_shortens_rule_hash() {
    let hash = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";
    assert_eq!(written_row("//app:version", hash), "  → //app:version 0123456789ab");
    assert_eq!(written_row("//a:b", "abc"), "  → //a:b abc");
  }

  #[test]
  fn dependency_row_marks_implicit_edges() {
    assert_eq!(dependency_row("//tools:stamp", false), "    → //tools:stamp");
    assert_eq!(dependency_row("//#:pthread", true), "    → //#:pthread (implicit)");
  }

  #[test]
  fn target_heading_names_type() {
    assert_eq!(target_heading("//app:version", "gen_rule"), "//app:version (gen_rule)");
  }

  // ==========================================================================
  // Summary
  // ==========================================================================

  #[test]
  fn elapsed_switches_to_seconds() {
    assert_eq!(elapsed(Duration::from_millis(7)), "7ms");
    assert_eq!(elapsed(Duration::from_millis(999)), "999ms");
    assert_eq!(elapsed(Duration::from_millis(1250)), "1.25s");
    assert_eq!(elapsed(Duration::from_secs(90)), "90.00s");
  }

  #[test]
  fn gen_summary_fields_in_report_order() {
    let summary = GenSummary {
      targets: 3,
      written: 1,
      unchanged: 2,
      elapsed: Duration::from_millis(40),
    };
    let fields = summary.fields();
    let labels: Vec<_> = fields.iter().map(|(label, _)| *label).collect();
    assert_eq!(labels, ["Targets", "Written", "Unchanged", "Time"]);
    assert_eq!(fields[1].1, "1");
    assert_eq!(fields[2].1, "2");
    assert_eq!(fields[3].1, "40ms");
  }
}
