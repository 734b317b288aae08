//! Location references inside string attributes.
//!
//! A location reference names the build output of another target:
//!
//! - `$(location //path:name)` - the default output of `//path:name`
//! - `$(location //path:name jar)` - the output labeled `jar`
//!
//! Such a string is both a dependency declaration and a template: the target
//! declaring it must depend on the referenced target, and at rule generation
//! time the macro is replaced by the referenced artifact path.
//!
//! Text that does not form a complete reference (no `:` in the key, no
//! closing parenthesis) passes through unchanged, so substituting a string
//! that already holds plain paths is a no-op.
//!
//! # Example
//!
//! ```
//! use buildgen_lib::location::{parse, LocationRef, Segment};
//!
//! let segments = parse("javac -cp $(location //lib:base jar) Main.java");
//! assert_eq!(segments, vec![
//!     Segment::Literal("javac -cp ".to_string()),
//!     Segment::Location(LocationRef { key: "//lib:base".to_string(), output_type: "jar".to_string() }),
//!     Segment::Literal(" Main.java".to_string()),
//! ]);
//! ```

use crate::key::{TargetKey, unify_dep};
use crate::target::TargetError;

const MACRO_PREFIX: &str = "$(location";

/// A parsed `$(location ...)` reference, key not yet unified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationRef {
  /// The dependency reference as written, e.g. `//path:name` or `:name`.
  pub key: String,
  /// Requested output label, empty for the default output.
  pub output_type: String,
}

/// A segment of parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text (no references)
  Literal(String),

  /// A location reference to be resolved
  Location(LocationRef),
}

/// Trait for looking up referenced artifacts during substitution.
pub trait Resolver {
  /// Resolve the artifact path(s) of `key` labeled `output_type` (empty for
  /// the default artifact), already joined into a single string.
  fn resolve_location(&self, key: &TargetKey, output_type: &str) -> Result<String, TargetError>;
}

/// Result of [`resolve_references`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
  /// Text with every reference substituted.
  pub text: String,
  /// Referenced `(key, output_type)` pairs in first-occurrence order, without repeats.
  pub edges: Vec<(TargetKey, String)>,
}

/// Split a string into literal text and location references.
pub fn parse(input: &str) -> Vec<Segment> {
  let mut segments = Vec::new();
  let mut literal_start = 0;
  let mut search_from = 0;

  while let Some(offset) = input[search_from..].find(MACRO_PREFIX) {
    let start = search_from + offset;
    match match_reference(input, start + MACRO_PREFIX.len()) {
      Some((reference, end)) => {
        if start > literal_start {
          segments.push(Segment::Literal(input[literal_start..start].to_string()));
        }
        segments.push(Segment::Location(reference));
        literal_start = end;
        search_from = end;
      }
      // Not a reference, keep scanning after the `$`
      None => search_from = start + 1,
    }
  }

  if literal_start < input.len() {
    segments.push(Segment::Literal(input[literal_start..].to_string()));
  }

  segments
}

/// All location references of `input`, in order of appearance.
pub fn references(input: &str) -> Vec<LocationRef> {
  parse(input)
    .into_iter()
    .filter_map(|segment| match segment {
      Segment::Location(reference) => Some(reference),
      Segment::Literal(_) => None,
    })
    .collect()
}

/// Substitute every reference of `input`, unifying keys against `base_dir`.
///
/// # Errors
///
/// Returns an error if a referenced key is malformed or the resolver cannot
/// provide the requested artifact.
pub fn resolve_references(input: &str, base_dir: &str, resolver: &impl Resolver) -> Result<Resolved, TargetError> {
  let mut text = String::new();
  let mut edges: Vec<(TargetKey, String)> = Vec::new();

  for segment in parse(input) {
    match segment {
      Segment::Literal(s) => text.push_str(&s),
      Segment::Location(reference) => {
        let key = unify_dep(base_dir, &reference.key)?;
        text.push_str(&resolver.resolve_location(&key, &reference.output_type)?);
        let edge = (key, reference.output_type);
        if !edges.contains(&edge) {
          edges.push(edge);
        }
      }
    }
  }

  Ok(Resolved { text, edges })
}

/// Match `\s+(\S*:\S+)(\s+\w*)?\)` starting at byte `pos`.
///
/// Returns the reference and the byte offset just past the closing `)`.
fn match_reference(input: &str, pos: usize) -> Option<(LocationRef, usize)> {
  let rest = &input[pos..];
  let key_offset = rest.find(|c: char| !c.is_whitespace())?;
  if key_offset == 0 {
    return None;
  }

  let key_start = pos + key_offset;
  let token_len = input[key_start..]
    .find(char::is_whitespace)
    .unwrap_or(input.len() - key_start);
  let token = &input[key_start..key_start + token_len];

  // The key may swallow `)` characters, so try the longest candidate first
  // and back off, the way a greedy regex would.
  let ends: Vec<usize> = token.char_indices().map(|(i, c)| i + c.len_utf8()).collect();
  for &end in ends.iter().rev() {
    let key = &token[..end];
    if !is_key_shaped(key) {
      continue;
    }
    if let Some((output_type, close)) = match_tail(input, key_start + end) {
      let reference = LocationRef {
        key: key.to_string(),
        output_type,
      };
      return Some((reference, close));
    }
  }

  None
}

/// A key needs a `:` followed by at least one more character.
fn is_key_shaped(key: &str) -> bool {
  key.find(':').is_some_and(|colon| colon + 1 < key.len())
}

/// Match the optional output type and the closing `)`.
fn match_tail(input: &str, pos: usize) -> Option<(String, usize)> {
  let rest = &input[pos..];
  let ws = rest.len() - rest.trim_start().len();

  if ws > 0 {
    let after = &rest[ws..];
    let word_len = after
      .find(|c: char| !(c.is_alphanumeric() || c == '_'))
      .unwrap_or(after.len());
    if after[word_len..].starts_with(')') {
      return Some((after[..word_len].to_string(), pos + ws + word_len + 1));
    }
    return None;
  }

  rest.starts_with(')').then(|| (String::new(), pos + 1))
}
