//! Lexical path helpers.
//!
//! Target keys and ninja paths always use `/` as separator, independent of the
//! host platform, so these helpers work on strings instead of [`std::path::Path`].
//! Nothing here touches the file system.

/// Normalize a path lexically, collapsing `.`, `..` and redundant separators.
///
/// Follows POSIX `normpath` semantics: leading `..` components of a relative
/// path are kept, `..` directly under the root is dropped, and an empty result
/// becomes `.`.
///
/// ```
/// use buildgen_lib::util::path::normpath;
///
/// assert_eq!(normpath("a//b/./c/../d"), "a/b/d");
/// assert_eq!(normpath(""), ".");
/// assert_eq!(normpath("../x"), "../x");
/// ```
pub fn normpath(path: &str) -> String {
  let absolute = path.starts_with('/');
  let mut parts: Vec<&str> = Vec::new();

  for component in path.split('/') {
    match component {
      "" | "." => {}
      ".." => {
        if parts.last().is_some_and(|last| *last != "..") {
          parts.pop();
        } else if !absolute {
          parts.push("..");
        }
      }
      other => parts.push(other),
    }
  }

  let joined = parts.join("/");
  match (absolute, joined.is_empty()) {
    (true, _) => format!("/{joined}"),
    (false, true) => ".".to_string(),
    (false, false) => joined,
  }
}

/// Join two path fragments with `/`, treating `.` as the empty prefix.
///
/// An absolute `tail` replaces `base`, like [`std::path::Path::join`].
pub fn join(base: &str, tail: &str) -> String {
  if tail.starts_with('/') || base.is_empty() || base == "." {
    return tail.to_string();
  }
  if tail.is_empty() {
    return base.to_string();
  }
  if base.ends_with('/') {
    format!("{base}{tail}")
  } else {
    format!("{base}/{tail}")
  }
}
