//! Errors raised while constructing targets and generating their rules.

use thiserror::Error;

/// Coarse classification of a [`TargetError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// Malformed or unsafe path: `..`, absolute where relative is required.
  Path,
  /// Dependency, visibility or option string breaks the declaration grammar.
  Format,
  /// Missing or invalid target name.
  Name,
  /// Two targets own the same source file and the policy is `error`.
  OwnershipConflict,
  /// Broken internal invariant, a bug in a target kind rather than in a build file.
  InternalConsistency,
}

/// Errors that can occur while declaring a target or generating its rules.
///
/// All of them are fatal to the evaluation of the build description: a
/// malformed declaration cannot produce a usable target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
  #[error("invalid target \"{0}\" starting from root path")]
  RootPath(String),

  #[error("invalid source file path: {0}. can only be relative path, and must in current directory or subdirectories")]
  InvalidSource(String),

  #[error("duplicate source file paths: {0:?}")]
  DuplicateSources(Vec<String>),

  #[error("don't use '..' in path \"{0}\"")]
  ParentReference(String),

  #[error("invalid format {0}")]
  InvalidFormat(String),

  #[error("invalid format {0}, missing ',' between labels?")]
  MultipleSeparators(String),

  #[error("wrong dependency format \"{0}\", expected \"path:name\"")]
  MissingSeparator(String),

  #[error("unknown target type \"{0}\"")]
  UnknownType(String),

  #[error("unrecognized options {0:?}")]
  UnrecognizedOptions(Vec<String>),

  #[error("invalid option \"{option}\": {message}")]
  InvalidOption { option: String, message: String },

  #[error("missing \"name\"")]
  MissingName,

  #[error("invalid target name \"{0}\", should not contain dir part")]
  InvalidName(String),

  #[error("\"{src}\" is already in srcs of \"{owner}\"")]
  OwnershipConflict { src: String, owner: String },

  #[error("dependency \"{dep}\" of \"{target}\" is not registered")]
  UnknownDependency { target: String, dep: String },

  #[error("unstable rule hash entropy: {0}")]
  UnstableEntropy(String),

  #[error("dependency cycle through \"{0}\"")]
  Cycle(String),

  #[error("\"{dep}\" has no output labeled \"{label}\"")]
  MissingArtifact { dep: String, label: String },
}

impl TargetError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      TargetError::RootPath(_)
      | TargetError::InvalidSource(_)
      | TargetError::DuplicateSources(_)
      | TargetError::ParentReference(_) => ErrorKind::Path,
      TargetError::InvalidFormat(_)
      | TargetError::MultipleSeparators(_)
      | TargetError::MissingSeparator(_)
      | TargetError::UnknownType(_)
      | TargetError::UnrecognizedOptions(_)
      | TargetError::InvalidOption { .. }
      | TargetError::MissingArtifact { .. } => ErrorKind::Format,
      TargetError::MissingName | TargetError::InvalidName(_) => ErrorKind::Name,
      TargetError::OwnershipConflict { .. } => ErrorKind::OwnershipConflict,
      TargetError::UnknownDependency { .. } | TargetError::UnstableEntropy(_) | TargetError::Cycle(_) => {
        ErrorKind::InternalConsistency
      }
    }
  }
}
