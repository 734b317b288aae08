//! Build statement emission and generated artifact tracking.
//!
//! Rule generation runs once per target, inside [`Target::get_rules`]. The
//! kind writes build statements through a [`RuleCtx`]; the context collects
//! the text, the clean list and the labeled artifacts, which are then frozen
//! into an immutable [`GeneratedRules`] shared by every later caller.
//!
//! # Statement format
//!
//! ```text
//! build <outputs>[ | <implicit outputs>]: <rule>[ <inputs>][ | <implicit deps>][ || <order-only deps>]
//!   <name> = <value>
//!
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError};
use std::thread::{self, ThreadId};

use tracing::{debug, trace};

use super::{Target, TargetError, TargetFile};
use crate::key::TargetKey;
use crate::location::{self, Resolver};
use crate::registry::Registry;
use crate::util::lock;
use crate::util::path::{join, normpath};

// ============================================================================
// Path arguments
// ============================================================================

/// Anything usable as a list of paths in a build statement.
pub trait IntoPaths {
  fn into_paths(self) -> Vec<String>;
}

impl IntoPaths for &str {
  fn into_paths(self) -> Vec<String> {
    vec![self.to_string()]
  }
}

impl IntoPaths for String {
  fn into_paths(self) -> Vec<String> {
    vec![self]
  }
}

impl IntoPaths for &String {
  fn into_paths(self) -> Vec<String> {
    vec![self.clone()]
  }
}

impl<S: Into<String>> IntoPaths for Vec<S> {
  fn into_paths(self) -> Vec<String> {
    self.into_iter().map(Into::into).collect()
  }
}

impl<S: AsRef<str>> IntoPaths for &[S] {
  fn into_paths(self) -> Vec<String> {
    self.iter().map(|s| s.as_ref().to_string()).collect()
  }
}

impl<S: Into<String>, const N: usize> IntoPaths for [S; N] {
  fn into_paths(self) -> Vec<String> {
    self.into_iter().map(Into::into).collect()
  }
}

impl<T: IntoPaths> IntoPaths for Option<T> {
  fn into_paths(self) -> Vec<String> {
    self.map(IntoPaths::into_paths).unwrap_or_default()
  }
}

// ============================================================================
// BuildStatement
// ============================================================================

/// One low-level build statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStatement {
  rule: String,
  outputs: Vec<String>,
  implicit_outputs: Vec<String>,
  inputs: Vec<String>,
  implicit_deps: Vec<String>,
  order_only_deps: Vec<String>,
  variables: Vec<(String, String)>,
  clean: Option<Vec<String>>,
}

impl BuildStatement {
  pub fn new(rule: impl Into<String>, outputs: impl IntoPaths) -> Self {
    Self {
      rule: rule.into(),
      outputs: outputs.into_paths(),
      ..Self::default()
    }
  }

  pub fn inputs(mut self, inputs: impl IntoPaths) -> Self {
    self.inputs = inputs.into_paths();
    self
  }

  pub fn implicit_deps(mut self, deps: impl IntoPaths) -> Self {
    self.implicit_deps = deps.into_paths();
    self
  }

  pub fn order_only_deps(mut self, deps: impl IntoPaths) -> Self {
    self.order_only_deps = deps.into_paths();
    self
  }

  pub fn implicit_outputs(mut self, outputs: impl IntoPaths) -> Self {
    self.implicit_outputs = outputs.into_paths();
    self
  }

  /// Add a variable assignment. An empty value still emits `name =`.
  pub fn variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.variables.push((name.into(), value.into()));
    self
  }

  /// Override the paths removed on clean. An empty list removes nothing.
  pub fn clean(mut self, paths: impl IntoPaths) -> Self {
    self.clean = Some(paths.into_paths());
    self
  }

  /// Paths registered on the clean list when this statement is emitted.
  pub fn clean_paths(&self) -> Vec<String> {
    match &self.clean {
      Some(paths) => paths.clone(),
      None => self.outputs.iter().chain(&self.implicit_outputs).cloned().collect(),
    }
  }

  /// Render the statement, its variables and a trailing blank line.
  pub fn render(&self) -> Vec<String> {
    let mut head = format!("build {}", self.outputs.join(" "));
    if !self.implicit_outputs.is_empty() {
      head.push_str(" | ");
      head.push_str(&self.implicit_outputs.join(" "));
    }
    head.push_str(": ");
    head.push_str(&self.rule);
    if !self.inputs.is_empty() {
      head.push(' ');
      head.push_str(&self.inputs.join(" "));
    }
    if !self.implicit_deps.is_empty() {
      head.push_str(" | ");
      head.push_str(&self.implicit_deps.join(" "));
    }
    if !self.order_only_deps.is_empty() {
      head.push_str(" || ");
      head.push_str(&self.order_only_deps.join(" "));
    }

    let mut lines = vec![head];
    for (name, value) in &self.variables {
      if value.is_empty() {
        lines.push(format!("  {name} ="));
      } else {
        lines.push(format!("  {name} = {value}"));
      }
    }
    lines.push(String::new());
    lines
  }
}

// ============================================================================
// GeneratedRules
// ============================================================================

/// Frozen output of one target's rule generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedRules {
  records: Vec<String>,
  clean_list: Vec<String>,
  target_files: BTreeMap<String, TargetFile>,
  default_target: Option<TargetFile>,
}

impl GeneratedRules {
  /// Emitted lines, in emission order.
  pub fn records(&self) -> &[String] {
    &self.records
  }

  pub fn clean_list(&self) -> &[String] {
    &self.clean_list
  }

  pub fn target_files(&self) -> &BTreeMap<String, TargetFile> {
    &self.target_files
  }

  pub fn default_target(&self) -> Option<&TargetFile> {
    self.default_target.as_ref()
  }

  /// The records as one newline terminated text block.
  pub fn text(&self) -> String {
    let mut text = String::new();
    for line in &self.records {
      text.push_str(line);
      text.push('\n');
    }
    text
  }
}

// ============================================================================
// RuleCtx
// ============================================================================

/// Emission context handed to [`super::TargetKind::generate`].
pub struct RuleCtx<'a> {
  target: &'a Target,
  registry: &'a dyn Registry,
  rules: GeneratedRules,
}

impl<'a> RuleCtx<'a> {
  fn new(target: &'a Target, registry: &'a dyn Registry) -> Self {
    Self {
      target,
      registry,
      rules: GeneratedRules::default(),
    }
  }

  pub fn registry(&self) -> &'a dyn Registry {
    self.registry
  }

  /// Emit a build statement and register its clean paths.
  pub fn ninja_build(&mut self, statement: BuildStatement) {
    trace!(key = %self.target.key(), rule = %statement.rule, "emitting build statement");
    self.remove_on_clean(statement.clean_paths());
    self.rules.records.extend(statement.render());
  }

  /// Emit raw text, one record per line.
  pub fn write_rule(&mut self, text: &str) {
    self.rules.records.extend(text.lines().map(str::to_string));
  }

  pub fn remove_on_clean(&mut self, paths: impl IntoPaths) {
    self.rules.clean_list.extend(paths.into_paths());
  }

  /// Record a labeled artifact. The first artifact becomes the default.
  pub fn add_target_file(&mut self, label: impl Into<String>, file: impl Into<TargetFile>) {
    let file = file.into();
    if self.rules.default_target.is_none() {
      self.rules.default_target = Some(file.clone());
    }
    self.rules.target_files.insert(label.into(), file);
  }

  /// Record a labeled artifact and make it the default.
  pub fn add_default_target_file(&mut self, label: impl Into<String>, file: impl Into<TargetFile>) {
    let file = file.into();
    self.rules.default_target = Some(file.clone());
    self.rules.target_files.insert(label.into(), file);
  }

  /// Path of a source file relative to the source root.
  pub fn source_file_path(&self, src: &str) -> String {
    normpath(&join(self.target.path(), src))
  }

  /// Path of a generated file of this target, under the build directory.
  pub fn target_file_path(&self, file: &str) -> String {
    normpath(&join(&join(self.registry.build_dir(), self.target.path()), file))
  }

  /// Strip the build directory from a generated path.
  pub fn remove_build_dir_prefix(&self, path: &str) -> String {
    let build_dir = self.registry.build_dir();
    match path.strip_prefix(build_dir) {
      Some(rest) if rest.starts_with('/') => rest[1..].to_string(),
      _ => path.to_string(),
    }
  }

  /// Substitute every location reference of `text` with the artifact path.
  ///
  /// Referenced targets are generated on demand.
  pub fn expand_locations(&self, text: &str) -> Result<String, TargetError> {
    let resolver = RegistryResolver {
      target: self.target,
      registry: self.registry,
    };
    Ok(location::resolve_references(text, self.target.path(), &resolver)?.text)
  }

  /// Default artifacts of every expanded dependency that has one.
  pub fn dep_target_files(&self) -> Result<Vec<String>, TargetError> {
    let mut files = Vec::new();
    for key in self.target.expanded_deps() {
      let dep = lookup_dep(self.target, key, self.registry)?;
      if let Some(file) = dep.get_target_file("", self.registry)? {
        for path in file.paths() {
          if !files.iter().any(|f| f == path) {
            files.push(path.to_string());
          }
        }
      }
    }
    Ok(files)
  }

  fn finish(self) -> GeneratedRules {
    self.rules
  }
}

fn lookup_dep(target: &Target, key: &TargetKey, registry: &dyn Registry) -> Result<Arc<Target>, TargetError> {
  registry.lookup(key).ok_or_else(|| TargetError::UnknownDependency {
    target: target.fullname().to_string(),
    dep: key.to_string(),
  })
}

struct RegistryResolver<'a> {
  target: &'a Target,
  registry: &'a dyn Registry,
}

impl Resolver for RegistryResolver<'_> {
  fn resolve_location(&self, key: &TargetKey, output_type: &str) -> Result<String, TargetError> {
    let dep = lookup_dep(self.target, key, self.registry)?;
    match dep.get_target_file(output_type, self.registry)? {
      Some(file) => Ok(file.joined()),
      None => Err(TargetError::MissingArtifact {
        dep: dep.fullname().to_string(),
        label: output_type.to_string(),
      }),
    }
  }
}

// ============================================================================
// Generation state
// ============================================================================

#[derive(Debug)]
pub(super) enum Generation {
  Pending,
  Running(ThreadId),
  Done(Arc<GeneratedRules>),
}

impl Target {
  /// Generated rules of this target. The kind's generation runs at most once;
  /// later calls, from any thread, share the first result.
  ///
  /// # Errors
  ///
  /// Generation errors are returned and leave the target ungenerated.
  /// Re-entering generation of the same target on one thread is reported as
  /// [`TargetError::Cycle`].
  pub fn get_rules(&self, registry: &dyn Registry) -> Result<Arc<GeneratedRules>, TargetError> {
    let me = thread::current().id();
    let mut state = lock(&self.generation);
    loop {
      let owner = match &*state {
        Generation::Done(rules) => return Ok(Arc::clone(rules)),
        Generation::Running(owner) => *owner,
        Generation::Pending => break,
      };
      if owner == me {
        return Err(TargetError::Cycle(self.fullname.clone()));
      }
      state = self
        .generation_done
        .wait(state)
        .unwrap_or_else(PoisonError::into_inner);
    }
    *state = Generation::Running(me);
    drop(state);

    let result = self.generate_rules(registry);

    let mut state = lock(&self.generation);
    *state = match &result {
      Ok(rules) => Generation::Done(Arc::clone(rules)),
      Err(_) => Generation::Pending,
    };
    drop(state);
    self.generation_done.notify_all();

    if let Err(e) = &result {
      self.error(&e.to_string());
    }
    result
  }

  fn generate_rules(&self, registry: &dyn Registry) -> Result<Arc<GeneratedRules>, TargetError> {
    let mut ctx = RuleCtx::new(self, registry);
    self.kind.generate(self, &mut ctx)?;
    let rules = ctx.finish();
    debug!(key = %self.key, records = rules.records.len(), "generated rules");
    Ok(Arc::new(rules))
  }

  /// Artifact labeled `label`, or the default artifact for an empty label.
  pub fn get_target_file(&self, label: &str, registry: &dyn Registry) -> Result<Option<TargetFile>, TargetError> {
    let rules = self.get_rules(registry)?;
    let file = if label.is_empty() {
      rules.default_target.clone()
    } else {
      rules.target_files.get(label).cloned()
    };
    Ok(file)
  }

  /// Every generated artifact path, sorted and without repeats.
  pub fn get_target_files(&self, registry: &dyn Registry) -> Result<Vec<String>, TargetError> {
    let rules = self.get_rules(registry)?;
    let mut files: Vec<String> = rules
      .target_files
      .values()
      .chain(&rules.default_target)
      .flat_map(|file| file.paths().into_iter().map(str::to_string))
      .collect();
    files.sort();
    files.dedup();
    Ok(files)
  }

  pub fn get_clean_list(&self, registry: &dyn Registry) -> Result<Vec<String>, TargetError> {
    Ok(self.get_rules(registry)?.clean_list.clone())
  }
}
