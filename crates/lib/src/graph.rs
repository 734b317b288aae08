//! Dependency graph over selected targets.
//!
//! The graph holds the targets matched by the command line patterns plus
//! everything they transitively depend on, with edges from each dependency
//! to its dependents. It is validated (acyclic, visibility respected) before
//! any hash is computed, so targets can rely on their dependencies being
//! registered and cycle free.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use crate::key::{TargetKey, matches};
use crate::registry::Registry;
use crate::target::{TargetError, Visibility};
use crate::util::hash::ContentHash;

#[derive(Debug, Error)]
pub enum GraphError {
  #[error("no targets match \"{0}\"")]
  NoMatch(String),

  #[error("\"{dep}\" depended on by \"{target}\" is not defined")]
  UnknownDependency { target: String, dep: String },

  #[error("dependency cycle detected through \"{0}\"")]
  Cycle(String),

  #[error("\"{dep}\" is not visible to \"{target}\"")]
  NotVisible { target: String, dep: String },

  #[error(transparent)]
  Target(#[from] TargetError),
}

/// Targets matching any of `patterns`, sorted.
///
/// # Errors
///
/// Returns [`GraphError::NoMatch`] for a pattern matching no registered target.
pub fn select(registry: &dyn Registry, patterns: &[TargetKey]) -> Result<Vec<TargetKey>, GraphError> {
  let keys = registry.keys();
  for pattern in patterns {
    if !keys.iter().any(|key| matches(key, pattern)) {
      return Err(GraphError::NoMatch(pattern.to_string()));
    }
  }
  Ok(
    keys
      .into_iter()
      .filter(|key| patterns.iter().any(|pattern| matches(key, pattern)))
      .collect(),
  )
}

/// The selected targets and their transitive dependencies.
#[derive(Debug)]
pub struct TargetGraph {
  graph: DiGraph<TargetKey, ()>,
  nodes: HashMap<TargetKey, NodeIndex>,
  selected: Vec<TargetKey>,
}

impl TargetGraph {
  /// Build the graph of `patterns` and everything they depend on.
  ///
  /// Dependencies follow `expanded_deps`, so location references and
  /// implicit libraries are part of the graph.
  pub fn build(registry: &dyn Registry, patterns: &[TargetKey]) -> Result<Self, GraphError> {
    let selected = select(registry, patterns)?;

    let mut graph = DiGraph::new();
    let mut nodes = HashMap::new();
    let mut queue: VecDeque<TargetKey> = selected.iter().cloned().collect();
    let mut edges = Vec::new();

    while let Some(key) = queue.pop_front() {
      if nodes.contains_key(&key) {
        continue;
      }
      let target = registry.lookup(&key).ok_or_else(|| GraphError::UnknownDependency {
        target: String::new(),
        dep: key.to_string(),
      })?;
      nodes.insert(key.clone(), graph.add_node(key.clone()));

      for dep in target.expanded_deps() {
        if !registry.contains(dep) {
          return Err(GraphError::UnknownDependency {
            target: target.fullname().to_string(),
            dep: dep.fullname(),
          });
        }
        edges.push((dep.clone(), key.clone()));
        queue.push_back(dep.clone());
      }
    }

    for (dep, dependent) in edges {
      graph.add_edge(nodes[&dep], nodes[&dependent], ());
    }

    debug!(
      selected = selected.len(),
      nodes = graph.node_count(),
      edges = graph.edge_count(),
      "built target graph"
    );
    Ok(Self { graph, nodes, selected })
  }

  /// Targets matched by the patterns.
  pub fn selected(&self) -> &[TargetKey] {
    &self.selected
  }

  /// Every target in the graph, sorted.
  pub fn keys(&self) -> Vec<TargetKey> {
    let mut keys: Vec<TargetKey> = self.nodes.keys().cloned().collect();
    keys.sort();
    keys
  }

  /// Direct dependencies of `key` within the graph, sorted.
  pub fn dependencies(&self, key: &TargetKey) -> Vec<TargetKey> {
    let Some(&idx) = self.nodes.get(key) else {
      return Vec::new();
    };
    let mut deps: Vec<TargetKey> = self
      .graph
      .neighbors_directed(idx, Direction::Incoming)
      .map(|dep| self.graph[dep].clone())
      .collect();
    deps.sort();
    deps.dedup();
    deps
  }

  /// Group targets into waves; every dependency of a wave is in an earlier one.
  pub fn waves(&self) -> Result<Vec<Vec<TargetKey>>, GraphError> {
    let mut in_degree: HashMap<NodeIndex, usize> = self
      .graph
      .node_indices()
      .map(|idx| (idx, self.graph.neighbors_directed(idx, Direction::Incoming).count()))
      .collect();
    let mut remaining: HashSet<NodeIndex> = self.graph.node_indices().collect();
    let mut waves = Vec::new();

    while !remaining.is_empty() {
      let ready: Vec<NodeIndex> = remaining.iter().filter(|idx| in_degree[idx] == 0).copied().collect();
      if ready.is_empty() {
        let stuck = remaining.iter().map(|&idx| &self.graph[idx]).min().map(TargetKey::fullname);
        return Err(GraphError::Cycle(stuck.unwrap_or_default()));
      }

      for &idx in &ready {
        remaining.remove(&idx);
        for dependent in self.graph.neighbors_directed(idx, Direction::Outgoing) {
          if let Some(degree) = in_degree.get_mut(&dependent) {
            *degree = degree.saturating_sub(1);
          }
        }
      }

      let mut wave: Vec<TargetKey> = ready.into_iter().map(|idx| self.graph[idx].clone()).collect();
      wave.sort();
      waves.push(wave);
    }

    Ok(waves)
  }

  /// Check every declared dependency against the dependency's visibility.
  ///
  /// Targets in the same directory always see each other.
  pub fn check_visibility(&self, registry: &dyn Registry) -> Result<(), GraphError> {
    for key in self.keys() {
      let Some(target) = registry.lookup(&key) else {
        continue;
      };
      for dep_key in target.deps() {
        let Some(dep) = registry.lookup(dep_key) else {
          continue;
        };
        if dep.path() == target.path() {
          continue;
        }
        if let Visibility::Only(allowed) = dep.visibility()
          && !allowed.iter().any(|pattern| matches(target.key(), pattern))
        {
          return Err(GraphError::NotVisible {
            target: target.fullname().to_string(),
            dep: dep.fullname().to_string(),
          });
        }
      }
    }
    Ok(())
  }

  /// Compute the rule hash of every target in the graph.
  ///
  /// Waves are processed in order and the targets of one wave in parallel, so
  /// each dependency hash is already memoized when a dependent needs it.
  pub fn compute_hashes(&self, registry: &dyn Registry) -> Result<BTreeMap<TargetKey, ContentHash>, GraphError> {
    let mut hashes = BTreeMap::new();
    for wave in self.waves()? {
      let computed: Vec<(TargetKey, ContentHash)> = wave
        .par_iter()
        .map(|key| {
          let target = registry.lookup(key).ok_or_else(|| GraphError::UnknownDependency {
            target: String::new(),
            dep: key.to_string(),
          })?;
          Ok((key.clone(), target.rule_hash(registry)?))
        })
        .collect::<Result<_, GraphError>>()?;
      hashes.extend(computed);
    }
    info!(targets = hashes.len(), "computed rule hashes");
    Ok(hashes)
  }
}
