//! Dependency-graph evaluation of locals and datasources.

use std::collections::{BTreeSet, HashMap, HashSet};

use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use rayon::prelude::*;
use tracing::{debug, info};

use super::{
  EvalInput, Evaluation, EvaluationStrategy, Outcome, cancelled_diagnostic, check_references, run_datasource, run_local,
};
use crate::config::Config;
use crate::diagnostics::{Diagnostic, DiagnosticKind, SharedDiagnostics};
use crate::expr::{Reference, body_references};

/// A graph over locals and datasources. Edges point from a dependency to its
/// dependents.
#[derive(Debug)]
pub struct EvaluationDag {
  graph: DiGraph<Reference, ()>,
  nodes: HashMap<Reference, NodeIndex>,
}

impl EvaluationDag {
  /// Build a graph from nodes and their references. References to things
  /// that are not nodes (variables, `path`, undeclared names) add no edges.
  pub fn new(nodes: Vec<(Reference, Vec<Reference>)>) -> Self {
    let mut graph = DiGraph::new();
    let mut indices = HashMap::new();

    for (node, _) in &nodes {
      let idx = graph.add_node(node.clone());
      indices.insert(node.clone(), idx);
    }

    for (node, deps) in &nodes {
      let dependent_idx = indices[node];
      for dep in deps {
        if let Some(&dep_idx) = indices.get(dep) {
          graph.add_edge(dep_idx, dependent_idx, ());
        }
      }
    }

    Self { graph, nodes: indices }
  }

  /// Locals and datasources of `config`, optionally restricted to datasources.
  pub fn from_config(config: &Config, datasources_only: bool) -> Self {
    let mut nodes: Vec<(Reference, Vec<Reference>)> = config
      .datasources
      .values()
      .map(|def| (def.reference(), body_references(&def.body)))
      .collect();
    if !datasources_only {
      nodes.extend(config.locals.values().map(|def| (def.reference(), def.expr.references())));
    }
    Self::new(nodes)
  }

  pub fn len(&self) -> usize {
    self.graph.node_count()
  }

  pub fn is_empty(&self) -> bool {
    self.graph.node_count() == 0
  }

  /// Every dependency cycle, each sorted, in a stable order.
  pub fn cycles(&self) -> Vec<Vec<Reference>> {
    let mut cycles: Vec<Vec<Reference>> = tarjan_scc(&self.graph)
      .into_iter()
      .filter(|scc| scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]))
      .map(|scc| {
        let mut members: Vec<Reference> = scc.into_iter().map(|idx| self.graph[idx].clone()).collect();
        members.sort();
        members
      })
      .collect();
    cycles.sort();
    cycles
  }

  /// Nodes grouped into waves: every node's dependencies are in earlier
  /// waves. Nodes on or behind a cycle are left out.
  pub fn waves(&self) -> Vec<Vec<Reference>> {
    let mut in_degree: HashMap<NodeIndex, usize> = self
      .graph
      .node_indices()
      .map(|idx| (idx, self.graph.neighbors_directed(idx, Direction::Incoming).count()))
      .collect();
    let mut remaining: HashSet<NodeIndex> = self.graph.node_indices().collect();
    let mut waves = Vec::new();

    while !remaining.is_empty() {
      let ready: Vec<NodeIndex> = remaining.iter().filter(|&&idx| in_degree[&idx] == 0).copied().collect();
      if ready.is_empty() {
        break;
      }

      for &idx in &ready {
        remaining.remove(&idx);
        for neighbor in self.graph.neighbors_directed(idx, Direction::Outgoing) {
          if let Some(deg) = in_degree.get_mut(&neighbor) {
            *deg = deg.saturating_sub(1);
          }
        }
      }

      let mut wave: Vec<Reference> = ready.into_iter().map(|idx| self.graph[idx].clone()).collect();
      wave.sort();
      waves.push(wave);
    }
    waves
  }

  /// Direct dependencies of `node` within the graph.
  pub fn dependencies(&self, node: &Reference) -> Vec<Reference> {
    let Some(&idx) = self.nodes.get(node) else {
      return Vec::new();
    };
    self
      .graph
      .neighbors_directed(idx, Direction::Incoming)
      .map(|dep| self.graph[dep].clone())
      .collect()
  }
}

pub(crate) fn cycle_diagnostic(cycle: &[Reference]) -> Diagnostic {
  let names: Vec<String> = cycle.iter().map(ToString::to_string).collect();
  Diagnostic::error(DiagnosticKind::Evaluation, "Dependency cycle")
    .with_detail(format!("these values depend on each other: {}", names.join(", ")))
}

/// Evaluates locals and datasources together, wave by wave. Nodes within a
/// wave are independent and run in parallel.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphStrategy;

impl EvaluationStrategy for GraphStrategy {
  fn name(&self) -> &'static str {
    "graph"
  }

  fn evaluate(&self, input: &EvalInput<'_>) -> Evaluation {
    let config = input.config;
    let diags = SharedDiagnostics::new();
    let mut ctx = input.base_context();

    let dag = EvaluationDag::from_config(config, false);
    let cycles = dag.cycles();
    if !cycles.is_empty() {
      for cycle in &cycles {
        diags.push(cycle_diagnostic(cycle));
      }
      return Evaluation {
        context: ctx,
        complete: false,
        diagnostics: diags.into_diagnostics(),
      };
    }

    // nodes without a value; dependents of these are skipped
    let mut failed: BTreeSet<Reference> = BTreeSet::new();
    for def in config.datasources.values() {
      let owner = def.reference();
      if !check_references(config, &body_references(&def.body), &owner, &def.subject, &diags) {
        failed.insert(owner);
      }
    }
    for def in config.locals.values() {
      let owner = def.reference();
      if !check_references(config, &def.expr.references(), &owner, &def.subject, &diags) {
        failed.insert(owner);
      }
    }

    let waves = dag.waves();
    info!(nodes = dag.len(), waves = waves.len(), "evaluating dependency graph");

    let mut evaluated = 0;
    let mut stopped = false;
    for (wave_idx, wave) in waves.iter().enumerate() {
      let ready: Vec<&Reference> = wave
        .iter()
        .filter(|node| {
          !failed.contains(*node) && dag.dependencies(node).iter().all(|dep| !failed.contains(dep))
        })
        .collect();
      for node in wave {
        if !ready.contains(&node) {
          failed.insert(node.clone());
        }
      }
      debug!(wave = wave_idx, nodes = ready.len(), "evaluating wave");

      let snapshot = &ctx;
      let results: Vec<(&Reference, Outcome)> = ready
        .par_iter()
        .map(|node| {
          let outcome = match node {
            Reference::Local(name) => match config.local(name) {
              Some(def) => run_local(def, snapshot, &diags),
              None => Outcome::Failed,
            },
            Reference::Data { kind, name } => match config.datasource(kind, name) {
              Some(def) => run_datasource(def, snapshot, input, &diags),
              None => Outcome::Failed,
            },
            _ => Outcome::Failed,
          };
          (*node, outcome)
        })
        .collect();

      let mut cancelled = false;
      for (node, outcome) in results {
        match outcome {
          Outcome::Done(value) => {
            evaluated += 1;
            match node {
              Reference::Local(name) => ctx.insert_local(name.clone(), value),
              Reference::Data { kind, name } => ctx.insert_data(kind.clone(), name.clone(), value),
              _ => {}
            }
          }
          Outcome::Failed => {
            failed.insert(node.clone());
          }
          Outcome::Fatal => {
            failed.insert(node.clone());
            stopped = true;
          }
          Outcome::Cancelled => cancelled = true,
        }
      }

      if cancelled {
        diags.push(cancelled_diagnostic(dag.len().saturating_sub(evaluated + failed.len())));
        stopped = true;
      }
      if stopped {
        break;
      }
    }

    let complete = !stopped && evaluated == dag.len();
    info!(evaluated, failed = failed.len(), complete, "graph evaluation finished");
    Evaluation {
      context: ctx,
      complete,
      diagnostics: diags.into_diagnostics(),
    }
  }
}
