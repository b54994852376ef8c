//! The Planner (`spec.md` §4.2) — the core of the crate.
//!
//! Resolves bindings against an [`Activation`] using path-aware axis
//! tracing, accumulates collection bindings, detects cycles and missing
//! dependencies, and produces a topologically ordered [`Plan`].
//!
//! Grounded on `pavexc`'s dependency-graph machinery
//! (`compiler/pavexc/src/compiler/analyses/user_components/scope_graph.rs`)
//! for the `petgraph`-backed cycle/ordering plumbing; the path-aware
//! selection rule itself (`spec.md` §4.2.2–§4.2.3) has no direct teacher
//! analog and is built from the spec's contract alone.

use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};
use indexmap::IndexMap;
use itertools::Itertools;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::axis::{Activation, PathActivation};
use crate::binding::{Binding, BindingKind};
use crate::error::PlanError;
use crate::key::Key;
use crate::locator::Locator;
use crate::module::Module;
use crate::plan::{Plan, PlanStep, ResolvedBinding, ResolvedElement};

/// Build the `Plan` that resolves `roots` against `module` under
/// `activation`, optionally layered on top of `parent` (`spec.md` §4.2).
#[tracing::instrument(skip(module, parent), fields(roots = roots.len()))]
pub fn plan(
    module: &Module,
    roots: Vec<Key>,
    activation: Activation,
    parent: Option<&Locator>,
) -> Result<Plan, PlanError> {
    let mut planner = Planner::new(module, activation, parent);
    for root in &roots {
        let mut path = Vec::new();
        planner.resolve_key(root, &mut path, &PathActivation::new())?;
    }
    let steps = planner.into_sorted_steps()?;
    Ok(Plan { roots, steps })
}

struct Planner<'m> {
    index: HashMap<Key, Vec<&'m Binding>>,
    base_activation: Activation,
    parent: Option<&'m Locator>,
    visiting: HashSet<Key>,
    visited: HashSet<Key>,
    steps: IndexMap<Key, PlanStep>,
}

impl<'m> Planner<'m> {
    fn new(module: &'m Module, base_activation: Activation, parent: Option<&'m Locator>) -> Self {
        // §4.2.1: group all bindings by Key, no activation filtering yet.
        let mut index: HashMap<Key, Vec<&'m Binding>> = HashMap::new();
        for binding in module.bindings() {
            index.entry(binding.key.clone()).or_default().push(binding);
        }
        Self {
            index,
            base_activation,
            parent,
            visiting: HashSet::new(),
            visited: HashSet::new(),
            steps: IndexMap::new(),
        }
    }

    fn resolve_key(&mut self, key: &Key, path: &mut Vec<Key>, pact: &PathActivation) -> Result<(), PlanError> {
        if self.visited.contains(key) {
            return Ok(());
        }
        if self.visiting.contains(key) {
            let mut cycle = path.clone();
            cycle.push(key.clone());
            return Err(PlanError::circular_dependency(cycle));
        }

        let candidates = self.index.get(key).cloned().unwrap_or_default();
        if candidates.is_empty() {
            if let Some(parent) = self.parent {
                if parent.has(key) {
                    self.visited.insert(key.clone());
                    return Ok(());
                }
            }
            let dependent = path.last().cloned();
            return Err(PlanError::missing_dependency(key.clone(), dependent, path.clone()));
        }

        let valid: Vec<&'m Binding> = candidates
            .iter()
            .copied()
            .filter(|b| b.tags.matches_activation(&self.base_activation) && pact.allows(&b.tags))
            .collect();

        if valid.is_empty() {
            let dependent = path.last().cloned();
            // Was there a candidate that matched the base activation but
            // tripped over a path constraint? That's an AxisConflict;
            // otherwise it's a plain MissingDependency (§4.2.3).
            let conflict = candidates
                .iter()
                .filter(|b| b.tags.matches_activation(&self.base_activation))
                .find_map(|b| pact.describe_conflict(&b.tags));
            return match conflict {
                Some(constraint) => Err(PlanError::axis_conflict(key.clone(), dependent, constraint, path.clone())),
                None => Err(PlanError::missing_dependency(key.clone(), dependent, path.clone())),
            };
        }

        let all_set = valid.iter().all(|b| b.is_set_element());
        let any_set = valid.iter().any(|b| b.is_set_element());
        if any_set && !all_set {
            // SPEC_FULL.md §3, open question 2: a Key left with both a set
            // and a non-set binding (e.g. after a careless `overridden_by`)
            // can never be compared for specificity — it's a conflict.
            return Err(PlanError::conflicting_bindings(
                key.clone(),
                valid.iter().map(|b| b.key.clone()).collect(),
            ));
        }

        self.visiting.insert(key.clone());
        path.push(key.clone());
        let outcome = if all_set {
            self.resolve_set_elements(key, &valid, path, pact)
        } else {
            match select_most_specific(&valid) {
                Ok(binding) => self.resolve_scalar(key, binding, path, pact),
                Err(e) => Err(e),
            }
        };
        path.pop();
        self.visiting.remove(key);
        if outcome.is_ok() {
            self.visited.insert(key.clone());
        }
        outcome
    }

    fn resolve_scalar(
        &mut self,
        key: &Key,
        binding: &'m Binding,
        path: &mut Vec<Key>,
        pact: &PathActivation,
    ) -> Result<(), PlanError> {
        let next_pact = pact.constrained_by(&binding.tags);
        let dependencies: Vec<Key> = match &binding.kind {
            BindingKind::Instance(_) => vec![],
            BindingKind::Class(f) | BindingKind::Factory(f) => f.dependencies().to_vec(),
            BindingKind::Alias(target) => vec![target.clone()],
            BindingKind::AssistedFactory { .. } => vec![],
            BindingKind::SetElement { .. } => unreachable!("scalar resolution never sees a SetElement"),
        };
        for dep in &dependencies {
            self.resolve_key(dep, path, &next_pact)?;
        }
        let resolved = match &binding.kind {
            BindingKind::Instance(value) => ResolvedBinding::Instance(value.clone()),
            BindingKind::Class(f) => ResolvedBinding::Class(f.clone()),
            BindingKind::Factory(f) => ResolvedBinding::Factory(f.clone()),
            BindingKind::Alias(target) => ResolvedBinding::Alias(target.clone()),
            BindingKind::AssistedFactory { functoid, runtime_params } => ResolvedBinding::AssistedFactory {
                functoid: functoid.clone(),
                runtime_params: runtime_params.clone(),
            },
            BindingKind::SetElement { .. } => unreachable!(),
        };
        tracing::debug!(%key, "selected binding");
        self.steps.insert(
            key.clone(),
            PlanStep {
                key: key.clone(),
                resolved,
                dependencies,
            },
        );
        Ok(())
    }

    fn resolve_set_elements(
        &mut self,
        key: &Key,
        valid: &[&'m Binding],
        path: &mut Vec<Key>,
        pact: &PathActivation,
    ) -> Result<(), PlanError> {
        let mut surviving = Vec::new();
        let mut all_dependencies: Vec<Key> = Vec::new();

        for binding in valid {
            let (element_key, inner, weak) = match &binding.kind {
                BindingKind::SetElement { element_key, inner, weak } => (element_key, inner, *weak),
                _ => unreachable!("resolve_set_elements only sees SetElement bindings"),
            };
            let next_pact = pact.constrained_by(&binding.tags);
            let dependencies = inner.dependencies().to_vec();
            let mut element_path = path.clone();
            let attempt: Result<(), PlanError> = (|| {
                for dep in &dependencies {
                    self.resolve_key(dep, &mut element_path, &next_pact)?;
                }
                Ok(())
            })();

            match attempt {
                Ok(()) => {
                    all_dependencies.extend(dependencies);
                    surviving.push(ResolvedElement {
                        element_key: element_key.clone(),
                        inner: inner.clone(),
                        weak,
                    });
                }
                Err(e @ (PlanError::MissingDependency { .. } | PlanError::AxisConflict { .. })) if weak => {
                    tracing::debug!(%key, element = %element_key, error = %e, "dropping weak set element");
                }
                Err(e) => return Err(e),
            }
        }

        let all_dependencies: Vec<Key> = all_dependencies.into_iter().unique().collect();

        tracing::debug!(%key, elements = surviving.len(), "accumulated set");
        self.steps.insert(
            key.clone(),
            PlanStep {
                key: key.clone(),
                resolved: ResolvedBinding::Set(surviving),
                dependencies: all_dependencies,
            },
        );
        Ok(())
    }

    /// §4.2.6: an explicit second topological sort over the collected steps,
    /// since set-accumulation can add steps out of DFS post-order.
    fn into_sorted_steps(self) -> Result<Vec<PlanStep>, PlanError> {
        let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
        for index in 0..self.steps.len() {
            graph.add_node(index);
        }
        for (index, step) in self.steps.values().enumerate() {
            for dep in &step.dependencies {
                if let Some(dep_index) = self.steps.get_index_of(dep) {
                    graph.add_edge(dep_index, index, ());
                }
            }
        }
        let order = toposort(&graph, None).map_err(|cycle| {
            let key = self.steps.get_index(cycle.node_id()).map(|(k, _)| k.clone());
            PlanError::circular_dependency(key.into_iter().collect())
        })?;

        let mut values: Vec<Option<PlanStep>> = self.steps.into_values().map(Some).collect();
        Ok(order
            .into_iter()
            .map(|index| values[index].take().expect("each index visited once"))
            .collect())
    }
}

fn select_most_specific<'m>(valid: &[&'m Binding]) -> Result<&'m Binding, PlanError> {
    let max_specificity = valid.iter().map(|b| b.tags.specificity()).max().unwrap_or(0);
    let most_specific: Vec<&'m Binding> = valid
        .iter()
        .copied()
        .filter(|b| b.tags.specificity() == max_specificity)
        .collect();
    if most_specific.len() == 1 {
        Ok(most_specific[0])
    } else {
        Err(PlanError::conflicting_bindings(
            most_specific[0].key.clone(),
            most_specific.iter().map(|b| b.key.clone()).collect(),
        ))
    }
}
