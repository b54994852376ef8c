//! The error taxonomy (`spec.md` §7).
//!
//! Every kind carries enough data to render a precise dependency path from a
//! root, the same way `pavexc`'s diagnostics point at a registration site —
//! minus the source-span machinery, since this crate never parses or
//! generates source code (see `DESIGN.md`).

use crate::key::Key;

fn render_path(path: &[Key]) -> String {
    path.iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn render_dependent(dependent: &Option<Key>) -> String {
    match dependent {
        Some(d) => format!(", required by `{d}`"),
        None => String::new(),
    }
}

/// Planning-time failures (`spec.md` §7). The Planner never partially
/// commits: any one of these aborts the current `plan`/`produce` call.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("missing dependency `{missing}`{dependent_suffix}")]
    MissingDependency {
        missing: Key,
        dependent: Option<Key>,
        dependent_suffix: String,
        path: Vec<Key>,
    },
    #[error("circular dependency: {rendered}")]
    CircularDependency { cycle: Vec<Key>, rendered: String },
    #[error("conflicting bindings for `{key}`: {candidate_count} equally specific candidates")]
    ConflictingBindings {
        key: Key,
        candidates: Vec<Key>,
        candidate_count: usize,
    },
    #[error("axis conflict resolving `{missing}`{dependent_suffix}: {constraint}")]
    AxisConflict {
        missing: Key,
        dependent: Option<Key>,
        dependent_suffix: String,
        constraint: String,
        path: Vec<Key>,
    },
}

impl PlanError {
    pub fn missing_dependency(missing: Key, dependent: Option<Key>, path: Vec<Key>) -> Self {
        let dependent_suffix = render_dependent(&dependent);
        PlanError::MissingDependency {
            missing,
            dependent,
            dependent_suffix,
            path,
        }
    }

    pub fn circular_dependency(cycle: Vec<Key>) -> Self {
        let rendered = render_path(&cycle);
        PlanError::CircularDependency { cycle, rendered }
    }

    pub fn conflicting_bindings(key: Key, candidates: Vec<Key>) -> Self {
        let candidate_count = candidates.len();
        PlanError::ConflictingBindings {
            key,
            candidates,
            candidate_count,
        }
    }

    pub fn axis_conflict(missing: Key, dependent: Option<Key>, constraint: String, path: Vec<Key>) -> Self {
        let dependent_suffix = render_dependent(&dependent);
        PlanError::AxisConflict {
            missing,
            dependent,
            dependent_suffix,
            constraint,
            path,
        }
    }

    /// A full `root -> ... -> offending key` rendering, for user-facing
    /// diagnostics (`spec.md` §7: "errors carry precise Keys and ... a
    /// dependency path from a root").
    pub fn render_trace(&self) -> String {
        match self {
            PlanError::MissingDependency { path, missing, .. } => {
                format!("{} -> {missing}", render_path(path))
            }
            PlanError::CircularDependency { rendered, .. } => rendered.clone(),
            PlanError::ConflictingBindings { key, .. } => key.to_string(),
            PlanError::AxisConflict { path, missing, .. } => {
                format!("{} -> {missing}", render_path(path))
            }
        }
    }
}

/// Runtime (production-time) failures (`spec.md` §7).
#[derive(Debug, thiserror::Error)]
pub enum ProduceError {
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Functoid(#[from] crate::functoid::FunctoidError),
    #[error("no instance found for `{0}`")]
    InstanceNotFound(Key),
    #[error("plan contains async steps; call produce_async instead of produce")]
    AsyncStepsNeedAsyncProducer,
    #[error("construction of `{key}` failed: {source}")]
    ProducerFailure {
        key: Key,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    AggregateCleanup(#[from] AggregateCleanupError),
}

/// Errors collected while releasing resources in `Locator::close`
/// (`spec.md` §7). Errors during release are collected; they don't stop the
/// rest of the release from being attempted (`spec.md` §5).
#[derive(Debug, thiserror::Error)]
#[error("{error_count} error(s) during close")]
pub struct AggregateCleanupError {
    pub errors: Vec<anyhow::Error>,
    pub error_count: usize,
}

impl AggregateCleanupError {
    pub fn new(errors: Vec<anyhow::Error>) -> Self {
        let error_count = errors.len();
        Self { errors, error_count }
    }
}
