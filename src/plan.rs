//! `Plan`: the topologically sorted result of planning (`spec.md` §3.6).

use crate::binding::ElementKind;
use crate::functoid::Functoid;
use crate::key::Key;

/// One surviving element of a resolved collection binding: the Planner has
/// already dropped any weak elements that failed to resolve
/// (`spec.md` §4.2.4 point 7).
#[derive(Clone, Debug)]
pub struct ResolvedElement {
    pub element_key: Key,
    pub inner: ElementKind,
    pub weak: bool,
}

/// The binding selected (or accumulated) for one [`Key`] by the Planner.
#[derive(Clone, Debug)]
pub enum ResolvedBinding {
    Instance(crate::functoid::BoxedValue),
    Class(Functoid),
    Factory(Functoid),
    Alias(Key),
    Set(Vec<ResolvedElement>),
    AssistedFactory {
        functoid: Functoid,
        runtime_params: Vec<String>,
    },
}

impl ResolvedBinding {
    pub fn is_async(&self) -> bool {
        match self {
            ResolvedBinding::Factory(f) | ResolvedBinding::Class(f) => f.is_async(),
            ResolvedBinding::AssistedFactory { functoid, .. } => functoid.is_async(),
            ResolvedBinding::Set(elements) => elements.iter().any(|e| match &e.inner {
                ElementKind::Class(f) | ElementKind::Factory(f) => f.is_async(),
                ElementKind::Instance(_) => false,
            }),
            ResolvedBinding::Instance(_) | ResolvedBinding::Alias(_) => false,
        }
    }
}

/// `(Key, resolved-binding-or-list, list of Key dependencies)`
/// (`spec.md` §3.6).
#[derive(Clone, Debug)]
pub struct PlanStep {
    pub key: Key,
    pub resolved: ResolvedBinding,
    pub dependencies: Vec<Key>,
}

/// An ordered list of [`PlanStep`]s together with the set of roots
/// (`spec.md` §3.6). Topologically sorted: every step's dependencies appear
/// strictly earlier in the list, or are served by the parent `Locator`.
#[derive(Clone, Debug, Default)]
pub struct Plan {
    pub roots: Vec<Key>,
    pub steps: Vec<PlanStep>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, key: &Key) -> Option<&PlanStep> {
        self.steps.iter().find(|s| &s.key == key)
    }

    /// `true` if any step's binding involves an async [`Functoid`] — the
    /// signal `Injector` uses to pick sync vs. async production
    /// (`spec.md` §4.6).
    pub fn has_async_steps(&self) -> bool {
        self.steps.iter().any(|s| s.resolved.is_async())
    }
}
