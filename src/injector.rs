//! `Injector`: the façade tying `Module`, `Planner`, `Producer`, and
//! `Locator` together into the entry point most callers use (`spec.md`
//! §4.6).
//!
//! `spec.md` §4.6 is explicit that the Injector carries "no state beyond
//! its dependencies on Planner and Producer" — every call is given the
//! Module and [`ProduceOptions`] it needs rather than the Injector
//! remembering them between calls, so `Injector` here is a unit struct
//! exposing associated functions, not a builder holding a bound Module.

use crate::axis::Activation;
use crate::error::{PlanError, ProduceError};
use crate::key::Key;
use crate::locator::Locator;
use crate::module::Module;
use crate::plan::Plan;
use crate::{planner, producer};

/// The knobs a `plan`/`produce`/`produce_async` call accepts beyond the
/// Module and roots themselves (`spec.md` §6).
#[derive(Clone, Debug, Default)]
pub struct ProduceOptions {
    pub activation: Activation,
    pub auto_roots: bool,
    pub parent_locator: Option<Locator>,
}

impl ProduceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    /// When `true`, every distinct Key bound in the Module is treated as a
    /// root, in addition to whatever is passed explicitly (`spec.md` §6:
    /// "when true, all Keys in the module are roots").
    pub fn with_auto_roots(mut self, auto_roots: bool) -> Self {
        self.auto_roots = auto_roots;
        self
    }

    pub fn with_parent_locator(mut self, parent_locator: Locator) -> Self {
        self.parent_locator = Some(parent_locator);
        self
    }
}

fn effective_roots(module: &Module, roots: Vec<Key>, options: &ProduceOptions) -> Vec<Key> {
    if !options.auto_roots {
        return roots;
    }
    let mut seen = ahash::HashSet::default();
    let mut all_roots = Vec::new();
    for binding in module.bindings() {
        if seen.insert(binding.key.clone()) {
            all_roots.push(binding.key.clone());
        }
    }
    all_roots
}

/// The façade most callers reach for: plan and produce a [`Module`] against
/// a fixed activation, and open a [`Locator::create_subcontext`] layer on
/// top of an already-produced one (`spec.md` §4.6).
pub struct Injector;

impl Injector {
    /// Resolve `roots` into a topologically sorted [`Plan`] without
    /// producing anything (`spec.md` §4.2, §4.6).
    #[tracing::instrument(skip_all, fields(roots = roots.len()))]
    pub fn plan(module: &Module, roots: Vec<Key>, options: &ProduceOptions) -> Result<Plan, PlanError> {
        let roots = effective_roots(module, roots, options);
        planner::plan(module, roots, options.activation.clone(), options.parent_locator.as_ref())
    }

    /// Plan and synchronously produce `roots` (`spec.md` §4.3.1).
    ///
    /// `spec.md` §4.6 asks `produce` to auto-select sync or async execution
    /// depending on whether the Plan has async steps. Rust has no safe way
    /// to block on async work from an arbitrary sync caller, so a Plan with
    /// async steps is rejected here with [`ProduceError::AsyncStepsNeedAsyncProducer`]
    /// rather than silently driven to completion on some executor the
    /// caller never asked for — call [`Injector::produce_async`] instead.
    #[tracing::instrument(skip_all, fields(roots = roots.len()))]
    pub fn produce(module: &Module, roots: Vec<Key>, options: &ProduceOptions) -> Result<Locator, ProduceError> {
        let plan = Self::plan(module, roots, options)?;
        if plan.has_async_steps() {
            return Err(ProduceError::AsyncStepsNeedAsyncProducer);
        }
        producer::produce(&plan, options.parent_locator.as_ref())
    }

    /// Plan and produce `roots` with cooperative async parallelism
    /// (`spec.md` §4.3.2). Handles plans with a mix of sync and async steps.
    #[tracing::instrument(skip_all, fields(roots = roots.len()))]
    pub async fn produce_async(module: &Module, roots: Vec<Key>, options: &ProduceOptions) -> Result<Locator, ProduceError> {
        let plan = Self::plan(module, roots, options)?;
        producer::produce_async(&plan, options.parent_locator.as_ref()).await
    }

    /// Produce a single Key identified only by its type (`spec.md` §6:
    /// "convenience variants exist for... type-only... inputs").
    pub fn produce_type<T: 'static>(module: &Module, options: &ProduceOptions) -> Result<Locator, ProduceError> {
        Self::produce(module, vec![Key::of::<T>()], options)
    }

    /// Produce a single named Key identified only by its type and name
    /// (`spec.md` §6: "convenience variants exist for... named-type-only
    /// inputs").
    pub fn produce_named<T: 'static>(
        module: &Module,
        name: impl Into<String>,
        options: &ProduceOptions,
    ) -> Result<Locator, ProduceError> {
        Self::produce(module, vec![Key::named::<T>(name)], options)
    }

    /// Plan and produce `module` layered on top of `parent` (`spec.md` §4.4,
    /// §6). `module` is the child's own, standalone set of bindings — it is
    /// never merged with whatever Module produced `parent`; anything it
    /// doesn't rebind falls through to `parent` at lookup time instead.
    pub fn create_subcontext(
        parent: &Locator,
        module: &Module,
        roots: Vec<Key>,
        options: &ProduceOptions,
    ) -> Result<Locator, ProduceError> {
        let options = ProduceOptions {
            parent_locator: Some(parent.clone()),
            ..options.clone()
        };
        Self::produce(module, roots, &options)
    }
}
