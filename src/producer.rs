//! The Producer (`spec.md` §4.3): executes a [`crate::plan::Plan`] into a
//! [`crate::locator::Locator`], synchronously or with cooperative async
//! parallelism.

use std::sync::Arc;

use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use smallvec::SmallVec;

use crate::error::ProduceError;
use crate::functoid::BoxedValue;
use crate::key::Key;
use crate::locator::Locator;
use crate::plan::{Plan, PlanStep, ResolvedBinding};

/// Execute every step of `plan` in order, writing each result into a fresh
/// [`Locator`] layered on top of `parent` (`spec.md` §4.3.1). Fails fast on
/// the first step that cannot be produced.
#[tracing::instrument(skip_all, fields(steps = plan.steps.len()))]
pub fn produce(plan: &Plan, parent: Option<&Locator>) -> Result<Locator, ProduceError> {
    let locator = match parent {
        Some(parent) => parent.create_subcontext(),
        None => Locator::new(),
    };
    for step in &plan.steps {
        produce_step(step, &locator)?;
    }
    Ok(locator)
}

fn produce_step(step: &PlanStep, locator: &Locator) -> Result<(), ProduceError> {
    match &step.resolved {
        ResolvedBinding::Instance(value) => locator.insert_scalar(step.key.clone(), value.clone()),
        ResolvedBinding::Alias(target) => {
            let value = locator
                .find(target)
                .ok_or_else(|| ProduceError::InstanceNotFound(target.clone()))?;
            locator.insert_scalar(step.key.clone(), value);
        }
        ResolvedBinding::Class(functoid) | ResolvedBinding::Factory(functoid) => {
            let args = gather_args(&step.dependencies, locator)?;
            let value = functoid
                .invoke_sync(&args)
                .map_err(|source| ProduceError::ProducerFailure {
                    key: step.key.clone(),
                    source: source.into(),
                })?;
            locator.insert_scalar(step.key.clone(), value);
        }
        ResolvedBinding::AssistedFactory { functoid, runtime_params } => {
            let curried = assisted_factory_value(step.key.clone(), functoid.clone(), runtime_params.clone(), locator.clone());
            locator.insert_scalar(step.key.clone(), curried);
        }
        ResolvedBinding::Set(elements) => {
            let mut values = Vec::with_capacity(elements.len());
            for element in elements {
                let value = match &element.inner {
                    crate::binding::ElementKind::Instance(value) => value.clone(),
                    crate::binding::ElementKind::Class(f) | crate::binding::ElementKind::Factory(f) => {
                        let args = gather_args(f.dependencies(), locator)?;
                        f.invoke_sync(&args).map_err(|source| ProduceError::ProducerFailure {
                            key: element.element_key.clone(),
                            source: source.into(),
                        })?
                    }
                };
                values.push(value);
            }
            locator.insert_set(step.key.clone(), values);
        }
    }
    tracing::trace!(key = %step.key, "constructed");
    Ok(())
}

fn gather_args(dependencies: &[Key], locator: &Locator) -> Result<Vec<BoxedValue>, ProduceError> {
    dependencies
        .iter()
        .map(|key| locator.find(key).ok_or_else(|| ProduceError::InstanceNotFound(key.clone())))
        .collect()
}

/// Wrap an `AssistedFactory` binding into the curried `Fn(runtime args) ->
/// value` value callers actually store and invoke (`spec.md` §9, open
/// question 3: DI'd tail dependencies are re-resolved against `locator` on
/// every call, since it is already the final, fully produced Locator by the
/// time anything can call the factory).
fn assisted_factory_value(
    key: Key,
    functoid: crate::functoid::Functoid,
    runtime_params: Vec<String>,
    locator: Locator,
) -> BoxedValue {
    Arc::new(AssistedFactory {
        key,
        functoid,
        runtime_params,
        locator,
    })
}

/// A curried factory handed back through [`Locator::get`]: calling it
/// resolves the declared dependencies afresh against the final Locator,
/// then invokes the wrapped [`crate::functoid::Functoid`] with those
/// prepended to the caller-supplied runtime arguments.
pub struct AssistedFactory {
    pub key: Key,
    pub functoid: crate::functoid::Functoid,
    pub runtime_params: Vec<String>,
    pub locator: Locator,
}

impl AssistedFactory {
    /// Call the factory, concatenating `runtime_args` with a fresh
    /// resolution of the trailing DI'd deps (`spec.md` §4.3.1), failing if
    /// any declared dependency cannot be found.
    pub fn call(&self, runtime_args: &[BoxedValue]) -> Result<BoxedValue, ProduceError> {
        let mut args: Vec<BoxedValue> = runtime_args.to_vec();
        args.extend(gather_args(self.functoid.dependencies(), &self.locator)?);
        self.functoid
            .invoke_sync(&args)
            .map_err(|source| ProduceError::ProducerFailure {
                key: self.key.clone(),
                source: source.into(),
            })
    }
}

/// Execute `plan` with cooperative async parallelism (`spec.md` §4.3.2):
/// steps whose dependencies are already satisfied run concurrently in a
/// [`FuturesUnordered`]; a step's construction doesn't block a sibling that
/// shares no dependency with it.
#[tracing::instrument(skip_all, fields(steps = plan.steps.len()))]
pub async fn produce_async(plan: &Plan, parent: Option<&Locator>) -> Result<Locator, ProduceError> {
    let locator = match parent {
        Some(parent) => parent.create_subcontext(),
        None => Locator::new(),
    };

    let mut completed: ahash::HashSet<Key> = ahash::HashSet::default();
    let mut remaining: Vec<&PlanStep> = plan.steps.iter().collect();
    let mut in_flight = FuturesUnordered::new();

    loop {
        let mut still_remaining = Vec::with_capacity(remaining.len());
        for step in remaining {
            // A dependency can be satisfied either by a step this call just
            // finished, or by a Key the Planner resolved straight out of
            // `parent_locator` without adding a step for it at all (`spec.md`
            // §4.2.4 step 3, §4.3.2 step 1(b)/(c)) — `locator` already falls
            // through to its parent, so `has` sees both.
            if step.dependencies.iter().all(|d| completed.contains(d) || locator.has(d)) {
                in_flight.push(produce_step_async(step, locator.clone()));
            } else {
                still_remaining.push(step);
            }
        }
        remaining = still_remaining;

        if in_flight.is_empty() {
            break;
        }
        match in_flight.next().await {
            Some(result) => {
                let key = result?;
                completed.insert(key);
            }
            None => break,
        }
    }

    if !remaining.is_empty() {
        // Every step whose dependencies never completed is itself missing a
        // dependency that isn't in this plan — the Planner guarantees this
        // never happens, so it's an internal invariant violation rather
        // than a user-reachable error path.
        unreachable!("produce_async: steps left with unsatisfied dependencies after all futures drained");
    }

    Ok(locator)
}

async fn produce_step_async(step: &PlanStep, locator: Locator) -> Result<Key, ProduceError> {
    match &step.resolved {
        ResolvedBinding::Class(functoid) | ResolvedBinding::Factory(functoid) if functoid.is_async() => {
            let args: SmallVec<[BoxedValue; 4]> = gather_args(&step.dependencies, &locator)?.into();
            let value = functoid
                .invoke_async(args)
                .await
                .map_err(|source| ProduceError::ProducerFailure {
                    key: step.key.clone(),
                    source: source.into(),
                })?;
            locator.insert_scalar(step.key.clone(), value);
        }
        ResolvedBinding::Set(elements) if step.resolved.is_async() => {
            let mut values = Vec::with_capacity(elements.len());
            for element in elements {
                let value = match &element.inner {
                    crate::binding::ElementKind::Instance(value) => value.clone(),
                    crate::binding::ElementKind::Factory(f) if f.is_async() => {
                        let args: SmallVec<[BoxedValue; 4]> = gather_args(f.dependencies(), &locator)?.into();
                        f.invoke_async(args).await.map_err(|source| ProduceError::ProducerFailure {
                            key: element.element_key.clone(),
                            source: source.into(),
                        })?
                    }
                    crate::binding::ElementKind::Class(f) | crate::binding::ElementKind::Factory(f) => {
                        let args = gather_args(f.dependencies(), &locator)?;
                        f.invoke_sync(&args).map_err(|source| ProduceError::ProducerFailure {
                            key: element.element_key.clone(),
                            source: source.into(),
                        })?
                    }
                };
                values.push(value);
            }
            locator.insert_set(step.key.clone(), values);
        }
        _ => {
            produce_step(step, &locator)?;
            return Ok(step.key.clone());
        }
    }
    tracing::trace!(key = %step.key, "constructed");
    Ok(step.key.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Binding;
    use crate::functoid::Functoid;
    use crate::module::Module;
    use crate::planner;

    #[test]
    fn sync_production_shares_one_singleton_instance() {
        let config = Key::of::<i64>();
        let database = Key::named::<i64>("db");
        let module = Module::new()
            .add_binding(Binding::instance(config.clone(), Arc::new(7i64)))
            .add_binding(Binding::class(
                database.clone(),
                Functoid::from_fn(vec![config.clone()], |args| Ok(args[0].clone())),
            ));
        let plan = planner::plan(&module, vec![database.clone()], crate::axis::Activation::empty(), None).unwrap();
        let locator = produce(&plan, None).unwrap();
        assert_eq!(*locator.get::<i64>(&database).unwrap(), 7);
    }

    #[test]
    fn missing_instance_surfaces_as_produce_error() {
        let plan = Plan {
            roots: vec![],
            steps: vec![PlanStep {
                key: Key::named::<i64>("orphan"),
                resolved: ResolvedBinding::Alias(Key::named::<i64>("nowhere")),
                dependencies: vec![],
            }],
        };
        let err = produce(&plan, None).unwrap_err();
        assert!(matches!(err, ProduceError::InstanceNotFound(_)));
    }

    #[tokio::test]
    async fn async_production_runs_independent_steps_concurrently() {
        // S6 (spec.md §8): two independent async factories with no shared
        // dependency should both complete even though neither depends on
        // the other finishing first.
        let a = Key::named::<i64>("a");
        let b = Key::named::<i64>("b");
        let module = Module::new()
            .add_binding(Binding::factory(
                a.clone(),
                Functoid::from_async_fn(vec![], |_args| async { Ok(Arc::new(1i64) as BoxedValue) }),
            ))
            .add_binding(Binding::factory(
                b.clone(),
                Functoid::from_async_fn(vec![], |_args| async { Ok(Arc::new(2i64) as BoxedValue) }),
            ));
        let plan = planner::plan(&module, vec![a.clone(), b.clone()], crate::axis::Activation::empty(), None).unwrap();
        let locator = produce_async(&plan, None).await.unwrap();
        assert_eq!(*locator.get::<i64>(&a).unwrap(), 1);
        assert_eq!(*locator.get::<i64>(&b).unwrap(), 2);
    }

    #[tokio::test]
    async fn async_production_respects_dependency_order() {
        let base = Key::named::<i64>("base");
        let derived = Key::named::<i64>("derived");
        let module = Module::new()
            .add_binding(Binding::factory(
                base.clone(),
                Functoid::from_async_fn(vec![], |_args| async { Ok(Arc::new(10i64) as BoxedValue) }),
            ))
            .add_binding(Binding::factory(
                derived.clone(),
                Functoid::from_async_fn(vec![base.clone()], |args| async move {
                    Ok(Arc::new(*args[0].downcast_ref::<i64>().unwrap() + 5) as BoxedValue)
                }),
            ));
        let plan = planner::plan(&module, vec![derived.clone()], crate::axis::Activation::empty(), None).unwrap();
        let locator = produce_async(&plan, None).await.unwrap();
        assert_eq!(*locator.get::<i64>(&derived).unwrap(), 15);
    }
}
