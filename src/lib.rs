//! A staged dependency-injection container: plan, validate, and produce a
//! graph of singletons from declarative bindings.
//!
//! The pieces compose roughly as:
//! [`key`] identifies what's being resolved, [`axis`] and [`binding`]
//! describe how a binding is staged for a particular activation,
//! [`module`] composes bindings into a buildable unit, [`planner`]
//! resolves a [`module::Module`] into a [`plan::Plan`], [`producer`] runs
//! a plan into a [`locator::Locator`], and [`injector`] ties all of that
//! into the façade most callers reach for.

pub mod axis;
pub mod binding;
pub mod error;
pub mod functoid;
pub mod injector;
pub mod key;
pub mod locator;
pub mod module;
pub mod plan;
pub mod planner;
pub mod producer;

pub use axis::{Activation, Axis, AxisError, AxisPoint, BindingTags, PathActivation};
pub use binding::{Binding, BindingKind, ElementKind};
pub use error::{AggregateCleanupError, PlanError, ProduceError};
pub use functoid::{BoxedValue, Functoid, FunctoidError};
pub use injector::{Injector, ProduceOptions};
pub use key::{Key, KeyId, Primitive, Token, TypeTag};
pub use locator::{Locator, Subcontext};
pub use module::Module;
pub use plan::{Plan, PlanStep, ResolvedBinding, ResolvedElement};
pub use producer::AssistedFactory;
