//! The `Binding` ADT (`spec.md` §3.4).

use crate::axis::{AxisPoint, BindingTags};
use crate::functoid::{BoxedValue, Functoid};
use crate::key::Key;

/// The payload of a set-element's inner construction — always one of
/// Instance/Class/Factory (`spec.md` §3.4: "Set-element bindings ... inner
/// Instance/Class/Factory").
#[derive(Clone, Debug)]
pub enum ElementKind {
    Instance(BoxedValue),
    Class(Functoid),
    Factory(Functoid),
}

impl ElementKind {
    pub(crate) fn dependencies(&self) -> &[Key] {
        match self {
            ElementKind::Instance(_) => &[],
            ElementKind::Class(f) | ElementKind::Factory(f) => f.dependencies(),
        }
    }
}

/// The six binding variants fixed by `spec.md` §3.4 and §9 ("the six
/// variants in §3.4 are fixed").
#[derive(Clone, Debug)]
pub enum BindingKind {
    /// A pre-built value — identity binding.
    Instance(BoxedValue),
    /// Constructed via DI'd args through its [`Functoid`].
    Class(Functoid),
    /// Invoked with DI'd args through its (possibly async) [`Functoid`].
    Factory(Functoid),
    /// Forwards to another [`Key`]; cycles through aliases are detected as
    /// ordinary cycles.
    Alias(Key),
    /// Contributes one element to the set keyed by `set_of(element_key.tag)`.
    SetElement {
        element_key: Key,
        inner: ElementKind,
        weak: bool,
    },
    /// Produces a curried factory function: DI'd args are resolved fresh on
    /// every call, runtime args are supplied by the caller
    /// (`spec.md` §9, open question 3).
    AssistedFactory {
        functoid: Functoid,
        runtime_params: Vec<String>,
    },
}

impl BindingKind {
    pub fn is_set_element(&self) -> bool {
        matches!(self, BindingKind::SetElement { .. })
    }

    /// The dependency keys this binding's Functoid (if any) declares
    /// (`spec.md` §4.2.5) — `None` for kinds whose dependencies are
    /// discovered structurally (`Alias`, `SetElement`) or not at all
    /// (`Instance`, `AssistedFactory`).
    pub fn functoid_dependencies(&self) -> Option<&[Key]> {
        match self {
            BindingKind::Class(f) | BindingKind::Factory(f) => Some(f.dependencies()),
            _ => None,
        }
    }
}

/// One declaration of how to produce a value for a [`Key`], keyed by that
/// key and carrying [`BindingTags`] (`spec.md` §3.4).
#[derive(Clone, Debug)]
pub struct Binding {
    pub key: Key,
    pub tags: BindingTags,
    pub kind: BindingKind,
}

impl Binding {
    fn new(key: Key, kind: BindingKind) -> Self {
        Self {
            key,
            tags: BindingTags::none(),
            kind,
        }
    }

    pub fn instance(key: Key, value: BoxedValue) -> Self {
        Self::new(key, BindingKind::Instance(value))
    }

    pub fn class(key: Key, functoid: Functoid) -> Self {
        Self::new(key, BindingKind::Class(functoid))
    }

    pub fn factory(key: Key, functoid: Functoid) -> Self {
        Self::new(key, BindingKind::Factory(functoid))
    }

    pub fn alias(key: Key, target: Key) -> Self {
        Self::new(key, BindingKind::Alias(target))
    }

    /// A set-element binding. `key` must be `set_of(element_key.tag)` with
    /// the same id as the collection it contributes to — enforced here
    /// rather than merely documented (`spec.md` §3.4's invariant).
    pub fn set_element(collection_key: Key, element_key: Key, inner: ElementKind, weak: bool) -> Self {
        assert_eq!(
            collection_key.tag,
            element_key.tag.clone().set_of(),
            "a Set-element binding's Key must be set_of(element_key.tag)"
        );
        assert_eq!(
            collection_key.id, element_key.id,
            "a Set-element binding's Key must share its id with the element it contributes to"
        );
        Self::new(
            collection_key,
            BindingKind::SetElement {
                element_key,
                inner,
                weak,
            },
        )
    }

    pub fn assisted_factory(key: Key, functoid: Functoid, runtime_params: Vec<String>) -> Self {
        Self::new(key, BindingKind::AssistedFactory { functoid, runtime_params })
    }

    /// Attach an axis tag to this binding, increasing its specificity.
    pub fn tagged(mut self, point: AxisPoint) -> Self {
        self.tags = self.tags.with(point);
        self
    }

    pub fn is_set_element(&self) -> bool {
        self.kind.is_set_element()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "set_of(element_key.tag)")]
    fn set_element_key_must_match_set_of_element_tag() {
        let element_key = Key::of::<u32>();
        let wrong_collection_key = Key::of::<String>();
        Binding::set_element(
            wrong_collection_key,
            element_key,
            ElementKind::Instance(std::sync::Arc::new(1u32)),
            false,
        );
    }

    #[test]
    fn set_element_key_matches_when_consistent() {
        let element_key = Key::of::<u32>();
        let binding = Binding::set_element(
            element_key.set_of(),
            element_key,
            ElementKind::Instance(std::sync::Arc::new(1u32)),
            false,
        );
        assert!(binding.is_set_element());
    }
}
