//! `Module`: an ordered sequence of bindings with `append`/`overridden_by`
//! composition (`spec.md` §3.5, §4.1).

use ahash::HashMap;

use crate::binding::Binding;
use crate::key::Key;

/// An ordered sequence of [`Binding`]s (`spec.md` §3.5).
#[derive(Clone, Debug, Default)]
pub struct Module {
    bindings: Vec<Binding>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_binding(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Concatenation; bindings coexist, order preserved.
    pub fn append(&self, other: &Module) -> Module {
        let mut bindings = self.bindings.clone();
        bindings.extend(other.bindings.iter().cloned());
        Module { bindings }
    }

    /// Per-Key, the latest binding wins, using append order within `overlay`
    /// then `self` — set-element bindings are never overridden; they
    /// accumulate from both sides (`spec.md` §3.5, §4.1).
    ///
    /// See `SPEC_FULL.md` §3.2 for the resolution of what happens when a
    /// Key ends up with both a set-element and a non-set-element binding
    /// after this merge: that combination is left in the module (this
    /// method never fails) and is instead rejected by the Planner the first
    /// time that Key is resolved.
    pub fn overridden_by(&self, overlay: &Module) -> Module {
        let combined: Vec<Binding> = self
            .bindings
            .iter()
            .cloned()
            .chain(overlay.bindings.iter().cloned())
            .collect();

        // The winning non-set binding per Key is the *last* one in append
        // order (self, then overlay) — since overlay always comes later,
        // its last non-set binding for a Key always wins when present.
        let mut winner_index: HashMap<Key, usize> = HashMap::default();
        for (index, binding) in combined.iter().enumerate() {
            if !binding.is_set_element() {
                winner_index.insert(binding.key.clone(), index);
            }
        }

        let bindings = combined
            .into_iter()
            .enumerate()
            .filter(|(index, binding)| {
                binding.is_set_element() || winner_index.get(&binding.key) == Some(index)
            })
            .map(|(_, binding)| binding)
            .collect();

        Module { bindings }
    }
}
