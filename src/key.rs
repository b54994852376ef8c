//! Identifiers and tagging primitives (`spec.md` §3.1–§3.2).

use std::any::TypeId;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// An opaque process-unique symbol.
///
/// Used where the Rust type system cannot distinguish interfaces on its own
/// (e.g. two independent trait objects that should nonetheless resolve to
/// distinct collection keys).
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct Token(u64);

impl Token {
    /// Mint a new, globally unique token.
    pub fn new() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for Token {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token(#{})", self.0)
    }
}

/// One of the built-in scalar kinds (`spec.md` §3.1).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Primitive {
    Integer,
    Float,
    String,
    Boolean,
    BigInteger,
    Symbol,
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Primitive::Integer => "integer",
            Primitive::Float => "float",
            Primitive::String => "string",
            Primitive::Boolean => "boolean",
            Primitive::BigInteger => "big-integer",
            Primitive::Symbol => "symbol",
        };
        write!(f, "{s}")
    }
}

/// An opaque, comparable identifier for a type (`spec.md` §3.1).
///
/// Equality is structural: `SetOf(a) == SetOf(b)` iff `a == b`.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum TypeTag {
    /// A reference to a concrete or abstract user-defined type constructor.
    ///
    /// Backed by [`std::any::TypeId`] — the idiomatic stand-in for the
    /// source language's runtime type reflection (see `spec.md` §9).
    Nominal { id: TypeId, name: &'static str },
    /// An opaque process-unique symbol.
    Token(Token),
    /// A built-in scalar kind.
    Primitive(Primitive),
    /// Recursively wraps a [`TypeTag`] to denote a collection binding.
    SetOf(Box<TypeTag>),
}

impl TypeTag {
    /// Build the nominal tag for a concrete Rust type.
    pub fn of<T: ?Sized + 'static>() -> Self {
        TypeTag::Nominal {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Wrap this tag to denote "the collection bound at this tag".
    pub fn set_of(self) -> Self {
        TypeTag::SetOf(Box::new(self))
    }

    /// `true` if this tag denotes a collection.
    pub fn is_set(&self) -> bool {
        matches!(self, TypeTag::SetOf(_))
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Nominal { name, .. } => write!(f, "{name}"),
            TypeTag::Token(t) => write!(f, "{t:?}"),
            TypeTag::Primitive(p) => write!(f, "{p}"),
            TypeTag::SetOf(inner) => write!(f, "Set<{inner}>"),
        }
    }
}

/// Distinguishes multiple bindings that share a [`TypeTag`].
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum KeyId {
    Name(String),
    Symbol(Token),
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyId::Name(n) => write!(f, "{n:?}"),
            KeyId::Symbol(t) => write!(f, "{t:?}"),
        }
    }
}

/// `(TypeTag, id?)` — the unit by which bindings are looked up (`spec.md` §3.2).
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Key {
    pub tag: TypeTag,
    pub id: Option<KeyId>,
}

impl Key {
    /// A plain key for a concrete Rust type.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            tag: TypeTag::of::<T>(),
            id: None,
        }
    }

    /// A named key: distinguishes multiple bindings for the same type.
    pub fn named<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self {
            tag: TypeTag::of::<T>(),
            id: Some(KeyId::Name(name.into())),
        }
    }

    /// A key built directly from a token, for types the Rust type system
    /// cannot distinguish on its own (e.g. two instances of the same trait
    /// object type meant to resolve independently).
    pub fn token(tag: TypeTag, token: Token) -> Self {
        Self {
            tag,
            id: Some(KeyId::Symbol(token)),
        }
    }

    /// Build an explicit key from raw parts.
    pub fn new(tag: TypeTag, id: Option<KeyId>) -> Self {
        Self { tag, id }
    }

    /// The key for the collection this key would contribute an element to.
    pub fn set_of(&self) -> Self {
        Self {
            tag: self.tag.clone().set_of(),
            id: self.id.clone(),
        }
    }

    /// `true` if this key identifies a collection.
    pub fn is_set(&self) -> bool {
        self.tag.is_set()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{}#{id}", self.tag),
            None => write!(f, "{}", self.tag),
        }
    }
}

/// The process-lexical side-table mapping a type name to its declared
/// dependency keys (`spec.md` §9's reflection re-architecting note).
pub mod registry {
    use super::{Key, KeyId, TypeTag};
    use ahash::HashMap;
    use std::sync::RwLock;

    type DepList = Vec<(TypeTag, Option<KeyId>)>;

    static REGISTRY: RwLock<Option<HashMap<&'static str, DepList>>> = RwLock::new(None);

    /// Register the ordered list of dependency keys for a type, identified
    /// by its stable name (typically `std::any::type_name::<T>()`).
    ///
    /// Populated either at `Module`-construction time or by a build-time
    /// code-generation step; the [`crate::functoid::Functoid`] contract is
    /// agnostic to which.
    pub fn register(type_name: &'static str, dependencies: DepList) {
        let mut guard = REGISTRY.write().expect("registry lock poisoned");
        guard.get_or_insert_with(HashMap::default).insert(type_name, dependencies);
    }

    /// Look up the dependency keys registered for a type name, if any.
    pub fn lookup(type_name: &str) -> Option<Vec<Key>> {
        let guard = REGISTRY.read().expect("registry lock poisoned");
        guard.as_ref()?.get(type_name).map(|deps| {
            deps.iter()
                .map(|(tag, id)| Key::new(tag.clone(), id.clone()))
                .collect()
        })
    }
}
