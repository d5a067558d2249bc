//! Target identity: `(object, kind, sub)` triples (spec §3), plus the item-key type that
//! indexes the `item` kind. Grounded on `util.py::ObjectKeyDict`, which compares composite keys
//! containing mutable objects by the object's `id()` while keeping the tuple/string parts of the
//! key compared by value — see the `ObjectKey` doc comment below for how that's reproduced
//! without a garbage collector.

use alloc::string::String;
use core::cmp::Ordering;
use core::hash::{Hash, Hasher};

use crate::compat::Rc;
use crate::object::ObjectHandle;

/// A key usable for the `item` kind. Restricted to a closed set of hashable, orderable variants
/// rather than an arbitrary `dyn Any`, since — unlike Python — Rust needs `Ord`/`Hash` up front
/// to use these as map keys; this is a deliberate narrowing from the source's "anything
/// hashable", recorded in `DESIGN.md`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Int(i64),
    Str(Rc<str>),
    Bool(bool),
}

impl From<i64> for Key {
    fn from(v: i64) -> Self {
        Key::Int(v)
    }
}

impl From<&str> for Key {
    fn from(v: &str) -> Self {
        Key::Str(Rc::from(v))
    }
}

impl From<String> for Key {
    fn from(v: String) -> Self {
        Key::Str(Rc::from(v.as_str()))
    }
}

impl From<bool> for Key {
    fn from(v: bool) -> Self {
        Key::Bool(v)
    }
}

/// The `kind` + `sub` half of a target (spec §3). `Iter`'s sub is unused: it denotes "the
/// iteration sequence of object" as a whole, used by `For` to subscribe to structural changes of
/// a trackable collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Sub {
    Attr(Rc<str>),
    Item(Key),
    Iter,
}

impl Sub {
    pub fn attr(name: impl AsRef<str>) -> Self {
        Sub::Attr(Rc::from(name.as_ref()))
    }

    pub fn item(key: impl Into<Key>) -> Self {
        Sub::Item(key.into())
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Sub::Attr(_) => "attr",
            Sub::Item(_) => "item",
            Sub::Iter => "iter",
        }
    }
}

/// Identity of a host object usable as a map key: compared and hashed by a stable numeric id
/// rather than by pointer, so that (unlike raw pointer comparison) there is no risk of an ABA
/// collision if an old allocation's address gets reused after the object it identified is
/// dropped. The object itself is reached, when still alive, through the accompanying weak
/// handle — mirroring `ObjectKeyDict`'s "store `id(obj)` for comparison, keep a reference for
/// resolution" split, but using a genuine weak reference since this crate (unlike the GC'd
/// source) must release storage when the object is no longer reachable (spec §3 Ownership).
#[derive(Clone)]
pub struct ObjectKey {
    pub(crate) id: u64,
    pub(crate) handle: ObjectHandle,
}

impl ObjectKey {
    pub(crate) fn new(id: u64, handle: ObjectHandle) -> Self {
        ObjectKey { id, handle }
    }

    /// Attempts to resolve the live object. Returns `None` if it has been dropped — the caller
    /// is expected to treat that the same way the spec treats a vanished weak watch: silently
    /// skip, rather than error (spec §5 Resource release), except where the operation explicitly
    /// requires the object (`ObjectGone`).
    pub(crate) fn upgrade(&self) -> Option<crate::object::Object> {
        self.handle.upgrade().map(crate::object::Object::from_rc)
    }
}

impl PartialEq for ObjectKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for ObjectKey {}

impl PartialOrd for ObjectKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ObjectKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Hash for ObjectKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl core::fmt::Debug for ObjectKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Obj#{}", self.id)
    }
}

/// A mutable slot on a host object: `(object, kind, sub)` (spec §3).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Target {
    pub object: ObjectKey,
    pub sub: Sub,
}

impl Target {
    pub(crate) fn new(object: ObjectKey, sub: Sub) -> Self {
        Target { object, sub }
    }
}

impl core::fmt::Debug for Target {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}.{:?}", self.object, self.sub)
    }
}
