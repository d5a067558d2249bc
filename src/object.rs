//! The base trackable object (spec §4.A), grounded on `abider.py::RuleAbider`: a concrete type
//! whose attribute/item writes are the single funnel through which change notifications are
//! fired. Names beginning with `_` bypass tracking, exactly as in the source
//! (`if not name.startswith('_'): self._changed(name)`).
//!
//! Rust has no attribute reflection, so rather than asking host authors to hand-register every
//! field (which the spec's design notes explicitly rule out, §9), `Object` stores attrs and
//! items in name/key-addressed maps itself. A statically-typed host wraps one `Object` per
//! trackable instance and layers typed accessors over it.

use alloc::vec::Vec;
use core::any::Any;
use core::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use indexmap::IndexMap;

use crate::compat::{AttrSetter, Cell, Rc, TrackHandler, Value};
use crate::id::{Id, IdAllocator};
use crate::key::{Key, ObjectKey, Sub};

#[cfg(not(feature = "unsync"))]
pub(crate) type ObjectHandle = alloc::sync::Weak<Cell<ObjectInner>>;
#[cfg(feature = "unsync")]
pub(crate) type ObjectHandle = alloc::rc::Weak<Cell<ObjectInner>>;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// A single registered tracker: either for one specific `(kind, sub)`, or a wildcard matching
/// any change on the object (spec §4.A: "`sub` is either a specific `(kind, name)` pair or a
/// wildcard").
pub(crate) type TrackerKey = Option<Sub>;

pub(crate) struct ObjectInner {
    id: u64,
    attrs: IndexMap<Rc<str>, Value, ahash::RandomState>,
    items: IndexMap<Key, Value, ahash::RandomState>,
    order: Vec<Key>,
    trackers: IndexMap<TrackerKey, IndexMap<Id, TrackHandler, ahash::RandomState>, ahash::RandomState>,
    ids: IdAllocator,
    /// `_rbk_commit` / `_rbk_commit_order` equivalent (spec §10.5): a host-registered hook
    /// invoked once per commit, sorted across objects by the paired order value.
    commit_hook: Option<(i64, crate::compat::CommitHook)>,
    /// `set_<name>` equivalent (spec §10.5): a host-registered typed setter preferred over the
    /// default dynamic-map write during commit write-through.
    setters: IndexMap<Rc<str>, AttrSetter, ahash::RandomState>,
}

impl Default for ObjectInner {
    fn default() -> Self {
        ObjectInner {
            id: NEXT_OBJECT_ID.fetch_add(1, AtomicOrdering::Relaxed),
            attrs: IndexMap::with_hasher(ahash::RandomState::new()),
            items: IndexMap::with_hasher(ahash::RandomState::new()),
            order: Vec::new(),
            trackers: IndexMap::with_hasher(ahash::RandomState::new()),
            ids: IdAllocator::default(),
            commit_hook: None,
            setters: IndexMap::with_hasher(ahash::RandomState::new()),
        }
    }
}

/// Anything that can report reads/writes into the context's bookkeeping. `Object` is the only
/// implementation the core ships (spec §4.A); `Namespace` (see `namespace.rs`) is built on top
/// of one.
pub trait Trackable {
    /// Register `handler` to be invoked whenever `sub` changes (or any sub, if `None`).
    fn track(&self, sub: Option<Sub>, handler: TrackHandler) -> Id;
    /// Remove a previously registered tracker.
    fn untrack(&self, sub: Option<Sub>, id: Id);
}

/// A handle to a reactive host object: dynamically-attributed storage plus the tracker registry
/// describing who to notify on change.
///
/// # Example
/// ```
/// use rulebook_core::object::Object;
///
/// let obj = Object::new();
/// obj.set_attr("x", 5i64);
/// assert_eq!(obj.get_attr("x").and_then(|v| v.downcast_ref::<i64>().copied()), Some(5));
/// ```
#[derive(Clone)]
pub struct Object(Rc<Cell<ObjectInner>>);

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl Object {
    pub fn new() -> Self {
        Object(Rc::new(Cell::new(ObjectInner::default())))
    }

    pub(crate) fn from_rc(rc: Rc<Cell<ObjectInner>>) -> Self {
        Object(rc)
    }

    #[cfg(not(feature = "unsync"))]
    fn hold(&self) -> crate::compat::Guard<'_, ObjectInner> {
        self.0.lock()
    }
    #[cfg(feature = "unsync")]
    fn hold(&self) -> crate::compat::Guard<'_, ObjectInner> {
        self.0.borrow_mut()
    }

    /// The stable identity key used for this object inside value sets and watch sets.
    pub(crate) fn key(&self) -> ObjectKey {
        let id = self.hold().id;
        let handle = Rc::downgrade(&self.0);
        ObjectKey::new(id, handle)
    }

    pub fn get_attr(&self, name: impl AsRef<str>) -> Option<Value> {
        self.hold().attrs.get(name.as_ref()).cloned()
    }

    /// Sets an already type-erased value, used internally for write-through and for namespace
    /// forwarding where the caller already holds a [`Value`] rather than a concrete `T`.
    pub(crate) fn set_attr_value(&self, name: impl AsRef<str>, value: Value) {
        let name = name.as_ref();
        {
            let mut inner = self.hold();
            let key: Rc<str> = Rc::from(name);
            inner.attrs.insert(key, value);
        }
        if !name.starts_with('_') {
            self.fire(Sub::attr(name));
        }
    }

    /// Registers a typed setter preferred over the dynamic attribute map during commit
    /// write-through (spec §10.5, the `set_<name>` idiom of `runtime.py::_do_set`).
    pub fn set_setter<F>(&self, name: impl AsRef<str>, setter: F)
    where
        F: Fn(Value) + crate::compat::FnBounds + 'static,
    {
        let key: Rc<str> = Rc::from(name.as_ref());
        self.hold().setters.insert(key, Rc::new(setter));
    }

    /// Commit-time write-through for an `attr` target: prefers a registered setter, falling back
    /// to the plain dynamic-map write (spec §4.B step 3b, §10.5).
    pub(crate) fn commit_attr(&self, name: impl AsRef<str>, value: Value) {
        let name = name.as_ref();
        let setter = self.hold().setters.get(name).cloned();
        match setter {
            Some(setter) => setter(value),
            None => self.set_attr_value(name, value),
        }
    }

    /// Sets an attribute and, unless `name` begins with `_`, fans the change out to every
    /// matching tracker (spec §4.A).
    pub fn set_attr<T: crate::compat::ValueBounds>(&self, name: impl AsRef<str>, value: T) {
        let name = name.as_ref();
        let rc_val: Value = Rc::new(value);
        {
            let mut inner = self.hold();
            let key: Rc<str> = Rc::from(name);
            inner.attrs.insert(key, rc_val);
        }
        if !name.starts_with('_') {
            self.fire(Sub::attr(name));
        }
    }

    pub fn get_item(&self, key: impl Into<Key>) -> Option<Value> {
        self.hold().items.get(&key.into()).cloned()
    }

    /// Commit-time write-through for an `item` target: a plain indexed set (spec §4.B step 3b;
    /// unlike `attr`, the source's `_do_set` has no per-item setter override).
    pub(crate) fn set_item_value(&self, key: Key, value: Value) {
        {
            let mut inner = self.hold();
            if !inner.items.contains_key(&key) {
                inner.order.push(key.clone());
            }
            inner.items.insert(key.clone(), value);
        }
        self.fire(Sub::Item(key));
    }

    pub fn set_item<T: crate::compat::ValueBounds>(&self, key: impl Into<Key>, value: T) {
        let key = key.into();
        let rc_val: Value = Rc::new(value);
        {
            let mut inner = self.hold();
            if !inner.items.contains_key(&key) {
                inner.order.push(key.clone());
            }
            inner.items.insert(key.clone(), rc_val);
        }
        self.fire(Sub::Item(key));
        self.fire_iter();
    }

    pub fn remove_item(&self, key: impl Into<Key>) {
        let key = key.into();
        {
            let mut inner = self.hold();
            inner.items.shift_remove(&key);
            inner.order.retain(|k| k != &key);
        }
        self.fire(Sub::Item(key));
        self.fire_iter();
    }

    pub fn contains_item(&self, key: impl Into<Key>) -> bool {
        self.hold().items.contains_key(&key.into())
    }

    /// Every item value in insertion order — the "iteration sequence" of spec §3/§4.D.
    pub fn iter_items(&self) -> Vec<Value> {
        let inner = self.hold();
        inner
            .order
            .iter()
            .filter_map(|k| inner.items.get(k).cloned())
            .collect()
    }

    fn fire_iter(&self) {
        self.fire(Sub::Iter);
    }

    fn fire(&self, sub: Sub) {
        let handlers: Vec<TrackHandler> = {
            let inner = self.hold();
            inner
                .trackers
                .get(&Some(sub.clone()))
                .into_iter()
                .chain(inner.trackers.get(&None).into_iter())
                .flat_map(|m| m.values().cloned())
                .collect()
        };
        let key = self.key();
        for handler in handlers {
            let target = crate::key::Target::new(key.clone(), sub.clone());
            handler(target);
        }
    }

    pub fn set_commit_hook<F>(&self, order: i64, hook: F)
    where
        F: Fn(&[Object]) + crate::compat::FnBounds + 'static,
    {
        self.hold().commit_hook = Some((order, alloc::boxed::Box::new(hook)));
    }

    pub(crate) fn commit_hook_order(&self) -> Option<i64> {
        self.hold().commit_hook.as_ref().map(|(order, _)| *order)
    }

    pub(crate) fn run_commit_hook(&self, objects: &[Object]) {
        // The hook is a `Box<dyn Fn>` and can't be cloned out, so this runs while holding the
        // lock — acceptable since commit hooks are documented as non-reentrant (spec §4.B).
        let inner = self.hold();
        if let Some((_, hook)) = inner.commit_hook.as_ref() {
            hook(objects);
        }
    }
}

impl Trackable for Object {
    fn track(&self, sub: Option<Sub>, handler: TrackHandler) -> Id {
        let mut inner = self.hold();
        let id = inner.ids.alloc();
        inner
            .trackers
            .entry(sub)
            .or_insert_with(|| IndexMap::with_hasher(ahash::RandomState::new()))
            .insert(id, handler);
        id
    }

    fn untrack(&self, sub: Option<Sub>, id: Id) {
        let mut inner = self.hold();
        if let Some(map) = inner.trackers.get_mut(&sub) {
            map.shift_remove(&id);
        }
        inner.ids.free(id);
    }
}

impl core::fmt::Debug for Object {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Object#{}", self.hold().id)
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.hold().id == other.hold().id
    }
}
impl Eq for Object {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attr_roundtrip() {
        let obj = Object::new();
        obj.set_attr("x", 5i64);
        assert_eq!(
            obj.get_attr("x").unwrap().downcast_ref::<i64>().copied(),
            Some(5)
        );
    }

    #[test]
    fn underscore_attrs_do_not_fire_trackers() {
        let obj = Object::new();
        let fired = Rc::new(Cell::new(0usize));
        #[cfg(not(feature = "unsync"))]
        let bump = {
            let fired = fired.clone();
            move |_t: crate::key::Target| {
                *fired.lock() += 1;
            }
        };
        #[cfg(feature = "unsync")]
        let bump = {
            let fired = fired.clone();
            move |_t: crate::key::Target| {
                *fired.borrow_mut() += 1;
            }
        };
        obj.track(None, Rc::new(bump));
        obj.set_attr("_hidden", 1i64);
        #[cfg(not(feature = "unsync"))]
        assert_eq!(*fired.lock(), 0);
        #[cfg(feature = "unsync")]
        assert_eq!(*fired.borrow(), 0);
        obj.set_attr("visible", 1i64);
        #[cfg(not(feature = "unsync"))]
        assert_eq!(*fired.lock(), 1);
        #[cfg(feature = "unsync")]
        assert_eq!(*fired.borrow(), 1);
    }

    #[test]
    fn item_iteration_preserves_insertion_order() {
        let obj = Object::new();
        obj.set_item(1i64, "a");
        obj.set_item(2i64, "b");
        let items = obj.iter_items();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn weak_key_does_not_resolve_after_drop() {
        let obj = Object::new();
        let key = obj.key();
        drop(obj);
        assert!(key.upgrade().is_none());
    }
}
