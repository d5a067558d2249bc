//! The object wrapper (spec §4.C), grounded on `runtime.py::ObjectWrapper`: a transparent
//! read/write proxy that reports every attribute/item/iteration read into the context's active
//! tracking frame and returns further wrappers for composite reads.
//!
//! Unlike the source, which wraps arbitrary Python objects, this crate's only trackable host
//! type is [`Object`](crate::object::Object) (see its doc comment for why), so `ObjectWrapper`
//! wraps an `Object` specifically rather than an arbitrary `dyn Any`.

use alloc::vec::Vec;

use crate::compat::Value;
use crate::context::Context;
use crate::error::{EngineError, Result};
use crate::key::Key;
use crate::object::Object;

/// The result of reading through a wrapper: either a plain value, or — if the read value was
/// itself a trackable [`Object`] — a further wrapper so subsequent reads keep being tracked
/// (spec §4.C: "wraps composite results ... so further reads chain").
#[derive(Clone)]
pub enum Wrapped {
    Value(Value),
    Object(ObjectWrapper),
}

impl Wrapped {
    pub fn into_value(self) -> Value {
        match self {
            Wrapped::Value(v) => v,
            Wrapped::Object(w) => crate::compat::Rc::new(w.obj) as Value,
        }
    }
}

/// A transparent, read-tracking proxy over an [`Object`] (spec §4.C).
///
/// # Example
/// ```
/// use rulebook_core::{context::Context, object::Object};
///
/// let ctx = Context::new();
/// let obj = Object::new();
/// obj.set_attr("x", 5i64);
/// let wrapper = ctx.wrap(obj);
/// let read = wrapper.get_attr("x").unwrap();
/// assert_eq!(read.into_value().downcast_ref::<i64>().copied(), Some(5));
/// ```
#[derive(Clone)]
pub struct ObjectWrapper {
    ctx: Context,
    obj: Object,
}

impl ObjectWrapper {
    /// Constructs a wrapper directly. Prefer [`Context::wrap`], which detects and rejects
    /// double-wrapping (spec: "Wrapping a wrapper is forbidden and fails with `DoubleWrap`").
    pub(crate) fn new(ctx: Context, obj: Object) -> Self {
        ObjectWrapper { ctx, obj }
    }

    pub(crate) fn object(&self) -> &Object {
        &self.obj
    }

    pub fn get_attr(&self, name: impl AsRef<str>) -> Result<Wrapped> {
        let target = crate::key::Target::new(self.obj.key(), crate::key::Sub::attr(name.as_ref()));
        let value = self.ctx.read_value(&target)?;
        self.ctx.wrap_value(value)
    }

    pub fn set_attr<T: crate::compat::ValueBounds>(&self, name: impl AsRef<str>, value: T) {
        self.obj.set_attr(name, value);
    }

    pub fn get_item(&self, key: impl Into<Key>) -> Result<Wrapped> {
        let target = crate::key::Target::new(self.obj.key(), crate::key::Sub::Item(key.into()));
        let value = self.ctx.read_value(&target)?;
        self.ctx.wrap_value(value)
    }

    pub fn set_item<T: crate::compat::ValueBounds>(&self, key: impl Into<Key>, value: T) {
        self.obj.set_item(key, value);
    }

    pub fn contains(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        let target = crate::key::Target::new(self.obj.key(), crate::key::Sub::Item(key.clone()));
        self.ctx.report_read(&target);
        self.obj.contains_item(key)
    }

    /// Iterates the object's items, reporting the `(obj, iter, _)` read once and wrapping each
    /// yielded element (spec §4.C).
    pub fn iter(&self) -> Result<Vec<Wrapped>> {
        let target = crate::key::Target::new(self.obj.key(), crate::key::Sub::Iter);
        self.ctx.report_read(&target);
        self.obj
            .iter_items()
            .into_iter()
            .map(|v| self.ctx.wrap_value(v))
            .collect()
    }
}

impl core::fmt::Debug for ObjectWrapper {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "ObjectWrapper({:?})", self.obj)
    }
}

impl PartialEq for ObjectWrapper {
    fn eq(&self, other: &Self) -> bool {
        self.obj == other.obj
    }
}
impl Eq for ObjectWrapper {}

impl Context {
    /// Wraps a read value, rejecting an already-wrapped value with [`EngineError::DoubleWrap`]
    /// and promoting a bare [`Object`] to a chained [`ObjectWrapper`] (spec §4.C).
    pub(crate) fn wrap_value(&self, value: Value) -> Result<Wrapped> {
        if value.downcast_ref::<ObjectWrapper>().is_some() {
            return Err(EngineError::DoubleWrap);
        }
        if let Some(obj) = value.downcast_ref::<Object>() {
            return Ok(Wrapped::Object(ObjectWrapper::new(self.clone(), obj.clone())));
        }
        Ok(Wrapped::Value(value))
    }

    /// Wraps a bare [`Object`] unconditionally. Used by callers that already hold an `Object`
    /// handle they know isn't itself a wrapper (e.g. the namespace root).
    pub fn wrap(&self, obj: Object) -> ObjectWrapper {
        ObjectWrapper::new(self.clone(), obj)
    }
}
