//! The default symbol table for rulebook expressions (spec §4.E), grounded on
//! `runtime.py::Namespace` / `NamespaceOverlay`.
//!
//! The source's `Namespace.__getattr__` falls through to `builtins` only for names it doesn't
//! already have. We reproduce the same externally-visible behaviour more simply (design note
//! §9: "provide an explicit built-ins table bound once at context creation") by seeding the
//! namespace's own attribute map with the builtins table at construction time — a read for an
//! unset name and a read for a builtin are then both ordinary attribute reads, and a rulebook
//! that deliberately shadows a builtin name still overrides it, exactly as in the source.

use alloc::string::String;
use alloc::vec::Vec;

use crate::compat::{Rc, Value};
use crate::error::{EngineError, Result};
use crate::object::Object;

/// Name-keyed constants/functions made available on every freshly constructed [`Namespace`].
pub type BuiltinsTable = alloc::collections::BTreeMap<Rc<str>, Value>;

/// A trackable root object that additionally seeds itself from a builtins table (spec §4.E).
#[derive(Clone)]
pub struct Namespace(Object);

impl Namespace {
    pub fn new(builtins: &BuiltinsTable) -> Self {
        let object = Object::new();
        for (name, value) in builtins.iter() {
            object.set_attr_value(name.as_ref(), value.clone());
        }
        Namespace(object)
    }

    pub fn object(&self) -> &Object {
        &self.0
    }
}

impl core::ops::Deref for Namespace {
    type Target = Object;
    fn deref(&self) -> &Object {
        &self.0
    }
}

/// A non-mutable shadow layering a small name map over a base namespace (spec §4.E). Used by
/// `For` to bind the iteration variable(s) for the scope of a per-item body. Overlay bindings
/// are resolved purely at expression-evaluation time — they never become `Target`s in their own
/// right, since an Assign's left-hand side always resolves, through the overlay, to some real
/// trackable object.
#[derive(Clone)]
pub struct Overlay {
    base: Object,
    shadow: alloc::collections::BTreeMap<Rc<str>, Value>,
}

impl Overlay {
    pub fn new(base: Object, shadow: impl IntoIterator<Item = (Rc<str>, Value)>) -> Self {
        Overlay {
            base,
            shadow: shadow.into_iter().collect(),
        }
    }

    /// Reads prefer the overlay; falls through to the base namespace otherwise.
    pub fn get(&self, name: impl AsRef<str>) -> Option<Value> {
        let name = name.as_ref();
        self.shadow
            .get(name)
            .cloned()
            .or_else(|| self.base.get_attr(name))
    }

    /// Writes to a shadowed name fail with [`EngineError::ShadowedWrite`]; writes to any other
    /// name forward to the base namespace.
    pub fn set(&self, name: impl AsRef<str>, value: Value) -> Result<()> {
        let name = name.as_ref();
        if self.shadow.contains_key(name) {
            return Err(EngineError::ShadowedWrite {
                name: String::from(name),
            });
        }
        self.base.set_attr_value(name, value);
        Ok(())
    }

    pub fn names(&self) -> Vec<Rc<str>> {
        self.shadow.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_prefers_shadow_then_falls_through() {
        let base = Object::new();
        base.set_attr("lst", 1i64);
        let overlay = Overlay::new(base.clone(), [(Rc::from("itm"), Rc::new(42i64) as Value)]);
        assert!(overlay.get("itm").unwrap().downcast_ref::<i64>().is_some());
        assert!(overlay.get("lst").is_some());
        assert!(overlay.get("missing").is_none());
    }

    #[test]
    fn overlay_rejects_shadowed_write() {
        let base = Object::new();
        let overlay = Overlay::new(base, [(Rc::from("itm"), Rc::new(1i64) as Value)]);
        let err = overlay.set("itm", Rc::new(2i64) as Value).unwrap_err();
        assert!(matches!(err, EngineError::ShadowedWrite { .. }));
    }

    #[test]
    fn overlay_forwards_non_shadowed_write() {
        let base = Object::new();
        let overlay = Overlay::new(base.clone(), [(Rc::from("itm"), Rc::new(1i64) as Value)]);
        overlay.set("other", Rc::new(7i64) as Value).unwrap();
        assert_eq!(
            base.get_attr("other").unwrap().downcast_ref::<i64>().copied(),
            Some(7)
        );
    }
}
