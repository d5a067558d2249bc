//! Opaque, zero-argument expressions (spec §1: "the core treats each expression as a
//! zero-argument function returning a value"). Grounded on `runtime.py::_LambdaWithSource`: the
//! source wraps compiled lambdas so their `repr()` shows rulebook source rather than a bare
//! function pointer; `Expr` carries the analogous optional label purely for `Debug` output.

use alloc::borrow::Cow;

use crate::compat::{ExprFn, Rc, Value};
use crate::context::Context;
use crate::error::Result;

/// A lazily-evaluated, dependency-tracked expression. Evaluating one always happens inside a
/// fresh read-tracking frame (`Context::tracked_eval`); the expression itself must tolerate
/// being re-evaluated an arbitrary number of times (spec §9: "must not assume purity beyond
/// tolerating repeated evaluation").
#[derive(Clone)]
pub struct Expr {
    label: Option<Cow<'static, str>>,
    func: ExprFn,
}

impl Expr {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&Context) -> Result<Value> + crate::compat::FnBounds + 'static,
    {
        Expr {
            label: None,
            func: Rc::new(func),
        }
    }

    /// Attaches a debug label (typically the rulebook source fragment an embedding loader
    /// compiled this expression from).
    pub fn labelled<F>(label: impl Into<Cow<'static, str>>, func: F) -> Self
    where
        F: Fn(&Context) -> Result<Value> + crate::compat::FnBounds + 'static,
    {
        Expr {
            label: Some(label.into()),
            func: Rc::new(func),
        }
    }

    /// A constant expression — convenient for tests and hand-built directive trees.
    pub fn constant<T: crate::compat::ValueBounds>(value: T) -> Self {
        let value: Value = Rc::new(value);
        Expr::new(move |_ctx| Ok(value.clone()))
    }

    pub(crate) fn call(&self, ctx: &Context) -> Result<Value> {
        (self.func)(ctx)
    }
}

impl core::fmt::Debug for Expr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.label {
            Some(label) => write!(f, "<Expr:{}>", label),
            None => write!(f, "<Expr>"),
        }
    }
}
