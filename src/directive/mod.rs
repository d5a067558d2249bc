//! The directive tree (spec §4.D), grounded on `runtime.py`'s `Block`/`If`/`For`/`Assign`/
//! `EnterLeave` node classes: activatable nodes that, while active, install assignments into
//! value sets and subscribe to the dependencies their expressions read.
//!
//! Every directive is always handled through an `Rc<dyn Directive>` handle, never through a bare
//! `&self` call from outside — see [`activate`], the single entry point implementing the common
//! "open a transaction, run the hook, flip the flag, mark uncommitted, drain, commit" contract
//! shared by every node kind (spec §4.D "Common contract").

mod assign;
mod block;
mod enter_leave;
mod for_;
mod if_;

pub use assign::Assign;
pub use block::Block;
pub use enter_leave::{EnterLeave, EnterLeaveEvent};
pub use for_::For;
pub use if_::If;

use core::sync::atomic::{AtomicBool, Ordering};

use crate::compat::{Action, BodyFactory, Combinator, Rc, Value};
use crate::context::Context;
use crate::error::Result;
use crate::id::Id;

/// Builds an [`Action`] (the opaque callback type `EnterLeave` fires) from a plain closure,
/// without requiring callers to name the `Rc`/`Arc` alias this crate picks per build mode.
pub fn action<F>(f: F) -> Action
where
    F: Fn(&Context) -> Result<()> + crate::compat::FnBounds + 'static,
{
    Rc::new(f)
}

/// Builds a [`Combinator`] (the relative-value folding function, spec §3/§4.B) from a plain
/// closure.
pub fn combinator<F>(f: F) -> Combinator
where
    F: Fn(Value, Value) -> Value + crate::compat::FnBounds + 'static,
{
    Rc::new(f)
}

/// Builds a [`BodyFactory`] (the per-item body constructor `For` invokes, spec §4.D) from a
/// plain closure.
pub fn body_factory<F>(f: F) -> BodyFactory
where
    F: Fn(Value) -> Rc<dyn Directive> + crate::compat::FnBounds + 'static,
{
    Rc::new(f)
}

/// An activatable node in the directive tree (spec §4.D).
///
/// Every concrete type is constructed behind an `Rc` and driven exclusively through
/// [`activate`]; `&self` methods here are the hooks that drive implements, not a public calling
/// convention of their own.
pub trait Directive: crate::compat::FnBounds {
    fn ctx(&self) -> Context;
    fn id(&self) -> Id;
    fn active(&self) -> bool;
    fn set_active_flag(&self, value: bool);
    fn c_active(&self) -> bool;
    fn set_c_active(&self, value: bool);

    /// Subclass-specific activation/deactivation behaviour (spec §4.D per-node sections).
    fn set_active_impl(&self, desired: bool) -> Result<()>;

    /// Subclass-specific commit-time hook; default no-op. Only `EnterLeave` overrides this
    /// (spec §4.D: `c_enter`/`c_leave` fire here).
    fn on_commit(&self, ctx: &Context) -> Result<()> {
        let _ = ctx;
        Ok(())
    }

    /// Reconciles `c_active` with `active` and runs the commit hook (spec §4.B step 3a). Order
    /// matters: `on_commit` must observe the *old* `c_active` to detect a transition, so it runs
    /// before the flag is updated.
    fn commit(&self, ctx: &Context) -> Result<()> {
        self.on_commit(ctx)?;
        self.set_c_active(self.active());
        Ok(())
    }
}

/// Common activation driver (spec §4.D "Common contract"): opens a transaction if none is open,
/// runs the node's `set_active_impl` hook, flips `active`, marks the node uncommitted, drains
/// the event queue, and commits only if this call is the one that opened the transaction.
/// Toggling to the current state is a no-op.
pub fn activate(directive: Rc<dyn Directive>, desired: bool) -> Result<()> {
    if directive.active() == desired {
        return Ok(());
    }
    let ctx = directive.ctx();
    let id = directive.id();
    let ctx_for_mark = ctx.clone();
    let for_body = directive.clone();
    let for_mark = directive.clone();
    ctx.transact(move || {
        for_body.set_active_impl(desired)?;
        for_body.set_active_flag(desired);
        ctx_for_mark.mark_directive_uncommitted(id, for_mark.clone());
        Ok(())
    })
}

/// Shared per-node bookkeeping: the owning context, the stable id used both as this node's key
/// in the uncommitted-directives set and (for `If`/`For`/`Assign`) as its watchset id, and the
/// `active`/`c_active` flags (spec §3 "Each directive carries a `ctx` back-reference, an `active`
/// flag ... and a `c_active` flag").
pub(crate) struct DirectiveBase {
    ctx: Context,
    id: Id,
    active: AtomicBool,
    c_active: AtomicBool,
}

impl DirectiveBase {
    pub(crate) fn new(ctx: Context) -> Self {
        let id = ctx.new_id();
        DirectiveBase {
            ctx,
            id,
            active: AtomicBool::new(false),
            c_active: AtomicBool::new(false),
        }
    }

    pub(crate) fn ctx(&self) -> Context {
        self.ctx.clone()
    }

    pub(crate) fn id(&self) -> Id {
        self.id
    }

    pub(crate) fn active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn set_active(&self, value: bool) {
        self.active.store(value, Ordering::Release);
    }

    pub(crate) fn c_active(&self) -> bool {
        self.c_active.load(Ordering::Acquire)
    }

    pub(crate) fn set_c_active(&self, value: bool) {
        self.c_active.store(value, Ordering::Release);
    }
}

impl Drop for DirectiveBase {
    fn drop(&mut self) {
        self.ctx.free_id(self.id);
    }
}

/// Permissive truthiness used by [`If`]'s condition and implicitly by any boolean-shaped rulebook
/// value: booleans and non-zero integers are truthy, anything else defaults to truthy (mirroring
/// the host rulebook language's own truthy-conversion rather than restricting conditions to a
/// bare `bool`).
pub(crate) fn is_truthy(value: &crate::compat::Value) -> bool {
    if let Some(b) = value.downcast_ref::<bool>() {
        return *b;
    }
    if let Some(n) = value.downcast_ref::<i64>() {
        return *n != 0;
    }
    true
}
