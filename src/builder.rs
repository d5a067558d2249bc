//! The node-assembly seam an embedding rulebook-syntax loader would call (spec §6): this crate
//! parses no source text and ships no `load_string`/`load_file` — only the *builder* half of
//! that surface, a thin facade over the constructors already used to hand-build every directive
//! tree in this crate's own tests, plus the `(root, ctx)` pair a loader's `load_string`/
//! `load_file` would hand back to its caller.

use alloc::vec::Vec;

use crate::compat::{Action, BodyFactory, Combinator, Rc};
use crate::context::Context;
use crate::directive::{Assign, Block, Directive, EnterLeave, EnterLeaveEvent, For, If};
use crate::error::Result;
use crate::expr::Expr;
use crate::key::Sub;

/// A fully-assembled directive tree paired with the [`Context`] it was built against — the
/// return shape spec §6 names for `load_string`/`load_file`.
#[derive(Clone)]
pub struct RootDirective {
    root: Rc<dyn Directive>,
    ctx: Context,
}

impl RootDirective {
    pub fn new(root: Rc<dyn Directive>, ctx: Context) -> Self {
        RootDirective { root, ctx }
    }

    pub fn ctx(&self) -> Context {
        self.ctx.clone()
    }

    pub fn root(&self) -> Rc<dyn Directive> {
        self.root.clone()
    }

    /// Activates or deactivates the root directive (spec §6 "Directive control": typical use
    /// toggles the root, though any sub-directive may also be driven directly through
    /// [`crate::directive::activate`]).
    pub fn set_active(&self, desired: bool) -> Result<()> {
        crate::directive::activate(self.root.clone(), desired)
    }
}

/// Node-by-node assembly facade over `Block`/`If`/`For`/`Assign`/`EnterLeave`'s own
/// constructors. An external loader compiling rulebook source text into a directive tree calls
/// these instead of naming the concrete directive types directly.
pub struct DirectiveBuilder {
    ctx: Context,
}

impl DirectiveBuilder {
    pub fn new(ctx: Context) -> Self {
        DirectiveBuilder { ctx }
    }

    pub fn ctx(&self) -> Context {
        self.ctx.clone()
    }

    pub fn block(&self, body: Vec<Rc<dyn Directive>>) -> Rc<dyn Directive> {
        Block::new(self.ctx.clone(), body) as Rc<dyn Directive>
    }

    pub fn if_(
        &self,
        cond: Expr,
        body: Rc<dyn Directive>,
        orelse: Option<Rc<dyn Directive>>,
    ) -> Rc<dyn Directive> {
        If::new(self.ctx.clone(), cond, body, orelse) as Rc<dyn Directive>
    }

    pub fn for_(&self, iter: Expr, body_factory: BodyFactory) -> Rc<dyn Directive> {
        For::new(self.ctx.clone(), iter, body_factory) as Rc<dyn Directive>
    }

    pub fn assign(
        &self,
        obj: Expr,
        sub: Sub,
        rhs: Expr,
        prio: Option<Expr>,
        combinator: Option<Combinator>,
    ) -> Rc<dyn Directive> {
        Assign::new(self.ctx.clone(), obj, sub, rhs, prio, combinator) as Rc<dyn Directive>
    }

    pub fn enter_leave(&self, event: EnterLeaveEvent, action: Action) -> Rc<dyn Directive> {
        EnterLeave::new(self.ctx.clone(), event, action) as Rc<dyn Directive>
    }

    /// Pairs an assembled tree with this builder's context — what a loader calls once the whole
    /// tree has been built, matching `load_string`/`load_file`'s documented return shape.
    pub fn finish(&self, root: Rc<dyn Directive>) -> RootDirective {
        RootDirective::new(root, self.ctx.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;

    #[test]
    fn builder_assembles_and_activates_a_simple_assign() {
        let ctx = Context::new();
        let target = Object::new();
        target.set_attr("x", 0i64);

        let builder = DirectiveBuilder::new(ctx.clone());
        let target_for_obj = target.clone();
        let assign = builder.assign(
            Expr::new(move |_ctx| Ok(Rc::new(target_for_obj.clone()) as _)),
            Sub::attr("x"),
            Expr::constant(7i64),
            None,
            None,
        );
        let root = builder.finish(assign);
        root.set_active(true).unwrap();
        assert_eq!(
            target.get_attr("x").unwrap().downcast_ref::<i64>().copied(),
            Some(7)
        );
    }
}
