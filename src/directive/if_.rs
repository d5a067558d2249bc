//! `If` (spec §4.D): evaluates a condition inside a read-tracking frame, subscribes to its
//! dependencies *before* cascading into whichever branch is now live, and re-runs the same
//! evaluate-then-branch logic whenever a dependency changes. Watch registration precedes branch
//! activation so that if the branch's own computation re-triggers the condition, the new
//! dependency list replaces the old one atomically (spec §9 open question, resolved "before").

use crate::compat::{Rc, WatchFn, WeakRef};
use crate::context::Context;
use crate::error::Result;
use crate::expr::Expr;
use crate::id::Id;

use super::{activate, is_truthy, Directive, DirectiveBase};

pub struct If {
    base: DirectiveBase,
    cond: Expr,
    body: Rc<dyn Directive>,
    orelse: Option<Rc<dyn Directive>>,
    self_weak: WeakRef<If>,
}

impl If {
    pub fn new(
        ctx: Context,
        cond: Expr,
        body: Rc<dyn Directive>,
        orelse: Option<Rc<dyn Directive>>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|weak| If {
            base: DirectiveBase::new(ctx),
            cond,
            body,
            orelse,
            self_weak: weak.clone(),
        })
    }

    fn reevaluate(&self, ctx: &Context) -> Result<()> {
        let cond = self.cond.clone();
        let ctx_for_eval = ctx.clone();
        let (value, deps) = ctx.track_reads(move || cond.call(&ctx_for_eval))?;
        let truthy = is_truthy(&value);

        let self_weak = self.self_weak.clone();
        let watch_handler: WatchFn = Rc::new(move |ctx: &Context| match self_weak.upgrade() {
            Some(this) => this.reevaluate(ctx),
            None => Ok(()),
        });
        ctx.add_watchset(deps, watch_handler, Some(self.base.id()));

        activate(self.body.clone(), truthy)?;
        if let Some(orelse) = &self.orelse {
            activate(orelse.clone(), !truthy)?;
        }
        Ok(())
    }
}

impl Directive for If {
    fn ctx(&self) -> Context {
        self.base.ctx()
    }

    fn id(&self) -> Id {
        self.base.id()
    }

    fn active(&self) -> bool {
        self.base.active()
    }

    fn set_active_flag(&self, value: bool) {
        self.base.set_active(value);
    }

    fn c_active(&self) -> bool {
        self.base.c_active()
    }

    fn set_c_active(&self, value: bool) {
        self.base.set_c_active(value);
    }

    fn set_active_impl(&self, desired: bool) -> Result<()> {
        if desired {
            self.reevaluate(&self.base.ctx())
        } else {
            activate(self.body.clone(), false)?;
            if let Some(orelse) = &self.orelse {
                activate(orelse.clone(), false)?;
            }
            self.base.ctx().remove_watchset(self.base.id());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::enter_leave::{EnterLeave, EnterLeaveEvent};
    use crate::object::Object;
    use core::cell::RefCell;

    #[test]
    fn activates_body_when_cond_truthy_and_reacts_to_change() {
        let ctx = Context::new();
        let flag_obj = Object::new();
        flag_obj.set_attr("a", false);

        let body_log = Rc::new(RefCell::new(0usize));
        let body_log_clone = body_log.clone();
        let body: Rc<dyn Directive> = EnterLeave::new(
            ctx.clone(),
            EnterLeaveEvent::Enter,
            Rc::new(move |_ctx: &Context| {
                *body_log_clone.borrow_mut() += 1;
                Ok(())
            }),
        );

        let flag_obj_for_cond = flag_obj.clone();
        let ctx_for_cond = ctx.clone();
        let cond = Expr::new(move |_ctx| {
            let wrapper = ctx_for_cond.wrap(flag_obj_for_cond.clone());
            let value = wrapper.get_attr("a")?;
            Ok(value.into_value())
        });

        let if_node = If::new(ctx.clone(), cond, body, None);
        activate(if_node.clone(), true).unwrap();
        assert_eq!(*body_log.borrow(), 0);

        flag_obj.set_attr("a", true);
        assert_eq!(*body_log.borrow(), 1);
    }
}
