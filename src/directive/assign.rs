//! `Assign` (spec §4.D): installs a value-set entry at `(obj, kind, sub)`, re-evaluating and
//! relocating that entry whenever its dependencies change. Grounded on `runtime.py::Assign`,
//! including its weak-held "last target" used to locate the prior entry when `obj` itself
//! changes (LHS relocation, spec §8 scenario 2).

use alloc::vec::Vec;

use crate::compat::{Cell, Combinator, Rc, Value, WatchFn, WeakRef};
use crate::context::Context;
use crate::error::{EngineError, Result};
use crate::expr::Expr;
use crate::id::Id;
use crate::key::{Sub, Target};
use crate::object::Object;

use super::{Directive, DirectiveBase};

pub struct Assign {
    base: DirectiveBase,
    obj: Expr,
    sub: Sub,
    rhs: Expr,
    prio: Option<Expr>,
    combinator: Option<Combinator>,
    last_target: Cell<Option<Target>>,
    self_weak: WeakRef<Assign>,
}

impl Assign {
    pub fn new(
        ctx: Context,
        obj: Expr,
        sub: Sub,
        rhs: Expr,
        prio: Option<Expr>,
        combinator: Option<Combinator>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|weak| Assign {
            base: DirectiveBase::new(ctx),
            obj,
            sub,
            rhs,
            prio,
            combinator,
            last_target: Cell::new(None),
            self_weak: weak.clone(),
        })
    }

    #[cfg(not(feature = "unsync"))]
    fn last_target(&self) -> Option<Target> {
        self.last_target.lock().clone()
    }
    #[cfg(feature = "unsync")]
    fn last_target(&self) -> Option<Target> {
        self.last_target.borrow().clone()
    }

    #[cfg(not(feature = "unsync"))]
    fn set_last_target(&self, target: Option<Target>) {
        *self.last_target.lock() = target;
    }
    #[cfg(feature = "unsync")]
    fn set_last_target(&self, target: Option<Target>) {
        *self.last_target.borrow_mut() = target;
    }

    fn reevaluate(&self, ctx: &Context) -> Result<()> {
        let obj_expr = self.obj.clone();
        let ctx_for_obj = ctx.clone();
        let (obj_value, mut deps) = ctx.track_reads(move || obj_expr.call(&ctx_for_obj))?;

        let rhs_expr = self.rhs.clone();
        let ctx_for_rhs = ctx.clone();
        let (rhs_value, rhs_deps) = ctx.track_reads(move || rhs_expr.call(&ctx_for_rhs))?;
        deps.extend(rhs_deps);

        let priority = match &self.prio {
            Some(prio_expr) => {
                let prio_expr = prio_expr.clone();
                let ctx_for_prio = ctx.clone();
                let (prio_value, prio_deps) =
                    ctx.track_reads(move || prio_expr.call(&ctx_for_prio))?;
                deps.extend(prio_deps);
                *prio_value
                    .downcast_ref::<i64>()
                    .ok_or(EngineError::UnsupportedLvalue)?
            }
            None => 0,
        };

        let object: Object = obj_value
            .downcast_ref::<Object>()
            .cloned()
            .ok_or(EngineError::UnsupportedLvalue)?;
        let new_target = Target::new(object.key(), self.sub.clone());

        let previous = self.last_target();
        if previous.as_ref() != Some(&new_target) {
            if let Some(prev) = previous {
                ctx.remove_value(&prev, self.base.id())?;
            }
        }
        ctx.add_value(
            new_target.clone(),
            rhs_value,
            priority,
            Some(self.base.id()),
            self.combinator.clone(),
        )?;
        self.set_last_target(Some(new_target));

        let self_weak = self.self_weak.clone();
        let watch_handler: WatchFn = Rc::new(move |ctx: &Context| match self_weak.upgrade() {
            Some(this) => this.reevaluate(ctx),
            None => Ok(()),
        });
        ctx.add_watchset(deps, watch_handler, Some(self.base.id()));
        Ok(())
    }
}

impl Directive for Assign {
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
            let ctx = self.base.ctx();
            if let Some(prev) = self.last_target() {
                ctx.remove_value(&prev, self.base.id())?;
            }
            ctx.remove_watchset(self.base.id());
            self.set_last_target(None);
            Ok(())
        }
    }
}

#[allow(dead_code)]
fn _assert_value_bounds(_: Value) {}
