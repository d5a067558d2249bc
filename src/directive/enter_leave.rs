//! `EnterLeave` (spec §4.D): a lifecycle hook firing an opaque action on an activation/commit
//! transition. `enter`/`leave` fire during `set_active_impl`; `c_enter`/`c_leave` fire during
//! commit, once the *committed* state (as opposed to the merely intended `active` state)
//! transitions — grounded on `runtime.py`'s `import` translation into `enter:` actions and its
//! `c_enter`/`c_leave` commit-phase dispatch.

use crate::compat::{Action, Rc};
use crate::context::Context;
use crate::error::Result;
use crate::id::Id;

use super::{Directive, DirectiveBase};

/// Which transition this node's action is wired to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnterLeaveEvent {
    Enter,
    Leave,
    CEnter,
    CLeave,
}

pub struct EnterLeave {
    base: DirectiveBase,
    event: EnterLeaveEvent,
    action: Action,
}

impl EnterLeave {
    pub fn new(ctx: Context, event: EnterLeaveEvent, action: Action) -> Rc<Self> {
        Rc::new(EnterLeave { base: DirectiveBase::new(ctx), event, action })
    }
}

impl Directive for EnterLeave {
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
        match (self.event, desired) {
            (EnterLeaveEvent::Enter, true) => (self.action)(&self.base.ctx()),
            (EnterLeaveEvent::Leave, false) => (self.action)(&self.base.ctx()),
            _ => Ok(()),
        }
    }

    fn on_commit(&self, ctx: &Context) -> Result<()> {
        let was = self.c_active();
        let now = self.active();
        match (self.event, was, now) {
            (EnterLeaveEvent::CEnter, false, true) => (self.action)(ctx),
            (EnterLeaveEvent::CLeave, true, false) => (self.action)(ctx),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::activate;
    use core::cell::RefCell;

    #[test]
    fn c_enter_fires_only_after_commit() {
        let ctx = Context::new();
        let fired = Rc::new(RefCell::new(false));
        let fired_clone = fired.clone();
        let node: Rc<dyn Directive> = EnterLeave::new(
            ctx.clone(),
            EnterLeaveEvent::CEnter,
            Rc::new(move |_ctx: &Context| {
                *fired_clone.borrow_mut() = true;
                Ok(())
            }),
        );
        activate(node, true).unwrap();
        assert!(*fired.borrow());
    }

    #[test]
    fn enter_fires_during_set_active_before_commit() {
        let ctx = Context::new();
        let order = Rc::new(RefCell::new(alloc::vec::Vec::<&'static str>::new()));
        let order_clone = order.clone();
        let node: Rc<dyn Directive> = EnterLeave::new(
            ctx.clone(),
            EnterLeaveEvent::Enter,
            Rc::new(move |_ctx: &Context| {
                order_clone.borrow_mut().push("enter");
                Ok(())
            }),
        );
        activate(node, true).unwrap();
        assert_eq!(*order.borrow(), alloc::vec!["enter"]);
    }
}
