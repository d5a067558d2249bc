//! `Block` (spec §4.D): an ordered sequence of child directives, activated in declared order and
//! deactivated in reverse — later children may depend on reads produced by earlier ones.

use alloc::vec::Vec;

use crate::compat::Rc;
use crate::context::Context;
use crate::error::Result;
use crate::id::Id;

use super::{activate, Directive, DirectiveBase};

pub struct Block {
    base: DirectiveBase,
    body: Vec<Rc<dyn Directive>>,
}

impl Block {
    pub fn new(ctx: Context, body: Vec<Rc<dyn Directive>>) -> Rc<Self> {
        Rc::new(Block { base: DirectiveBase::new(ctx), body })
    }
}

impl Directive for Block {
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
            for child in &self.body {
                activate(child.clone(), true)?;
            }
        } else {
            for child in self.body.iter().rev() {
                activate(child.clone(), false)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::enter_leave::{EnterLeave, EnterLeaveEvent};
    use core::cell::RefCell;

    fn logging_enter_leave(
        ctx: &Context,
        event: EnterLeaveEvent,
        tag: &'static str,
        log: Rc<RefCell<Vec<&'static str>>>,
    ) -> Rc<EnterLeave> {
        EnterLeave::new(
            ctx.clone(),
            event,
            Rc::new(move |_ctx: &Context| {
                log.borrow_mut().push(tag);
                Ok(())
            }),
        )
    }

    #[test]
    fn activates_children_in_declared_order() {
        let ctx = Context::new();
        let log = Rc::new(RefCell::new(Vec::<&'static str>::new()));
        let a = logging_enter_leave(&ctx, EnterLeaveEvent::Enter, "a", log.clone());
        let b = logging_enter_leave(&ctx, EnterLeaveEvent::Enter, "b", log.clone());
        let block = Block::new(
            ctx.clone(),
            alloc::vec![a as Rc<dyn Directive>, b as Rc<dyn Directive>],
        );
        activate(block, true).unwrap();
        assert_eq!(*log.borrow(), alloc::vec!["a", "b"]);
    }

    #[test]
    fn deactivates_children_in_reverse_order() {
        let ctx = Context::new();
        let log = Rc::new(RefCell::new(Vec::<&'static str>::new()));
        let a = logging_enter_leave(&ctx, EnterLeaveEvent::Leave, "a", log.clone());
        let b = logging_enter_leave(&ctx, EnterLeaveEvent::Leave, "b", log.clone());
        let block = Block::new(
            ctx.clone(),
            alloc::vec![a as Rc<dyn Directive>, b as Rc<dyn Directive>],
        );
        activate(block.clone(), true).unwrap();
        assert!(log.borrow().is_empty());
        activate(block, false).unwrap();
        assert_eq!(*log.borrow(), alloc::vec!["b", "a"]);
    }
}
