//! `For` (spec §4.D): evaluates an iterable expression, diffs the resulting items against the
//! currently active per-item bodies by raw identity (not equality — "equal-but-distinct items
//! are treated as independent", matching `runtime.py::For`'s use of `id(item)`), and activates or
//! deactivates bodies for items that appeared or disappeared.

use alloc::vec::Vec;

use crate::compat::{Cell, Rc, Value, WatchFn, WeakRef};
use crate::context::Context;
use crate::error::Result;
use crate::expr::Expr;
use crate::id::Id;
use crate::key::{Sub, Target};
use crate::object::Object;

use super::{activate, Directive, DirectiveBase};

/// Raw identity of a `Value`, used the way the source uses Python's `id()`: two separately
/// constructed but `==`-equal items are still distinct loop items.
type ItemIdentity = usize;

fn item_identity(value: &Value) -> ItemIdentity {
    Rc::as_ptr(value) as *const () as ItemIdentity
}

struct ItemState {
    identity: ItemIdentity,
    body: Rc<dyn Directive>,
    /// Kept alive only so the identity above cannot be recycled by a later, unrelated item while
    /// this entry is still live.
    _item: Value,
}

pub struct For {
    base: DirectiveBase,
    iter: Expr,
    body_factory: crate::compat::BodyFactory,
    items: Cell<Vec<ItemState>>,
    self_weak: WeakRef<For>,
}

impl For {
    pub fn new(ctx: Context, iter: Expr, body_factory: crate::compat::BodyFactory) -> Rc<Self> {
        Rc::new_cyclic(|weak| For {
            base: DirectiveBase::new(ctx),
            iter,
            body_factory,
            items: Cell::new(Vec::new()),
            self_weak: weak.clone(),
        })
    }

    #[cfg(not(feature = "unsync"))]
    fn take_items(&self) -> Vec<ItemState> {
        core::mem::take(&mut *self.items.lock())
    }
    #[cfg(feature = "unsync")]
    fn take_items(&self) -> Vec<ItemState> {
        core::mem::take(&mut *self.items.borrow_mut())
    }

    #[cfg(not(feature = "unsync"))]
    fn put_items(&self, items: Vec<ItemState>) {
        *self.items.lock() = items;
    }
    #[cfg(feature = "unsync")]
    fn put_items(&self, items: Vec<ItemState>) {
        *self.items.borrow_mut() = items;
    }

    fn collect_current(value: &Value) -> Vec<Value> {
        if let Some(object) = value.downcast_ref::<Object>() {
            object.iter_items()
        } else if let Some(items) = value.downcast_ref::<Vec<Value>>() {
            items.clone()
        } else {
            Vec::new()
        }
    }

    fn reevaluate(&self, ctx: &Context) -> Result<()> {
        let iter_expr = self.iter.clone();
        let ctx_for_iter = ctx.clone();
        let (iter_value, mut deps) = ctx.track_reads(move || iter_expr.call(&ctx_for_iter))?;

        if let Some(object) = iter_value.downcast_ref::<Object>() {
            deps.push(Target::new(object.key(), Sub::Iter));
        }

        let current = Self::collect_current(&iter_value);
        let mut previous = self.take_items();
        let mut next = Vec::with_capacity(current.len());

        for item in &current {
            let identity = item_identity(item);
            if let Some(pos) = previous.iter().position(|entry| entry.identity == identity) {
                next.push(previous.remove(pos));
            } else {
                let body = (self.body_factory)(item.clone());
                activate(body.clone(), true)?;
                next.push(ItemState { identity, body, _item: item.clone() });
            }
        }
        for leftover in previous {
            activate(leftover.body, false)?;
        }
        self.put_items(next);

        let self_weak = self.self_weak.clone();
        let watch_handler: WatchFn = Rc::new(move |ctx: &Context| match self_weak.upgrade() {
            Some(this) => this.reevaluate(ctx),
            None => Ok(()),
        });
        ctx.add_watchset(deps, watch_handler, Some(self.base.id()));
        Ok(())
    }
}

impl Directive for For {
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
            for leftover in self.take_items() {
                activate(leftover.body, false)?;
            }
            ctx.remove_watchset(self.base.id());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::enter_leave::{EnterLeave, EnterLeaveEvent};
    use crate::directive::Block;
    use core::cell::RefCell;

    fn counting_body_factory(active: Rc<RefCell<Vec<i64>>>) -> crate::compat::BodyFactory {
        Rc::new(move |item: Value| {
            let n = *item.downcast_ref::<i64>().unwrap();
            let on_enter = active.clone();
            let on_leave = active.clone();
            let ctx = Context::new();
            let enter = EnterLeave::new(
                ctx.clone(),
                EnterLeaveEvent::Enter,
                Rc::new(move |_ctx| {
                    on_enter.borrow_mut().push(n);
                    Ok(())
                }),
            );
            let leave = EnterLeave::new(
                ctx.clone(),
                EnterLeaveEvent::Leave,
                Rc::new(move |_ctx| {
                    on_leave.borrow_mut().retain(|&x| x != n);
                    Ok(())
                }),
            );
            Block::new(ctx, alloc::vec![enter as Rc<dyn Directive>, leave as Rc<dyn Directive>])
                as Rc<dyn Directive>
        })
    }

    #[test]
    fn activates_a_body_per_item_and_reacts_to_list_change() {
        let ctx = Context::new();
        let list_obj = Object::new();
        list_obj.set_item(0i64, 1i64);
        list_obj.set_item(1i64, 2i64);
        ctx.ns().set_attr("lst", list_obj.clone());

        let iter_expr = Expr::new(|ctx: &Context| {
            let wrapped = ctx.nswrap().get_attr("lst")?;
            Ok(wrapped.into_value())
        });

        let active = Rc::new(RefCell::new(Vec::new()));
        let for_node = For::new(ctx.clone(), iter_expr, counting_body_factory(active.clone()));
        activate(for_node.clone(), true).unwrap();
        assert_eq!(*active.borrow(), alloc::vec![1, 2]);

        list_obj.remove_item(0i64);
        assert_eq!(*active.borrow(), alloc::vec![2]);

        list_obj.set_item(2i64, 3i64);
        assert_eq!(*active.borrow(), alloc::vec![2, 3]);

        activate(for_node, false).unwrap();
        assert!(active.borrow().is_empty());
    }
}
