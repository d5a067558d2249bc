//! End-to-end scenarios against the public directive-tree API, one per rulebook shape named in
//! the runtime's testable-properties section: each builds a small hand-authored directive tree
//! (no loader in this crate) and drives it through external host mutations.

use std::sync::{Arc, Mutex};

use rulebook_core::directive::{activate, Assign, Block, Directive, For, If};
use rulebook_core::error::EngineError;
use rulebook_core::key::Sub;
use rulebook_core::{Context, Expr, Object};

fn read_i64(obj: &Object, name: &str) -> i64 {
    obj.get_attr(name).unwrap().downcast_ref::<i64>().copied().unwrap()
}

fn read_bool(obj: &Object, name: &str) -> bool {
    obj.get_attr(name).unwrap().downcast_ref::<bool>().copied().unwrap()
}

#[test]
fn scenario_1_simple_assign() {
    // y = x
    let ctx = Context::new();
    ctx.ns().set_attr("x", 5i64);

    let ns = ctx.ns();
    let assign = Assign::new(
        ctx.clone(),
        Expr::new({
            let ns = ns.clone();
            move |_ctx| Ok(Arc::new(ns.clone()) as _)
        }),
        Sub::attr("y"),
        Expr::new(|ctx: &Context| Ok(ctx.nswrap().get_attr("x")?.into_value())),
        None,
        None,
    );
    let root: Arc<dyn Directive> = assign;
    activate(root.clone(), true).unwrap();
    assert_eq!(read_i64(&ns, "y"), 5);

    ctx.ns().set_attr("x", 42i64);
    assert_eq!(read_i64(&ns, "y"), 42);

    activate(root, false).unwrap();
    // Deactivation removes the value-set entry; the host attribute retains its last committed
    // value rather than erroring or reverting (spec §8 boundary behaviour).
    ctx.ns().set_attr("y", 12i64);
    ctx.ns().set_attr("x", 24i64);
    assert_eq!(read_i64(&ns, "y"), 12);
}

#[test]
fn scenario_2_lhs_relocation() {
    // obj1.x = 0 / obj2.x = 0 / obj.x = 42 prio 5, relocating obj1 -> obj2
    let ctx = Context::new();
    let obj1 = Object::new();
    obj1.set_attr("x", 0i64);
    let obj2 = Object::new();
    obj2.set_attr("x", 0i64);
    ctx.ns().set_attr("obj", obj1.clone());

    let assign = Assign::new(
        ctx.clone(),
        Expr::new(|ctx: &Context| Ok(ctx.nswrap().get_attr("obj")?.into_value())),
        Sub::attr("x"),
        Expr::constant(42i64),
        Some(Expr::constant(5i64)),
        None,
    );
    activate(assign as Arc<dyn Directive>, true).unwrap();
    assert_eq!(read_i64(&obj1, "x"), 42);
    assert_eq!(read_i64(&obj2, "x"), 0);

    ctx.ns().set_attr("obj", obj2.clone());
    assert_eq!(read_i64(&obj2, "x"), 42);
    assert_eq!(read_i64(&obj1, "x"), 0);
}

#[test]
fn scenario_3_static_priority() {
    // x = 100 / x = 200 prio -5  =>  x == 100 (higher priority wins)
    let ctx = Context::new();
    let target = Object::new();
    target.set_attr("x", 0i64);

    let low = Assign::new(
        ctx.clone(),
        Expr::new({
            let target = target.clone();
            move |_ctx| Ok(Arc::new(target.clone()) as _)
        }),
        Sub::attr("x"),
        Expr::constant(200i64),
        Some(Expr::constant(-5i64)),
        None,
    );
    let high = Assign::new(
        ctx.clone(),
        Expr::new({
            let target = target.clone();
            move |_ctx| Ok(Arc::new(target.clone()) as _)
        }),
        Sub::attr("x"),
        Expr::constant(100i64),
        Some(Expr::constant(0i64)),
        None,
    );
    let root: Arc<dyn Directive> =
        Block::new(ctx.clone(), vec![low as Arc<dyn Directive>, high as Arc<dyn Directive>]);
    activate(root, true).unwrap();
    assert_eq!(read_i64(&target, "x"), 100);
}

#[test]
fn scenario_4_dynamic_priority() {
    // x = 0 prio 0 / x = 1 prio myprio
    let ctx = Context::new();
    let target = Object::new();
    target.set_attr("x", 0i64);
    ctx.ns().set_attr("myprio", 100i64);

    let base = Assign::new(
        ctx.clone(),
        Expr::new({
            let target = target.clone();
            move |_ctx| Ok(Arc::new(target.clone()) as _)
        }),
        Sub::attr("x"),
        Expr::constant(0i64),
        Some(Expr::constant(0i64)),
        None,
    );
    let dynamic = Assign::new(
        ctx.clone(),
        Expr::new({
            let target = target.clone();
            move |_ctx| Ok(Arc::new(target.clone()) as _)
        }),
        Sub::attr("x"),
        Expr::constant(1i64),
        Some(Expr::new(|ctx: &Context| Ok(ctx.nswrap().get_attr("myprio")?.into_value()))),
        None,
    );
    let root: Arc<dyn Directive> =
        Block::new(ctx.clone(), vec![base as Arc<dyn Directive>, dynamic as Arc<dyn Directive>]);
    activate(root, true).unwrap();
    assert_eq!(read_i64(&target, "x"), 1);

    ctx.ns().set_attr("myprio", -100i64);
    assert_eq!(read_i64(&target, "x"), 0);
}

#[test]
fn scenario_5_conditional() {
    // b = False / if a: b = True prio 10
    let ctx = Context::new();
    ctx.ns().set_attr("a", false);
    ctx.ns().set_attr("b", false);

    let ns = ctx.ns();
    let base = Assign::new(
        ctx.clone(),
        Expr::new({
            let ns = ns.clone();
            move |_ctx| Ok(Arc::new(ns.clone()) as _)
        }),
        Sub::attr("b"),
        Expr::constant(false),
        None,
        None,
    );
    let conditional = Assign::new(
        ctx.clone(),
        Expr::new({
            let ns = ns.clone();
            move |_ctx| Ok(Arc::new(ns.clone()) as _)
        }),
        Sub::attr("b"),
        Expr::constant(true),
        Some(Expr::constant(10i64)),
        None,
    );
    let if_node = If::new(
        ctx.clone(),
        Expr::new(|ctx: &Context| Ok(ctx.nswrap().get_attr("a")?.into_value())),
        conditional as Arc<dyn Directive>,
        None,
    );
    let root: Arc<dyn Directive> =
        Block::new(ctx.clone(), vec![base as Arc<dyn Directive>, if_node as Arc<dyn Directive>]);
    activate(root, true).unwrap();
    assert!(!read_bool(&ns, "b"));

    ctx.ns().set_attr("a", true);
    assert!(read_bool(&ns, "b"));

    ctx.ns().set_attr("a", false);
    assert!(!read_bool(&ns, "b"));
}

#[test]
fn scenario_6_iteration() {
    // for itm in lst: itm.y = itm.x
    let ctx = Context::new();
    let obj1 = Object::new();
    obj1.set_attr("x", 10i64);
    let obj2 = Object::new();
    obj2.set_attr("x", 20i64);

    let lst = Object::new();
    lst.set_item(0i64, obj1.clone());
    ctx.ns().set_attr("lst", lst.clone());

    let body_factory = rulebook_core::directive::body_factory(move |item| {
        let item_obj = item.downcast_ref::<Object>().unwrap().clone();
        let item_for_rhs = item_obj.clone();
        Assign::new(
            Context::new(),
            Expr::new(move |_ctx| Ok(Arc::new(item_obj.clone()) as _)),
            Sub::attr("y"),
            Expr::new(move |ctx: &Context| Ok(ctx.wrap(item_for_rhs.clone()).get_attr("x")?.into_value())),
            None,
            None,
        ) as Arc<dyn Directive>
    });
    let for_node = For::new(
        ctx.clone(),
        Expr::new(|ctx: &Context| Ok(ctx.nswrap().get_attr("lst")?.into_value())),
        body_factory,
    );
    activate(for_node as Arc<dyn Directive>, true).unwrap();
    assert_eq!(read_i64(&obj1, "y"), 10);

    lst.set_item(1i64, obj2.clone());
    assert_eq!(read_i64(&obj1, "y"), 10);
    assert_eq!(read_i64(&obj2, "y"), 20);
}

#[test]
fn scenario_7_transactional_glitch_free_write() {
    // A host attribute that rejects odd numbers; three assigns targeting it are activated inside
    // one explicit transaction, so the host must see exactly the final, even, effective value and
    // never one of the intermediate odd ones a naive per-activate auto-commit would expose.
    let ctx = Context::new();
    let host = Object::new();
    host.set_attr("x", 0i64);

    let seen: Arc<Mutex<Vec<i64>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = seen.clone();
        host.set_setter("x", move |value| {
            let n = *value.downcast_ref::<i64>().unwrap();
            assert_eq!(n % 2, 0, "host must never observe an odd intermediate value");
            seen.lock().unwrap().push(n);
        });
    }

    let host_for_a = host.clone();
    let a = Assign::new(
        ctx.clone(),
        Expr::new(move |_ctx| Ok(Arc::new(host_for_a.clone()) as _)),
        Sub::attr("x"),
        Expr::constant(1i64),
        Some(Expr::constant(0i64)),
        None,
    );
    let host_for_b = host.clone();
    let b = Assign::new(
        ctx.clone(),
        Expr::new(move |_ctx| Ok(Arc::new(host_for_b.clone()) as _)),
        Sub::attr("x"),
        Expr::constant(3i64),
        Some(Expr::constant(1i64)),
        None,
    );
    let host_for_c = host.clone();
    let c = Assign::new(
        ctx.clone(),
        Expr::new(move |_ctx| Ok(Arc::new(host_for_c.clone()) as _)),
        Sub::attr("x"),
        Expr::constant(4i64),
        Some(Expr::constant(2i64)),
        None,
    );

    ctx.begin().unwrap();
    activate(a as Arc<dyn Directive>, true).unwrap();
    activate(b as Arc<dyn Directive>, true).unwrap();
    activate(c as Arc<dyn Directive>, true).unwrap();
    ctx.commit().unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![4]);
    assert_eq!(read_i64(&host, "x"), 4);
}

#[test]
fn boundary_empty_value_set_retains_last_committed_value() {
    let ctx = Context::new();
    let target = Object::new();
    target.set_attr("x", 7i64);

    let assign = Assign::new(
        ctx.clone(),
        Expr::new({
            let target = target.clone();
            move |_ctx| Ok(Arc::new(target.clone()) as _)
        }),
        Sub::attr("x"),
        Expr::constant(99i64),
        None,
        None,
    );
    activate(assign.clone() as Arc<dyn Directive>, true).unwrap();
    assert_eq!(read_i64(&target, "x"), 99);

    activate(assign as Arc<dyn Directive>, false).unwrap();
    // The value set for `x` is now empty; the runtime leaves the host's last value alone rather
    // than erroring or clearing it (spec §4.B "kept as the last value, like a floating line").
    assert_eq!(read_i64(&target, "x"), 99);
}

#[test]
fn boundary_oscillation_stashes_error_within_max_chain() {
    // x = y + 1 / y = x + 1: a directly self-sustaining cascade with no fixed point, capped well
    // below the default so the test doesn't have to dispatch a thousand hops to observe it.
    let ctx = Context::with_max_chain(50);
    let ns = ctx.ns();
    ns.set_attr("x", 0i64);
    ns.set_attr("y", 0i64);

    let x_assign = Assign::new(
        ctx.clone(),
        Expr::new({
            let ns = ns.clone();
            move |_ctx| Ok(Arc::new(ns.clone()) as _)
        }),
        Sub::attr("x"),
        Expr::new(|ctx: &Context| {
            let y = ctx.nswrap().get_attr("y")?.into_value();
            Ok(Arc::new(*y.downcast_ref::<i64>().unwrap() + 1) as _)
        }),
        None,
        None,
    );
    let y_assign = Assign::new(
        ctx.clone(),
        Expr::new({
            let ns = ns.clone();
            move |_ctx| Ok(Arc::new(ns.clone()) as _)
        }),
        Sub::attr("y"),
        Expr::new(|ctx: &Context| {
            let x = ctx.nswrap().get_attr("x")?.into_value();
            Ok(Arc::new(*x.downcast_ref::<i64>().unwrap() + 1) as _)
        }),
        None,
        None,
    );
    let root: Arc<dyn Directive> =
        Block::new(ctx.clone(), vec![x_assign as Arc<dyn Directive>, y_assign as Arc<dyn Directive>]);
    // Activating the second assign immediately drives the cascade past max_chain. The failure
    // surfaces through the context's infallible auto-drain path rather than `activate`'s own
    // `Result`, matching how an externally triggered oscillation would be reported.
    activate(root, true).unwrap();

    match ctx.take_last_error() {
        Some(EngineError::Oscillation { max_chain, .. }) => assert_eq!(max_chain, 50),
        other => panic!("expected a stashed Oscillation error, got {:?}", other),
    }
}
