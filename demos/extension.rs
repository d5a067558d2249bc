//! Host-defined commit validation via `set_setter` (spec §10.5, the `set_<name>` idiom): while
//! `should_cancel` is set, the `x` attribute's setter silently refuses whatever value the engine
//! is about to commit, leaving the host's own value untouched — demonstrating that a rejecting
//! setter, not a vote/cancel protocol, is this engine's extension point for vetoing a write.

use std::io::BufRead;
use std::sync::{Arc, Mutex};

use rulebook_core::directive::{activate, Assign, Directive};
use rulebook_core::key::Sub;
use rulebook_core::{Context, Expr, Object};

#[derive(Debug, Default, Clone, Copy)]
struct Item(usize);

fn main() {
    let ctx = Context::new();
    ctx.ns().set_attr("line_chars", 0i64);

    let host = Object::new();
    host.set_attr("x", Item::default());

    let should_cancel = Arc::new(Mutex::new(false));
    {
        let host_for_setter = host.clone();
        let should_cancel = should_cancel.clone();
        host.set_setter("x", move |new_value| {
            let prev = host_for_setter.get_attr("x").unwrap().downcast_ref::<Item>().copied().unwrap();
            let next = *new_value.downcast_ref::<Item>().unwrap();
            if *should_cancel.lock().unwrap() {
                println!("-> prevented change: {} => {}", prev.0, next.0);
            } else {
                println!("-> made change: {} => {}", prev.0, next.0);
                host_for_setter.set_attr("x", next);
            }
        });
    }

    let host_for_obj = host.clone();
    let assign = Assign::new(
        ctx.clone(),
        Expr::new(move |_ctx| Ok(Arc::new(host_for_obj.clone()) as _)),
        Sub::attr("x"),
        Expr::new(|ctx: &Context| {
            let chars = ctx.nswrap().get_attr("line_chars")?.into_value();
            let chars = *chars.downcast_ref::<i64>().unwrap_or(&0);
            Ok(Arc::new(Item(chars as usize)) as _)
        }),
        None,
        None,
    );
    activate(assign as Arc<dyn Directive>, true).expect("activation of a freshly built tree never fails");

    for line in std::io::stdin().lock().lines().flatten() {
        match line.as_str() {
            "@exit" => {
                println!("Exiting...");
                break;
            }
            "@toggle" => {
                let mut cancel = should_cancel.lock().unwrap();
                *cancel = !*cancel;
            }
            "@val" => {
                let x = host.get_attr("x").unwrap().downcast_ref::<Item>().copied().unwrap();
                println!("-> x = {}", x.0);
            }
            _ => {
                ctx.ns().set_attr("line_chars", line.chars().count() as i64);
            }
        }
    }
}
