//! Reactive line/character counters built entirely out of the directive tree: `average` is an
//! `Assign` whose right-hand side reads the `lines`/`chars` namespace attributes, so writing
//! either one automatically re-triggers `average`'s recomputation and commits the new value —
//! no explicit recompute call anywhere in the input loop below.

use std::io::BufRead;
use std::sync::Arc;

use rulebook_core::directive::{activate, Assign, Block, Directive};
use rulebook_core::key::Sub;
use rulebook_core::{Context, Expr};

fn main() {
    let ctx = Context::new();
    ctx.ns().set_attr("lines", 0i64);
    ctx.ns().set_attr("chars", 0i64);

    let root_expr = Expr::new(|ctx: &Context| Ok(Arc::new(ctx.ns()) as _));
    let average_rhs = Expr::new(|ctx: &Context| {
        let lines = ctx.nswrap().get_attr("lines")?.into_value();
        let chars = ctx.nswrap().get_attr("chars")?.into_value();
        let lines = *lines.downcast_ref::<i64>().unwrap_or(&0);
        let chars = *chars.downcast_ref::<i64>().unwrap_or(&0);
        let avg = if lines == 0 { 0.0 } else { chars as f64 / lines as f64 };
        Ok(Arc::new(avg) as _)
    });
    let average = Assign::new(ctx.clone(), root_expr, Sub::attr("average"), average_rhs, None, None);

    let root: Arc<dyn Directive> = Block::new(ctx.clone(), vec![average as Arc<dyn Directive>]);
    activate(root, true).expect("activation of a freshly built tree never fails");

    for line in std::io::stdin().lock().lines().flatten() {
        match line.as_str() {
            "@exit" => {
                println!("Exiting...");
                break;
            }
            "@lines" => {
                println!("-> {} lines read", read_i64(&ctx, "lines"));
            }
            "@chars" => {
                println!("-> {} characters read", read_i64(&ctx, "chars"));
            }
            "@avg" => {
                let avg = ctx.ns().get_attr("average").unwrap();
                println!("-> average of {:.2} characters read per line", avg.downcast_ref::<f64>().unwrap());
            }
            _ => {
                let lines = read_i64(&ctx, "lines");
                ctx.ns().set_attr("lines", lines + 1);
                let chars = read_i64(&ctx, "chars");
                ctx.ns().set_attr("chars", chars + line.chars().count() as i64);
            }
        }
    }
}

fn read_i64(ctx: &Context, name: &str) -> i64 {
    ctx.ns().get_attr(name).unwrap().downcast_ref::<i64>().copied().unwrap()
}
