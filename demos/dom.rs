//! A tiny reactive DOM: `p`'s `text` attribute is an `Assign` that mirrors whatever is currently
//! written to `input`'s `text`, and every element's parent-child link is wired up by an
//! `EnterLeave` whose `c_enter` action fires once the linking `Assign` actually commits.

use std::io::BufRead;
use std::sync::Arc;

use rulebook_core::directive::{activate, Assign, Block, Directive, EnterLeave, EnterLeaveEvent};
use rulebook_core::key::Sub;
use rulebook_core::{Context, Expr, Object};

/// Builds the pair of directives that both set `child.parent = parent` and, once that commits,
/// append `child` to `parent`'s `children` items.
fn link(ctx: &Context, parent: Object, child: Object) -> Arc<dyn Directive> {
    let parent_for_assign = parent.clone();
    let child_for_assign = child.clone();
    let set_parent = Assign::new(
        ctx.clone(),
        Expr::new(move |_ctx| Ok(Arc::new(child_for_assign.clone()) as _)),
        Sub::attr("parent"),
        Expr::new(move |_ctx| Ok(Arc::new(parent_for_assign.clone()) as _)),
        None,
        None,
    );

    let child_for_link = child.clone();
    let attach = EnterLeave::new(ctx.clone(), EnterLeaveEvent::CEnter, {
        let parent = parent.clone();
        move |_ctx: &Context| {
            let next_key = parent.iter_items().len() as i64;
            parent.set_item(next_key, child_for_link.clone());
            Ok(())
        }
    });

    Block::new(ctx.clone(), vec![set_parent as Arc<dyn Directive>, attach as Arc<dyn Directive>])
}

fn main() {
    let ctx = Context::new();

    let body = Object::new();
    let input = Object::new();
    input.set_attr("text", String::new());
    let p = Object::new();

    let input_for_expr = input.clone();
    let p_for_expr = p.clone();
    let mirror_text = Assign::new(
        ctx.clone(),
        Expr::new(move |_ctx| Ok(Arc::new(p_for_expr.clone()) as _)),
        Sub::attr("text"),
        Expr::new(move |ctx: &Context| {
            let wrapped = ctx.wrap(input_for_expr.clone()).get_attr("text")?;
            Ok(wrapped.into_value())
        }),
        None,
        None,
    );

    let root: Arc<dyn Directive> = Block::new(
        ctx.clone(),
        vec![
            link(&ctx, body.clone(), input.clone()),
            link(&ctx, body.clone(), p.clone()),
            mirror_text as Arc<dyn Directive>,
        ],
    );
    activate(root, true).expect("activation of a freshly built tree never fails");

    println!("dom ready: type text to append to `input`, or one of @body/@input/@p/#dom/#body/#input/#p/exit");
    let mut focused = Some(input.clone());
    for line in std::io::stdin().lock().lines().flatten() {
        match line.as_str() {
            "exit" => break,
            "@" => focused = None,
            "@body" => focused = Some(body.clone()),
            "@input" => focused = Some(input.clone()),
            "@p" => focused = Some(p.clone()),
            "#dom" | "#body" => print_element("body", &body),
            "#input" => print_element("input", &input),
            "#p" => print_element("p", &p),
            "$clear" => input.set_attr("text", String::new()),
            other => match &focused {
                Some(el) if *el == input => {
                    let mut text = el.get_attr("text").unwrap().downcast_ref::<String>().cloned().unwrap();
                    text.push_str(other);
                    el.set_attr("text", text);
                }
                Some(_) => println!("-> only `input` accepts text"),
                None => println!("-> no element has focus"),
            },
        }
    }
}

fn print_element(name: &str, el: &Object) {
    let text = el.get_attr("text").and_then(|v| v.downcast_ref::<String>().cloned());
    println!("{name}: text={text:?} children={}", el.iter_items().len());
}
