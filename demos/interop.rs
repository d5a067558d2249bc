//! Two ways to let a resource that isn't itself built for reactive storage interoperate with the
//! engine: wrapping it behind `Arc<Mutex<_>>` and keeping it entirely outside the value-set graph
//! (approach #1), versus storing it as a plain `Send + Sync` value directly on a host `Object` and
//! read-modify-writing it through `get_attr`/`set_attr` (approach #2) — the latter only works
//! because, unlike an `Assign`'s right-hand side, a plain attribute write runs exactly once per
//! call rather than needing to tolerate repeated re-evaluation.

use std::error::Error;
use std::io::BufRead;
use std::sync::{Arc, Mutex};

use rulebook_core::Object;

struct Resource {
    counter: usize,
}

impl Resource {
    fn new(initial: usize) -> Self {
        Resource { counter: initial }
    }

    fn modify(&mut self) {
        self.counter += 1;
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    // approach #1 - Arc<Mutex<_>>, held entirely outside any `Object`.
    let resource1 = Arc::new(Mutex::new(Resource::new(1)));

    // approach #2 - a plain `Send + Sync` value stored directly as an attribute.
    let host = Object::new();
    host.set_attr("resource2", Resource::new(10));

    for line in std::io::stdin().lock().lines().flatten() {
        if line == "@exit" {
            println!("Exiting...");
            break;
        }

        {
            let mut resource = resource1.lock().expect("mutex lock acquired");
            resource.modify();
            println!("-> approach #1 - {}", resource.counter);
        }

        let mut resource = host.get_attr("resource2").unwrap().downcast_ref::<Resource>().map(|r| Resource::new(r.counter)).unwrap();
        resource.modify();
        println!("-> approach #2 - {}", resource.counter);
        host.set_attr("resource2", resource);
    }

    Ok(())
}
