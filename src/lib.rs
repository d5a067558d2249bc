#![no_std]
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

extern crate alloc;

mod compat;

pub mod builder;
pub mod context;
pub mod directive;
pub mod error;
pub mod expr;
pub mod id;
pub mod key;
pub mod namespace;
pub mod object;
pub mod wrapper;

pub use builder::{DirectiveBuilder, RootDirective};
pub use context::Context;
pub use directive::{action, activate, body_factory, combinator, Directive};
pub use error::{EngineError, Result};
pub use expr::Expr;
pub use id::Id;
pub use key::{Key, Sub, Target};
pub use namespace::{BuiltinsTable, Namespace};
pub use object::{Object, Trackable};
pub use wrapper::{ObjectWrapper, Wrapped};
