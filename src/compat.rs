//! Compile-time choice between a `Send + Sync` core (default, `Arc` + `spin::Mutex`) and a
//! single-threaded core (`unsync` feature, `Rc` + `RefCell`). Every type alias that the rest of
//! the crate builds on is defined once per branch here, mirroring how closures, values and
//! handlers are bounded in each mode.

pub use compat::*;

#[cfg(not(feature = "unsync"))]
mod compat {
    use alloc::boxed::Box;
    use core::any::Any;

    pub(crate) use ::spin::{Mutex as Cell, MutexGuard as Guard};
    pub(crate) use alloc::sync::Arc as Rc;
    pub(crate) use alloc::sync::Weak as WeakRef;

    use crate::{error::EngineError, key::Target, object::Object};

    /// Bound required of anything stored as a type-erased value in a value set.
    pub trait ValueBounds: Any + Send + Sync {}
    impl<T: Any + Send + Sync> ValueBounds for T {}

    /// Bound required of closures captured by expressions, trackers and directive hooks.
    pub trait FnBounds: Send + Sync {}
    impl<F: Send + Sync> FnBounds for F {}

    pub(crate) type Value = Rc<dyn Any + Send + Sync>;

    pub(crate) type TrackHandler = Rc<dyn Fn(Target) + Send + Sync>;
    pub(crate) type ExprFn =
        Rc<dyn Fn(&crate::context::Context) -> Result<Value, EngineError> + Send + Sync>;
    pub(crate) type WatchFn =
        Rc<dyn Fn(&crate::context::Context) -> Result<(), EngineError> + Send + Sync>;
    pub(crate) type Combinator = Rc<dyn Fn(Value, Value) -> Value + Send + Sync>;
    pub(crate) type Action =
        Rc<dyn Fn(&crate::context::Context) -> Result<(), EngineError> + Send + Sync>;
    pub(crate) type BodyFactory =
        Rc<dyn Fn(Value) -> Rc<dyn crate::directive::Directive> + Send + Sync>;
    pub(crate) type CommitHook = Box<dyn Fn(&[Object]) + Send + Sync>;
    pub(crate) type GlobalCommitHook = Rc<dyn Fn(&[Object]) + Send + Sync>;
    pub(crate) type AttrSetter = Rc<dyn Fn(Value) + Send + Sync>;
}

#[cfg(feature = "unsync")]
mod compat {
    use alloc::boxed::Box;
    use core::any::Any;

    pub(crate) use alloc::rc::Rc;
    pub(crate) use alloc::rc::Weak as WeakRef;
    pub(crate) use core::cell::{RefCell as Cell, RefMut as Guard};

    use crate::{error::EngineError, key::Target, object::Object};

    /// Bound required of anything stored as a type-erased value in a value set.
    pub trait ValueBounds: Any {}
    impl<T: Any> ValueBounds for T {}

    /// Bound required of closures captured by expressions, trackers and directive hooks.
    pub trait FnBounds {}
    impl<F> FnBounds for F {}

    pub(crate) type Value = Rc<dyn Any>;

    pub(crate) type TrackHandler = Rc<dyn Fn(Target)>;
    pub(crate) type ExprFn = Rc<dyn Fn(&crate::context::Context) -> Result<Value, EngineError>>;
    pub(crate) type WatchFn = Rc<dyn Fn(&crate::context::Context) -> Result<(), EngineError>>;
    pub(crate) type Combinator = Rc<dyn Fn(Value, Value) -> Value>;
    pub(crate) type Action = Rc<dyn Fn(&crate::context::Context) -> Result<(), EngineError>>;
    pub(crate) type BodyFactory = Rc<dyn Fn(Value) -> Rc<dyn crate::directive::Directive>>;
    pub(crate) type CommitHook = Box<dyn Fn(&[Object])>;
    pub(crate) type GlobalCommitHook = Rc<dyn Fn(&[Object])>;
    pub(crate) type AttrSetter = Rc<dyn Fn(Value)>;
}
