//! Typed failures for every way a rulebook can go wrong at runtime (spec §7).
//!
//! The original implementation reported most of these as a bare `RuntimeError` with a
//! human-readable message; `korhah`, this crate's structural ancestor, reports cancellation as a
//! bare `Err(())`. Neither is enough detail for callers that need to distinguish "an Assign
//! oscillated" from "you double-wrapped an object", so each case gets its own variant.

use alloc::string::String;
use alloc::vec::Vec;

use crate::key::Target;

/// A snapshot of a [`Target`](crate::key::Target) suitable for embedding in an error, taken
/// without needing to keep the target (and thus the object it points at) alive afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDebug {
    pub kind: &'static str,
    pub sub: String,
}

impl From<&Target> for TargetDebug {
    fn from(target: &Target) -> Self {
        TargetDebug {
            kind: target.sub.kind_name(),
            sub: alloc::format!("{:?}", target.sub),
        }
    }
}

/// Every failure mode the runtime core can surface (spec §7).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Load-time: assignment target is not attribute or item access.
    ///
    /// Surfaced here for completeness of the error contract even though this crate does not ship
    /// a loader itself (see `SPEC_FULL.md` §6) — an embedding loader should return this variant.
    #[error("assignment target is not an attribute or item access")]
    UnsupportedLvalue,

    /// Effective-value computation found no non-relative anchor entry in a value set.
    #[error("value set for {target:?} contains only relative values, no non-relative anchor")]
    EmptyBase { target: TargetDebug },

    /// Event drain exceeded `MAX_CHAIN` dispatches in a single `process_events` call.
    #[error("event chain exceeded {max_chain} dispatches at {target:?} (likely oscillation); next queued: {upcoming:?}")]
    Oscillation {
        max_chain: usize,
        target: TargetDebug,
        upcoming: Vec<TargetDebug>,
    },

    /// `commit()` called with no open transaction, or `begin()` called while one is already open.
    #[error("no transaction is open (or one is already open for begin())")]
    NoTransaction,

    /// `process_events` was called while already draining.
    #[error("process_events called re-entrantly")]
    NestedDrain,

    /// An already-wrapped object was wrapped again.
    #[error("object is already wrapped")]
    DoubleWrap,

    /// A write was attempted against a name shadowed by a namespace overlay.
    #[error("cannot write to overlay-shadowed name {name:?}")]
    ShadowedWrite { name: String },

    /// A weak reference to a tracked object failed to resolve.
    #[error("object no longer exists")]
    ObjectGone,
}

pub type Result<T> = core::result::Result<T, EngineError>;
