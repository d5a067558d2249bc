//! The global bookkeeping plane (spec §4.B), grounded on `runtime.py::Runtime`: value sets,
//! the pending-event queue, the watch registry, the read-tracking stack and transaction state
//! all live here. Every other component (`Object`, `ObjectWrapper`, directives, `Namespace`)
//! reaches back into a `Context` to do anything observable.

use alloc::collections::{BTreeMap, BTreeSet, VecDeque};
use alloc::vec::Vec;

use indexmap::IndexMap;

use crate::compat::{Cell, Combinator, GlobalCommitHook, Rc, Value, WatchFn};
use crate::directive::Directive;
use crate::error::{EngineError, Result, TargetDebug};
use crate::id::{Id, IdAllocator};
use crate::key::{Sub, Target};
use crate::namespace::{BuiltinsTable, Namespace};
use crate::object::Object;

/// Oscillation cap (spec §4.B): a single `process_events` drain that dispatches more than this
/// many watcher invocations aborts with [`EngineError::Oscillation`]. Fixed at 1000 in the
/// original source; overridable per [`Context`] via [`Context::with_max_chain`] (spec §10.3).
pub const MAX_CHAIN: usize = 1000;

#[cfg(not(feature = "unsync"))]
pub(crate) type ContextHandle = alloc::sync::Weak<Cell<ContextState>>;
#[cfg(feature = "unsync")]
pub(crate) type ContextHandle = alloc::rc::Weak<Cell<ContextState>>;

struct ValueEntry {
    value: Value,
    priority: i64,
    combinator: Option<Combinator>,
}

struct TargetWatchers {
    handlers: IndexMap<Id, WatchFn, ahash::RandomState>,
    /// The id this target was registered under on the host object's own tracker registry, so it
    /// can be torn down once the last handler for this target is removed. `None` if the object
    /// had already been reclaimed by the time anyone first watched this target.
    object_tracker_id: Option<Id>,
}

pub(crate) struct ContextState {
    ids: IdAllocator,
    valuesets: BTreeMap<Target, BTreeMap<Id, ValueEntry>>,
    /// Per-transaction staging map (spec §3 invariant 3), insertion-ordered so commit's
    /// write-through happens "in insertion order" (spec §9 Transactional staging).
    uncommitted: IndexMap<Target, Value, ahash::RandomState>,
    uncommitted_directives: IndexMap<Id, Rc<dyn Directive>, ahash::RandomState>,
    watchsets: BTreeMap<Id, Vec<Target>>,
    watchers: BTreeMap<Target, TargetWatchers>,
    queue: VecDeque<Target>,
    inhibit: BTreeMap<Target, usize>,
    in_transaction: bool,
    processing: bool,
    read_stack: Vec<BTreeSet<Target>>,
    commit_hooks: Vec<GlobalCommitHook>,
    last_error: Option<EngineError>,
    max_chain: usize,
    ns: Namespace,
}

/// The runtime's central bookkeeping plane (spec §4.B).
///
/// # Example
/// ```
/// use rulebook_core::context::Context;
///
/// let ctx = Context::new();
/// ctx.ns().set_attr("x", 5i64);
/// assert_eq!(
///     ctx.ns().get_attr("x").unwrap().downcast_ref::<i64>().copied(),
///     Some(5)
/// );
/// ```
#[derive(Clone)]
pub struct Context(Rc<Cell<ContextState>>);

impl Default for Context {
    fn default() -> Self {
        Context::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Context::construct(&BuiltinsTable::new(), MAX_CHAIN)
    }

    /// Builds a context whose namespace falls through unresolved reads to `builtins`
    /// (spec §4.A, §10.5).
    pub fn with_builtins(builtins: &BuiltinsTable) -> Self {
        Context::construct(builtins, MAX_CHAIN)
    }

    /// Builds a context with a non-default oscillation cap (spec §10.3). Mainly useful for test
    /// harnesses that want to exercise near-`MAX_CHAIN` chains without the default cap's cost.
    pub fn with_max_chain(max_chain: usize) -> Self {
        Context::construct(&BuiltinsTable::new(), max_chain)
    }

    fn construct(builtins: &BuiltinsTable, max_chain: usize) -> Self {
        let state = ContextState {
            ids: IdAllocator::default(),
            valuesets: BTreeMap::new(),
            uncommitted: IndexMap::with_hasher(ahash::RandomState::new()),
            uncommitted_directives: IndexMap::with_hasher(ahash::RandomState::new()),
            watchsets: BTreeMap::new(),
            watchers: BTreeMap::new(),
            queue: VecDeque::new(),
            inhibit: BTreeMap::new(),
            in_transaction: false,
            processing: false,
            read_stack: Vec::new(),
            commit_hooks: Vec::new(),
            last_error: None,
            max_chain,
            ns: Namespace::new(builtins),
        };
        Context(Rc::new(Cell::new(state)))
    }

    #[cfg(not(feature = "unsync"))]
    fn hold(&self) -> crate::compat::Guard<'_, ContextState> {
        self.0.lock()
    }
    #[cfg(feature = "unsync")]
    fn hold(&self) -> crate::compat::Guard<'_, ContextState> {
        self.0.borrow_mut()
    }

    pub(crate) fn downgrade(&self) -> ContextHandle {
        Rc::downgrade(&self.0)
    }

    pub(crate) fn new_id(&self) -> Id {
        self.hold().ids.alloc()
    }

    /// Returns a directive's id to the pool once the directive itself is dropped (see
    /// `DirectiveBase`'s `Drop` impl) — the id's value-set/watchset registrations are always torn
    /// down well before this point, via deactivation.
    pub(crate) fn free_id(&self, id: Id) {
        self.hold().ids.free(id);
    }

    /// The root namespace object (spec §6: "`ns`, the root namespace, a trackable object").
    pub fn ns(&self) -> Object {
        self.hold().ns.object().clone()
    }

    /// A wrapper over [`Context::ns`] (spec §6: "`nswrap`, its wrapper").
    pub fn nswrap(&self) -> crate::wrapper::ObjectWrapper {
        self.wrap(self.ns())
    }

    /// Registers a hook invoked with every object touched by a commit, after per-object
    /// `_rbk_commit` hooks have run (spec §4.B step 3d).
    pub fn add_commit_hook<F>(&self, hook: F)
    where
        F: Fn(&[Object]) + crate::compat::FnBounds + 'static,
    {
        self.hold().commit_hooks.push(Rc::new(hook));
    }

    /// The most recent failure surfaced while auto-draining an externally triggered change
    /// (spec §10.5 design note: the trackable protocol's `track`/`untrack`/fire path is
    /// infallible by contract, so failures reaching it through [`Context::notify_change`] are
    /// logged and stashed here rather than silently dropped).
    pub fn take_last_error(&self) -> Option<EngineError> {
        self.hold().last_error.take()
    }

    fn max_chain(&self) -> usize {
        self.hold().max_chain
    }

    // ---- value-set engine (spec §4.B, §3) ----

    pub(crate) fn add_value(
        &self,
        target: Target,
        value: Value,
        priority: i64,
        id: Option<Id>,
        combinator: Option<Combinator>,
    ) -> Result<Id> {
        let id = id.unwrap_or_else(|| self.new_id());
        {
            let mut state = self.hold();
            state
                .valuesets
                .entry(target.clone())
                .or_default()
                .insert(id, ValueEntry { value, priority, combinator });
        }
        log::trace!("add_value target={:?} id={}", target, id);
        self.value_set_changed(&target)?;
        Ok(id)
    }

    pub(crate) fn remove_value(&self, target: &Target, id: Id) -> Result<()> {
        let existed = {
            let mut state = self.hold();
            let existed = state
                .valuesets
                .get_mut(target)
                .map(|set| set.remove(&id).is_some())
                .unwrap_or(false);
            if let Some(set) = state.valuesets.get(target) {
                if set.is_empty() {
                    state.valuesets.remove(target);
                }
            }
            existed
        };
        if existed {
            log::trace!("remove_value target={:?} id={}", target, id);
            self.value_set_changed(target)?;
        }
        Ok(())
    }

    /// The effective-value rule of spec §4.B: descending-priority scan for the highest-priority
    /// non-relative anchor, then fold relative entries above it from lowest to highest priority.
    fn compute_effective(&self, target: &Target) -> Result<Option<Value>> {
        let state = self.hold();
        let set = match state.valuesets.get(target) {
            Some(set) if !set.is_empty() => set,
            _ => return Ok(None),
        };
        // `set` iterates ascending by `Id`; a stable sort on descending priority keeps that as
        // the tie-break order, which is how this crate resolves spec §9's "implementation
        // defined but deterministic" open question.
        let mut entries: Vec<(&Id, &ValueEntry)> = set.iter().collect();
        entries.sort_by(|a, b| b.1.priority.cmp(&a.1.priority));

        let anchor_pos = entries
            .iter()
            .position(|(_, entry)| entry.combinator.is_none());
        let anchor_pos = match anchor_pos {
            Some(pos) => pos,
            None => return Err(EngineError::EmptyBase { target: target.into() }),
        };

        let mut base = entries[anchor_pos].1.value.clone();
        for (_, entry) in entries[0..anchor_pos].iter().rev() {
            if let Some(comb) = &entry.combinator {
                base = comb(base, entry.value.clone());
            }
        }
        Ok(Some(base))
    }

    /// Stages the new effective value and, if one exists, immediately notifies the target's
    /// watchers (spec §4.B: `_value_set_changed` enqueues within the same drain rather than
    /// waiting for the eventual physical write-through, which is what lets a chain like
    /// `x = y + 1` / `y = x + 1` cascade — and oscillate — inside a single `process_events` call).
    fn value_set_changed(&self, target: &Target) -> Result<()> {
        log::debug!("value_set_changed target={:?}", target);
        match self.compute_effective(target)? {
            Some(value) => {
                self.hold().uncommitted.insert(target.clone(), value);
                self.notify_change(target.clone());
            }
            None => {
                self.hold().uncommitted.shift_remove(target);
            }
        }
        Ok(())
    }

    // ---- read tracking (spec §4.B track_reads, §4.C) ----

    pub(crate) fn push_frame(&self) {
        self.hold().read_stack.push(BTreeSet::new());
    }

    pub(crate) fn pop_frame(&self) -> Vec<Target> {
        self.hold()
            .read_stack
            .pop()
            .map(|frame| frame.into_iter().collect())
            .unwrap_or_default()
    }

    pub(crate) fn report_read(&self, target: &Target) {
        let mut state = self.hold();
        if let Some(frame) = state.read_stack.last_mut() {
            frame.insert(target.clone());
        }
    }

    /// Evaluates `f` inside a fresh read-tracking frame and returns its result paired with the
    /// distinct targets read during the call (spec §4.B `track_reads`).
    pub fn track_reads<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<(T, Vec<Target>)> {
        self.push_frame();
        let result = f();
        let deps = self.pop_frame();
        Ok((result?, deps))
    }

    pub(crate) fn read_value(&self, target: &Target) -> Result<Value> {
        self.report_read(target);
        if let Some(value) = self.hold().uncommitted.get(target).cloned() {
            return Ok(value);
        }
        let object = target.object.upgrade().ok_or(EngineError::ObjectGone)?;
        match &target.sub {
            Sub::Attr(name) => object.get_attr(name.as_ref()).ok_or(EngineError::ObjectGone),
            Sub::Item(key) => object.get_item(key.clone()).ok_or(EngineError::ObjectGone),
            Sub::Iter => Err(EngineError::UnsupportedLvalue),
        }
    }

    // ---- watch sets (spec §4.B add_watchset/remove_watchset) ----

    pub(crate) fn add_watchset(
        &self,
        targets: Vec<Target>,
        handler: WatchFn,
        id: Option<Id>,
    ) -> Id {
        let id = id.unwrap_or_else(|| self.new_id());
        self.remove_watchset(id);
        log::trace!("add_watchset id={} targets={:?}", id, targets);
        for target in &targets {
            self.subscribe_target(target, id, handler.clone());
        }
        self.hold().watchsets.insert(id, targets);
        id
    }

    pub(crate) fn remove_watchset(&self, id: Id) {
        let targets = self.hold().watchsets.remove(&id);
        if let Some(targets) = targets {
            log::trace!("remove_watchset id={}", id);
            for target in targets {
                self.unsubscribe_target(&target, id);
            }
        }
    }

    fn subscribe_target(&self, target: &Target, id: Id, handler: WatchFn) {
        log::trace!("subscribe_target target={:?} id={}", target, id);
        let already_watched = self.hold().watchers.contains_key(target);
        if !already_watched {
            let object_tracker_id = target.object.upgrade().map(|object| {
                let ctx_handle = self.downgrade();
                let sub = target.sub.clone();
                object.track(
                    Some(sub),
                    Rc::new(move |fired: Target| {
                        if let Some(ctx) = upgrade_ctx(&ctx_handle) {
                            ctx.notify_change(fired);
                        }
                    }),
                )
            });
            self.hold().watchers.insert(
                target.clone(),
                TargetWatchers {
                    handlers: IndexMap::with_hasher(ahash::RandomState::new()),
                    object_tracker_id,
                },
            );
        }
        if let Some(tw) = self.hold().watchers.get_mut(target) {
            tw.handlers.insert(id, handler);
        }
    }

    fn unsubscribe_target(&self, target: &Target, id: Id) {
        log::trace!("unsubscribe_target target={:?} id={}", target, id);
        let tracker_to_remove = {
            let mut state = self.hold();
            match state.watchers.get_mut(target) {
                Some(tw) => {
                    tw.handlers.shift_remove(&id);
                    if tw.handlers.is_empty() {
                        let tracker_id = tw.object_tracker_id;
                        state.watchers.remove(target);
                        Some(tracker_id)
                    } else {
                        None
                    }
                }
                None => None,
            }
        };
        if let Some(Some(tracker_id)) = tracker_to_remove {
            if let Some(object) = target.object.upgrade() {
                object.untrack(Some(target.sub.clone()), tracker_id);
            }
        }
    }

    // ---- suspension inhibit (spec §4.B) ----

    pub(crate) fn inhibit_notify(&self, target: Target) -> InhibitGuard {
        *self.hold().inhibit.entry(target.clone()).or_insert(0) += 1;
        InhibitGuard { ctx: self.clone(), target }
    }

    fn is_inhibited(&self, target: &Target) -> bool {
        self.hold().inhibit.get(target).copied().unwrap_or(0) > 0
    }

    // ---- event queue / transactions (spec §4.B) ----

    /// Enqueues `target` for dispatch, auto-draining (wrapped in its own transaction) unless a
    /// drain is already in progress higher up the call stack.
    pub fn notify_change(&self, target: Target) {
        if self.is_inhibited(&target) {
            return;
        }
        log::trace!("notify_change {:?}", target);
        self.hold().queue.push_back(target);
        let already_processing = self.hold().processing;
        if !already_processing {
            if let Err(e) = self.transact(|| Ok(())) {
                log::error!("auto-drain failed: {}", e);
                self.hold().last_error = Some(e);
            }
        }
    }

    pub fn begin(&self) -> Result<()> {
        let mut state = self.hold();
        if state.in_transaction {
            return Err(EngineError::NoTransaction);
        }
        state.in_transaction = true;
        log::debug!("begin transaction");
        Ok(())
    }

    pub fn commit(&self) -> Result<()> {
        if !self.hold().in_transaction {
            return Err(EngineError::NoTransaction);
        }
        log::debug!("commit: directive phase");
        let directives: Vec<Rc<dyn Directive>> = {
            let mut state = self.hold();
            state.uncommitted_directives.drain(..).map(|(_, d)| d).collect()
        };
        for directive in &directives {
            directive.commit(self)?;
        }

        log::debug!("commit: write-through phase");
        let writes: Vec<(Target, Value)> = {
            let mut state = self.hold();
            state.uncommitted.drain(..).collect()
        };
        let mut touched: Vec<Object> = Vec::new();
        for (target, value) in writes {
            if let Some(object) = target.object.upgrade() {
                let _guard = self.inhibit_notify(target.clone());
                match &target.sub {
                    Sub::Attr(name) => object.commit_attr(name.as_ref(), value),
                    Sub::Item(key) => object.set_item_value(key.clone(), value),
                    Sub::Iter => {}
                }
                if !touched.iter().any(|o| o == &object) {
                    touched.push(object);
                }
            }
        }

        log::debug!("commit: per-object hook phase");
        let mut ordered: Vec<(i64, Object)> = touched
            .into_iter()
            .filter_map(|o| o.commit_hook_order().map(|order| (order, o)))
            .collect();
        ordered.sort_by_key(|(order, _)| *order);
        let ordered_objects: Vec<Object> = ordered.into_iter().map(|(_, o)| o).collect();
        for object in &ordered_objects {
            object.run_commit_hook(&ordered_objects);
        }

        log::debug!("commit: global hook phase");
        let hooks: Vec<GlobalCommitHook> = self.hold().commit_hooks.clone();
        for hook in &hooks {
            hook(&ordered_objects);
        }

        self.hold().in_transaction = false;
        Ok(())
    }

    pub(crate) fn is_in_transaction(&self) -> bool {
        self.hold().in_transaction
    }

    pub(crate) fn mark_directive_uncommitted(&self, id: Id, directive: Rc<dyn Directive>) {
        self.hold().uncommitted_directives.insert(id, directive);
    }

    pub fn process_events(&self) -> Result<()> {
        {
            let mut state = self.hold();
            if state.processing {
                return Err(EngineError::NestedDrain);
            }
            state.processing = true;
        }
        log::debug!("process_events: begin drain");
        let result = self.drain_loop();
        self.hold().processing = false;
        log::debug!("process_events: end drain");
        result
    }

    fn drain_loop(&self) -> Result<()> {
        let mut dispatched = 0usize;
        loop {
            let target = self.hold().queue.pop_front();
            let target = match target {
                Some(t) => t,
                None => break,
            };
            let handlers: Vec<WatchFn> = self
                .hold()
                .watchers
                .get(&target)
                .map(|tw| tw.handlers.values().cloned().collect())
                .unwrap_or_default();
            for handler in handlers {
                dispatched += 1;
                if dispatched > self.max_chain() {
                    let upcoming: Vec<TargetDebug> = {
                        let state = self.hold();
                        state.queue.iter().take(5).map(TargetDebug::from).collect()
                    };
                    return Err(EngineError::Oscillation {
                        max_chain: self.max_chain(),
                        target: (&target).into(),
                        upcoming,
                    });
                }
                handler(self)?;
            }
        }
        Ok(())
    }

    /// Runs `body`, opening a transaction first unless one is already open, draining the queue
    /// afterwards unless a drain is already running higher up the call stack, and committing
    /// only if this call is the one that opened the transaction (spec §4.D common directive
    /// contract; also used for the "auto-opened for a single outside-initiated change" case of
    /// §4.B). Grounded on `runtime.py::Directive.set_active`'s `if not self.ctx._processing: ...`
    /// guard: a nested call reached from inside an active drain (e.g. a watch handler activating
    /// a child directive) must leave draining to the enclosing `process_events`, not attempt its
    /// own — otherwise it fails with `NestedDrain`, aborting the whole call chain before the
    /// outermost `transact` ever reaches `commit()`.
    pub(crate) fn transact<F>(&self, body: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        let opened = !self.is_in_transaction();
        if opened {
            self.begin()?;
        }
        let body_result = body();
        let already_processing = self.hold().processing;
        let drain_result = if body_result.is_ok() && !already_processing {
            self.process_events()
        } else {
            Ok(())
        };
        let result = body_result.and(drain_result);
        if opened && result.is_ok() {
            self.commit()?;
        }
        result
    }
}

fn upgrade_ctx(handle: &ContextHandle) -> Option<Context> {
    handle.upgrade().map(Context)
}

/// RAII guard suppressing notifications for one target while held (spec §4.B suspension
/// inhibit). Dropping it re-enables notification once no other guard for the same target is
/// outstanding.
pub(crate) struct InhibitGuard {
    ctx: Context,
    target: Target,
}

impl Drop for InhibitGuard {
    fn drop(&mut self) {
        let mut state = self.ctx.hold();
        if let Some(count) = state.inhibit.get_mut(&self.target) {
            *count -= 1;
            if *count == 0 {
                state.inhibit.remove(&self.target);
            }
        }
    }
}
