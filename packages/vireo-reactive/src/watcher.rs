use std::cell::{Cell, RefCell};
use std::mem;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashSet;

use crate::dep::{Dep, DepId, TargetGuard};
use crate::error::{self, BoxError, ReactiveError};
use crate::scheduler;
use crate::scope::Scope;
use crate::traverse::traverse;
use crate::value::Value;

pub type WatcherId = u64;

pub type Evaluator = Box<dyn FnMut() -> Result<Value, BoxError>>;
pub type WatchCallback = Box<dyn FnMut(&Value, &Value) -> Result<(), BoxError>>;
pub type BeforeHook = Box<dyn FnMut()>;

/// The three watcher variants, distinguished by evaluation timing and
/// side-effect policy.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum WatcherKind {
    /// Eager; the evaluator is the render effect itself.
    Render,
    /// Lazy; evaluated on demand, cached until a dependency marks it dirty.
    Computed,
    /// Eager with a change callback; evaluator and callback errors are
    /// reported, not rethrown. `deep` touches every nested cell of the
    /// result, `sync` bypasses the scheduler.
    UserWatch { deep: bool, sync: bool },
}

impl WatcherKind {
    fn is_lazy(self) -> bool {
        matches!(self, WatcherKind::Computed)
    }

    fn is_user(self) -> bool {
        matches!(self, WatcherKind::UserWatch { .. })
    }

    fn is_deep(self) -> bool {
        matches!(self, WatcherKind::UserWatch { deep: true, .. })
    }

    fn is_sync(self) -> bool {
        matches!(self, WatcherKind::UserWatch { sync: true, .. })
    }
}

thread_local! {
    static NEXT_WATCHER_ID: Cell<WatcherId> = const { Cell::new(1) };
}

/// A tracked unit of re-evaluable work. Wraps an evaluator, re-collects its
/// dependency set on every run, and fires its downstream effect when the
/// produced value changed.
///
/// The creation-order id is the scheduler's sole ordering key: parents are
/// created before children, computed sources before their readers, so an
/// ascending-id flush recomputes things in the right order.
pub struct Watcher {
    id: WatcherId,
    kind: WatcherKind,
    weak_self: Weak<Watcher>,
    owner: Weak<Scope>,
    getter: RefCell<Evaluator>,
    cb: RefCell<Option<WatchCallback>>,
    before: RefCell<Option<BeforeHook>>,
    value: RefCell<Value>,
    active: Cell<bool>,
    dirty: Cell<bool>,
    // Confirmed dependency set from the last completed run, and the staging
    // set being collected during the current run. Reconciled by
    // `cleanup_deps` after every evaluation.
    deps: RefCell<Vec<Rc<Dep>>>,
    new_deps: RefCell<Vec<Rc<Dep>>>,
    dep_ids: RefCell<FxHashSet<DepId>>,
    new_dep_ids: RefCell<FxHashSet<DepId>>,
}

impl Watcher {
    fn create(
        owner: &Rc<Scope>,
        kind: WatcherKind,
        getter: Evaluator,
        cb: Option<WatchCallback>,
        before: Option<BeforeHook>,
    ) -> Rc<Self> {
        let id = NEXT_WATCHER_ID.with(|c| {
            let id = c.get();
            c.set(id + 1);
            id
        });
        let watcher = Rc::new_cyclic(|weak| Watcher {
            id,
            kind,
            weak_self: weak.clone(),
            owner: Rc::downgrade(owner),
            getter: RefCell::new(getter),
            cb: RefCell::new(cb),
            before: RefCell::new(before),
            value: RefCell::new(Value::Undefined),
            active: Cell::new(true),
            dirty: Cell::new(kind.is_lazy()),
            deps: RefCell::new(Vec::new()),
            new_deps: RefCell::new(Vec::new()),
            dep_ids: RefCell::new(FxHashSet::default()),
            new_dep_ids: RefCell::new(FxHashSet::default()),
        });
        owner.register(&watcher);
        watcher
    }

    /// A render watcher: evaluates immediately, re-runs through the
    /// scheduler. `before` is invoked by the flush loop right before each
    /// re-run (pre-update lifecycle).
    pub fn render(
        owner: &Rc<Scope>,
        getter: impl FnMut() -> Result<Value, BoxError> + 'static,
        before: Option<BeforeHook>,
    ) -> Result<Rc<Self>, ReactiveError> {
        let watcher = Self::create(owner, WatcherKind::Render, Box::new(getter), None, before);
        let value = watcher.get()?;
        *watcher.value.borrow_mut() = value;
        Ok(watcher)
    }

    /// A computed watcher: zero evaluations until the first `evaluate`.
    pub fn computed(
        owner: &Rc<Scope>,
        getter: impl FnMut() -> Result<Value, BoxError> + 'static,
    ) -> Rc<Self> {
        Self::create(owner, WatcherKind::Computed, Box::new(getter), None, None)
    }

    /// A user watch: evaluates immediately, fires `cb(new, old)` on change.
    pub fn user(
        owner: &Rc<Scope>,
        getter: impl FnMut() -> Result<Value, BoxError> + 'static,
        cb: impl FnMut(&Value, &Value) -> Result<(), BoxError> + 'static,
        deep: bool,
        sync: bool,
    ) -> Result<Rc<Self>, ReactiveError> {
        let watcher = Self::create(
            owner,
            WatcherKind::UserWatch { deep, sync },
            Box::new(getter),
            Some(Box::new(cb)),
            None,
        );
        let value = watcher.get()?;
        *watcher.value.borrow_mut() = value;
        Ok(watcher)
    }

    pub fn id(&self) -> WatcherId {
        self.id
    }

    pub fn kind(&self) -> WatcherKind {
        self.kind
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Last value produced by the evaluator.
    pub fn value(&self) -> Value {
        self.value.borrow().clone()
    }

    /// Evaluate the getter and re-collect dependencies.
    ///
    /// Occupies the collecting slot for the duration of the evaluator, then
    /// reconciles the staging dependency set against the confirmed one on
    /// every exit path. User-watch evaluator failures are reported and
    /// collapse to `Undefined`; all other failures propagate.
    pub fn get(&self) -> Result<Value, ReactiveError> {
        let guard = TargetGuard::push(self.weak_self.upgrade());
        let result = (self.getter.borrow_mut())();
        let outcome = match result {
            Ok(value) => {
                if self.kind.is_deep() {
                    // Touch everything nested in the result so each cell
                    // registers this watcher before collection stops.
                    traverse(&value);
                }
                Ok(value)
            }
            Err(source) => {
                let err = ReactiveError::Evaluator {
                    id: self.id,
                    source,
                };
                if self.kind.is_user() {
                    error::report(&err);
                    Ok(Value::Undefined)
                } else {
                    Err(err)
                }
            }
        };
        drop(guard);
        self.cleanup_deps();
        outcome
    }

    /// Called by `Dep::depend` while this watcher occupies the collecting
    /// slot. The staging set deduplicates within a run; the confirmed set
    /// check avoids re-subscribing to a dep that persisted from the last run.
    pub(crate) fn add_dep(&self, dep: &Rc<Dep>) {
        let id = dep.id();
        if !self.new_dep_ids.borrow().contains(&id) {
            self.new_dep_ids.borrow_mut().insert(id);
            self.new_deps.borrow_mut().push(dep.clone());
            if !self.dep_ids.borrow().contains(&id) {
                dep.add_sub(self.weak_self.clone());
            }
        }
    }

    /// Unsubscribe from deps the latest run no longer read, then promote the
    /// staging set to confirmed. The two buffers swap instead of
    /// reallocating.
    fn cleanup_deps(&self) {
        {
            let new_ids = self.new_dep_ids.borrow();
            for dep in self.deps.borrow().iter() {
                if !new_ids.contains(&dep.id()) {
                    dep.remove_sub(self.id);
                }
            }
        }
        mem::swap(
            &mut *self.dep_ids.borrow_mut(),
            &mut *self.new_dep_ids.borrow_mut(),
        );
        self.new_dep_ids.borrow_mut().clear();
        mem::swap(&mut *self.deps.borrow_mut(), &mut *self.new_deps.borrow_mut());
        self.new_deps.borrow_mut().clear();
    }

    /// Notification entry point, invoked by a dep on change.
    pub fn update(&self) {
        if self.kind.is_lazy() {
            self.dirty.set(true);
        } else if self.kind.is_sync() {
            if let Err(err) = self.run() {
                error::report(&err);
            }
        } else if let Some(this) = self.weak_self.upgrade() {
            scheduler::queue_watcher(this);
        }
    }

    /// Re-evaluate and fire the downstream effect. Invoked by the scheduler
    /// during flush and by `update` for sync watchers.
    pub(crate) fn run(&self) -> Result<(), ReactiveError> {
        if !self.active.get() {
            return Ok(());
        }
        let value = self.get()?;
        let old_value = self.value.borrow().clone();
        // Reference results always count as changed: in-place mutation is
        // invisible to an identity comparison. Same for deep watchers.
        if value != old_value || value.is_object() || self.kind.is_deep() {
            *self.value.borrow_mut() = value.clone();
            if let Some(cb) = self.cb.borrow_mut().as_mut() {
                if let Err(source) = cb(&value, &old_value) {
                    error::report(&ReactiveError::Callback {
                        id: self.id,
                        source,
                    });
                }
            }
        }
        Ok(())
    }

    /// Force an evaluation and clear the dirty bit. Only meaningful for
    /// computed watchers; fires no downstream effect — the caller pulls the
    /// value.
    pub fn evaluate(&self) -> Result<(), ReactiveError> {
        let value = self.get()?;
        *self.value.borrow_mut() = value;
        self.dirty.set(false);
        Ok(())
    }

    /// Propagate the current collecting watcher's interest to every dep this
    /// watcher already tracks, without re-evaluating. Lets a reader of a
    /// computed value transitively subscribe to the computed's own inputs.
    pub fn depend(&self) {
        let deps: Vec<Rc<Dep>> = self.deps.borrow().clone();
        for dep in deps {
            dep.depend();
        }
    }

    pub(crate) fn invoke_before(&self) {
        if let Some(before) = self.before.borrow_mut().as_mut() {
            before();
        }
    }

    /// Remove self from every subscribed dep and from the owner registry.
    /// Idempotent; a torn-down watcher ignores later updates and runs.
    pub fn teardown(&self) {
        if !self.active.get() {
            return;
        }
        if let Some(owner) = self.owner.upgrade() {
            // The registry scan is skipped while the whole scope is being
            // torn down; the scope drops its list wholesale.
            if !owner.is_being_destroyed() {
                owner.remove(self.id);
            }
        }
        for dep in self.deps.borrow().iter() {
            dep.remove_sub(self.id);
        }
        self.active.set(false);
        tracing::trace!(watcher = self.id, "watcher torn down");
    }
}
