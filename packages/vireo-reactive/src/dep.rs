use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::config;
use crate::watcher::{Watcher, WatcherId};

pub type DepId = u64;

thread_local! {
    static NEXT_DEP_ID: Cell<DepId> = const { Cell::new(0) };
    // The watcher currently collecting dependencies sits on top. `None`
    // entries suspend collection (see `untracked`).
    static TARGET_STACK: RefCell<Vec<Option<Rc<Watcher>>>> = const { RefCell::new(Vec::new()) };
}

/// An observable subject. Every reactive storage cell owns one; reads call
/// `depend` to turn themselves into graph edges, writes call `notify`.
///
/// Subscriber edges are weak: strong ownership of watchers belongs to their
/// `Scope` (and, transiently, the scheduler queue), so a dropped watcher can
/// never be kept alive by the cells it read.
pub struct Dep {
    id: DepId,
    weak_self: Weak<Dep>,
    subs: RefCell<SmallVec<[Weak<Watcher>; 4]>>,
}

impl Dep {
    pub fn new() -> Rc<Self> {
        let id = NEXT_DEP_ID.with(|c| {
            let id = c.get();
            c.set(id + 1);
            id
        });
        Rc::new_cyclic(|weak| Dep {
            id,
            weak_self: weak.clone(),
            subs: RefCell::new(SmallVec::new()),
        })
    }

    /// Unique per instance, assigned at construction. Used for dependency
    /// deduplication and diagnostics, never for equality.
    pub fn id(&self) -> DepId {
        self.id
    }

    /// Unconditional append; the watcher side deduplicates across runs.
    pub(crate) fn add_sub(&self, watcher: Weak<Watcher>) {
        self.subs.borrow_mut().push(watcher);
    }

    /// Removes by watcher id; also prunes entries whose watcher is gone.
    pub(crate) fn remove_sub(&self, id: WatcherId) {
        self.subs
            .borrow_mut()
            .retain(|w| w.upgrade().is_some_and(|w| w.id() != id));
    }

    /// Register this dep with the currently collecting watcher, if any.
    /// The single hook that turns a read into a graph edge.
    pub fn depend(&self) {
        if let Some(target) = current_target() {
            if let Some(this) = self.weak_self.upgrade() {
                target.add_dep(&this);
            }
        }
    }

    /// Tell every live subscriber that this dep changed.
    pub fn notify(&self) {
        // Stabilize the subscriber list first: an update may create new
        // watchers or tear down existing ones mid-iteration.
        let mut subs: Vec<Rc<Watcher>> = self
            .subs
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        if !config::async_enabled() {
            // Subs aren't sorted by the scheduler when batching is off, so
            // order them here to keep creation-order firing.
            subs.sort_by_key(|w| w.id());
        }
        for sub in subs {
            sub.update();
        }
    }

    /// Number of live subscribers. Diagnostic only.
    pub fn subscriber_count(&self) -> usize {
        self.subs
            .borrow()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    pub fn has_subscriber(&self, id: WatcherId) -> bool {
        self.subs
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .any(|w| w.id() == id)
    }
}

pub(crate) fn current_target() -> Option<Rc<Watcher>> {
    TARGET_STACK.with(|s| s.borrow().last().and_then(Clone::clone))
}

/// Scoped occupancy of the collecting slot. Pushes on construction, pops on
/// drop, so the pairing survives early returns and evaluator failures.
pub(crate) struct TargetGuard(());

impl TargetGuard {
    pub(crate) fn push(target: Option<Rc<Watcher>>) -> Self {
        TARGET_STACK.with(|s| s.borrow_mut().push(target));
        TargetGuard(())
    }
}

impl Drop for TargetGuard {
    fn drop(&mut self) {
        TARGET_STACK.with(|s| {
            s.borrow_mut().pop();
        });
    }
}

/// Evaluate `f` with dependency collection suspended. Reads inside the
/// closure do not attach to the enclosing watcher.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _guard = TargetGuard::push(None);
    f()
}
