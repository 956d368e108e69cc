use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::watcher::{Watcher, WatcherId};

/// Owner context for watchers. A component instance (or any other owning
/// collaborator) holds one and tears it down when destroyed; every watcher
/// created against it is registered here and torn down with it.
#[derive(Default)]
pub struct Scope {
    watchers: RefCell<Vec<Rc<Watcher>>>,
    destroying: Cell<bool>,
}

impl Scope {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub(crate) fn register(&self, watcher: &Rc<Watcher>) {
        self.watchers.borrow_mut().push(watcher.clone());
    }

    pub(crate) fn remove(&self, id: WatcherId) {
        self.watchers.borrow_mut().retain(|w| w.id() != id);
    }

    pub(crate) fn is_being_destroyed(&self) -> bool {
        self.destroying.get()
    }

    pub fn watcher_count(&self) -> usize {
        self.watchers.borrow().len()
    }

    /// Tear down every registered watcher. The destroying flag lets each
    /// teardown skip the per-watcher registry scan.
    pub fn teardown_all(&self) {
        self.destroying.set(true);
        let watchers = self.watchers.take();
        for watcher in &watchers {
            watcher.teardown();
        }
        self.destroying.set(false);
    }
}
