use std::cell::RefCell;
use std::collections::VecDeque;

use crate::scheduler;

thread_local! {
    static CALLBACKS: RefCell<VecDeque<Box<dyn FnOnce()>>> = RefCell::new(VecDeque::new());
}

/// Defer `callback` until the host's next tick checkpoint, after the current
/// synchronous work unwinds. The scheduler batches its flush through this
/// queue; anything else queued here runs in registration order around it.
pub fn next_tick(callback: impl FnOnce() + 'static) {
    CALLBACKS.with(|q| q.borrow_mut().push_back(Box::new(callback)));
}

/// Observe "state has settled" without being a tracked computation. If a
/// flush is already scheduled for this tick the callback runs at the end of
/// that flush; otherwise it joins the deferred queue directly.
pub fn run_after_flush(callback: impl FnOnce() + 'static) {
    if scheduler::flush_pending() {
        scheduler::queue_post_flush(Box::new(callback));
    } else {
        next_tick(callback);
    }
}

/// The host's tick checkpoint: drains deferred callbacks until the queue is
/// empty, so callbacks queued by callbacks still run before the host resumes.
/// Returns whether anything ran.
pub fn tick() -> bool {
    let mut ran = false;
    loop {
        // Pop one at a time; a callback may queue more.
        let next = CALLBACKS.with(|q| q.borrow_mut().pop_front());
        match next {
            Some(callback) => {
                ran = true;
                callback();
            }
            None => break,
        }
    }
    ran
}

pub fn has_pending() -> bool {
    CALLBACKS.with(|q| !q.borrow().is_empty())
}
