use std::cell::RefCell;
use std::mem;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::config;
use crate::error::{self, ReactiveError};
use crate::next_tick::next_tick;
use crate::watcher::{Watcher, WatcherId};

/// How many times one watcher may re-enter the queue within a single flush
/// before the flush is declared a runaway and abandoned.
pub const MAX_UPDATE_COUNT: u32 = 100;

#[derive(Default)]
struct SchedulerState {
    queue: Vec<Rc<Watcher>>,
    // Membership by watcher id: at most one queue entry per id per flush
    // cycle. Cleared per-watcher right before its run so it may legally
    // re-enqueue itself.
    has: FxHashSet<WatcherId>,
    circular: FxHashMap<WatcherId, u32>,
    activated: Vec<Box<dyn FnOnce()>>,
    post_flush: Vec<Box<dyn FnOnce()>>,
    waiting: bool,
    flushing: bool,
    // First not-yet-run slot of the sorted queue during a flush.
    index: usize,
}

thread_local! {
    static SCHEDULER: RefCell<SchedulerState> = RefCell::new(SchedulerState::default());
}

/// Push a dirty watcher onto the flush queue, deduplicated by id.
///
/// The first enqueue of a tick schedules a deferred flush. If a flush is
/// already running, the watcher is spliced into the pending tail at its
/// id-sorted position — never before the cursor — so it still runs in the
/// current flush.
pub fn queue_watcher(watcher: Rc<Watcher>) {
    let id = watcher.id();
    let schedule = SCHEDULER.with(|s| {
        let mut state = s.borrow_mut();
        if state.has.contains(&id) {
            return false;
        }
        state.has.insert(id);
        if !state.flushing {
            state.queue.push(watcher);
        } else {
            let mut i = state.queue.len();
            while i > state.index && state.queue[i - 1].id() > id {
                i -= 1;
            }
            state.queue.insert(i, watcher);
        }
        if !state.waiting {
            state.waiting = true;
            return true;
        }
        false
    });
    if schedule {
        if config::async_enabled() {
            tracing::trace!("scheduling deferred flush");
            next_tick(flush_scheduler_queue);
        } else {
            flush_scheduler_queue();
        }
    }
}

/// Defer an activation hook until the current (or next) flush has drained
/// its watcher queue. Used upstream for keep-alive activation lifecycle.
pub fn queue_activated(hook: impl FnOnce() + 'static) {
    SCHEDULER.with(|s| s.borrow_mut().activated.push(Box::new(hook)));
}

pub(crate) fn queue_post_flush(callback: Box<dyn FnOnce()>) {
    SCHEDULER.with(|s| s.borrow_mut().post_flush.push(callback));
}

/// A flush has been scheduled for this tick and has not completed yet.
pub(crate) fn flush_pending() -> bool {
    SCHEDULER.with(|s| s.borrow().waiting)
}

/// Run every pending watcher in ascending creation-id order: parents before
/// children, computed sources before their readers. Errors are isolated per
/// watcher; a runaway re-enqueue loop abandons the flush.
fn flush_scheduler_queue() {
    SCHEDULER.with(|s| {
        let mut state = s.borrow_mut();
        state.flushing = true;
        state.index = 0;
        state.queue.sort_by_key(|w| w.id());
    });
    tracing::debug!("flushing scheduler queue");
    loop {
        // Re-read the queue bounds every step: a run may splice new entries
        // into the pending tail.
        let next = SCHEDULER.with(|s| {
            let mut state = s.borrow_mut();
            if state.index < state.queue.len() {
                let watcher = state.queue[state.index].clone();
                state.index += 1;
                state.has.remove(&watcher.id());
                Some(watcher)
            } else {
                None
            }
        });
        let Some(watcher) = next else { break };
        watcher.invoke_before();
        if let Err(err) = watcher.run() {
            error::report(&err);
        }
        // If the run re-queued its own id, count the re-entry.
        let runaway = SCHEDULER.with(|s| {
            let mut state = s.borrow_mut();
            if state.has.contains(&watcher.id()) {
                let count = state.circular.entry(watcher.id()).or_insert(0);
                *count += 1;
                *count > MAX_UPDATE_COUNT
            } else {
                false
            }
        });
        if runaway {
            error::report(&ReactiveError::RunawayUpdate {
                id: watcher.id(),
                limit: MAX_UPDATE_COUNT,
            });
            break;
        }
    }
    // Activation hooks and settle observers fire only after the whole batch
    // (including mid-flush splices) has drained. State is reset first so a
    // hook that dirties a watcher starts a fresh, schedulable cycle instead
    // of splicing into a queue about to be cleared.
    let (activated, post_flush) = SCHEDULER.with(|s| {
        let mut state = s.borrow_mut();
        (
            mem::take(&mut state.activated),
            mem::take(&mut state.post_flush),
        )
    });
    reset_scheduler_state();
    for hook in activated {
        hook();
    }
    for callback in post_flush {
        callback();
    }
    tracing::trace!("scheduler idle");
}

fn reset_scheduler_state() {
    SCHEDULER.with(|s| {
        let mut state = s.borrow_mut();
        state.queue.clear();
        state.has.clear();
        state.circular.clear();
        state.index = 0;
        state.waiting = false;
        state.flushing = false;
    });
}
