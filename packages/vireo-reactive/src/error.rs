use std::cell::RefCell;

use thiserror::Error;

use crate::watcher::WatcherId;

/// Opaque failure produced by an evaluator or a watch callback.
pub type BoxError = Box<dyn std::error::Error>;

#[derive(Debug, Error)]
pub enum ReactiveError {
    /// The evaluator of a watcher failed. Propagated to the caller of
    /// `Watcher::get` unless the watcher is a user watch, in which case it is
    /// reported and swallowed.
    #[error("evaluator for watcher #{id} failed: {source}")]
    Evaluator { id: WatcherId, source: BoxError },

    /// A watch callback failed. Always reported, never propagated: callbacks
    /// run inside the flush loop and must not abort sibling updates.
    #[error("callback for watcher #{id} failed: {source}")]
    Callback { id: WatcherId, source: BoxError },

    /// A watcher re-entered the scheduler queue more than `limit` times
    /// within a single flush. Indicates a cyclic reactive dependency.
    #[error("runaway update: watcher #{id} re-queued more than {limit} times in one flush")]
    RunawayUpdate { id: WatcherId, limit: u32 },
}

type ErrorHandler = Box<dyn Fn(&ReactiveError)>;

thread_local! {
    static HANDLER: RefCell<Option<ErrorHandler>> = const { RefCell::new(None) };
}

/// Route reported errors to the embedder instead of the log.
pub fn set_error_handler(handler: impl Fn(&ReactiveError) + 'static) {
    HANDLER.with(|h| *h.borrow_mut() = Some(Box::new(handler)));
}

/// Restore the default `tracing` sink.
pub fn clear_error_handler() {
    HANDLER.with(|h| *h.borrow_mut() = None);
}

pub(crate) fn report(err: &ReactiveError) {
    let handled = HANDLER.with(|h| {
        if let Some(handler) = h.borrow().as_ref() {
            handler(err);
            true
        } else {
            false
        }
    });
    if !handled {
        tracing::error!("{err}");
    }
}
