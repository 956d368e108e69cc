use std::cell::Cell;

thread_local! {
    static ASYNC: Cell<bool> = const { Cell::new(true) };
}

/// Toggle batched updates. When disabled, `queue_watcher` flushes
/// immediately on the mutating call stack and `Dep::notify` sorts its
/// subscribers by creation id so they still fire in deterministic order.
/// Intended for test harnesses and debugging, not production use.
pub fn set_async(enabled: bool) {
    ASYNC.with(|c| c.set(enabled));
}

pub fn async_enabled() -> bool {
    ASYNC.with(Cell::get)
}
