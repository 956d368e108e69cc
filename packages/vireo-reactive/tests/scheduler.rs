use std::cell::{Cell, RefCell};
use std::rc::Rc;

use vireo_reactive::{
    MAX_UPDATE_COUNT, ObservedCell, Scope, Value, Watcher, clear_error_handler, config,
    queue_activated, run_after_flush, set_error_handler, tick,
};

#[test]
fn one_synchronous_block_yields_one_flush_in_id_order() {
    let scope = Scope::new();
    let a = ObservedCell::new(0);
    let b = ObservedCell::new(0);
    let log = Rc::new(RefCell::new(Vec::new()));

    let mut ids = Vec::new();
    for cell in [&a, &b, &a] {
        let cell = (*cell).clone();
        let log = log.clone();
        let id = Rc::new(Cell::new(0u64));
        let id_slot = id.clone();
        let watcher = Watcher::user(
            &scope,
            move || Ok(cell.get()),
            move |_, _| {
                log.borrow_mut().push(id_slot.get());
                Ok(())
            },
            false,
            false,
        )
        .expect("watch");
        id.set(watcher.id());
        ids.push(watcher.id());
    }

    // Many mutations inside one synchronous block...
    a.set(1);
    b.set(1);
    a.set(2);
    b.set(2);
    assert!(log.borrow().is_empty(), "nothing fires before the tick");

    // ...coalesce into exactly one flush, each watcher once, ascending id.
    assert!(tick());
    assert_eq!(*log.borrow(), ids);

    // And the queue is genuinely drained.
    assert!(!tick());
    assert!(log.borrow().len() == 3);
}

#[test]
fn duplicate_notifications_deduplicate_within_a_tick() {
    let scope = Scope::new();
    let a = ObservedCell::new(0);
    let b = ObservedCell::new(0);
    let runs = Rc::new(Cell::new(0));

    {
        let (a, b) = (a.clone(), b.clone());
        let runs = runs.clone();
        Watcher::user(
            &scope,
            move || {
                a.get();
                Ok(b.get())
            },
            move |_, _| {
                runs.set(runs.get() + 1);
                Ok(())
            },
            false,
            false,
        )
        .expect("watch");
    }

    // Two distinct deps dirty the same watcher; it still runs once.
    a.set(1);
    b.set(1);
    tick();
    assert_eq!(runs.get(), 1);
}

#[test]
fn non_batched_notify_fires_subscribers_in_creation_order() {
    let scope = Scope::new();
    let flag = ObservedCell::new(false);
    let data = ObservedCell::new(0);
    let log = Rc::new(RefCell::new(Vec::new()));

    // w1 starts on the branch that ignores `data`...
    let w1 = {
        let (flag, data) = (flag.clone(), data.clone());
        let log = log.clone();
        Watcher::user(
            &scope,
            move || {
                Ok(if let Value::Bool(true) = flag.get() {
                    data.get()
                } else {
                    Value::from(-1)
                })
            },
            move |_, _| {
                log.borrow_mut().push("w1");
                Ok(())
            },
            false,
            false,
        )
        .expect("watch")
    };
    let w2 = {
        let data = data.clone();
        let log = log.clone();
        Watcher::user(
            &scope,
            move || Ok(data.get()),
            move |_, _| {
                log.borrow_mut().push("w2");
                Ok(())
            },
            false,
            false,
        )
        .expect("watch")
    };
    assert!(w1.id() < w2.id());

    // ...and subscribes to `data` only now, after w2 already did. The raw
    // subscriber order is therefore [w2, w1].
    flag.set(true);
    tick();
    log.borrow_mut().clear();

    // Without batching, notify itself must restore creation order.
    config::set_async(false);
    data.set(42);
    assert_eq!(*log.borrow(), vec!["w1", "w2"]);
    config::set_async(true);
}

#[test]
fn behind_cursor_enqueue_runs_in_the_same_flush() {
    let scope = Scope::new();
    let x = ObservedCell::new(0);
    let y = ObservedCell::new(0);
    let log = Rc::new(RefCell::new(Vec::new()));

    // b is created first: smaller id, sorted ahead of a.
    let b = {
        let y = y.clone();
        let log = log.clone();
        Watcher::user(
            &scope,
            move || Ok(y.get()),
            move |_, _| {
                log.borrow_mut().push("b");
                Ok(())
            },
            false,
            false,
        )
        .expect("watch")
    };
    let a = {
        let x = x.clone();
        let y = y.clone();
        let log = log.clone();
        Watcher::user(
            &scope,
            move || Ok(x.get()),
            move |new, _| {
                log.borrow_mut().push("a");
                // Dirty a watcher whose id is behind the flush cursor.
                y.set(new.clone());
                Ok(())
            },
            false,
            false,
        )
        .expect("watch")
    };
    assert!(b.id() < a.id());

    x.set(1);
    tick();

    // b ran inside the same flush, not on a later tick.
    assert_eq!(*log.borrow(), vec!["a", "b"]);
    assert!(!vireo_reactive::next_tick::has_pending());
}

#[test]
fn ahead_of_cursor_enqueue_joins_sorted_position() {
    let scope = Scope::new();
    let a_src = ObservedCell::new(0);
    let b_src = ObservedCell::new(0);
    let c_src = ObservedCell::new(0);
    let log = Rc::new(RefCell::new(Vec::new()));

    let _w1 = {
        let (a_src, c_src) = (a_src.clone(), c_src.clone());
        let log = log.clone();
        Watcher::user(
            &scope,
            move || Ok(a_src.get()),
            move |new, _| {
                log.borrow_mut().push("w1");
                // Dirties w3, whose id is ahead of the cursor.
                c_src.set(new.clone());
                Ok(())
            },
            false,
            false,
        )
        .expect("watch")
    };
    let _w2 = {
        let b_src = b_src.clone();
        let log = log.clone();
        Watcher::user(
            &scope,
            move || Ok(b_src.get()),
            move |_, _| {
                log.borrow_mut().push("w2");
                Ok(())
            },
            false,
            false,
        )
        .expect("watch")
    };
    let _w3 = {
        let c_src = c_src.clone();
        let log = log.clone();
        Watcher::user(
            &scope,
            move || Ok(c_src.get()),
            move |_, _| {
                log.borrow_mut().push("w3");
                Ok(())
            },
            false,
            false,
        )
        .expect("watch")
    };

    a_src.set(1);
    b_src.set(1);
    tick();

    assert_eq!(*log.borrow(), vec!["w1", "w2", "w3"]);
}

#[test]
fn runaway_update_loop_is_detected() {
    let scope = Scope::new();
    let cell = ObservedCell::new(0);
    let errors = Rc::new(RefCell::new(Vec::new()));
    let runs = Rc::new(Cell::new(0u32));
    {
        let errors = errors.clone();
        set_error_handler(move |err| errors.borrow_mut().push(err.to_string()));
    }

    {
        let write = cell.clone();
        let read = cell.clone();
        let runs = runs.clone();
        Watcher::user(
            &scope,
            move || Ok(read.get()),
            move |new, _| {
                runs.set(runs.get() + 1);
                // Perpetually re-dirties its own dependency.
                if let Value::Int(n) = new {
                    write.set(n + 1);
                }
                Ok(())
            },
            false,
            false,
        )
        .expect("watch");
    }

    cell.set(1);
    tick();

    let reported = errors.borrow();
    assert_eq!(reported.len(), 1);
    assert!(reported[0].contains("runaway update"), "{}", reported[0]);
    // One initial run plus MAX_UPDATE_COUNT tolerated re-entries.
    assert_eq!(runs.get(), MAX_UPDATE_COUNT + 1);

    drop(reported);
    clear_error_handler();
}

#[test]
fn activated_hooks_run_after_the_batch_drains() {
    let scope = Scope::new();
    let a = ObservedCell::new(0);
    let b = ObservedCell::new(0);
    let log = Rc::new(RefCell::new(Vec::new()));

    let _w1 = {
        let a = a.clone();
        let log = log.clone();
        Watcher::user(
            &scope,
            move || Ok(a.get()),
            move |_, _| {
                log.borrow_mut().push("w1");
                let log = log.clone();
                // Queued mid-flush: must wait for the whole batch.
                queue_activated(move || log.borrow_mut().push("activated"));
                Ok(())
            },
            false,
            false,
        )
        .expect("watch")
    };
    let _w2 = {
        let b = b.clone();
        let log = log.clone();
        Watcher::user(
            &scope,
            move || Ok(b.get()),
            move |_, _| {
                log.borrow_mut().push("w2");
                Ok(())
            },
            false,
            false,
        )
        .expect("watch")
    };

    a.set(1);
    b.set(1);
    tick();

    assert_eq!(*log.borrow(), vec!["w1", "w2", "activated"]);
}

#[test]
fn run_after_flush_observes_settled_state() {
    let scope = Scope::new();
    let cell = ObservedCell::new(0);
    let log = Rc::new(RefCell::new(Vec::new()));

    {
        let cell = cell.clone();
        let log = log.clone();
        Watcher::user(
            &scope,
            move || Ok(cell.get()),
            move |_, _| {
                log.borrow_mut().push("watcher");
                Ok(())
            },
            false,
            false,
        )
        .expect("watch");
    }

    // Mutation first: a flush is pending, so the observer attaches to it and
    // runs after the batch even though it was registered later in the tick.
    cell.set(1);
    {
        let log = log.clone();
        run_after_flush(move || log.borrow_mut().push("settled"));
    }
    tick();
    assert_eq!(*log.borrow(), vec!["watcher", "settled"]);

    // With no flush pending it degrades to a plain deferred callback.
    log.borrow_mut().clear();
    {
        let log = log.clone();
        run_after_flush(move || log.borrow_mut().push("idle"));
    }
    tick();
    assert_eq!(*log.borrow(), vec!["idle"]);
}

#[test]
fn before_hook_runs_ahead_of_each_rerun() {
    let scope = Scope::new();
    let cell = ObservedCell::new(0);
    let log = Rc::new(RefCell::new(Vec::new()));

    {
        let cell = cell.clone();
        let getter_log = log.clone();
        let before_log = log.clone();
        Watcher::render(
            &scope,
            move || {
                getter_log.borrow_mut().push("render");
                Ok(cell.get())
            },
            Some(Box::new(move || before_log.borrow_mut().push("before"))),
        )
        .expect("render");
    }

    // Construction evaluates without the pre-update hook.
    assert_eq!(*log.borrow(), vec!["render"]);
    log.borrow_mut().clear();

    cell.set(1);
    tick();
    assert_eq!(*log.borrow(), vec!["before", "render"]);
}

#[test]
fn watchers_created_during_flush_evaluate_immediately() {
    let scope = Scope::new();
    let cell = ObservedCell::new(0);
    let log = Rc::new(RefCell::new(Vec::new()));
    let spawned = Rc::new(RefCell::new(None));

    {
        let cell = cell.clone();
        let log = log.clone();
        let scope = scope.clone();
        let spawned = spawned.clone();
        Watcher::user(
            &scope.clone(),
            move || Ok(cell.get()),
            move |_, _| {
                log.borrow_mut().push("outer");
                if spawned.borrow().is_none() {
                    // A watcher born mid-flush; its first evaluation happens
                    // right here, synchronously.
                    let log = log.clone();
                    let inner = Watcher::render(
                        &scope,
                        move || {
                            log.borrow_mut().push("inner");
                            Ok(Value::Undefined)
                        },
                        None,
                    )
                    .expect("render");
                    *spawned.borrow_mut() = Some(inner);
                }
                Ok(())
            },
            false,
            false,
        )
        .expect("watch");
    }

    cell.set(1);
    tick();
    assert_eq!(*log.borrow(), vec!["outer", "inner"]);
}
