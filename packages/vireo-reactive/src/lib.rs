//! Fine-grained dependency tracking and batched update scheduling for the
//! Vireo runtime.
//!
//! State mutation flows: cell write → [`Dep::notify`] → each subscribed
//! [`Watcher::update`] → [`scheduler::queue_watcher`] → deferred
//! [`next_tick`] flush → `Watcher::run` → evaluator re-executes, re-collects
//! its dependency set, and fires its downstream effect (re-render, watch
//! callback).
//!
//! Single-threaded and cooperative: the target stack, scheduler queue, and
//! deferred-callback queue are thread-local singletons, and the embedder
//! drives the deferred queue by calling [`tick`] at its macrotask boundary.

pub mod cell;
pub mod config;
pub mod dep;
pub mod error;
pub mod next_tick;
pub mod scheduler;
pub mod scope;
pub mod traverse;
pub mod value;
pub mod watcher;

pub use cell::{ObservedCell, ObservedList, ObservedObject};
pub use dep::{Dep, DepId, untracked};
pub use error::{BoxError, ReactiveError, clear_error_handler, set_error_handler};
pub use next_tick::{next_tick, run_after_flush, tick};
pub use scheduler::{MAX_UPDATE_COUNT, queue_activated, queue_watcher};
pub use scope::Scope;
pub use traverse::traverse;
pub use value::Value;
pub use watcher::{Watcher, WatcherId, WatcherKind};
