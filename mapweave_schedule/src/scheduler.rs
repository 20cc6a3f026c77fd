// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The coalescing scheduler.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;

use log::trace;

use crate::driver::FlushDriver;
use crate::policy::{FlushPolicy, FlushToken};

type Task = Box<dyn FnOnce()>;

#[derive(Copy, Clone, Debug)]
struct Pending {
    token: FlushToken,
    policy: FlushPolicy,
}

struct State {
    default_policy: FlushPolicy,
    tasks: BTreeMap<String, Task>,
    pending: Option<Pending>,
    next_token: u64,
    batch_depth: usize,
    // One entry per open batch; `None` when that batch did not name a policy.
    policy_stack: Vec<Option<FlushPolicy>>,
    deferred: Option<FlushPolicy>,
}

impl State {
    fn current_policy(&self) -> FlushPolicy {
        self.policy_stack
            .iter()
            .rev()
            .find_map(|p| *p)
            .unwrap_or(self.default_policy)
    }

    /// Record a request at `policy`; returns the request to hand to the driver, if any.
    fn escalate(&mut self, policy: FlushPolicy) -> Option<Pending> {
        match self.pending {
            Some(p) if p.policy >= policy => None,
            _ => {
                self.next_token += 1;
                let pending = Pending {
                    token: FlushToken(self.next_token),
                    policy,
                };
                self.pending = Some(pending);
                Some(pending)
            }
        }
    }
}

/// Coalesces keyed tasks into a single deferred flush.
///
/// ## Semantics
///
/// - [`schedule`](Self::schedule) stores a task under a key, replacing any task already
///   stored under that key, and requests a flush.
/// - A flush runs every queued task once and empties the queue. Tasks must not rely on
///   running in any particular order relative to each other.
/// - [`batch`](Self::batch) runs a closure synchronously; flush requests raised inside it are
///   held back until the outermost batch returns, then issued once.
/// - A pending [`FlushPolicy::Frame`] flush is never downgraded by a microtask request. A
///   frame request made while a microtask flush is pending re-requests the flush with a new
///   token; the old microtask callback then fires stale and does nothing.
///
/// The scheduler is single-threaded and re-entrant: tasks may schedule further tasks,
/// which land in a fresh queue and request a new flush.
pub struct FlushScheduler {
    state: RefCell<State>,
    driver: RefCell<Box<dyn FlushDriver>>,
}

impl core::fmt::Debug for FlushScheduler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("FlushScheduler")
            .field("default_policy", &state.default_policy)
            .field("tasks", &state.tasks.len())
            .field("pending", &state.pending)
            .field("batch_depth", &state.batch_depth)
            .finish_non_exhaustive()
    }
}

impl FlushScheduler {
    /// Create a scheduler that requests flushes from `driver`.
    pub fn new(default_policy: FlushPolicy, driver: Box<dyn FlushDriver>) -> Self {
        Self {
            state: RefCell::new(State {
                default_policy,
                tasks: BTreeMap::new(),
                pending: None,
                next_token: 0,
                batch_depth: 0,
                policy_stack: Vec::new(),
                deferred: None,
            }),
            driver: RefCell::new(driver),
        }
    }

    /// The policy used when neither the call nor an enclosing batch names one.
    pub fn default_policy(&self) -> FlushPolicy {
        self.state.borrow().default_policy
    }

    /// Schedule `task` under `key` using the policy of the innermost enclosing batch, or
    /// the default policy outside batches.
    pub fn schedule(&self, key: impl Into<String>, task: impl FnOnce() + 'static) {
        let policy = {
            let mut state = self.state.borrow_mut();
            state.tasks.insert(key.into(), Box::new(task));
            state.current_policy()
        };
        self.request_flush(policy);
    }

    /// Schedule `task` under `key` with an explicit policy.
    pub fn schedule_with_policy(
        &self,
        key: impl Into<String>,
        policy: FlushPolicy,
        task: impl FnOnce() + 'static,
    ) {
        self.state
            .borrow_mut()
            .tasks
            .insert(key.into(), Box::new(task));
        self.request_flush(policy);
    }

    /// Drop the task queued under `key`. Returns whether one was queued.
    pub fn cancel(&self, key: &str) -> bool {
        self.state.borrow_mut().tasks.remove(key).is_some()
    }

    /// Whether a task is queued under `key`.
    pub fn is_scheduled(&self, key: &str) -> bool {
        self.state.borrow().tasks.contains_key(key)
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        self.state.borrow().tasks.len()
    }

    /// Whether no task is queued.
    pub fn is_empty(&self) -> bool {
        self.state.borrow().tasks.is_empty()
    }

    /// Policy of the flush currently requested from the driver, if any.
    pub fn pending_policy(&self) -> Option<FlushPolicy> {
        self.state.borrow().pending.map(|p| p.policy)
    }

    /// Whether a batch is currently open.
    pub fn in_batch(&self) -> bool {
        self.state.borrow().batch_depth > 0
    }

    /// Run `f` with flush requests deferred until the outermost batch completes.
    ///
    /// When `policy` is given, flush requests made inside this block (and not overridden by
    /// an inner batch or an explicit [`schedule_with_policy`](Self::schedule_with_policy))
    /// use it. A batch in which nothing is scheduled never touches the driver.
    pub fn batch<R>(&self, policy: Option<FlushPolicy>, f: impl FnOnce() -> R) -> R {
        {
            let mut state = self.state.borrow_mut();
            state.batch_depth += 1;
            state.policy_stack.push(policy);
        }
        let guard = BatchGuard { scheduler: self };
        let out = f();
        drop(guard);
        out
    }

    /// Host callback: run the flush identified by `token`.
    ///
    /// Returns `false` without doing anything if `token` is not the pending one.
    pub fn fire(&self, token: FlushToken) -> bool {
        let tasks = {
            let mut state = self.state.borrow_mut();
            match state.pending {
                Some(p) if p.token == token => {
                    state.pending = None;
                    core::mem::take(&mut state.tasks)
                }
                _ => {
                    trace!("ignoring stale flush token {}", token.get());
                    return false;
                }
            }
        };
        trace!("flush {} running {} task(s)", token.get(), tasks.len());
        for (_, task) in tasks {
            task();
        }
        true
    }

    /// Run every queued task now and forget any pending request.
    ///
    /// Returns the number of tasks run.
    pub fn flush_now(&self) -> usize {
        let tasks = {
            let mut state = self.state.borrow_mut();
            state.pending = None;
            core::mem::take(&mut state.tasks)
        };
        let n = tasks.len();
        for (_, task) in tasks {
            task();
        }
        n
    }

    fn request_flush(&self, policy: FlushPolicy) {
        let request = {
            let mut state = self.state.borrow_mut();
            if state.batch_depth > 0 {
                state.deferred = Some(state.deferred.map_or(policy, |d| d.max(policy)));
                return;
            }
            state.escalate(policy)
        };
        if let Some(p) = request {
            trace!("requesting {:?} flush {}", p.policy, p.token.get());
            self.driver.borrow_mut().request(p.policy, p.token);
        }
    }

    fn end_batch(&self) {
        let deferred = {
            let mut state = self.state.borrow_mut();
            state.policy_stack.pop();
            state.batch_depth -= 1;
            if state.batch_depth == 0 {
                state.deferred.take()
            } else {
                None
            }
        };
        if let Some(policy) = deferred {
            self.request_flush(policy);
        }
    }
}

struct BatchGuard<'a> {
    scheduler: &'a FlushScheduler,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        self.scheduler.end_batch();
    }
}
