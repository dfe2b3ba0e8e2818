//!  Circuit Breaker State Machine:
//!
//!                                 trip once the failure count
//!                                    reaches the threshold
//!
//!             +-----------------------------------------------------------------------+
//!             |                                                                       |
//!             |                                                                       v
//!     +----------------+                   +----------------+   Timer elapsed  +----------------+
//!     |                |                   |                |<-----------------|                |
//!     |                |   Probe succeed   |                |                  |                |
//!     |     Closed     |<------------------|    HalfOpen    |                  |      Open      |
//!     |                |                   |                |   Probe failed   |                |
//!     |                |                   |                +----------------->|                |
//!     +----------------+                   +----------------+                  +----------------+
//!

pub mod error;
pub mod rule;
pub mod timer;

pub use error::*;
pub use rule::*;
pub use timer::*;

use crate::{logging, utils};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

cfg_async! {
    use std::future::Future;
}

/// States of Circuit Breaker State Machine
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum State {
    Closed,
    HalfOpen,
    Open,
}

impl Default for State {
    fn default() -> State {
        State::Closed
    }
}

/// `StateChangeListener` listens on the circuit breaker state change event.
///
/// Listeners run inside the breaker's critical section and must not call back
/// into the breaker. Argument rule is shared from the circuit breaker's rule,
/// it is immutable for the lifetime of the breaker.
pub trait StateChangeListener: Sync + Send {
    /// `on_transform_to_closed` is triggered when circuit breaker state transformed to Closed.
    fn on_transform_to_closed(&self, prev: State, rule: Arc<Rule>);

    /// `on_transform_to_open` is triggered when circuit breaker state transformed to Open.
    /// The `failure_count` indicates the counter value when the transformation occurred.
    fn on_transform_to_open(&self, prev: State, rule: Arc<Rule>, failure_count: u32);

    /// `on_transform_to_half_open` is triggered when circuit breaker state transformed to HalfOpen.
    fn on_transform_to_half_open(&self, prev: State, rule: Arc<Rule>);
}

/// The mutable part of the breaker. The three fields move together, so they
/// are guarded as one unit.
#[derive(Debug, Default)]
struct Machine {
    state: State,
    failure_count: u32,
    last_transition_ms: u64,
}

/// `Breaker` is an in-process circuit breaker around a single dependency.
///
/// A breaker is safe to share across threads and tasks. The state check before
/// an invocation and the state update after it are serialized through an
/// internal lock; the wrapped operation itself runs outside of it, so wrapped
/// calls do not serialize each other. Concurrent calls that pass the open
/// check right before another caller trips the breaker are allowed to finish,
/// the guarantee is best-effort, not linearizable.
pub struct Breaker {
    rule: Arc<Rule>,
    /// shared with the recovery timer callback, see `start_recovery_timer`
    machine: Arc<Mutex<Machine>>,
    /// failure kinds that bypass counting and state entirely
    ignored_kinds: Mutex<HashSet<FailureKind>>,
    listeners: Arc<Mutex<Vec<Arc<dyn StateChangeListener>>>>,
    timer: Arc<dyn RecoveryTimer>,
}

impl Breaker {
    /// Creates a breaker with the default [`ThreadTimer`] driving recovery.
    pub fn new(rule: Rule) -> crate::Result<Self> {
        Self::with_timer(rule, Arc::new(ThreadTimer::default()))
    }

    /// Creates a breaker with a caller-supplied timer, e.g. a [`ManualTimer`]
    /// in tests.
    pub fn with_timer(rule: Rule, timer: Arc<dyn RecoveryTimer>) -> crate::Result<Self> {
        rule.is_valid()?;
        Ok(Self {
            rule: Arc::new(rule),
            machine: Arc::new(Mutex::new(Machine::default())),
            ignored_kinds: Mutex::new(HashSet::new()),
            listeners: Arc::new(Mutex::new(Vec::new())),
            timer,
        })
    }

    /// `execute` routes one unit of work through the breaker.
    ///
    /// While the breaker is open the operation is never invoked and
    /// [`BreakerError::Open`] is returned immediately. Otherwise the outcome of
    /// the operation drives the state machine: success confirms recovery (or
    /// gradually restores the service level), failure is counted and may trip
    /// the breaker, unless its kind is in the ignored set.
    pub fn execute<T, F>(&self, operation: F) -> Result<T, BreakerError>
    where
        F: FnOnce() -> Result<T, Failure>,
    {
        if self.current_state() == State::Open {
            return Err(BreakerError::Open);
        }
        match operation() {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(failure) => Err(self.on_failure(failure)),
        }
    }

    cfg_async! {
        /// `execute_async` is the [`Breaker::execute`] contract for operations
        /// that suspend. The open check happens before the future is created and
        /// the outcome handling after it resolved; the suspension point itself is
        /// not under the breaker's lock.
        pub async fn execute_async<T, F, Fut>(&self, operation: F) -> Result<T, BreakerError>
        where
            F: FnOnce() -> Fut,
            Fut: Future<Output = Result<T, Failure>>,
        {
            if self.current_state() == State::Open {
                return Err(BreakerError::Open);
            }
            match operation().await {
                Ok(value) => {
                    self.on_success();
                    Ok(value)
                }
                Err(failure) => Err(self.on_failure(failure)),
            }
        }
    }

    /// `trip` forces the breaker open and (re)starts the recovery countdown.
    /// No-op if the breaker is already open.
    pub fn trip(&self) {
        let mut machine = self.machine.lock().unwrap();
        self.transform_to_open(&mut machine);
    }

    /// `reset` forces the breaker closed, clears the failure count and stops
    /// the recovery countdown. Idempotent.
    pub fn reset(&self) {
        let mut machine = self.machine.lock().unwrap();
        self.transform_to_closed(&mut machine);
    }

    /// `close` releases the recovery timer. Safe to call multiple times; a
    /// closed-down breaker that is currently open stays open.
    pub fn close(&self) {
        self.timer.stop();
    }

    /// `current_state` returns current state of the circuit breaker.
    pub fn current_state(&self) -> State {
        self.machine.lock().unwrap().state
    }

    /// `set_state` overwrites the state without touching the counter or the
    /// timer. An escape hatch for tests and operational tooling; normal
    /// transitions go through [`Breaker::execute`], [`Breaker::trip`] and
    /// [`Breaker::reset`].
    pub fn set_state(&self, state: State) {
        self.machine.lock().unwrap().state = state;
    }

    pub fn failure_count(&self) -> u32 {
        self.machine.lock().unwrap().failure_count
    }

    /// `service_level` derives the current health as a percentage in [0, 100]:
    /// `(threshold - failure_count) / threshold * 100`.
    pub fn service_level(&self) -> f64 {
        let machine = self.machine.lock().unwrap();
        let threshold = self.rule.failure_threshold;
        f64::from(threshold - machine.failure_count) / f64::from(threshold) * 100.0
    }

    pub fn failure_threshold(&self) -> u32 {
        self.rule.failure_threshold
    }

    pub fn retry_timeout(&self) -> Duration {
        Duration::from_millis(self.rule.retry_timeout_ms)
    }

    /// Timestamp (unix millis) of the last state transition, 0 before the first one.
    pub fn last_transition_ms(&self) -> u64 {
        self.machine.lock().unwrap().last_transition_ms
    }

    /// `bound_rule` returns the associated circuit breaking rule.
    pub fn bound_rule(&self) -> &Arc<Rule> {
        &self.rule
    }

    /// Failures of this kind will bypass the breaker from now on: not counted,
    /// no state change, propagated as [`BreakerError::Ignored`].
    pub fn add_ignored_kind(&self, kind: FailureKind) {
        self.ignored_kinds.lock().unwrap().insert(kind);
    }

    pub fn remove_ignored_kind(&self, kind: FailureKind) {
        self.ignored_kinds.lock().unwrap().remove(&kind);
    }

    pub fn is_ignored_kind(&self, kind: FailureKind) -> bool {
        self.ignored_kinds.lock().unwrap().contains(&kind)
    }

    pub fn register_state_change_listeners(
        &self,
        listeners: Vec<Arc<dyn StateChangeListener>>,
    ) {
        self.listeners.lock().unwrap().extend(listeners);
    }

    pub fn clear_state_change_listeners(&self) {
        self.listeners.lock().unwrap().clear();
    }

    fn on_success(&self) {
        let mut machine = self.machine.lock().unwrap();
        match machine.state {
            // recovery confirmed by the probe call
            State::HalfOpen => self.transform_to_closed(&mut machine),
            _ => {
                if machine.failure_count > 0 {
                    machine.failure_count -= 1;
                }
            }
        }
    }

    fn on_failure(&self, failure: Failure) -> BreakerError {
        if self.is_ignored_kind(failure.kind()) {
            return BreakerError::Ignored(failure);
        }
        let mut machine = self.machine.lock().unwrap();
        if machine.failure_count < self.rule.failure_threshold {
            machine.failure_count += 1;
        }
        // a failed probe retrips unconditionally, a closed-state failure only
        // once the counter saturates
        if machine.state == State::HalfOpen
            || machine.failure_count >= self.rule.failure_threshold
        {
            self.transform_to_open(&mut machine);
        }
        BreakerError::Operation(failure)
    }

    /// Moves the machine to Open and restarts the countdown. Caller holds the lock.
    fn transform_to_open(&self, machine: &mut Machine) {
        if machine.state == State::Open {
            return;
        }
        let prev = machine.state;
        machine.state = State::Open;
        machine.last_transition_ms = utils::curr_time_millis();
        self.start_recovery_timer();
        logging::warn!(
            "circuit breaker {} opened at {}",
            self.rule.id,
            utils::format_time_millis(machine.last_transition_ms)
        );
        for listener in self.listeners.lock().unwrap().iter() {
            listener.on_transform_to_open(prev, Arc::clone(&self.rule), machine.failure_count);
        }
    }

    /// Moves the machine to Closed, clears the counter, stops the countdown.
    /// Caller holds the lock.
    fn transform_to_closed(&self, machine: &mut Machine) {
        machine.failure_count = 0;
        self.timer.stop();
        if machine.state == State::Closed {
            return;
        }
        let prev = machine.state;
        machine.state = State::Closed;
        machine.last_transition_ms = utils::curr_time_millis();
        logging::info!("circuit breaker {} closed", self.rule.id);
        for listener in self.listeners.lock().unwrap().iter() {
            listener.on_transform_to_closed(prev, Arc::clone(&self.rule));
        }
    }

    /// Arms the one-shot countdown whose callback moves Open to HalfOpen. The
    /// callback holds weak-free clones of the shared parts only, so it stays
    /// valid however long the timer outlives this call.
    fn start_recovery_timer(&self) {
        let machine = Arc::clone(&self.machine);
        let listeners = Arc::clone(&self.listeners);
        let rule = Arc::clone(&self.rule);
        self.timer.start(
            self.retry_timeout(),
            Box::new(move || {
                let mut machine = machine.lock().unwrap();
                if machine.state != State::Open {
                    return;
                }
                machine.state = State::HalfOpen;
                machine.last_transition_ms = utils::curr_time_millis();
                logging::info!("circuit breaker {} half-open, waiting for a probe call", rule.id);
                for listener in listeners.lock().unwrap().iter() {
                    listener.on_transform_to_half_open(State::Open, Arc::clone(&rule));
                }
            }),
        );
    }
}

impl Default for Breaker {
    fn default() -> Self {
        // the default rule is statically valid
        Self::new(Rule::default()).unwrap()
    }
}

impl Drop for Breaker {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Breaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Breaker")
            .field("rule", &self.rule)
            .field("machine", &self.machine)
            .field("ignored_kinds", &self.ignored_kinds)
            .finish()
    }
}
