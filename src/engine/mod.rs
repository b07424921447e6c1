//! The engine: the execution orchestrator for actions.
//!
//! The engine "calls" actions: it resolves absent continuations to the
//! terminal sink, bounds synchronous recursion by trampolining to the
//! next tick, and catches panics in user code, re-entering them as
//! conditions on the failure channel. Errors never unwind past an action
//! boundary.
//!
//! Engines are cheap handles over shared state; [`Engine::child`] derives
//! another handle onto the same scheduler, and [`Engine::with_hook`]
//! installs a per-instance [`CallHook`] decoration. [`Engine::trace`]
//! derives a child that logs every dispatch — semantically identical,
//! fully substitutable.
//!
//! Two constructors pick the time driver: [`Engine::new`] runs on wall
//! time, [`Engine::lab`] on virtual time for deterministic tests.

mod config;
mod hook;
mod scheduler;
mod time;

pub use config::{ConfigError, EngineConfig, ENV_BUFFER_CAPACITY, ENV_MAX_DEPTH};
pub use hook::{CallHook, TraceHook};
pub use scheduler::Driver;
pub use time::Time;

use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use crate::action::Action;
use crate::condition::Condition;
use crate::value::Value;

use scheduler::Scheduler;

struct EngineShared {
    config: EngineConfig,
    sched: Scheduler,
    /// Current synchronous call depth (trampoline bookkeeping).
    depth: Cell<u32>,
    calls: Cell<u64>,
    bounces: Cell<u64>,
}

/// The execution engine that dispatches actions.
///
/// Cloning an engine yields another handle onto the same scheduler and
/// counters; per-instance state is limited to the optional call hook.
#[derive(Clone)]
pub struct Engine {
    shared: Rc<EngineShared>,
    hook: Option<Rc<dyn CallHook>>,
}

impl Engine {
    /// Creates an engine on the wall-clock driver with default config.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates a wall-clock engine with the given configuration.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self::build(config, Driver::Wall)
    }

    /// Creates a deterministic virtual-time engine with default config.
    #[must_use]
    pub fn lab() -> Self {
        Self::build(EngineConfig::default(), Driver::Virtual)
    }

    /// Creates a deterministic virtual-time engine with the given config.
    #[must_use]
    pub fn lab_with_config(config: EngineConfig) -> Self {
        Self::build(config, Driver::Virtual)
    }

    fn build(config: EngineConfig, driver: Driver) -> Self {
        Self {
            shared: Rc::new(EngineShared {
                config,
                sched: Scheduler::new(driver),
                depth: Cell::new(0),
                calls: Cell::new(0),
                bounces: Cell::new(0),
            }),
            hook: None,
        }
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Capacity of bounded waiter queues and generator bursts.
    #[must_use]
    pub fn buffer_capacity(&self) -> usize {
        self.shared.config.buffer_capacity
    }

    /// The current scheduler time.
    #[must_use]
    pub fn now(&self) -> Time {
        self.shared.sched.now()
    }

    /// Total action invocations executed so far.
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.shared.calls.get()
    }

    /// How many times the trampoline deferred a call to the next tick.
    #[must_use]
    pub fn trampoline_bounces(&self) -> u64 {
        self.shared.bounces.get()
    }

    /// Derives a child engine sharing this engine's scheduler and config.
    #[must_use]
    pub fn child(&self) -> Self {
        self.clone()
    }

    /// Derives a child with the given call hook installed.
    #[must_use]
    pub fn with_hook(&self, hook: impl CallHook + 'static) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
            hook: Some(Rc::new(hook)),
        }
    }

    /// Derives a child that logs one line per dispatch.
    #[must_use]
    pub fn trace(&self) -> Self {
        self.with_hook(TraceHook)
    }

    /// The user entry point: dispatches `action` with both continuations
    /// drained. Returns immediately; side effects drive completion.
    pub fn run(&self, input: Value, action: Action) {
        self.call(&action, input, None, None);
    }

    /// Invokes `action` with the given continuations.
    ///
    /// Absent continuations are replaced by [`Engine::drain`]. While the
    /// synchronous call depth is under the configured bound the action is
    /// invoked in place, inside a panic guard that routes panics from user
    /// code to `failure` as conditions; past the bound the whole call is
    /// deferred to the next tick so the native stack can unwind.
    pub fn call(
        &self,
        action: &Action,
        input: Value,
        success: Option<Action>,
        failure: Option<Action>,
    ) {
        let success = success.unwrap_or_else(|| self.drain());
        let failure = failure.unwrap_or_else(|| self.drain());

        let depth = self.shared.depth.get();
        if depth >= self.shared.config.max_depth {
            self.shared.bounces.set(self.shared.bounces.get() + 1);
            let engine = self.clone();
            let action = action.clone();
            self.shared.sched.push(move || {
                engine.call(&action, input, Some(success), Some(failure));
            });
            return;
        }

        let action = match &self.hook {
            Some(hook) => hook
                .on_call(self, action, &input, &success, &failure)
                .unwrap_or_else(|| action.clone()),
            None => action.clone(),
        };

        self.shared.depth.set(depth + 1);
        self.shared.calls.set(self.shared.calls.get() + 1);
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            action.invoke(self, input.clone(), success.clone(), failure.clone());
        }));
        self.shared.depth.set(self.shared.depth.get() - 1);

        if let Err(payload) = outcome {
            let message = panic_message(payload.as_ref());
            tracing::debug!(
                target: "strand::engine",
                action = action.name(),
                panic = %message,
                "panic re-entered as condition"
            );
            let condition = Condition::raised(
                self.clone(),
                Value::Str(message),
                input,
                success,
                failure.clone(),
            );
            self.call(&failure, Value::Condition(condition), None, None);
        }
    }

    /// The terminal sink action for this engine.
    ///
    /// Ordinary values are discarded; uncaught failure conditions are
    /// reported at WARN. A call hook's `on_drain` observes both.
    #[must_use]
    pub fn drain(&self) -> Action {
        let engine = self.clone();
        Action::native("drain", move |_rt, input, _success, _failure| {
            match &input {
                Value::Condition(condition) if !condition.is_pause() => {
                    tracing::warn!(
                        target: "strand::engine",
                        condition = %condition,
                        input = %condition.input().summary(),
                        "uncaught failure condition"
                    );
                }
                other => {
                    tracing::trace!(target: "strand::engine", input = %other.summary(), "drain");
                }
            }
            if let Some(hook) = &engine.hook {
                hook.on_drain(&engine, &input);
            }
        })
    }

    /// Schedules a bare thunk on the next tick.
    pub fn next_tick(&self, thunk: impl FnOnce() + 'static) {
        self.shared.sched.push(thunk);
    }

    /// Schedules a bare thunk after `millis` (zero means next tick).
    pub fn delay_thunk(&self, millis: u64, thunk: impl FnOnce() + 'static) {
        self.shared.sched.push_after(millis, thunk);
    }

    /// Dispatches `action` after `millis`, next-tick when zero.
    pub fn delay(
        &self,
        millis: u64,
        action: Action,
        input: Value,
        success: Option<Action>,
        failure: Option<Action>,
    ) {
        let engine = self.clone();
        self.delay_thunk(millis, move || {
            engine.call(&action, input, success, failure);
        });
    }

    /// Constructs a raised condition at the given site and delivers it.
    pub fn raise_to(&self, failure: &Action, error: Value, input: Value, success: Action) {
        let condition = Condition::raised(self.clone(), error, input, success, failure.clone());
        self.call(failure, Value::Condition(condition), None, None);
    }

    /// Returns true if no work is pending.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        self.shared.sched.is_quiescent()
    }

    /// Drives the scheduler until quiescent; returns the number of
    /// scheduler turns executed.
    pub fn run_until_quiescent(&self) -> u64 {
        self.shared.sched.run_until_quiescent()
    }

    /// Drives at most `max_steps` scheduler turns; returns the number
    /// executed. The bounded form is how callers drive sequences that
    /// never quiesce on their own (cycles, clocks).
    pub fn run_bounded(&self, max_steps: u64) -> u64 {
        self.shared.sched.run_bounded(max_steps)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.shared.config)
            .field("sched", &self.shared.sched)
            .field("depth", &self.shared.depth.get())
            .field("decorated", &self.hook.is_some())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic in action".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinator::{chain, map, pass};
    use crate::test_support::capture;
    use std::cell::RefCell;

    #[test]
    fn run_delivers_through_the_chain() {
        let engine = Engine::lab();
        let (probe, seen) = capture();
        engine.run(
            Value::Int(1),
            chain([map(|v| Value::Int(v.as_int().unwrap_or(0) + 1)), probe]),
        );
        engine.run_until_quiescent();
        assert_eq!(seen.borrow().as_slice(), &[Value::Int(2)]);
    }

    #[test]
    fn deep_chains_bounce_instead_of_overflowing() {
        let engine = Engine::lab_with_config(EngineConfig::new().with_max_depth(10));
        let (probe, seen) = capture();
        let stages: Vec<Action> = (0..200).map(|_| pass()).collect();
        let mut all = stages;
        all.push(probe);
        engine.run(Value::Int(9), chain(all));
        engine.run_until_quiescent();
        assert_eq!(seen.borrow().as_slice(), &[Value::Int(9)]);
        assert!(engine.trampoline_bounces() > 0);
    }

    #[test]
    fn panics_become_failure_conditions() {
        let engine = Engine::lab();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = {
            let seen = Rc::clone(&seen);
            Action::native("sink", move |_rt, input, _s, _f| {
                seen.borrow_mut().push(input);
            })
        };
        let boom = map(|_| panic!("kaboom"));
        let root = Action::native("root", move |rt, input, _s, _f| {
            rt.call(&boom, input, None, Some(sink.clone()));
        });
        engine.run(Value::Int(3), root);
        engine.run_until_quiescent();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        let condition = seen[0].as_condition().expect("condition");
        assert_eq!(condition.error(), &Value::from("kaboom"));
        assert_eq!(condition.input(), &Value::Int(3));
    }

    #[test]
    fn trace_child_is_substitutable() {
        let engine = Engine::lab().trace();
        let (probe, seen) = capture();
        engine.run(Value::Int(5), chain([pass(), probe]));
        engine.run_until_quiescent();
        assert_eq!(seen.borrow().as_slice(), &[Value::Int(5)]);
    }

    #[test]
    fn hook_may_substitute_the_action() {
        struct Expired(Action);
        impl CallHook for Expired {
            fn on_call(
                &self,
                _engine: &Engine,
                action: &Action,
                _input: &Value,
                _success: &Action,
                _failure: &Action,
            ) -> Option<Action> {
                (action.name() == "guarded").then(|| self.0.clone())
            }
        }

        let engine = Engine::lab();
        let (probe, seen) = capture();
        let derived = engine.with_hook(Expired(crate::combinator::supply(Value::from("expired"))));
        let guarded = Action::native("guarded", |rt, input, success, failure| {
            rt.call(&success, input, None, Some(failure));
        });
        derived.run(Value::from("live"), chain([guarded, probe]));
        derived.run_until_quiescent();
        assert_eq!(seen.borrow().as_slice(), &[Value::from("expired")]);
    }
}
