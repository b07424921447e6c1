//! Strand: a cooperative action-combinator kernel with resumable errors.
//!
//! # Overview
//!
//! Strand assembles side-effectful computations ("actions") into
//! sequences, forks, pipelines, and channels, all executed by a
//! single-threaded cooperative engine. Its distinguishing feature is the
//! error model: a failure is reified as a condition and delivered to the
//! nearest installed handler, which may *resume* from the failure point,
//! *rollback* to an outer handler, or *restart* the protected region.
//!
//! # Core Guarantees
//!
//! - **Exactly-one delivery**: every reached action invocation settles at
//!   most one of its continuations (or deliberately stops)
//! - **Bounded stacks**: deep synchronous chains trampoline through the
//!   scheduler every `max_depth` frames
//! - **No unwinding past actions**: panics in user code re-enter the
//!   failure channel as conditions
//! - **Bounded buffers**: serialized regions push back with pause
//!   conditions instead of queueing without limit
//! - **Deterministic testing**: the lab engine runs on virtual time
//!
//! # Module Structure
//!
//! - [`value`]: the dynamic datum flowing between actions
//! - [`action`]: the action representation and its adapters
//! - [`condition`]: recoverable failure values and pause signals
//! - [`engine`]: the orchestrator, scheduler, config, and trace hook
//! - [`combinator`]: sequencing, error model, concurrency, streams, flow
//! - [`channel`]: CSP-style rendezvous channels
//! - [`test_support`]: capture probes shared by the test suites

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

pub mod action;
pub mod channel;
pub mod combinator;
pub mod condition;
pub mod engine;
pub mod test_support;
pub mod value;

// Re-exports for convenient access to core types
pub use action::{Action, Step};
pub use channel::Channel;
pub use combinator::{
    add, alt, any, atomic, attempt, bind, branch, catch, chain, clock, collect_until,
    collect_while, cond, cycle, debounce, delay_for, emit, enum_from, fail, filter, finally,
    forgive, fork, generate, interruptible, interruption, map, pass, pause, pipeline, probe,
    raise, reduce, seq, send, spray, supply, sync, tee, timeout, AtomicRegion,
    Interruptible, InterruptionHandle, Pattern, SyncPoint,
};
pub use condition::{Condition, PauseSignal, Signal};
pub use engine::{CallHook, ConfigError, Driver, Engine, EngineConfig, Time, TraceHook};
pub use value::{Value, ValueError};
