//! Combinators for assembling action sequences.
//!
//! This module provides the building blocks:
//!
//! - [`seq`]/[`chain`]/[`branch`] and the source/sink primitives
//! - the error model: [`raise`], [`catch`], [`finally`], [`attempt`], [`forgive`]
//! - concurrency: [`fork`], [`tee`], [`any`], [`alt`], [`timeout`], [`sync`], interruption
//! - streams: [`generate`], [`spray`], [`cycle`], [`enum_from`], [`collect_until`], [`clock`]
//! - serialization and backpressure: [`atomic`], [`pipeline`]
//! - data flow: [`map`], [`filter`], [`reduce`], [`add`], [`supply`], [`cond`]

pub mod atomic;
pub mod clock;
pub mod cond;
pub mod flow;
pub mod fork;
pub mod gen;
pub mod interrupt;
pub mod recover;
pub mod seq;
pub mod sync;
pub mod timeout;

pub use atomic::{atomic, pipeline, AtomicRegion};
pub use clock::{clock, debounce};
pub use cond::{cond, Pattern};
pub use flow::{add, delay_for, emit, filter, map, probe, reduce, supply};
pub use fork::{alt, any, fork, tee};
pub use gen::{collect_until, collect_while, cycle, enum_from, generate, pause, spray};
pub use interrupt::{
    interruptible, interruption, Interruptible, InterruptionHandle, Registrar,
};
pub use recover::{attempt, catch, finally, forgive, raise};
pub use seq::{bind, branch, chain, fail, pass, send, seq};
pub use sync::{sync, SyncPoint};
pub use timeout::timeout;
