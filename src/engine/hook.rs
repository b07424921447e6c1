//! The engine decoration seam.
//!
//! A derived engine may install a [`CallHook`] to observe or redirect
//! every dispatch. The built-in [`TraceHook`] logs one line per call;
//! an application-level hook can instead substitute the dispatched action
//! (for example, replacing everything with a pre-registered "expired"
//! action once a session lapses). Semantics are otherwise identical to the
//! undecorated engine.

use crate::action::Action;
use crate::value::Value;

use super::Engine;

/// Observes or redirects engine dispatches.
pub trait CallHook {
    /// Called before each dispatch.
    ///
    /// Returning `Some(action)` substitutes the dispatched action; the
    /// continuations and input are unchanged. Returning `None` proceeds
    /// with the original.
    fn on_call(
        &self,
        engine: &Engine,
        action: &Action,
        input: &Value,
        success: &Action,
        failure: &Action,
    ) -> Option<Action> {
        let _ = (engine, action, input, success, failure);
        None
    }

    /// Called when a value reaches the terminal sink.
    fn on_drain(&self, engine: &Engine, input: &Value) {
        let _ = (engine, input);
    }
}

/// The built-in tracing decoration: one structured log line per call.
#[derive(Debug, Default, Clone, Copy)]
pub struct TraceHook;

impl CallHook for TraceHook {
    fn on_call(
        &self,
        _engine: &Engine,
        action: &Action,
        input: &Value,
        success: &Action,
        failure: &Action,
    ) -> Option<Action> {
        tracing::debug!(
            target: "strand::trace",
            action = action.name(),
            input = %input.summary(),
            ok = success.name(),
            err = failure.name(),
            "call"
        );
        None
    }

    fn on_drain(&self, _engine: &Engine, input: &Value) {
        if let Value::Condition(condition) = input {
            tracing::debug!(
                target: "strand::trace",
                condition = %condition,
                resume_site = condition.success().name(),
                "drain"
            );
        } else {
            tracing::debug!(target: "strand::trace", input = %input.summary(), "drain");
        }
    }
}
