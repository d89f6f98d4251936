//! Wrap guard: decides whether a caught failure gets a new wrapper.

use tracing::debug;

use crate::aggregate::{Failure, WrapState};
use crate::chain::Unwinding;
use crate::frame::ContextFrame;
use crate::record::{ErrorKind, ErrorRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapDecision {
    /// Forward the aggregate's records untouched; the caller may only add a
    /// locating frame.
    PassThrough,
    /// Turn the failure into records owned by the current layer.
    Wrap,
}

/// Returns `false` only for an aggregate the container already wrapped that
/// is crossing a nested provisioning layer.
pub fn should_wrap(current_call_is_top_level: bool, caught: &Failure) -> bool {
    if current_call_is_top_level {
        return true;
    }
    match caught {
        Failure::Thrown(_) => true,
        Failure::Provision(err) => err.wrap_state() == WrapState::Unwrapped,
        Failure::Configuration(_) => false,
    }
}

pub fn decide(current_call_is_top_level: bool, caught: &Failure) -> WrapDecision {
    let decision = if should_wrap(current_call_is_top_level, caught) {
        WrapDecision::Wrap
    } else {
        WrapDecision::PassThrough
    };
    debug!(top_level = current_call_is_top_level, ?decision, "wrap decision");
    decision
}

/// Converts a failure caught from user code into an unwinding failure.
///
/// A thrown cause becomes one record tagged `kind`. Aggregates contribute
/// their own records, so their messages lead the eventual report and nothing
/// is wrapped twice.
pub fn absorb(caught: Failure, kind: ErrorKind) -> Unwinding {
    match caught {
        Failure::Thrown(cause) => Unwinding::new(ErrorRecord::from_cause(kind, cause)),
        Failure::Provision(err) => Unwinding::from_records(err.into_records()),
        Failure::Configuration(err) => Unwinding::from_records(err.into_records()),
    }
}

/// Forwards an already wrapped aggregate through a provider layer.
///
/// Ordinals and messages are kept; the layer's `frame` is the one thing added
/// to every record.
pub fn pass_through(caught: Failure, kind: ErrorKind, frame: ContextFrame) -> Unwinding {
    match caught {
        Failure::Provision(err) => Unwinding::from_records(err.with_context(frame).into_records()),
        Failure::Configuration(err) => Unwinding::from_records(err.with_context(frame).into_records()),
        thrown @ Failure::Thrown(_) => absorb(thrown, kind).with_frame(frame),
    }
}
