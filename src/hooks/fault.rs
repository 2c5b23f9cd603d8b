//! Reporting of callbacks that raised an error.

use std::fmt;

use crate::binding::BindingId;

/// A callback that raised during one invocation. Only that invocation's
/// opinion is lost; the rest of the dispatch carries on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackFault {
    /// Numeric id of the event being dispatched.
    pub event: u32,
    pub binding: BindingId,
    pub message: String,
}

impl fmt::Display for CallbackFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "callback {} for event {} failed: {}",
            self.binding, self.event, self.message
        )
    }
}

/// Where callback faults go. The embedding server installs its own to surface
/// them on its script error channel.
pub trait FaultReporter: Send + Sync {
    fn report(&self, fault: &CallbackFault);
}

impl<F> FaultReporter for F
where
    F: Fn(&CallbackFault) + Send + Sync,
{
    fn report(&self, fault: &CallbackFault) {
        self(fault)
    }
}

/// Default reporter: an error event on the `hooks` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl FaultReporter for LogReporter {
    fn report(&self, fault: &CallbackFault) {
        tracing::error!(
            target: "hooks",
            event = fault.event,
            binding = %fault.binding,
            "{}",
            fault.message
        );
    }
}
