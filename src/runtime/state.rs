use std::fmt;

/// Lifecycle of a monitored run. `Stopping` and `Ended` are both final for the
/// event loop; the process exits after the final notification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Running,
    Stopping,
    Ended,
}

impl RunState {
    pub fn is_running(self) -> bool {
        self == RunState::Running
    }

    /// Running -> Stopping. Returns whether the transition happened.
    pub fn begin_stop(&mut self) -> bool {
        self.transition(RunState::Stopping)
    }

    /// Running -> Ended. Returns whether the transition happened.
    pub fn end(&mut self) -> bool {
        self.transition(RunState::Ended)
    }

    fn transition(&mut self, next: RunState) -> bool {
        if *self != RunState::Running {
            tracing::debug!(
                target: "simwatch::runtime",
                from = ?*self,
                to = ?next,
                "ignoring run state transition"
            );
            return false;
        }
        tracing::debug!(target: "simwatch::runtime", to = ?next, "run state changed");
        *self = next;
        true
    }
}

/// What ended the event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The engine reported natural completion.
    Completed,
    /// Operator interrupt.
    Interrupted,
    /// Unrecoverable fault raised through the abort trigger.
    Fatal(String),
    /// The engine stopped on its own without being asked.
    EngineStopped,
    /// The engine's event stream closed before completion.
    EngineClosed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Completed => write!(f, "completed"),
            StopReason::Interrupted => write!(f, "interrupted"),
            StopReason::Fatal(message) => write!(f, "fatal: {message}"),
            StopReason::EngineStopped => write!(f, "engine stopped"),
            StopReason::EngineClosed => write!(f, "engine event stream closed"),
        }
    }
}
