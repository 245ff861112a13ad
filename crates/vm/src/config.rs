//! Defines the [`Config`] type, holding the host-chosen knobs of a [`Machine`](crate::Machine).

/// Configuration of a [`Machine`](crate::Machine).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// The maximum number of steps performed by a single call to
    /// [`Machine::run`](crate::Machine::run).
    ///
    /// `None` lets the program run until it halts, which might be never.
    pub step_limit: Option<u64>,
    /// Whether every decoded instruction should be logged at the `TRACE` level.
    pub trace_instructions: bool,
}

impl Config {
    /// Returns this configuration with the provided step limit.
    #[inline]
    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = Some(limit);
        self
    }

    /// Returns this configuration with instruction tracing enabled or disabled.
    #[inline]
    pub fn with_trace_instructions(mut self, yes: bool) -> Self {
        self.trace_instructions = yes;
        self
    }
}
