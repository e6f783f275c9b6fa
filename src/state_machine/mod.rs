mod job;
mod state;

pub use job::{
    DATE_FORMAT, Diagnostic, JobOutcome, MemoryUsage, REFERENCE_YEAR, ReturnValue, parse_log_date,
};
pub use state::{Effect, EventCode, LifecycleState, StateMachine, Transition};
