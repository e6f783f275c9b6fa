use std::fmt;

use serde::{Deserialize, Serialize};

use super::job::{MemoryUsage, ReturnValue};
use crate::parser;

/// Event codes written by the scheduler at the start of each log record.
///
/// Only the codes that influence classification are listed; any other code
/// leaves the current state untouched. Discriminants are the logged values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum EventCode {
    Submitted = 0,
    Started = 1,
    Evicted = 4,
    Terminated = 5,
    ImageSizeUpdated = 6,
    ShadowException = 7,
    Aborted = 9,
    Held = 12,
    Released = 13,
    Disconnected = 22,
    ReconnectionFailed = 24,
}

impl EventCode {
    pub const ALL: [EventCode; 11] = [
        EventCode::Submitted,
        EventCode::Started,
        EventCode::Evicted,
        EventCode::Terminated,
        EventCode::ImageSizeUpdated,
        EventCode::ShadowException,
        EventCode::Aborted,
        EventCode::Held,
        EventCode::Released,
        EventCode::Disconnected,
        EventCode::ReconnectionFailed,
    ];

    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.code() == code)
    }

    /// Recognizes the fixed-width `NNN ` prefix of a log line.
    pub fn from_line(line: &str) -> Option<Self> {
        let prefix = line.as_bytes().get(..4)?;
        if prefix[3] != b' ' || !prefix[..3].iter().all(u8::is_ascii_digit) {
            return None;
        }
        let code = prefix[..3]
            .iter()
            .fold(0u16, |acc, digit| acc * 10 + u16::from(digit - b'0'));
        Self::from_code(code)
    }

    /// The lifecycle state a job enters when this event is logged.
    pub fn state(self) -> LifecycleState {
        match self {
            EventCode::Submitted => LifecycleState::Submitted,
            EventCode::Started => LifecycleState::Started,
            EventCode::Evicted => LifecycleState::Evicted,
            EventCode::Terminated => LifecycleState::Terminated,
            EventCode::ImageSizeUpdated => LifecycleState::ImageSizeUpdated,
            EventCode::ShadowException => LifecycleState::ShadowException,
            EventCode::Aborted => LifecycleState::Aborted,
            EventCode::Held => LifecycleState::Held,
            EventCode::Released => LifecycleState::Released,
            EventCode::Disconnected => LifecycleState::Disconnected,
            EventCode::ReconnectionFailed => LifecycleState::ReconnectionFailed,
        }
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.code())
    }
}

/// Classification of a job as of the most recent recognized event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// No recognized event seen yet.
    #[default]
    Unknown,
    Submitted,
    Started,
    Evicted,
    Terminated,
    ImageSizeUpdated,
    ShadowException,
    Aborted,
    Held,
    Released,
    Disconnected,
    ReconnectionFailed,
}

impl LifecycleState {
    /// The job will not resume from this state.
    pub fn is_ended(self) -> bool {
        matches!(
            self,
            LifecycleState::Evicted
                | LifecycleState::Terminated
                | LifecycleState::Aborted
                | LifecycleState::Disconnected
                | LifecycleState::ReconnectionFailed
        )
    }

    /// The job is active, or assumed to be.
    pub fn is_running(self) -> bool {
        matches!(
            self,
            LifecycleState::Submitted | LifecycleState::Started | LifecycleState::ImageSizeUpdated
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LifecycleState::Unknown => "unknown",
            LifecycleState::Submitted => "submitted",
            LifecycleState::Started => "started",
            LifecycleState::Evicted => "evicted",
            LifecycleState::Terminated => "terminated",
            LifecycleState::ImageSizeUpdated => "image size updated",
            LifecycleState::ShadowException => "shadow exception",
            LifecycleState::Aborted => "aborted",
            LifecycleState::Held => "held",
            LifecycleState::Released => "released",
            LifecycleState::Disconnected => "disconnected",
            LifecycleState::ReconnectionFailed => "reconnection failed",
        };
        f.write_str(label)
    }
}

/// Side effect a single log line has on the data collected for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    /// A return-value record of the terminated run. Discards interim samples.
    CaptureReturn(ReturnValue),
    /// A three-column memory summary.
    CaptureMemory(MemoryUsage),
    /// A periodic memory sample while the job runs.
    ObserveMemory(u64),
    /// A new run attempt began; memory data of previous attempts is void.
    ClearHistory,
}

/// The result of feeding one line to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Event recognized at the start of the line, if any.
    pub event: Option<EventCode>,
    /// State after the line.
    pub state: LifecycleState,
    pub effect: Effect,
}

/// Replays log lines for one job.
///
/// The event code of a line only decides the next state. Which record
/// patterns apply is gated by that state, since the body of a record spans
/// several lines after the one carrying the code.
pub struct StateMachine;

impl StateMachine {
    pub fn next(current: LifecycleState, line: &str) -> Transition {
        let event = EventCode::from_line(line);
        let state = event.map_or(current, EventCode::state);
        let effect = match state {
            LifecycleState::Terminated => Self::on_terminated(line),
            LifecycleState::Evicted => Self::on_evicted(line),
            LifecycleState::ImageSizeUpdated => Self::on_image_size_updated(line),
            LifecycleState::Submitted | LifecycleState::Started => Effect::ClearHistory,
            _ => Effect::None,
        };
        Transition {
            event,
            state,
            effect,
        }
    }

    fn on_terminated(line: &str) -> Effect {
        if let Some(ret) = parser::match_return_value(line) {
            Effect::CaptureReturn(ret)
        } else if let Some(memory) = parser::match_memory_summary(line) {
            Effect::CaptureMemory(memory)
        } else {
            Effect::None
        }
    }

    // Evictions report memory but never a return value.
    fn on_evicted(line: &str) -> Effect {
        parser::match_memory_summary(line).map_or(Effect::None, Effect::CaptureMemory)
    }

    fn on_image_size_updated(line: &str) -> Effect {
        parser::match_memory_update(line).map_or(Effect::None, Effect::ObserveMemory)
    }
}
