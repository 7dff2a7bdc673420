//! `ark-types` – shared vocabulary of the ARK cognitive core.
//!
//! Every other crate in the workspace speaks in terms of the types defined
//! here:
//!
//! - [`Event`] / [`EventKind`] – immutable inputs entering the attention
//!   pipeline.
//! - [`Capability`] – the static registry of tools a department may be
//!   granted.
//! - [`ArkError`] – the workspace-wide error used at orchestration
//!   boundaries.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Free-form key → value map carried by events and reasoning contexts.
pub type Payload = Map<String, Value>;

// ─────────────────────────────────────────────────────────────────────────────
// Event kinds
// ─────────────────────────────────────────────────────────────────────────────

/// Classification of an incoming [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    UserInput,
    HardwareAlert,
    SystemUpdate,
    EmotionTrigger,
    ReasoningComplete,
    MemoryQuery,
    MetaAnalysis,
}

impl EventKind {
    /// Return the canonical snake_case label.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::UserInput => "user_input",
            EventKind::HardwareAlert => "hardware_alert",
            EventKind::SystemUpdate => "system_update",
            EventKind::EmotionTrigger => "emotion_trigger",
            EventKind::ReasoningComplete => "reasoning_complete",
            EventKind::MemoryQuery => "memory_query",
            EventKind::MetaAnalysis => "meta_analysis",
        }
    }

    /// Default urgency for events of this kind (lower = more urgent).
    pub fn default_priority(&self) -> i32 {
        match self {
            EventKind::HardwareAlert => 1,
            EventKind::UserInput => 2,
            EventKind::SystemUpdate => 3,
            _ => 5,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = ArkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user_input" => Ok(EventKind::UserInput),
            "hardware_alert" => Ok(EventKind::HardwareAlert),
            "system_update" => Ok(EventKind::SystemUpdate),
            "emotion_trigger" => Ok(EventKind::EmotionTrigger),
            "reasoning_complete" => Ok(EventKind::ReasoningComplete),
            "memory_query" => Ok(EventKind::MemoryQuery),
            "meta_analysis" => Ok(EventKind::MetaAnalysis),
            other => Err(ArkError::UnknownEventKind(other.to_string())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Event
// ─────────────────────────────────────────────────────────────────────────────

/// A single input to the cognitive core.
///
/// Fields are private: an event is immutable once built.  Use
/// [`Event::with_context`] while constructing to attach caller context.
///
/// # Example
///
/// ```
/// use ark_types::{Event, EventKind};
///
/// let event = Event::user_input("How are you?", "console");
/// assert_eq!(event.kind(), EventKind::UserInput);
/// assert_eq!(event.priority(), 2);
/// assert_eq!(event.topic(), "user_input_console");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    id: Uuid,
    kind: EventKind,
    payload: Payload,
    priority: i32,
    created_at: DateTime<Utc>,
    source: String,
    context: Payload,
}

impl Event {
    /// Build an event with an explicit priority.
    pub fn new(kind: EventKind, payload: Payload, priority: i32, source: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            payload,
            priority,
            created_at: Utc::now(),
            source: source.into(),
            context: Payload::new(),
        }
    }

    /// A user utterance.  The text is stored under the `"text"` payload key.
    pub fn user_input(text: impl Into<String>, source: impl Into<String>) -> Self {
        let mut payload = Payload::new();
        payload.insert("text".to_string(), Value::String(text.into()));
        Self::new(
            EventKind::UserInput,
            payload,
            EventKind::UserInput.default_priority(),
            source,
        )
    }

    /// A hardware alert raised by an external telemetry sampler.
    pub fn hardware_alert(payload: Payload) -> Self {
        Self::new(
            EventKind::HardwareAlert,
            payload,
            EventKind::HardwareAlert.default_priority(),
            "hardware",
        )
    }

    /// A system-level update notification.
    pub fn system_update(payload: Payload) -> Self {
        Self::new(
            EventKind::SystemUpdate,
            payload,
            EventKind::SystemUpdate.default_priority(),
            "system",
        )
    }

    /// Attach caller context.  Consumes the event so context can only be set
    /// before the event is shared.
    pub fn with_context(mut self, context: Payload) -> Self {
        self.context = context;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn context(&self) -> &Payload {
        &self.context
    }

    /// Attention topic derived from this event: `<kind>_<source>`.
    pub fn topic(&self) -> String {
        format!("{}_{}", self.kind, self.source)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Capabilities
// ─────────────────────────────────────────────────────────────────────────────

/// Tools a reasoning department may be granted.
///
/// Departments name their tools as strings in configuration; names are
/// resolved with [`FromStr`] when the department is built, so an unknown
/// name fails construction instead of being skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Inspect throughput and latency of the running system.
    AnalyzePerformance,
    /// Draft a plan for the next system evolution step.
    PlanEvolution,
    /// Review a proposed code change.
    ReviewCodeChanges,
    /// Check generated code for syntax errors.
    ValidateSyntax,
    /// Audit a proposal for security issues.
    CheckSecurity,
    /// Locate performance bottlenecks.
    IdentifyBottlenecks,
    /// Summarise the current system state.
    GetSystemStateSummary,
}

impl Capability {
    /// Every known capability, in declaration order.
    pub const ALL: [Capability; 7] = [
        Capability::AnalyzePerformance,
        Capability::PlanEvolution,
        Capability::ReviewCodeChanges,
        Capability::ValidateSyntax,
        Capability::CheckSecurity,
        Capability::IdentifyBottlenecks,
        Capability::GetSystemStateSummary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::AnalyzePerformance => "analyze_performance",
            Capability::PlanEvolution => "plan_evolution",
            Capability::ReviewCodeChanges => "review_code_changes",
            Capability::ValidateSyntax => "validate_syntax",
            Capability::CheckSecurity => "check_security",
            Capability::IdentifyBottlenecks => "identify_bottlenecks",
            Capability::GetSystemStateSummary => "get_system_state_summary",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = ArkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ArkError::UnknownCapability(s.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Workspace-wide error for capability resolution and orchestration faults.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArkError {
    #[error("Capability Denied: {agent} does not hold {capability}")]
    Unauthorized { agent: String, capability: Capability },

    #[error("Unknown capability: {0}")]
    UnknownCapability(String),

    #[error("Unknown event kind: {0}")]
    UnknownEventKind(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_labels_roundtrip_through_from_str() {
        for kind in [
            EventKind::UserInput,
            EventKind::HardwareAlert,
            EventKind::SystemUpdate,
            EventKind::EmotionTrigger,
            EventKind::ReasoningComplete,
            EventKind::MemoryQuery,
            EventKind::MetaAnalysis,
        ] {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert!(matches!(
            "telepathy".parse::<EventKind>(),
            Err(ArkError::UnknownEventKind(_))
        ));
    }

    #[test]
    fn event_constructors_use_default_priorities() {
        assert_eq!(Event::user_input("hi", "console").priority(), 2);
        assert_eq!(Event::hardware_alert(Payload::new()).priority(), 1);
        assert_eq!(Event::system_update(Payload::new()).priority(), 3);
    }

    #[test]
    fn hardware_alert_topic_uses_hardware_source() {
        let event = Event::hardware_alert(Payload::new());
        assert_eq!(event.source(), "hardware");
        assert_eq!(event.topic(), "hardware_alert_hardware");
    }

    #[test]
    fn user_input_stores_text_in_payload() {
        let event = Event::user_input("status report", "console");
        assert_eq!(event.payload()["text"], "status report");
    }

    #[test]
    fn with_context_attaches_context() {
        let mut ctx = Payload::new();
        ctx.insert("session".into(), Value::from(7));
        let event = Event::user_input("hello", "web").with_context(ctx);
        assert_eq!(event.context()["session"], 7);
    }

    #[test]
    fn event_serializes_kind_as_snake_case() {
        let event = Event::system_update(Payload::new());
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"system_update\""));
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id(), event.id());
        assert_eq!(back.kind(), EventKind::SystemUpdate);
    }

    #[test]
    fn capability_resolves_known_names() {
        assert_eq!(
            "check_security".parse::<Capability>().unwrap(),
            Capability::CheckSecurity
        );
        for cap in Capability::ALL {
            assert_eq!(cap.as_str().parse::<Capability>().unwrap(), cap);
        }
    }

    #[test]
    fn unknown_capability_is_an_error() {
        let err = "launch_rockets".parse::<Capability>().unwrap_err();
        assert_eq!(err, ArkError::UnknownCapability("launch_rockets".into()));
        assert!(err.to_string().contains("launch_rockets"));
    }

    #[test]
    fn ark_error_display() {
        let err = ArkError::Unauthorized {
            agent: "critic".into(),
            capability: Capability::PlanEvolution,
        };
        let text = err.to_string();
        assert!(text.contains("Capability Denied"));
        assert!(text.contains("plan_evolution"));
    }
}
