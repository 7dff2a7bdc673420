//! [`AttentionScheduler`] – single-focus priority arbitration.
//!
//! Exactly one [`AttentionFocus`] is current at a time.  On every event:
//!
//! 1. A `hardware_alert` unconditionally replaces the focus with a critical
//!    one (`CRITICAL_hardware_alert`, priority [`CRITICAL_PRIORITY`]).
//! 2. Otherwise the event takes the focus when there is none, or when its
//!    priority number is strictly lower (more urgent) than the current one.
//! 3. Otherwise its topic (`<kind>_<source>`) joins the background set.
//!
//! A superseded focus always moves its topic into the background set.
//! State is purely in-process; nothing is persisted.
//!
//! # Example
//!
//! ```
//! use ark_kernel::attention::AttentionScheduler;
//! use ark_types::{Event, Payload};
//!
//! let mut attention = AttentionScheduler::new();
//! attention.process(&Event::user_input("hello", "console"));
//! let focus = attention.process(&Event::hardware_alert(Payload::new()));
//! assert!(focus.topic.starts_with("CRITICAL_"));
//! assert_eq!(focus.background_tasks, vec!["user_input_console".to_string()]);
//! ```

use ark_types::{Event, EventKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Priority assigned to the critical hardware focus (most urgent).
pub const CRITICAL_PRIORITY: i32 = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttentionFocus {
    pub topic: String,
    pub priority: i32,
    /// Steps taken while this focus was current.
    pub reasoning_chain: Vec<String>,
    /// Topics waiting in the background, in arrival order.
    pub background_tasks: Vec<String>,
}

#[derive(Debug, Default)]
pub struct AttentionScheduler {
    current: Option<AttentionFocus>,
    background: Vec<String>,
}

impl AttentionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&AttentionFocus> {
        self.current.as_ref()
    }

    pub fn background(&self) -> &[String] {
        &self.background
    }

    /// Route `event` through arbitration and return the resulting focus.
    pub fn process(&mut self, event: &Event) -> AttentionFocus {
        if event.kind() == EventKind::HardwareAlert {
            let topic = format!("CRITICAL_{}", event.kind());
            info!(source = event.source(), "hardware alert pre-empts attention");
            self.replace_focus(topic, CRITICAL_PRIORITY, event);
        } else {
            let preempts = self
                .current
                .as_ref()
                .is_none_or(|focus| event.priority() < focus.priority);
            if preempts {
                self.replace_focus(event.topic(), event.priority(), event);
            } else {
                let topic = event.topic();
                debug!(topic = %topic, "event queued in background");
                self.push_background(topic);
                if let Some(focus) = self.current.as_mut() {
                    focus.background_tasks = self.background.clone();
                }
            }
        }
        // Every branch above leaves a focus in place.
        self.current.clone().unwrap_or_else(|| AttentionFocus {
            topic: event.topic(),
            priority: event.priority(),
            reasoning_chain: Vec::new(),
            background_tasks: self.background.clone(),
        })
    }

    /// Append a step to the current focus's reasoning chain.
    pub fn record_step(&mut self, step: impl Into<String>) {
        if let Some(focus) = self.current.as_mut() {
            focus.reasoning_chain.push(step.into());
        }
    }

    /// Retire the current focus into the background set.
    ///
    /// Lets a handled critical focus give way to ordinary events again.
    pub fn release(&mut self) -> Option<AttentionFocus> {
        let released = self.current.take()?;
        self.push_background(released.topic.clone());
        debug!(topic = %released.topic, "attention focus released");
        Some(released)
    }

    fn replace_focus(&mut self, topic: String, priority: i32, event: &Event) {
        if let Some(previous) = self.current.take() {
            self.push_background(previous.topic);
        }
        // The new focus is no longer a background task.
        self.background.retain(|t| t != &topic);
        self.current = Some(AttentionFocus {
            reasoning_chain: vec![format!("{} from {}", event.kind(), event.source())],
            topic,
            priority,
            background_tasks: self.background.clone(),
        });
    }

    fn push_background(&mut self, topic: String) {
        if !self.background.contains(&topic) {
            self.background.push(topic);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_types::Payload;

    fn event(kind: EventKind, priority: i32, source: &str) -> Event {
        Event::new(kind, Payload::new(), priority, source)
    }

    #[test]
    fn first_event_takes_focus() {
        let mut attention = AttentionScheduler::new();
        let focus = attention.process(&Event::user_input("hi", "console"));
        assert_eq!(focus.topic, "user_input_console");
        assert_eq!(focus.priority, 2);
        assert!(focus.background_tasks.is_empty());
    }

    #[test]
    fn hardware_alert_preempts_any_focus() {
        let mut attention = AttentionScheduler::new();
        attention.process(&event(EventKind::MetaAnalysis, 5, "observer"));
        let focus = attention.process(&Event::hardware_alert(Payload::new()));
        assert!(focus.topic.starts_with("CRITICAL_"));
        assert_eq!(focus.topic, "CRITICAL_hardware_alert");
        assert_eq!(focus.priority, CRITICAL_PRIORITY);
        assert_eq!(focus.background_tasks, vec!["meta_analysis_observer"]);
    }

    #[test]
    fn hardware_alert_preempts_even_an_existing_critical_focus() {
        let mut attention = AttentionScheduler::new();
        attention.process(&Event::hardware_alert(Payload::new()));
        let focus = attention.process(&Event::hardware_alert(Payload::new()));
        assert_eq!(focus.topic, "CRITICAL_hardware_alert");
        // The superseded critical topic is the same one now in focus.
        assert!(focus.background_tasks.is_empty());
    }

    #[test]
    fn more_urgent_event_replaces_focus() {
        let mut attention = AttentionScheduler::new();
        attention.process(&Event::system_update(Payload::new()));
        let focus = attention.process(&Event::user_input("urgent", "console"));
        assert_eq!(focus.topic, "user_input_console");
        assert_eq!(attention.background(), ["system_update_system"]);
    }

    #[test]
    fn equal_priority_goes_to_background() {
        let mut attention = AttentionScheduler::new();
        attention.process(&Event::user_input("a", "console"));
        let focus = attention.process(&Event::user_input("b", "web"));
        assert_eq!(focus.topic, "user_input_console");
        assert_eq!(focus.background_tasks, vec!["user_input_web"]);
    }

    #[test]
    fn background_set_is_deduplicated_and_copied_into_focus() {
        let mut attention = AttentionScheduler::new();
        attention.process(&Event::hardware_alert(Payload::new()));
        attention.process(&Event::system_update(Payload::new()));
        attention.process(&Event::user_input("x", "console"));
        let focus = attention.process(&Event::system_update(Payload::new()));
        assert_eq!(focus.topic, "CRITICAL_hardware_alert");
        assert_eq!(
            focus.background_tasks,
            vec!["system_update_system", "user_input_console"]
        );
    }

    #[test]
    fn release_lets_ordinary_events_take_focus() {
        let mut attention = AttentionScheduler::new();
        attention.process(&Event::hardware_alert(Payload::new()));
        let released = attention.release().unwrap();
        assert_eq!(released.topic, "CRITICAL_hardware_alert");
        assert!(attention.current().is_none());

        let focus = attention.process(&Event::system_update(Payload::new()));
        assert_eq!(focus.topic, "system_update_system");
        assert_eq!(focus.background_tasks, vec!["CRITICAL_hardware_alert"]);
    }

    #[test]
    fn record_step_appends_to_current_focus() {
        let mut attention = AttentionScheduler::new();
        attention.record_step("ignored without focus");
        attention.process(&Event::user_input("x", "console"));
        attention.record_step("architect: 0.80");
        let chain = &attention.current().unwrap().reasoning_chain;
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1], "architect: 0.80");
    }
}
