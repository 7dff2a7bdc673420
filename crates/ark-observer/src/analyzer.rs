//! [`MetaObserver`] – windowed pattern analysis over the memory store.
//!
//! Each query reads the entries of one kind created within the last
//! `hours` and hands them to the pure functions in [`crate::patterns`].
//! Store failures are logged and treated as "no data"; the observer never
//! fails its caller.
//!
//! [`MetaObserver::report`] recomputes at most once per
//! [`ObserverConfig::analysis_interval`]; within the interval the cached
//! report is returned unchanged.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ark_memory::{MemoryEntry, MemoryKind, MemoryStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::patterns::{self, ConsciousnessPattern, EmotionalPattern, ReasoningPattern};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Thresholds and windows for the observer.
#[derive(Debug, Clone, PartialEq)]
pub struct ObserverConfig {
    /// Minimum time between two recomputed reports.
    pub analysis_interval: Duration,
    /// Window used by [`MetaObserver::report`] and
    /// [`MetaObserver::critical_events`].
    pub analysis_period_hours: u32,
    /// `stressed` frequency (per hour) above which `high_stress` fires.
    pub stress_threshold: f64,
    /// Attention average below which `fatigue` fires.
    pub fatigue_threshold: f64,
    /// `evolving` frequency (per hour) above which `evolution_surge` fires.
    pub evolution_threshold: f64,
    /// Emotional intensity above which `emotional_spike` fires.
    pub emotional_spike_threshold: f64,
    /// Number of past reports retained.
    pub history_limit: usize,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            analysis_interval: Duration::from_secs(3600),
            analysis_period_hours: 24,
            stress_threshold: 0.7,
            fatigue_threshold: 0.3,
            evolution_threshold: 0.8,
            emotional_spike_threshold: 0.8,
            history_limit: 100,
        }
    }
}

/// `stressed` frequency above which load reduction is recommended.
const RECOMMEND_STRESS_FREQUENCY: f64 = 0.5;
/// Attention average below which more rest is recommended.
const RECOMMEND_ATTENTION_FLOOR: f64 = 0.4;
/// `evolving` frequency below which self-improvement is recommended.
const RECOMMEND_EVOLUTION_FLOOR: f64 = 0.2;

// ─────────────────────────────────────────────────────────────────────────────
// Report types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriticalEventKind {
    HighStress,
    Fatigue,
    EvolutionSurge,
    EmotionalSpike,
}

impl CriticalEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CriticalEventKind::HighStress => "high_stress",
            CriticalEventKind::Fatigue => "fatigue",
            CriticalEventKind::EvolutionSurge => "evolution_surge",
            CriticalEventKind::EmotionalSpike => "emotional_spike",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalEvent {
    pub kind: CriticalEventKind,
    pub severity: Severity,
    pub message: String,
    pub recommendation: String,
}

/// Snapshot of one analysis pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaReport {
    pub timestamp: DateTime<Utc>,
    pub analysis_period_hours: u32,
    pub consciousness_patterns: Vec<ConsciousnessPattern>,
    pub emotional_patterns: Vec<EmotionalPattern>,
    pub reasoning_patterns: Vec<ReasoningPattern>,
    pub critical_events: Vec<CriticalEvent>,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// MetaObserver
// ─────────────────────────────────────────────────────────────────────────────

pub struct MetaObserver {
    store: Arc<MemoryStore>,
    config: ObserverConfig,
    last_analysis: Option<(Instant, MetaReport)>,
    history: VecDeque<MetaReport>,
}

impl MetaObserver {
    pub fn new(store: Arc<MemoryStore>, config: ObserverConfig) -> Self {
        Self {
            store,
            config,
            last_analysis: None,
            history: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &ObserverConfig {
        &self.config
    }

    /// Past reports, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &MetaReport> {
        self.history.iter()
    }

    pub fn consciousness_patterns(&self, hours: u32) -> Vec<ConsciousnessPattern> {
        patterns::consciousness_patterns(&self.window(MemoryKind::Reasoning, hours), hours)
    }

    pub fn emotional_patterns(&self, hours: u32) -> Vec<EmotionalPattern> {
        patterns::emotional_patterns(&self.window(MemoryKind::Emotion, hours), hours)
    }

    pub fn reasoning_patterns(&self, hours: u32) -> Vec<ReasoningPattern> {
        patterns::reasoning_patterns(&self.window(MemoryKind::Reasoning, hours), hours)
    }

    /// Threshold alerts over the configured analysis period.
    pub fn critical_events(&self) -> Vec<CriticalEvent> {
        let hours = self.config.analysis_period_hours;
        detect_critical_events(
            &self.config,
            &self.consciousness_patterns(hours),
            &self.emotional_patterns(hours),
        )
    }

    /// Full report, recomputed at most once per analysis interval.
    pub fn report(&mut self) -> MetaReport {
        if let Some((at, report)) = &self.last_analysis {
            if at.elapsed() < self.config.analysis_interval {
                debug!("meta report served from cache");
                return report.clone();
            }
        }

        let hours = self.config.analysis_period_hours;
        let consciousness = self.consciousness_patterns(hours);
        let emotional = self.emotional_patterns(hours);
        let reasoning = self.reasoning_patterns(hours);
        let report = MetaReport {
            timestamp: Utc::now(),
            analysis_period_hours: hours,
            critical_events: detect_critical_events(&self.config, &consciousness, &emotional),
            insights: insights(&consciousness, &emotional, &reasoning),
            recommendations: recommendations(&consciousness),
            consciousness_patterns: consciousness,
            emotional_patterns: emotional,
            reasoning_patterns: reasoning,
        };
        info!(
            critical_events = report.critical_events.len(),
            insights = report.insights.len(),
            "meta analysis completed"
        );

        self.history.push_back(report.clone());
        while self.history.len() > self.config.history_limit {
            self.history.pop_front();
        }
        self.last_analysis = Some((Instant::now(), report.clone()));
        report
    }

    fn window(&self, kind: MemoryKind, hours: u32) -> Vec<MemoryEntry> {
        if hours == 0 {
            return Vec::new();
        }
        match self.store.recent(chrono::Duration::hours(i64::from(hours)), Some(kind)) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, kind = kind.as_str(), "meta observer could not read memories");
                Vec::new()
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rules
// ─────────────────────────────────────────────────────────────────────────────

fn detect_critical_events(
    config: &ObserverConfig,
    consciousness: &[ConsciousnessPattern],
    emotional: &[EmotionalPattern],
) -> Vec<CriticalEvent> {
    let mut events = Vec::new();

    if let Some(stressed) = find_state(consciousness, "stressed") {
        if stressed.frequency > config.stress_threshold {
            events.push(CriticalEvent {
                kind: CriticalEventKind::HighStress,
                severity: Severity::Warning,
                message: format!("High frequency of stressed states: {:.2}/hour", stressed.frequency),
                recommendation: "Reduce cognitive load and schedule recovery time".into(),
            });
        }
    }

    if consciousness
        .iter()
        .any(|p| p.attention_level_avg < config.fatigue_threshold)
    {
        events.push(CriticalEvent {
            kind: CriticalEventKind::Fatigue,
            severity: Severity::Warning,
            message: "Signs of fatigue: low average attention level".into(),
            recommendation: "Pause non-essential work and recover".into(),
        });
    }

    if let Some(evolving) = find_state(consciousness, "evolving") {
        if evolving.frequency > config.evolution_threshold {
            events.push(CriticalEvent {
                kind: CriticalEventKind::EvolutionSurge,
                severity: Severity::Info,
                message: format!("Active evolution: {:.2}/hour", evolving.frequency),
                recommendation: "Self-improvement is active; keep monitoring".into(),
            });
        }
    }

    for pattern in emotional {
        if pattern.intensity > config.emotional_spike_threshold {
            events.push(CriticalEvent {
                kind: CriticalEventKind::EmotionalSpike,
                severity: Severity::Warning,
                message: format!(
                    "Emotional spike: {} (intensity {:.2})",
                    pattern.emotion, pattern.intensity
                ),
                recommendation: "Monitor emotional state".into(),
            });
        }
    }

    events
}

fn insights(
    consciousness: &[ConsciousnessPattern],
    emotional: &[EmotionalPattern],
    reasoning: &[ReasoningPattern],
) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(p) = first_max_by(consciousness, |p| p.frequency) {
        out.push(format!(
            "Most frequent consciousness state: {} ({:.2}/hour)",
            p.pattern_type, p.frequency
        ));
    }
    if let Some(p) = first_max_by(emotional, |p| p.intensity) {
        out.push(format!("Most intense emotion: {} ({:.2})", p.emotion, p.intensity));
    }
    if let Some(p) = first_max_by(reasoning, |p| p.success_rate) {
        out.push(format!(
            "Most successful reasoning type: {} (success {:.2})",
            p.reasoning_type, p.success_rate
        ));
    }
    out
}

fn recommendations(consciousness: &[ConsciousnessPattern]) -> Vec<String> {
    let mut out = Vec::new();
    if find_state(consciousness, "stressed").is_some_and(|p| p.frequency > RECOMMEND_STRESS_FREQUENCY) {
        out.push("Reduce cognitive load to lower stress".to_string());
    }
    if consciousness
        .iter()
        .any(|p| p.attention_level_avg < RECOMMEND_ATTENTION_FLOOR)
    {
        out.push("Increase rest and recovery time".to_string());
    }
    if find_state(consciousness, "evolving").is_some_and(|p| p.frequency < RECOMMEND_EVOLUTION_FLOOR) {
        out.push("Activate self-improvement mode".to_string());
    }
    out
}

fn find_state<'a>(patterns: &'a [ConsciousnessPattern], state: &str) -> Option<&'a ConsciousnessPattern> {
    patterns.iter().find(|p| p.pattern_type == state)
}

/// Element with the largest key; the earliest wins ties.
fn first_max_by<T>(items: &[T], key: impl Fn(&T) -> f64) -> Option<&T> {
    let mut best: Option<(&T, f64)> = None;
    for item in items {
        let k = key(item);
        if best.is_none_or(|(_, top)| k > top) {
            best = Some((item, k));
        }
    }
    best.map(|(item, _)| item)
}
