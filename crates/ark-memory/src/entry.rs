//! Memory entry types.
//!
//! [`MemoryEntry`] is the durable record.  It is only ever created by
//! [`MemoryStore::insert`][crate::store::MemoryStore::insert], which assigns
//! the id and timestamp; callers describe what to store with a
//! [`NewMemory`] builder.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Emotion name → intensity in `[0, 1]`.
pub type EmotionalTrace = BTreeMap<String, f64>;

// ─────────────────────────────────────────────────────────────────────────────
// MemoryKind
// ─────────────────────────────────────────────────────────────────────────────

/// Category of a memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Reasoning,
    Emotion,
    SelfPatch,
    Homeostasis,
    Insight,
    Pattern,
    Goal,
    Experience,
}

impl MemoryKind {
    /// Every kind, in declaration order.
    pub const ALL: [MemoryKind; 8] = [
        MemoryKind::Reasoning,
        MemoryKind::Emotion,
        MemoryKind::SelfPatch,
        MemoryKind::Homeostasis,
        MemoryKind::Insight,
        MemoryKind::Pattern,
        MemoryKind::Goal,
        MemoryKind::Experience,
    ];

    /// Return the string representation used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryKind::Reasoning => "reasoning",
            MemoryKind::Emotion => "emotion",
            MemoryKind::SelfPatch => "self_patch",
            MemoryKind::Homeostasis => "homeostasis",
            MemoryKind::Insight => "insight",
            MemoryKind::Pattern => "pattern",
            MemoryKind::Goal => "goal",
            MemoryKind::Experience => "experience",
        }
    }

    /// Parse a database string into a [`MemoryKind`].
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        MemoryKind::ALL.iter().copied().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MemoryPriority
// ─────────────────────────────────────────────────────────────────────────────

/// Retention priority; stored as an integer (`critical = 5` … `minimal = 1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryPriority {
    Minimal = 1,
    Low = 2,
    Medium = 3,
    High = 4,
    Critical = 5,
}

impl MemoryPriority {
    pub fn as_i64(&self) -> i64 {
        *self as i64
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(MemoryPriority::Minimal),
            2 => Some(MemoryPriority::Low),
            3 => Some(MemoryPriority::Medium),
            4 => Some(MemoryPriority::High),
            5 => Some(MemoryPriority::Critical),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MemoryEntry
// ─────────────────────────────────────────────────────────────────────────────

/// A single stored memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Monotonic id assigned on insert.
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub kind: MemoryKind,
    /// Structured payload.
    pub content: Value,
    pub priority: MemoryPriority,
    /// Graph node ids of related entries (see [`MemoryEntry::node_id`]).
    pub associations: Vec<String>,
    pub emotional_trace: EmotionalTrace,
    pub consciousness_state: String,
    /// In `[0, 1]`.
    pub attention_level: f64,
    pub reasoning_depth: u32,
    pub tags: Vec<String>,
    pub access_count: u64,
    pub last_accessed: DateTime<Utc>,
    /// Reserved for a future aging policy; not enforced.
    pub decay_rate: f64,
}

impl MemoryEntry {
    /// Graph node id for an entry of `kind` with `id`: `<kind>_<id>`.
    pub fn node_id_for(kind: MemoryKind, id: i64) -> String {
        format!("{}_{}", kind.as_str(), id)
    }

    /// This entry's knowledge-graph node id.
    pub fn node_id(&self) -> String {
        Self::node_id_for(self.kind, self.id)
    }

    /// The emotion with the highest intensity, if any.
    ///
    /// Ties resolve to the alphabetically first emotion.
    pub fn dominant_emotion(&self) -> Option<&str> {
        let mut best: Option<(&str, f64)> = None;
        for (name, &intensity) in &self.emotional_trace {
            match best {
                Some((_, top)) if intensity <= top => {}
                _ => best = Some((name.as_str(), intensity)),
            }
        }
        best.map(|(name, _)| name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// NewMemory builder
// ─────────────────────────────────────────────────────────────────────────────

/// Description of an entry to insert.
///
/// # Example
///
/// ```
/// use ark_memory::{MemoryKind, MemoryPriority, NewMemory};
/// use serde_json::json;
///
/// let new = NewMemory::new(MemoryKind::Reasoning, json!({ "thought": "check sensors" }))
///     .priority(MemoryPriority::High)
///     .emotion("curiosity", 0.6)
///     .tags(["planning"]);
/// assert_eq!(new.tags, vec!["planning".to_string()]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct NewMemory {
    pub kind: MemoryKind,
    pub content: Value,
    pub priority: MemoryPriority,
    pub associations: Vec<String>,
    pub emotional_trace: EmotionalTrace,
    pub consciousness_state: String,
    pub attention_level: f64,
    pub reasoning_depth: u32,
    pub tags: Vec<String>,
    pub decay_rate: f64,
}

impl NewMemory {
    pub fn new(kind: MemoryKind, content: Value) -> Self {
        Self {
            kind,
            content,
            priority: MemoryPriority::Medium,
            associations: Vec::new(),
            emotional_trace: EmotionalTrace::new(),
            consciousness_state: "normal".to_string(),
            attention_level: 0.5,
            reasoning_depth: 1,
            tags: Vec::new(),
            decay_rate: 0.1,
        }
    }

    pub fn priority(mut self, priority: MemoryPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn associations<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.associations = nodes.into_iter().map(Into::into).collect();
        self
    }

    /// Record one emotion; intensity is clamped to `[0, 1]`.
    pub fn emotion(mut self, name: impl Into<String>, intensity: f64) -> Self {
        self.emotional_trace.insert(name.into(), intensity.clamp(0.0, 1.0));
        self
    }

    /// Replace the whole emotional trace; intensities are clamped to `[0, 1]`.
    pub fn emotional_trace(mut self, trace: EmotionalTrace) -> Self {
        self.emotional_trace = trace
            .into_iter()
            .map(|(name, v)| (name, v.clamp(0.0, 1.0)))
            .collect();
        self
    }

    pub fn consciousness_state(mut self, state: impl Into<String>) -> Self {
        self.consciousness_state = state.into();
        self
    }

    /// Clamped to `[0, 1]`.
    pub fn attention_level(mut self, level: f64) -> Self {
        self.attention_level = level.clamp(0.0, 1.0);
        self
    }

    pub fn reasoning_depth(mut self, depth: u32) -> Self {
        self.reasoning_depth = depth;
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn decay_rate(mut self, rate: f64) -> Self {
        self.decay_rate = rate;
        self
    }
}
