//! Pattern records and the aggregation functions that build them.
//!
//! Every function here is pure: it takes the entries of one kind that fall
//! inside the analysis window (any order) and the window length in hours,
//! and returns one record per group.  Groups below their minimum size are
//! dropped.
//!
//! | pattern                  | grouped by                 | min size |
//! |--------------------------|----------------------------|----------|
//! | [`ConsciousnessPattern`] | `consciousness_state`      | 3        |
//! | [`EmotionalPattern`]     | dominant emotion           | 2        |
//! | [`ReasoningPattern`]     | reasoning-depth bucket     | 2        |
//!
//! `frequency` is always occurrences per hour of the window, and `duration`
//! is the mean gap in seconds between consecutive occurrences.

use std::collections::{BTreeMap, BTreeSet};

use ark_memory::MemoryEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MIN_CONSCIOUSNESS_OCCURRENCES: usize = 3;
pub const MIN_EMOTION_OCCURRENCES: usize = 2;
pub const MIN_REASONING_OCCURRENCES: usize = 2;

/// How many triggers / consequences are kept per pattern.
const TOP_CAUSES: usize = 5;

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsciousnessPattern {
    pub pattern_type: String,
    pub frequency: f64,
    pub duration: f64,
    /// Mean attention level of the occurrences.
    pub intensity: f64,
    pub triggers: Vec<String>,
    pub consequences: Vec<String>,
    /// Mean intensity per emotion seen alongside this state.
    pub emotional_correlation: BTreeMap<String, f64>,
    pub reasoning_depth_avg: f64,
    pub attention_level_avg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalPattern {
    pub emotion: String,
    pub frequency: f64,
    pub duration: f64,
    /// Mean attention level of the occurrences.
    pub intensity: f64,
    pub triggers: Vec<String>,
    /// `"<from>-><to>"` → share of departures from this emotion.
    pub transitions: BTreeMap<String, f64>,
    /// Consciousness state → mean attention while this emotion dominated.
    pub consciousness_correlation: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningPattern {
    /// Depth bucket: `shallow`, `moderate`, `deep` or `profound`.
    pub reasoning_type: String,
    pub frequency: f64,
    pub success_rate: f64,
    pub depth_avg: f64,
    pub attention_required: f64,
    /// Mean intensity per emotion across these entries.
    pub emotional_impact: BTreeMap<String, f64>,
    pub consciousness_states: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregation
// ─────────────────────────────────────────────────────────────────────────────

/// Bucket label for a reasoning depth.
pub fn depth_bucket(depth: u32) -> &'static str {
    match depth {
        0..=2 => "shallow",
        3..=4 => "moderate",
        5..=6 => "deep",
        _ => "profound",
    }
}

const DEPTH_BUCKETS: [&str; 4] = ["shallow", "moderate", "deep", "profound"];

pub fn consciousness_patterns(entries: &[MemoryEntry], window_hours: u32) -> Vec<ConsciousnessPattern> {
    if window_hours == 0 {
        return Vec::new();
    }
    let mut groups: BTreeMap<&str, Vec<&MemoryEntry>> = BTreeMap::new();
    for entry in chronological(entries) {
        groups.entry(entry.consciousness_state.as_str()).or_default().push(entry);
    }

    groups
        .into_iter()
        .filter(|(_, group)| group.len() >= MIN_CONSCIOUSNESS_OCCURRENCES)
        .map(|(state, group)| {
            let attention = mean(group.iter().map(|e| e.attention_level));
            ConsciousnessPattern {
                pattern_type: state.to_string(),
                frequency: group.len() as f64 / f64::from(window_hours),
                duration: mean_gap_secs(group.iter().map(|e| e.timestamp)),
                intensity: attention,
                triggers: top_values(&group, &["trigger", "cause"]),
                consequences: top_values(&group, &["consequence", "result"]),
                emotional_correlation: emotion_means(&group),
                reasoning_depth_avg: mean(group.iter().map(|e| f64::from(e.reasoning_depth))),
                attention_level_avg: attention,
            }
        })
        .collect()
}

pub fn emotional_patterns(entries: &[MemoryEntry], window_hours: u32) -> Vec<EmotionalPattern> {
    if window_hours == 0 {
        return Vec::new();
    }
    let series: Vec<(&str, &MemoryEntry)> = chronological(entries)
        .into_iter()
        .filter_map(|e| e.dominant_emotion().map(|name| (name, e)))
        .collect();

    // Transitions are counted over the whole series, not within one group.
    let mut departures: BTreeMap<&str, BTreeMap<&str, usize>> = BTreeMap::new();
    for pair in series.windows(2) {
        let (from, to) = (pair[0].0, pair[1].0);
        if from != to {
            *departures.entry(from).or_default().entry(to).or_default() += 1;
        }
    }

    let mut groups: BTreeMap<&str, Vec<&MemoryEntry>> = BTreeMap::new();
    for &(name, entry) in &series {
        groups.entry(name).or_default().push(entry);
    }

    groups
        .into_iter()
        .filter(|(_, group)| group.len() >= MIN_EMOTION_OCCURRENCES)
        .map(|(emotion, group)| {
            let transitions: BTreeMap<String, f64> = departures
                .get(emotion)
                .map(|targets| {
                    let total: usize = targets.values().sum();
                    targets
                        .iter()
                        .map(|(to, n)| (format!("{emotion}->{to}"), *n as f64 / total as f64))
                        .collect()
                })
                .unwrap_or_default();

            let mut by_state: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
            for entry in &group {
                by_state
                    .entry(entry.consciousness_state.as_str())
                    .or_default()
                    .push(entry.attention_level);
            }

            EmotionalPattern {
                emotion: emotion.to_string(),
                frequency: group.len() as f64 / f64::from(window_hours),
                duration: mean_gap_secs(group.iter().map(|e| e.timestamp)),
                intensity: mean(group.iter().map(|e| e.attention_level)),
                triggers: top_values(&group, &["trigger", "cause"]),
                transitions,
                consciousness_correlation: by_state
                    .into_iter()
                    .map(|(state, levels)| (state.to_string(), mean(levels.into_iter())))
                    .collect(),
            }
        })
        .collect()
}

pub fn reasoning_patterns(entries: &[MemoryEntry], window_hours: u32) -> Vec<ReasoningPattern> {
    if window_hours == 0 {
        return Vec::new();
    }
    let mut groups: BTreeMap<&str, Vec<&MemoryEntry>> = BTreeMap::new();
    for entry in chronological(entries) {
        groups.entry(depth_bucket(entry.reasoning_depth)).or_default().push(entry);
    }

    DEPTH_BUCKETS
        .iter()
        .filter_map(|bucket| groups.remove(bucket).map(|group| (*bucket, group)))
        .filter(|(_, group)| group.len() >= MIN_REASONING_OCCURRENCES)
        .map(|(bucket, group)| ReasoningPattern {
            reasoning_type: bucket.to_string(),
            frequency: group.len() as f64 / f64::from(window_hours),
            success_rate: mean(
                group
                    .iter()
                    .map(|e| (e.attention_level + f64::from(e.reasoning_depth) / 10.0) / 2.0),
            ),
            depth_avg: mean(group.iter().map(|e| f64::from(e.reasoning_depth))),
            attention_required: mean(group.iter().map(|e| e.attention_level)),
            emotional_impact: emotion_means(&group),
            consciousness_states: group
                .iter()
                .map(|e| e.consciousness_state.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn chronological(entries: &[MemoryEntry]) -> Vec<&MemoryEntry> {
    let mut sorted: Vec<&MemoryEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
    sorted
}

/// Arithmetic mean; `0.0` for an empty input.
fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

/// Mean gap in seconds between consecutive (ascending) timestamps.
fn mean_gap_secs(timestamps: impl Iterator<Item = DateTime<Utc>>) -> f64 {
    let ts: Vec<DateTime<Utc>> = timestamps.collect();
    mean(ts.windows(2).map(|w| (w[1] - w[0]).num_microseconds().unwrap_or(i64::MAX) as f64 / 1e6))
}

fn emotion_means(group: &[&MemoryEntry]) -> BTreeMap<String, f64> {
    let mut acc: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for entry in group {
        for (name, intensity) in &entry.emotional_trace {
            acc.entry(name.as_str()).or_default().push(*intensity);
        }
    }
    acc.into_iter()
        .map(|(name, values)| (name.to_string(), mean(values.into_iter())))
        .collect()
}

/// Most common values of the first present `keys` field in each entry's
/// content, most frequent first; ties keep first-seen order.
fn top_values(group: &[&MemoryEntry], keys: &[&str]) -> Vec<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for entry in group {
        let Some(value) = keys.iter().find_map(|k| entry.content.get(*k)) else {
            continue;
        };
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        match counts.iter_mut().find(|(t, _)| *t == text) {
            Some((_, n)) => *n += 1,
            None => counts.push((text, 1)),
        }
    }
    // Stable sort keeps first-seen order among equal counts.
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(TOP_CAUSES).map(|(t, _)| t).collect()
}
