//! `ark-observer` – The Meta Observer.
//!
//! Periodically mines the memory store for behavioural patterns and raises
//! rule-based alerts.  Patterns are always recomputed from a time-windowed
//! query; nothing here is authoritative state.
//!
//! # Modules
//!
//! - [`patterns`] – pattern record types and the pure aggregation functions
//!   that build them from a slice of [`MemoryEntry`][ark_memory::MemoryEntry].
//! - [`analyzer`] – [`MetaObserver`][analyzer::MetaObserver]: reads the
//!   store, applies alert thresholds, and caches one report per analysis
//!   interval with a bounded history.

pub mod analyzer;
pub mod patterns;

pub use analyzer::{CriticalEvent, CriticalEventKind, MetaObserver, MetaReport, ObserverConfig, Severity};
pub use patterns::{ConsciousnessPattern, EmotionalPattern, ReasoningPattern};
