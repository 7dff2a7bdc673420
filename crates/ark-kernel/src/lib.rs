//! `ark-kernel` – Arbitration & Scheduling
//!
//! The brainstem of the cognitive core.  It does not reason; it decides what
//! gets reasoned about, in which order, and with which tools.
//!
//! # Modules
//!
//! - [`attention`] – [`AttentionScheduler`][attention::AttentionScheduler]:
//!   keeps a single current focus plus a background set and arbitrates
//!   incoming events by priority.  Hardware alerts always pre-empt.
//! - [`dispatcher`] – [`Dispatcher`][dispatcher::Dispatcher]: a thread-safe
//!   priority queue of reasoning tasks with FIFO ordering inside a priority
//!   band and active/completed bookkeeping.
//! - [`capability_registry`] – [`CapabilityRegistry`][capability_registry::CapabilityRegistry]:
//!   resolves department tool names to [`Capability`][ark_types::Capability]
//!   values at construction time and enforces least privilege afterwards.

pub mod attention;
pub mod capability_registry;
pub mod dispatcher;

pub use attention::{AttentionFocus, AttentionScheduler, CRITICAL_PRIORITY};
pub use capability_registry::CapabilityRegistry;
pub use dispatcher::{Dispatcher, DispatcherStatus, ReasoningTask, TaskRecord, TaskStatus};
