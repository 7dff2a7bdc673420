//! `ark-memory` – The Associative Memory Engine.
//!
//! Records every reasoning step durably, links it into an in-memory
//! knowledge graph, and keeps two cache tiers in front of SQLite.
//!
//! # Modules
//!
//! - [`entry`] – [`MemoryEntry`][entry::MemoryEntry] and its enum-like
//!   fields ([`MemoryKind`][entry::MemoryKind],
//!   [`MemoryPriority`][entry::MemoryPriority]), plus the
//!   [`NewMemory`][entry::NewMemory] builder used for inserts.
//! - [`graph`] – [`KnowledgeGraph`][graph::KnowledgeGraph]: an explicit
//!   undirected adjacency list supporting bounded-depth association queries
//!   and neighbour-count pattern discovery.
//! - [`store`] – [`MemoryStore`][store::MemoryStore]: the SQLite-backed
//!   store.  A single insert commits the row, the graph node and the
//!   short-term cache as one unit.
//! - [`working`] – [`WorkingMemory`][working::WorkingMemory]: the small
//!   bounded scratchpad the orchestrator uses between steps.

pub mod entry;
pub mod graph;
pub mod store;
pub mod working;

pub use entry::{EmotionalTrace, MemoryEntry, MemoryKind, MemoryPriority, NewMemory};
pub use graph::{Association, GraphError, GraphPattern, KnowledgeGraph};
pub use store::{MemoryStore, StoreConfig, StoreError, StoreStats};
pub use working::{WorkingMemory, WorkingMemoryItem, WorkingMemoryStatus};
