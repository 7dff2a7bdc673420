//! `ark-runtime` – The Cognitive Brain.
//!
//! Wires the memory engine, attention, dispatcher and observer around the
//! department consensus pipeline.
//!
//! # Modules
//!
//! - [`brain`] – [`CognitiveBrain`][brain::CognitiveBrain]: the single
//!   orchestrator that owns every subsystem.  One input is processed end to
//!   end (attention → consensus → memory write → follow-up scheduling)
//!   before the next one starts.
//! - [`consensus`] – [`ConsensusPipeline`][consensus::ConsensusPipeline]:
//!   runs the department roster sequentially and reconciles the chains into
//!   one [`Consensus`][consensus::Consensus].  Never fails.
//! - [`department`] – [`Department`][department::Department]: a
//!   role-configured agent producing one confidence-scored
//!   [`ReasoningChain`][department::ReasoningChain] per input.
//! - [`llm_driver`] – the [`TextGenerator`][llm_driver::TextGenerator] seam
//!   and its HTTP implementation [`OllamaDriver`][llm_driver::OllamaDriver]
//!   for a local [Ollama](https://ollama.com) server.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs
//!   the global `tracing` subscriber with an optional OTLP exporter.

pub mod brain;
pub mod consensus;
pub mod department;
pub mod llm_driver;
pub mod telemetry;

pub use brain::{BrainConfig, BrainError, BrainOutcome, BrainStatus, CognitiveBrain, EventOutcome, FollowUp};
pub use consensus::{Consensus, ConsensusPipeline, ConsensusSummary, DepartmentStatus};
pub use department::{Department, DepartmentConfig, DepartmentId, ReasoningChain, roster};
pub use llm_driver::{DriverConfig, DriverStats, LlmError, OllamaDriver, TextGenerator};
pub use telemetry::{TracerProviderGuard, init_tracing};
