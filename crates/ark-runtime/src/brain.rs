//! [`CognitiveBrain`] – the orchestrator.
//!
//! Owns one of everything: the memory store (shared with the observer),
//! working memory, attention, dispatcher, consensus pipeline and meta
//! observer.  Each call handles one input end to end:
//!
//! 1. **Attend** – the input becomes an [`Event`] and passes through the
//!    [`AttentionScheduler`].
//! 2. **Deliberate** – the [`ConsensusPipeline`] runs every department.
//! 3. **Remember** – each chain is stored as a `reasoning` memory linked to
//!    the previous step; the consensus is stored as an `insight` linked to
//!    every step.
//! 4. **Follow up** – a consensus below
//!    [`BrainConfig::follow_up_threshold`] schedules a `review` task on the
//!    [`Dispatcher`], drained later by [`CognitiveBrain::run_follow_ups`].
//!
//! # Example
//!
//! ```rust,no_run
//! use ark_runtime::brain::{BrainConfig, CognitiveBrain};
//! use ark_types::Payload;
//!
//! # async fn demo() -> Result<(), ark_runtime::BrainError> {
//! let mut brain = CognitiveBrain::new(BrainConfig::default())?;
//! let outcome = brain.process_input("How should we cache results?", &Payload::new()).await?;
//! println!("{} ({:.2})", outcome.consensus.final_decision, outcome.consensus.confidence_score);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ark_kernel::{AttentionFocus, AttentionScheduler, Dispatcher, DispatcherStatus};
use ark_memory::{
    EmotionalTrace, MemoryEntry, MemoryKind, MemoryPriority, MemoryStore, NewMemory, StoreConfig, StoreError,
    StoreStats, WorkingMemory, WorkingMemoryStatus,
};
use ark_observer::{MetaObserver, MetaReport, ObserverConfig};
use ark_types::{ArkError, Event, EventKind, Payload};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{info, warn};

use crate::consensus::{Consensus, ConsensusPipeline, DepartmentStatus};
use crate::department::roster;
use crate::llm_driver::{DriverConfig, OllamaDriver, TextGenerator};

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum BrainError {
    #[error("Memory store error: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Ark(#[from] ArkError),
    /// A review could not be stored; `completed` holds the reviews that were.
    #[error("Review failed after {} completed: {source}", completed.len())]
    FollowUps {
        completed: Vec<FollowUp>,
        #[source]
        source: StoreError,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration bundle for [`CognitiveBrain`].
#[derive(Debug, Clone)]
pub struct BrainConfig {
    /// Base URL of the Ollama server.
    pub ollama_url: String,
    pub default_model: String,
    /// Model used by the Engineer department.
    pub coder_model: String,
    /// SQLite database path.  `None` keeps memories in RAM only.
    pub persistence_path: Option<String>,
    pub store: StoreConfig,
    pub observer: ObserverConfig,
    pub driver: DriverConfig,
    pub working_memory_capacity: usize,
    /// Consensus confidence below which a review is scheduled.
    pub follow_up_threshold: f64,
    /// Dispatcher priority of review tasks (lower = sooner).
    pub follow_up_priority: i32,
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            default_model: "llama3:8b".to_string(),
            coder_model: "deepseek-coder-v2:latest".to_string(),
            persistence_path: None,
            store: StoreConfig::default(),
            observer: ObserverConfig::default(),
            driver: DriverConfig::default(),
            working_memory_capacity: 100,
            follow_up_threshold: 0.7,
            follow_up_priority: 1,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outcomes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrainOutcome {
    pub consensus: Consensus,
    pub focus: AttentionFocus,
    /// Id of the scheduled review task, if confidence was low.
    pub follow_up: Option<String>,
    /// Reasoning memories in step order, then the insight.
    pub memory_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventOutcome {
    pub focus: AttentionFocus,
    pub memory_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUp {
    pub task_id: String,
    pub consensus: Consensus,
    pub memory_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrainStatus {
    pub focus: Option<AttentionFocus>,
    pub background_tasks: Vec<String>,
    pub working_memory: WorkingMemoryStatus,
    pub dispatcher: DispatcherStatus,
    pub departments: Vec<DepartmentStatus>,
    pub memory: StoreStats,
}

/// Caller-supplied affect stamped onto persisted memories.
#[derive(Debug, Clone, PartialEq)]
struct Affect {
    consciousness_state: String,
    emotional_trace: EmotionalTrace,
}

impl Default for Affect {
    fn default() -> Self {
        Self {
            consciousness_state: "normal".to_string(),
            emotional_trace: EmotionalTrace::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CognitiveBrain
// ─────────────────────────────────────────────────────────────────────────────

pub struct CognitiveBrain {
    config: BrainConfig,
    store: Arc<MemoryStore>,
    working: WorkingMemory,
    attention: AttentionScheduler,
    dispatcher: Dispatcher,
    pipeline: ConsensusPipeline,
    observer: MetaObserver,
    affect: Affect,
}

impl CognitiveBrain {
    /// Build the brain with one [`OllamaDriver`] per configured model.
    ///
    /// # Errors
    ///
    /// [`BrainError::Store`] if the memory database cannot be opened.
    pub fn new(config: BrainConfig) -> Result<Self, BrainError> {
        let default: Arc<dyn TextGenerator> = Arc::new(OllamaDriver::with_config(
            &config.ollama_url,
            &config.default_model,
            config.driver.clone(),
        ));
        let coder: Arc<dyn TextGenerator> = if config.coder_model == config.default_model {
            Arc::clone(&default)
        } else {
            Arc::new(OllamaDriver::with_config(
                &config.ollama_url,
                &config.coder_model,
                config.driver.clone(),
            ))
        };
        let coder_model = config.coder_model.clone();
        Self::assemble(config, move |dept| {
            if dept.model == coder_model {
                Arc::clone(&coder)
            } else {
                Arc::clone(&default)
            }
        })
    }

    /// Build the brain with every department sharing `generator`.
    pub fn with_generator(config: BrainConfig, generator: Arc<dyn TextGenerator>) -> Result<Self, BrainError> {
        Self::assemble(config, move |_| Arc::clone(&generator))
    }

    fn assemble<F>(config: BrainConfig, generator_for: F) -> Result<Self, BrainError>
    where
        F: Fn(&crate::department::DepartmentConfig) -> Arc<dyn TextGenerator>,
    {
        let store = match &config.persistence_path {
            Some(path) => {
                info!("opening persistent memory store at: {}", path);
                MemoryStore::open(path)?
            }
            None => {
                warn!("no persistence_path configured; using in-memory store (data will be lost)");
                MemoryStore::open_in_memory()?
            }
        };
        let store = Arc::new(store.with_config(config.store.clone()));
        let pipeline = ConsensusPipeline::from_roster(
            roster(&config.default_model, &config.coder_model),
            generator_for,
        )?;
        let observer = MetaObserver::new(Arc::clone(&store), config.observer.clone());

        Ok(Self {
            working: WorkingMemory::new(config.working_memory_capacity),
            attention: AttentionScheduler::new(),
            dispatcher: Dispatcher::new(),
            pipeline,
            observer,
            store,
            affect: Affect::default(),
            config,
        })
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub fn working_memory(&self) -> &WorkingMemory {
        &self.working
    }

    pub fn attention(&self) -> &AttentionScheduler {
        &self.attention
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn pipeline(&self) -> &ConsensusPipeline {
        &self.pipeline
    }

    pub fn observer(&self) -> &MetaObserver {
        &self.observer
    }

    // -------------------------------------------------------------------------
    // Input processing
    // -------------------------------------------------------------------------

    /// Run one user input through attention, consensus and memory.
    pub async fn process_input(&mut self, text: &str, context: &Payload) -> Result<BrainOutcome, BrainError> {
        let event = Event::user_input(text, "user").with_context(context.clone());
        self.attention.process(&event);
        self.working.store("user_request", json!(text));

        let consensus = self.pipeline.run(text, context).await;
        for chain in &consensus.reasoning_trace {
            self.attention
                .record_step(format!("{}: {:.2}", chain.department, chain.confidence));
        }
        let memory_ids = self.persist_consensus(&consensus, &[])?;
        self.working
            .store("reasoning_result", json!(consensus.final_decision));

        let follow_up = (consensus.confidence_score < self.config.follow_up_threshold).then(|| {
            let task_id = self.dispatcher.schedule(
                json!({
                    "type": "review",
                    "input": text,
                    "final_decision": consensus.final_decision,
                    "confidence": consensus.confidence_score,
                    "conflicts": consensus.conflicts,
                }),
                self.config.follow_up_priority,
            );
            info!(task_id = %task_id, confidence = consensus.confidence_score, "low confidence; review scheduled");
            task_id
        });

        let focus = self.current_focus(&event);
        Ok(BrainOutcome {
            consensus,
            focus,
            follow_up,
            memory_ids,
        })
    }

    /// Route a non-conversational event (hardware alert, system update, …).
    pub fn handle_event(&mut self, event: Event) -> Result<EventOutcome, BrainError> {
        let focus = self.attention.process(&event);
        let key = match event.kind() {
            EventKind::HardwareAlert => "hardware_status",
            EventKind::SystemUpdate => "system_update",
            other => other.as_str(),
        };
        self.working.store(key, Value::Object(event.payload().clone()));

        let (kind, priority) = match event.kind() {
            EventKind::HardwareAlert => (MemoryKind::Homeostasis, MemoryPriority::Critical),
            _ => (MemoryKind::Experience, MemoryPriority::Medium),
        };
        let new = NewMemory::new(
            kind,
            json!({
                "event_kind": event.kind().as_str(),
                "source": event.source(),
                "payload": event.payload(),
                "context": event.context(),
            }),
        )
        .priority(priority)
        .tags([event.kind().as_str(), event.source()]);
        let memory_id = self.store.insert(self.with_affect(new))?;
        info!(kind = event.kind().as_str(), memory_id, topic = %focus.topic, "event handled");

        Ok(EventOutcome { focus, memory_id })
    }

    /// Drain up to `limit` review tasks, re-running the pipeline on each.
    ///
    /// Reviews never schedule further follow-ups.  A task is completed only
    /// after its review is stored, and its result records the memory ids.  On
    /// a store failure the reviews finished so far come back inside
    /// [`BrainError::FollowUps`] and the failing task stays dispatched.
    pub async fn run_follow_ups(&mut self, limit: usize) -> Result<Vec<FollowUp>, BrainError> {
        let mut done = Vec::new();
        while done.len() < limit {
            let Some(task) = self.dispatcher.next() else { break };
            let input = task.payload.get("input").and_then(Value::as_str).unwrap_or_default();
            let review = format!("Review the previous low-confidence decision on: {input}");
            let mut context = Payload::new();
            context.insert("review_of".into(), task.payload.clone());

            let consensus = self.pipeline.run(&review, &context).await;
            let memory_ids = match self.persist_consensus(&consensus, &["review"]) {
                Ok(ids) => ids,
                Err(source) => {
                    warn!(task_id = %task.task_id, error = %source, "review could not be stored");
                    return Err(BrainError::FollowUps { completed: done, source });
                }
            };
            self.dispatcher.complete(
                &task.task_id,
                json!({
                    "final_decision": consensus.final_decision,
                    "confidence": consensus.confidence_score,
                    "memory_ids": memory_ids,
                }),
            );
            done.push(FollowUp {
                task_id: task.task_id,
                consensus,
                memory_ids,
            });
        }
        Ok(done)
    }

    // -------------------------------------------------------------------------
    // Affect, attention, reporting
    // -------------------------------------------------------------------------

    /// Set the affect copied onto every memory persisted from now on.
    pub fn set_affect(&mut self, consciousness_state: impl Into<String>, emotional_trace: EmotionalTrace) {
        self.affect = Affect {
            consciousness_state: consciousness_state.into(),
            emotional_trace: emotional_trace
                .into_iter()
                .map(|(name, v)| (name, v.clamp(0.0, 1.0)))
                .collect(),
        };
    }

    /// Retire the current focus, e.g. once a hardware alert is dealt with.
    pub fn release_attention(&mut self) -> Option<AttentionFocus> {
        self.attention.release()
    }

    pub fn report(&mut self) -> MetaReport {
        self.observer.report()
    }

    pub fn status(&self) -> Result<BrainStatus, BrainError> {
        Ok(BrainStatus {
            focus: self.attention.current().cloned(),
            background_tasks: self.attention.background().to_vec(),
            working_memory: self.working.status(),
            dispatcher: self.dispatcher.status(),
            departments: self.pipeline.department_status(),
            memory: self.store.stats()?,
        })
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    fn with_affect(&self, new: NewMemory) -> NewMemory {
        new.consciousness_state(self.affect.consciousness_state.as_str())
            .emotional_trace(self.affect.emotional_trace.clone())
    }

    fn current_focus(&self, event: &Event) -> AttentionFocus {
        self.attention.current().cloned().unwrap_or_else(|| AttentionFocus {
            topic: event.topic(),
            priority: event.priority(),
            reasoning_chain: Vec::new(),
            background_tasks: self.attention.background().to_vec(),
        })
    }

    fn persist_consensus(&self, consensus: &Consensus, extra_tags: &[&str]) -> Result<Vec<i64>, StoreError> {
        let mut ids = Vec::with_capacity(consensus.reasoning_trace.len() + 1);
        let mut nodes = Vec::with_capacity(consensus.reasoning_trace.len());

        for (step, chain) in consensus.reasoning_trace.iter().enumerate() {
            let mut tags = vec!["consensus", chain.department.as_str()];
            tags.extend_from_slice(extra_tags);
            let new = NewMemory::new(
                MemoryKind::Reasoning,
                json!({
                    "department": chain.department,
                    "input": chain.input,
                    "reasoning": chain.reasoning,
                    "output": chain.output,
                    "metadata": chain.metadata,
                }),
            )
            .attention_level(chain.confidence)
            .reasoning_depth(step as u32 + 1)
            .associations(nodes.last().cloned())
            .tags(tags);
            let id = self.store.insert(self.with_affect(new))?;
            nodes.push(MemoryEntry::node_id_for(MemoryKind::Reasoning, id));
            ids.push(id);
        }

        let mut tags = vec!["consensus", "decision"];
        tags.extend_from_slice(extra_tags);
        let priority = if consensus.conflicts.is_empty() {
            MemoryPriority::Medium
        } else {
            MemoryPriority::High
        };
        let insight = NewMemory::new(
            MemoryKind::Insight,
            json!({
                "final_decision": consensus.final_decision,
                "confidence_score": consensus.confidence_score,
                "conflicts": consensus.conflicts,
                "department_votes": consensus.department_votes,
            }),
        )
        .priority(priority)
        .attention_level(consensus.confidence_score)
        .associations(nodes)
        .tags(tags);
        ids.push(self.store.insert(self.with_affect(insight))?);
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::department::testing::Scripted;
    use ark_kernel::{CRITICAL_PRIORITY, TaskStatus};

    const CONFIDENT: &str = "A detailed and well reasoned answer that clearly exceeds fifty characters.";

    fn brain(generator: Scripted) -> CognitiveBrain {
        CognitiveBrain::with_generator(BrainConfig::default(), Arc::new(generator)).unwrap()
    }

    #[tokio::test]
    async fn confident_input_is_persisted_without_follow_up() {
        let mut brain = brain(Scripted::replying(&[CONFIDENT]));
        let outcome = brain.process_input("design a cache", &Payload::new()).await.unwrap();

        assert!((outcome.consensus.confidence_score - 0.8).abs() < 1e-9);
        assert!(outcome.follow_up.is_none());
        assert_eq!(outcome.memory_ids.len(), 7);
        assert_eq!(outcome.focus.topic, "user_input_user");
        assert_eq!(outcome.focus.reasoning_chain.len(), 7);
        assert_eq!(brain.dispatcher().status().queue_size, 0);

        let step_three = brain.store().get(outcome.memory_ids[2]).unwrap().unwrap();
        assert_eq!(step_three.kind, MemoryKind::Reasoning);
        assert_eq!(step_three.reasoning_depth, 3);
        assert_eq!(step_three.tags, vec!["consensus", "critic"]);
        assert_eq!(
            step_three.associations,
            vec![MemoryEntry::node_id_for(MemoryKind::Reasoning, outcome.memory_ids[1])]
        );

        let insight = brain.store().get(outcome.memory_ids[6]).unwrap().unwrap();
        assert_eq!(insight.kind, MemoryKind::Insight);
        assert_eq!(insight.associations.len(), 6);
        assert_eq!(insight.content["final_decision"], json!(outcome.consensus.final_decision));
    }

    #[tokio::test]
    async fn working_memory_tracks_request_and_result() {
        let mut brain = brain(Scripted::replying(&["short"]));
        let outcome = brain.process_input("hello", &Payload::new()).await.unwrap();
        let wm = brain.working_memory();
        assert_eq!(wm.item("user_request").unwrap().value, json!("hello"));
        assert_eq!(
            wm.item("reasoning_result").unwrap().value,
            json!(outcome.consensus.final_decision)
        );
    }

    #[tokio::test]
    async fn low_confidence_schedules_review_which_does_not_recurse() {
        let mut brain = brain(Scripted::replying(&["meh"]));
        let outcome = brain.process_input("tricky question", &Payload::new()).await.unwrap();
        assert_eq!(outcome.consensus.confidence_score, 0.5);
        let task_id = outcome.follow_up.expect("review scheduled");
        let record = brain.dispatcher().record(&task_id).unwrap();
        assert_eq!(record.priority, 1);

        let reviews = brain.run_follow_ups(10).await.unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].task_id, task_id);
        assert_eq!(reviews[0].consensus.reasoning_trace[0].input, "Review the previous low-confidence decision on: tricky question");
        assert_eq!(
            brain.dispatcher().status(),
            DispatcherStatus {
                queue_size: 0,
                active_count: 0,
                completed_count: 1
            }
        );

        let review_memory = brain.store().get(reviews[0].memory_ids[0]).unwrap().unwrap();
        assert!(review_memory.tags.contains(&"review".to_string()));
        assert!(brain.run_follow_ups(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn completed_review_records_its_memory_ids() {
        let mut brain = brain(Scripted::replying(&["meh"]));
        let task_id = brain
            .process_input("tricky question", &Payload::new())
            .await
            .unwrap()
            .follow_up
            .unwrap();

        let reviews = brain.run_follow_ups(1).await.unwrap();
        let record = brain.dispatcher().record(&task_id).unwrap();
        assert_eq!(record.status, TaskStatus::Completed);
        let result = record.result.unwrap();
        assert_eq!(result["memory_ids"], json!(reviews[0].memory_ids));
        assert_eq!(result["final_decision"], json!(reviews[0].consensus.final_decision));
    }

    #[tokio::test]
    async fn unstored_review_leaves_its_task_dispatched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ark.db").to_string_lossy().into_owned();
        let config = BrainConfig {
            persistence_path: Some(path.clone()),
            ..BrainConfig::default()
        };
        let mut brain = CognitiveBrain::with_generator(config, Arc::new(Scripted::replying(&["meh"]))).unwrap();
        let mut tasks = Vec::new();
        for q in ["first", "second"] {
            tasks.push(brain.process_input(q, &Payload::new()).await.unwrap().follow_up.unwrap());
        }
        assert_eq!(brain.run_follow_ups(1).await.unwrap().len(), 1);

        let outside = rusqlite::Connection::open(&path).unwrap();
        outside
            .execute_batch(
                "CREATE TRIGGER deny_insert BEFORE INSERT ON memory_entries \
                 BEGIN SELECT RAISE(ABORT, 'read-only'); END;",
            )
            .unwrap();

        match brain.run_follow_ups(10).await {
            Err(BrainError::FollowUps { completed, .. }) => assert!(completed.is_empty()),
            other => panic!("expected a follow-up store failure, got {other:?}"),
        }
        assert_eq!(brain.dispatcher().record(&tasks[0]).unwrap().status, TaskStatus::Completed);
        let pending = brain.dispatcher().record(&tasks[1]).unwrap();
        assert_eq!(pending.status, TaskStatus::Dispatched);
        assert!(pending.result.is_none());
    }

    #[tokio::test]
    async fn run_follow_ups_respects_limit() {
        let mut brain = brain(Scripted::replying(&["meh"]));
        for q in ["a", "b", "c"] {
            brain.process_input(q, &Payload::new()).await.unwrap();
        }
        assert_eq!(brain.run_follow_ups(2).await.unwrap().len(), 2);
        assert_eq!(brain.dispatcher().status().queue_size, 1);
    }

    #[tokio::test]
    async fn hardware_alert_preempts_and_is_stored_as_critical_homeostasis() {
        let mut brain = brain(Scripted::replying(&[CONFIDENT]));
        brain.process_input("routine work", &Payload::new()).await.unwrap();

        let mut payload = Payload::new();
        payload.insert("cpu_temp".into(), json!(96.5));
        let outcome = brain.handle_event(Event::hardware_alert(payload)).unwrap();
        assert_eq!(outcome.focus.topic, "CRITICAL_hardware_alert");
        assert_eq!(outcome.focus.priority, CRITICAL_PRIORITY);
        assert_eq!(outcome.focus.background_tasks, vec!["user_input_user"]);

        let entry = brain.store().get(outcome.memory_id).unwrap().unwrap();
        assert_eq!(entry.kind, MemoryKind::Homeostasis);
        assert_eq!(entry.priority, MemoryPriority::Critical);
        assert_eq!(entry.content["payload"]["cpu_temp"], json!(96.5));
        assert_eq!(
            brain.working_memory().item("hardware_status").unwrap().value["cpu_temp"],
            json!(96.5)
        );

        // Ordinary input cannot take focus until the alert is released.
        let next = brain.process_input("more work", &Payload::new()).await.unwrap();
        assert_eq!(next.focus.topic, "CRITICAL_hardware_alert");
        brain.release_attention();
        let after = brain.process_input("more work", &Payload::new()).await.unwrap();
        assert_eq!(after.focus.topic, "user_input_user");
    }

    #[tokio::test]
    async fn system_update_is_an_experience() {
        let mut brain = brain(Scripted::replying(&["ok"]));
        let outcome = brain.handle_event(Event::system_update(Payload::new())).unwrap();
        let entry = brain.store().get(outcome.memory_id).unwrap().unwrap();
        assert_eq!(entry.kind, MemoryKind::Experience);
        assert_eq!(entry.tags, vec!["system_update", "system"]);
        assert!(brain.working_memory().item("system_update").is_some());
    }

    #[tokio::test]
    async fn affect_is_stamped_on_memories_and_feeds_the_report() {
        let mut brain = brain(Scripted::replying(&["ok"]));
        let mut trace = EmotionalTrace::new();
        trace.insert("anxiety".into(), 1.7);
        brain.set_affect("stressed", trace);
        let outcome = brain.process_input("deadline", &Payload::new()).await.unwrap();

        let entry = brain.store().get(outcome.memory_ids[0]).unwrap().unwrap();
        assert_eq!(entry.consciousness_state, "stressed");
        assert_eq!(entry.emotional_trace["anxiety"], 1.0);

        let report = brain.report();
        let stressed = report
            .consciousness_patterns
            .iter()
            .find(|p| p.pattern_type == "stressed")
            .unwrap();
        // Only the six reasoning steps; the insight is not a reasoning memory.
        assert_eq!(stressed.frequency, 6.0 / 24.0);
    }

    #[tokio::test]
    async fn status_summarises_every_subsystem() {
        let mut brain = brain(Scripted::offline());
        brain.process_input("ping", &Payload::new()).await.unwrap();
        let status = brain.status().unwrap();
        assert_eq!(status.focus.unwrap().topic, "user_input_user");
        assert_eq!(status.departments.len(), 6);
        assert!(status.departments.iter().all(|d| d.available == Some(false)));
        assert_eq!(status.memory.total_memories, 7);
        assert_eq!(status.working_memory.total_items, 2);
    }

    #[test]
    fn persistent_store_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ark.db").to_string_lossy().into_owned();
        let config = BrainConfig {
            persistence_path: Some(path),
            ..BrainConfig::default()
        };
        {
            let mut brain = CognitiveBrain::with_generator(config.clone(), Arc::new(Scripted::replying(&["x"]))).unwrap();
            brain.handle_event(Event::system_update(Payload::new())).unwrap();
        }
        let brain = CognitiveBrain::with_generator(config, Arc::new(Scripted::replying(&["x"]))).unwrap();
        assert_eq!(brain.store().stats().unwrap().total_memories, 1);
    }
}
