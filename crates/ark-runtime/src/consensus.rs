//! [`ConsensusPipeline`] – sequential department run and reconciliation.
//!
//! Departments run strictly in roster order.  Each one sees the caller's
//! context plus `department_outputs`, a map of every earlier department's
//! output in this run.  The pipeline itself cannot fail: a run that
//! produced no chains still yields a [`Consensus`] with confidence `0.0`
//! and a synthetic conflict.
//!
//! Tool names in each [`DepartmentConfig`] are resolved into the
//! [`CapabilityRegistry`] when the pipeline is built; an unknown tool is a
//! construction error.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use ark_kernel::CapabilityRegistry;
use ark_types::{ArkError, Capability, Payload};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::department::{Department, DepartmentConfig, DepartmentId, ReasoningChain, reports_failure};
use crate::llm_driver::TextGenerator;

/// Context key under which earlier outputs are shared.
pub const DEPARTMENT_OUTPUTS_KEY: &str = "department_outputs";

const CONSENSUS_HISTORY_LIMIT: usize = 100;

// ─────────────────────────────────────────────────────────────────────────────
// Result types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consensus {
    /// Output of the last chain, or `"No decision"`.
    pub final_decision: String,
    pub department_votes: BTreeMap<DepartmentId, String>,
    pub reasoning_trace: Vec<ReasoningChain>,
    /// Mean chain confidence, clamped to `[0, 1]`.
    pub confidence_score: f64,
    /// Ids of departments whose output reported a failure.
    pub conflicts: Vec<String>,
    pub meta_analysis: String,
}

impl Consensus {
    pub fn from_trace(trace: Vec<ReasoningChain>) -> Self {
        let Some(last) = trace.last() else {
            return Self {
                final_decision: "No decision".to_string(),
                department_votes: BTreeMap::new(),
                reasoning_trace: Vec::new(),
                confidence_score: 0.0,
                conflicts: vec!["No department produced a reasoning step".to_string()],
                meta_analysis: String::new(),
            };
        };
        let final_decision = last.output.clone();
        let mean = trace.iter().map(|c| c.confidence).sum::<f64>() / trace.len() as f64;
        Self {
            meta_analysis: final_decision.clone(),
            final_decision,
            department_votes: trace.iter().map(|c| (c.department, c.output.clone())).collect(),
            confidence_score: mean.clamp(0.0, 1.0),
            conflicts: trace
                .iter()
                .filter(|c| reports_failure(&c.output))
                .map(|c| c.department.as_str().to_string())
                .collect(),
            reasoning_trace: trace,
        }
    }
}

/// Compact record kept in the pipeline's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusSummary {
    /// Timestamp of the first chain, if any ran.
    pub timestamp: Option<DateTime<Utc>>,
    pub final_decision: String,
    pub confidence: f64,
    pub conflicts: Vec<String>,
    pub departments_involved: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentStatus {
    pub id: DepartmentId,
    pub name: String,
    pub model: String,
    pub memory_size: usize,
    pub history_size: usize,
    pub tools: Vec<Capability>,
    /// Collaborator availability on the last call; `None` before any call.
    pub available: Option<bool>,
}

// ─────────────────────────────────────────────────────────────────────────────
// ConsensusPipeline
// ─────────────────────────────────────────────────────────────────────────────

pub struct ConsensusPipeline {
    departments: Vec<Department>,
    registry: CapabilityRegistry,
    history: VecDeque<ConsensusSummary>,
}

impl ConsensusPipeline {
    /// Build one department per config, in the given order.
    ///
    /// `generator_for` supplies each department's text generator.
    ///
    /// # Errors
    ///
    /// [`ArkError::UnknownCapability`] if any config names an unknown tool.
    pub fn from_roster<F>(configs: Vec<DepartmentConfig>, generator_for: F) -> Result<Self, ArkError>
    where
        F: Fn(&DepartmentConfig) -> Arc<dyn TextGenerator>,
    {
        let mut registry = CapabilityRegistry::new();
        let mut departments = Vec::with_capacity(configs.len());
        for config in configs {
            let tools = registry.grant_all(config.id.as_str(), config.tools.iter().map(String::as_str))?;
            let generator = generator_for(&config);
            departments.push(Department::new(config, tools, generator));
        }
        Ok(Self {
            departments,
            registry,
            history: VecDeque::new(),
        })
    }

    pub fn departments(&self) -> &[Department] {
        &self.departments
    }

    /// Least-privilege check before a department uses a tool.
    pub fn authorize(&self, department: DepartmentId, capability: Capability) -> Result<(), ArkError> {
        self.registry.check(department.as_str(), capability)
    }

    pub async fn run(&mut self, input: &str, context: &Payload) -> Consensus {
        let mut shared = context.clone();
        let mut outputs = serde_json::Map::new();
        let mut trace = Vec::with_capacity(self.departments.len());

        for department in &mut self.departments {
            if !outputs.is_empty() {
                shared.insert(DEPARTMENT_OUTPUTS_KEY.to_string(), Value::Object(outputs.clone()));
            }
            let chain = department.process(input, &shared).await;
            outputs.insert(chain.department.as_str().to_string(), Value::String(chain.output.clone()));
            trace.push(chain);
        }

        let consensus = Consensus::from_trace(trace);
        info!(
            confidence = consensus.confidence_score,
            conflicts = consensus.conflicts.len(),
            "consensus reached"
        );
        self.history.push_back(ConsensusSummary {
            timestamp: consensus.reasoning_trace.first().map(|c| c.timestamp),
            final_decision: consensus.final_decision.clone(),
            confidence: consensus.confidence_score,
            conflicts: consensus.conflicts.clone(),
            departments_involved: consensus.department_votes.len(),
        });
        while self.history.len() > CONSENSUS_HISTORY_LIMIT {
            self.history.pop_front();
        }
        consensus
    }

    pub fn department_status(&self) -> Vec<DepartmentStatus> {
        self.departments
            .iter()
            .map(|d| DepartmentStatus {
                id: d.id(),
                name: d.id().display_name().to_string(),
                model: d.config().model.clone(),
                memory_size: d.memory().count(),
                history_size: d.history().count(),
                tools: d.tools().to_vec(),
                available: d.last_available(),
            })
            .collect()
    }

    /// Summaries of past runs, oldest first.
    pub fn consensus_history(&self) -> impl Iterator<Item = &ConsensusSummary> {
        self.history.iter()
    }
}
