//! [`Department`] – one role-configured reasoning agent.
//!
//! A department turns `(input, context)` into exactly one
//! [`ReasoningChain`].  It never returns an error: collaborator failures
//! become an error-labelled chain with confidence `0.0`, and an unavailable
//! collaborator yields a degraded canned output.
//!
//! # Confidence heuristic
//!
//! | output                                   | confidence |
//! |------------------------------------------|------------|
//! | contains `error` or `failed` (any case)  | 0.3        |
//! | longer than 50 characters                | 0.8        |
//! | otherwise                                | 0.5        |

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use ark_types::{Capability, Payload};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::llm_driver::TextGenerator;

const LOW_CONFIDENCE: f64 = 0.3;
const MEDIUM_CONFIDENCE: f64 = 0.5;
const HIGH_CONFIDENCE: f64 = 0.8;
const LONG_OUTPUT_CHARS: usize = 50;
const DEGRADED_PREVIEW_CHARS: usize = 100;

/// `true` when `text` carries a failure marker.
pub fn reports_failure(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("error") || lower.contains("failed")
}

pub fn confidence_for(output: &str) -> f64 {
    if reports_failure(output) {
        LOW_CONFIDENCE
    } else if output.chars().count() > LONG_OUTPUT_CHARS {
        HIGH_CONFIDENCE
    } else {
        MEDIUM_CONFIDENCE
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Identity and configuration
// ─────────────────────────────────────────────────────────────────────────────

/// The fixed roster, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepartmentId {
    Architect,
    Engineer,
    Critic,
    MemoryKeeper,
    Documentor,
    MetaObserver,
}

impl DepartmentId {
    pub const ALL: [DepartmentId; 6] = [
        DepartmentId::Architect,
        DepartmentId::Engineer,
        DepartmentId::Critic,
        DepartmentId::MemoryKeeper,
        DepartmentId::Documentor,
        DepartmentId::MetaObserver,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DepartmentId::Architect => "architect",
            DepartmentId::Engineer => "engineer",
            DepartmentId::Critic => "critic",
            DepartmentId::MemoryKeeper => "memory_keeper",
            DepartmentId::Documentor => "documentor",
            DepartmentId::MetaObserver => "meta_observer",
        }
    }

    /// Human-readable name used to label outputs.
    pub fn display_name(&self) -> &'static str {
        match self {
            DepartmentId::Architect => "Architect Department",
            DepartmentId::Engineer => "Engineer Department",
            DepartmentId::Critic => "Critic Department",
            DepartmentId::MemoryKeeper => "Memory Keeper Department",
            DepartmentId::Documentor => "Documentor Department",
            DepartmentId::MetaObserver => "Meta Observer Department",
        }
    }
}

impl fmt::Display for DepartmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentConfig {
    pub id: DepartmentId,
    pub description: String,
    pub style: String,
    pub tone: String,
    /// Tool names, resolved against [`Capability`] when the pipeline is built.
    pub tools: Vec<String>,
    pub model: String,
    pub system_prompt: String,
    /// Bound on both the private memory and the reasoning history.
    pub memory_size: usize,
}

fn system_prompt(id: DepartmentId, duties: &[&str]) -> String {
    let mut prompt = format!("You are the {} of ARK's brain. Your role is to:", id.display_name());
    for duty in duties {
        prompt.push_str("\n- ");
        prompt.push_str(duty);
    }
    prompt
}

/// The standard six-department roster.  The Engineer runs on `coder_model`;
/// everyone else on `default_model`.
pub fn roster(default_model: &str, coder_model: &str) -> Vec<DepartmentConfig> {
    let dept = |id: DepartmentId, description: &str, style: &str, tone: &str, tools: &[&str], model: &str, duties: &[&str]| {
        DepartmentConfig {
            id,
            description: description.to_string(),
            style: style.to_string(),
            tone: tone.to_string(),
            tools: tools.iter().map(|t| t.to_string()).collect(),
            model: model.to_string(),
            system_prompt: system_prompt(id, duties),
            memory_size: 1000,
        }
    };
    vec![
        dept(
            DepartmentId::Architect,
            "High-level design and integration, strategic planning",
            "strategic",
            "contemplative",
            &["analyze_performance", "plan_evolution"],
            default_model,
            &[
                "Design the overall approach to the task",
                "Integrate the work of the other departments",
                "Plan long-term evolution of the system",
            ],
        ),
        dept(
            DepartmentId::Engineer,
            "Code generation, implementation, technical solutions",
            "practical",
            "focused",
            &["review_code_changes", "validate_syntax"],
            coder_model,
            &[
                "Turn the design into concrete technical steps",
                "Write and review code",
                "Keep solutions simple and correct",
            ],
        ),
        dept(
            DepartmentId::Critic,
            "Review, validation, testing, quality assurance",
            "critical",
            "skeptical",
            &["check_security", "identify_bottlenecks"],
            default_model,
            &[
                "Find weaknesses, risks and missing tests",
                "Check security and performance",
                "Challenge unsupported assumptions",
            ],
        ),
        dept(
            DepartmentId::MemoryKeeper,
            "Memory management, traceability, historical context",
            "retrospective",
            "reflective",
            &["get_system_state_summary"],
            default_model,
            &[
                "Relate the task to past decisions",
                "Keep reasoning traceable",
                "Point out relevant history",
            ],
        ),
        dept(
            DepartmentId::Documentor,
            "Documentation, explainability, communication",
            "explanatory",
            "helpful",
            &["get_system_state_summary"],
            default_model,
            &[
                "Explain the decision in plain language",
                "Record what was done and why",
            ],
        ),
        dept(
            DepartmentId::MetaObserver,
            "Self-reflection, conflict resolution, meta-analysis",
            "meta-analytical",
            "balanced",
            &["get_system_state_summary"],
            default_model,
            &[
                "Reconcile the other departments' outputs",
                "Resolve conflicts between them",
                "State the final decision",
            ],
        ),
    ]
}

// ─────────────────────────────────────────────────────────────────────────────
// Reasoning chain
// ─────────────────────────────────────────────────────────────────────────────

/// One department's answer to one input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningChain {
    pub timestamp: DateTime<Utc>,
    pub department: DepartmentId,
    pub input: String,
    pub reasoning: String,
    pub output: String,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub metadata: Payload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentMemory {
    pub timestamp: DateTime<Utc>,
    pub input: String,
    pub output: String,
    pub context: Payload,
}

// ─────────────────────────────────────────────────────────────────────────────
// Department
// ─────────────────────────────────────────────────────────────────────────────

pub struct Department {
    config: DepartmentConfig,
    tools: Vec<Capability>,
    generator: Arc<dyn TextGenerator>,
    memory: VecDeque<DepartmentMemory>,
    history: VecDeque<ReasoningChain>,
    last_available: Option<bool>,
}

impl Department {
    /// `tools` must already be resolved; see
    /// [`ConsensusPipeline::from_roster`][crate::consensus::ConsensusPipeline::from_roster].
    pub fn new(config: DepartmentConfig, tools: Vec<Capability>, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            config,
            tools,
            generator,
            memory: VecDeque::new(),
            history: VecDeque::new(),
            last_available: None,
        }
    }

    pub fn id(&self) -> DepartmentId {
        self.config.id
    }

    pub fn config(&self) -> &DepartmentConfig {
        &self.config
    }

    pub fn tools(&self) -> &[Capability] {
        &self.tools
    }

    pub fn memory(&self) -> impl Iterator<Item = &DepartmentMemory> {
        self.memory.iter()
    }

    pub fn history(&self) -> impl Iterator<Item = &ReasoningChain> {
        self.history.iter()
    }

    /// Collaborator availability observed on the last call, if any.
    pub fn last_available(&self) -> Option<bool> {
        self.last_available
    }

    pub async fn process(&mut self, input: &str, context: &Payload) -> ReasoningChain {
        let name = self.config.id.display_name();
        let prompt = match self.enhance(input, context) {
            Ok(prompt) => prompt,
            Err(e) => return self.error_chain(input, &e),
        };

        let available = self.generator.is_available().await;
        self.last_available = Some(available);

        let (output, degraded) = if available {
            match self
                .generator
                .generate(&prompt, Some(self.config.system_prompt.as_str()))
                .await
            {
                Ok(text) => (format!("[{name}] {}", text.trim()), false),
                Err(e) => return self.error_chain(input, &e),
            }
        } else {
            warn!(department = %self.config.id, "text generator unavailable; using degraded output");
            let preview: String = prompt.chars().take(DEGRADED_PREVIEW_CHARS).collect();
            (format!("[{name}] Processed: {preview}..."), true)
        };

        let mut metadata = Payload::new();
        metadata.insert("department".into(), json!(name));
        metadata.insert("model".into(), json!(self.generator.model()));
        metadata.insert(
            "tools_used".into(),
            Value::from(self.tools.iter().map(|t| t.as_str()).collect::<Vec<_>>()),
        );
        metadata.insert("degraded".into(), Value::Bool(degraded));

        let chain = ReasoningChain {
            timestamp: Utc::now(),
            department: self.config.id,
            input: input.to_string(),
            reasoning: format!("Processed by {name} with {} style", self.config.style),
            confidence: confidence_for(&output),
            output,
            metadata,
        };
        debug!(department = %self.config.id, confidence = chain.confidence, "department step complete");
        self.remember(&chain, context);
        chain
    }

    fn enhance(&self, input: &str, context: &Payload) -> Result<String, serde_json::Error> {
        let mut prompt = format!(
            "Role: {}\nStyle: {}\nTone: {}\n",
            self.config.description, self.config.style, self.config.tone
        );
        if !context.is_empty() {
            prompt.push_str(&format!("Context: {}\n", serde_json::to_string_pretty(context)?));
        }
        prompt.push_str("Task: ");
        prompt.push_str(input);
        Ok(prompt)
    }

    /// Failures are reported, never recorded in memory or history.
    fn error_chain(&self, input: &str, error: &dyn fmt::Display) -> ReasoningChain {
        let name = self.config.id.display_name();
        warn!(department = %self.config.id, error = %error, "department processing failed");
        let mut metadata = Payload::new();
        metadata.insert("error".into(), json!(error.to_string()));
        ReasoningChain {
            timestamp: Utc::now(),
            department: self.config.id,
            input: input.to_string(),
            reasoning: format!("Error in {name}: {error}"),
            output: "Error occurred during processing".to_string(),
            confidence: 0.0,
            metadata,
        }
    }

    fn remember(&mut self, chain: &ReasoningChain, context: &Payload) {
        let bound = self.config.memory_size;
        self.memory.push_back(DepartmentMemory {
            timestamp: chain.timestamp,
            input: chain.input.clone(),
            output: chain.output.clone(),
            context: context.clone(),
        });
        self.history.push_back(chain.clone());
        while self.memory.len() > bound {
            self.memory.pop_front();
        }
        while self.history.len() > bound {
            self.history.pop_front();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test doubles
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::llm_driver::{LlmError, TextGenerator};

    /// Scripted generator: answers from `replies` in order, repeating the
    /// last one; records every prompt it was given.
    pub struct Scripted {
        pub available: bool,
        pub replies: Mutex<Vec<Result<String, String>>>,
        pub prompts: Mutex<Vec<(String, Option<String>)>>,
    }

    impl Scripted {
        pub fn replying(replies: &[&str]) -> Self {
            Self {
                available: true,
                replies: Mutex::new(replies.iter().map(|r| Ok(r.to_string())).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                available: true,
                replies: Mutex::new(vec![Err(message.to_string())]),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn offline() -> Self {
            Self {
                available: false,
                ..Self::replying(&[])
            }
        }

        pub fn prompts(&self) -> Vec<(String, Option<String>)> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String, LlmError> {
            self.prompts
                .lock()
                .unwrap()
                .push((prompt.to_string(), system.map(str::to_string)));
            let mut replies = self.replies.lock().unwrap();
            let reply = if replies.len() > 1 {
                replies.remove(0)
            } else {
                replies.first().cloned().unwrap_or_else(|| Ok(String::new()))
            };
            reply.map_err(LlmError::BadResponse)
        }

        async fn is_available(&self) -> bool {
            self.available
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }
}
