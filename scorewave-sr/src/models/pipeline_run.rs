//! Pipeline run state machine
//!
//! A run progresses through the stages in a fixed order:
//! RECEIVED → VALIDATING → RECOGNIZING → ASSEMBLING → RENDERING_TIMELINE →
//! RENDERING_AUDIO → SUCCEEDED
//!
//! Any stage may transition directly to FAILED. Runs are never retried.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Failure category of a terminated run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    EmptyRequest,
    ValidationFailed,
    RecognitionFailed,
    IncompleteRecognition,
    AssemblyFailed,
    TimelineConversionFailed,
    SynthesisFailed,
    Timeout,
    /// Anything not covered by a dedicated kind
    Unexpected,
}

/// Pipeline run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    /// Request accepted, workspace not yet populated
    Received,
    /// Decode and resolution checks
    Validating,
    /// External optical music recognition
    Recognizing,
    /// Fragment parsing, well-formedness checks and merge
    Assembling,
    /// Notation → performance timeline
    RenderingTimeline,
    /// Performance timeline → waveform
    RenderingAudio,
    /// Waveform produced
    Succeeded,
    /// Run terminated with an error
    Failed(FailureKind),
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Succeeded | PipelineState::Failed(_))
    }
}

/// State transition event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub run_id: Uuid,
    pub old_state: PipelineState,
    pub new_state: PipelineState,
    pub transitioned_at: DateTime<Utc>,
}

/// One pipeline invocation (in-memory only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Unique run identifier, also used in log fields
    pub run_id: Uuid,

    /// Current state
    pub state: PipelineState,

    /// Number of pages submitted
    pub page_count: usize,

    /// Every transition taken, in order
    pub transitions: Vec<StateTransition>,

    pub started_at: DateTime<Utc>,

    /// Set once a terminal state is reached
    pub ended_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub fn new(page_count: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            state: PipelineState::Received,
            page_count,
            transitions: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to new state
    ///
    /// Transitions out of a terminal state are ignored.
    pub fn transition_to(&mut self, new_state: PipelineState) -> Option<&StateTransition> {
        if self.state.is_terminal() {
            tracing::warn!(
                run_id = %self.run_id,
                state = ?self.state,
                requested = ?new_state,
                "Ignoring transition out of terminal state"
            );
            return None;
        }

        let transition = StateTransition {
            run_id: self.run_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        tracing::debug!(
            run_id = %self.run_id,
            from = ?transition.old_state,
            to = ?new_state,
            "Pipeline state transition"
        );

        self.state = new_state;
        if new_state.is_terminal() {
            self.ended_at = Some(transition.transitioned_at);
        }
        self.transitions.push(transition);
        self.transitions.last()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// States visited so far, starting with RECEIVED
    pub fn history(&self) -> Vec<PipelineState> {
        let mut states = vec![PipelineState::Received];
        states.extend(self.transitions.iter().map(|t| t.new_state));
        states
    }

    pub fn elapsed_ms(&self) -> i64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds()
    }
}
