//! Workflow orchestration: phase sequencing, result envelopes, and the
//! destination pipeline engine

pub mod engine;
pub mod outcome;
pub mod phases;

pub use engine::{WorkflowConfig, WorkflowEngine};
pub use outcome::{unwrap_phase_result, PhaseOutcome};
pub use phases::{weighted_quality, WorkflowPhase, PHASE_WEIGHTS};
