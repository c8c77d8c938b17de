//! AI content generation: context, prompts, merging and the step loop.

pub mod merge;
pub mod orchestrator;
pub mod prompt;
pub mod step;

pub use merge::{merge_contribution, MergeOutcome};
pub use orchestrator::{GenerationError, Orchestrator, ProgressEvent, RunSummary};
pub use prompt::{build_context, build_prompt, GenerationContext};
pub use step::{execute_step, load_api_key, StepError, StepSuccess};
