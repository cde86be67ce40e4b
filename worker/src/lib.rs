pub mod engine;
pub mod runner;

pub use engine::{CommandEngine, PASSWORD_ENV};
pub use runner::{run_all, PipelineRunner, RunnerOutcome};
