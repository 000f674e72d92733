//! Pipeline execution: the stage driver, its events and the retry primitive

pub mod engine;
pub mod events;
pub mod retry;

pub use engine::SubmissionPipeline;
pub use events::{EventHandler, EventSink, PipelineEvent, Stage};
pub use retry::{Backoff, RetryError, RetryPolicy};
