//! # taskloop Core
//!
//! Domain types, traits, and error definitions for the taskloop orchestration
//! runtime. This crate carries no scheduling or caching logic: it defines the
//! domain model that the context store, tools, workers, and orchestrator
//! implement against.
//!
//! ## Design Philosophy
//!
//! Every capability seam is a trait here (`Tool`, `Worker`). Implementations
//! live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with scripted/counting test doubles
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod event;
pub mod task;
pub mod tool;
pub mod worker;

// Re-export key types at crate root for ergonomics
pub use error::{ContextError, Error, Result, ToolError, WorkerError};
pub use event::{DomainEvent, EventBus};
pub use task::{
    IterationRecord, Phase, Task, TaskOutcome, TaskResult, WorkerResult, FEEDBACK_KEY,
    GATHERED_CONTEXT_KEY,
};
pub use tool::{Tool, ToolRegistry, ToolResult};
pub use worker::{Worker, WorkerRegistry};

/// Cancellation token threaded through every phase, worker, and tool call.
pub use tokio_util::sync::CancellationToken;
