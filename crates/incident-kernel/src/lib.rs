//! Incident Kernel
//!
//! Two-phase graph execution:
//! 1. **Construction Phase**: declare stages and their dependencies, then
//!    validate once into a sealed [`ValidatedGraph`]
//! 2. **Execution Phase**: the [`GraphScheduler`] dispatches every node whose
//!    dependencies have been merged, runs siblings concurrently and folds each
//!    node's output into the shared state one merge at a time
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use incident_kernel::prelude::*;
//!
//! // Construction phase
//! let mut builder = GraphBuilder::new("classify");
//! builder.add_node("remediate");
//! builder.add_edge("classify", "remediate");
//! let graph = builder.validate()?;
//!
//! // Execution phase
//! let scheduler = GraphScheduler::new(SchedulerConfig::default());
//! let report = scheduler.run(&graph, state, runner).await;
//! ```

pub mod construction;
pub mod error;
pub mod executor;
pub mod scheduler;
pub mod types;
pub mod validated_graph;

pub use error::{FailureKind, GraphError, NodeFailure};
pub use types::{CancelReason, NodeKey, RunStatus};

/// Re-export of the types needed to build and run a graph
pub mod prelude {
    pub use crate::construction::{GraphBuilder, GraphValidator};
    pub use crate::error::{FailureKind, GraphError, NodeFailure};
    pub use crate::executor::NodeRunner;
    pub use crate::scheduler::{FailedNode, GraphScheduler, RunReport, SchedulerConfig};
    pub use crate::types::{CancelReason, NodeKey, RunStatus};
    pub use crate::validated_graph::ValidatedGraph;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
