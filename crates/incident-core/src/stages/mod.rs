//! Pipeline stages
//!
//! A stage is a pure function of its input view and the injected reasoner.
//! It never touches shared state; it returns a [`StageUpdate`] for the
//! field it owns and the pipeline merges it.
//!
//! - [`Classifier`]: level and service overview
//! - [`Remediator`]: reasoner-backed fix suggestions per issue
//! - [`CookbookWriter`]: markdown runbook from remediations
//! - [`TicketDrafter`]: tracker-ready tickets for severe issues
//! - [`CausalCorrelator`](crate::correlation::CausalCorrelator) and
//!   [`RiskDetector`](crate::risk::RiskDetector): the analytical stages
//! - [`Notifier`]: notification payload gated on risk output

use crate::config::PipelineConfig;
use crate::correlation::CausalCorrelator;
use crate::error::StageError;
use crate::reasoner::Reasoner;
use crate::risk::RiskDetector;
use crate::state::{StageInput, StageUpdate};
use crate::types::StageId;
use std::collections::BTreeMap;
use std::sync::Arc;

mod classify;
mod cookbook;
mod notify;
mod remediate;
mod ticket;

pub use classify::Classifier;
pub use cookbook::CookbookWriter;
pub use notify::Notifier;
pub use remediate::Remediator;
pub use ticket::TicketDrafter;

/// Unit of pipeline work
///
/// Implement this trait to replace a built-in stage through
/// [`StageSet::replace`].
#[async_trait::async_trait]
pub trait Stage: Send + Sync {
    /// Graph node this stage runs as
    fn id(&self) -> StageId;

    /// Compute the stage's update from its input view
    ///
    /// `Err` is a stage-level failure: the pipeline records it and merges an
    /// empty value for the stage's field instead.
    async fn run(&self, input: StageInput, reasoner: &dyn Reasoner) -> Result<StageUpdate, StageError>;
}

/// One stage implementation per [`StageId`]
#[derive(Clone)]
pub struct StageSet {
    stages: BTreeMap<StageId, Arc<dyn Stage>>,
}

impl StageSet {
    /// Built-in stages configured from `config`
    pub fn standard(config: &PipelineConfig) -> Self {
        let stages: [Arc<dyn Stage>; 7] = [
            Arc::new(Classifier),
            Arc::new(Remediator::new(config.remediation.clone())),
            Arc::new(CookbookWriter),
            Arc::new(TicketDrafter::new(config.ticket.clone())),
            Arc::new(CausalCorrelator::new(config.correlation.clone())),
            Arc::new(RiskDetector::new(config.risk.clone())),
            Arc::new(Notifier::new(config.notify.clone())),
        ];
        Self {
            stages: stages.into_iter().map(|stage| (stage.id(), stage)).collect(),
        }
    }

    /// Swap in `stage` for whatever runs as `stage.id()`
    pub fn replace(&mut self, stage: Arc<dyn Stage>) -> &mut Self {
        self.stages.insert(stage.id(), stage);
        self
    }

    pub fn get(&self, id: StageId) -> Option<&Arc<dyn Stage>> {
        self.stages.get(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = StageId> + '_ {
        self.stages.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl std::fmt::Debug for StageSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageSet")
            .field("stages", &self.stages.keys().collect::<Vec<_>>())
            .finish()
    }
}
