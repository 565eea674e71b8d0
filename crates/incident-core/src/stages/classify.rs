use super::Stage;
use crate::error::StageError;
use crate::reasoner::Reasoner;
use crate::state::{StageInput, StageOutput, StageUpdate};
use crate::types::{Classification, StageId};
use indexmap::IndexSet;

/// Deterministic log overview
#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier;

impl Classifier {
    pub fn classify(input: &StageInput) -> Classification {
        let mut classification = Classification {
            total_entries: input.log_entries.len(),
            issue_count: input.issues.len(),
            highest_severity: input.issues.iter().map(|i| i.severity).max(),
            ..Classification::default()
        };

        let mut services = IndexSet::new();
        for entry in &input.log_entries {
            *classification.level_counts.entry(entry.level).or_insert(0) += 1;
            if entry.level.is_actionable() {
                classification.actionable_entries += 1;
            }
            let service = entry.service.trim();
            if !service.is_empty() {
                services.insert(service.to_string());
            }
        }
        classification.services = services.into_iter().collect();
        classification
    }
}

#[async_trait::async_trait]
impl Stage for Classifier {
    fn id(&self) -> StageId {
        StageId::Classify
    }

    async fn run(&self, input: StageInput, _reasoner: &dyn Reasoner) -> Result<StageUpdate, StageError> {
        let classification = Self::classify(&input);
        tracing::debug!(
            entries = classification.total_entries,
            actionable = classification.actionable_entries,
            "log classified"
        );
        Ok(StageUpdate::new(StageOutput::Classification(classification)))
    }
}
