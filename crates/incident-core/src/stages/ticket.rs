use super::Stage;
use crate::config::TicketConfig;
use crate::error::StageError;
use crate::reasoner::{excerpt, Reasoner};
use crate::state::{StageInput, StageOutput, StageUpdate};
use crate::types::{Issue, StageId, TicketDraft};
use std::collections::HashSet;

const TITLE_CHARS: usize = 80;

/// Drafts one ticket per distinct severe issue
#[derive(Debug, Clone, Default)]
pub struct TicketDrafter {
    config: TicketConfig,
}

impl TicketDrafter {
    pub fn new(config: TicketConfig) -> Self {
        Self { config }
    }

    pub fn draft<'a>(&self, issues: impl IntoIterator<Item = &'a Issue>) -> Vec<TicketDraft> {
        let mut seen = HashSet::new();
        issues
            .into_iter()
            .filter(|issue| issue.severity >= self.config.min_severity)
            .filter(|issue| seen.insert(issue.description.trim().to_lowercase()))
            .map(|issue| {
                let mut body = format!("{}\n\nSeverity: {}", issue.description, issue.severity);
                if let Some(line) = issue.line_number {
                    body.push_str(&format!("\nOriginating log line: {line}"));
                }
                TicketDraft {
                    title: format!("[{}] {}", issue.severity, excerpt(issue.description.trim(), TITLE_CHARS)),
                    severity: issue.severity,
                    body,
                    labels: vec![
                        "incident".to_string(),
                        format!("severity:{}", issue.severity.to_string().to_lowercase()),
                    ],
                }
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl Stage for TicketDrafter {
    fn id(&self) -> StageId {
        StageId::Ticket
    }

    async fn run(&self, input: StageInput, _reasoner: &dyn Reasoner) -> Result<StageUpdate, StageError> {
        let tickets = self.draft(&input.issues);
        tracing::debug!(tickets = tickets.len(), "tickets drafted");
        Ok(StageUpdate::new(StageOutput::Tickets(tickets)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;
    use pretty_assertions::assert_eq;

    #[test]
    fn severe_issues_only_and_deduplicated() {
        let issues = vec![
            Issue::new("db down", Severity::Critical).at_line(4),
            Issue::new("slow api", Severity::Medium),
            Issue::new("DB down ", Severity::Critical),
            Issue::new("disk 91%", Severity::High),
        ];

        let tickets = TicketDrafter::default().draft(&issues);

        assert_eq!(tickets.len(), 2);
        assert_eq!(tickets[0].title, "[CRITICAL] db down");
        assert_eq!(tickets[0].body, "db down\n\nSeverity: CRITICAL\nOriginating log line: 4");
        assert_eq!(tickets[1].labels, vec!["incident", "severity:high"]);
    }

    #[test]
    fn threshold_is_configurable() {
        let drafter = TicketDrafter::new(TicketConfig {
            min_severity: Severity::Low,
        });
        assert_eq!(drafter.draft(&[Issue::new("noise", Severity::Low)]).len(), 1);
    }
}
