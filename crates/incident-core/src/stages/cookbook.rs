use super::Stage;
use crate::error::StageError;
use crate::reasoner::Reasoner;
use crate::state::{StageInput, StageOutput, StageUpdate};
use crate::types::{Remediation, StageId};
use std::cmp::Reverse;
use std::fmt::Write;

/// Renders remediations into a markdown runbook, most severe first
#[derive(Debug, Clone, Copy, Default)]
pub struct CookbookWriter;

impl CookbookWriter {
    pub fn render(remediations: &[Remediation]) -> String {
        let mut ordered: Vec<&Remediation> = remediations.iter().collect();
        ordered.sort_by_key(|r| Reverse(r.severity));

        let mut out = String::from("# Incident Remediation Cookbook\n");
        if ordered.is_empty() {
            out.push_str("\nNo remediations required.\n");
            return out;
        }
        for (index, remediation) in ordered.iter().enumerate() {
            let _ = write!(out, "\n## {}. [{}] {}\n\n", index + 1, remediation.severity, remediation.issue);
            for (step, text) in remediation.steps.iter().enumerate() {
                let _ = writeln!(out, "{}. {text}", step + 1);
            }
            if !remediation.rationale.is_empty() {
                let _ = write!(out, "\n_{}_\n", remediation.rationale);
            }
        }
        out
    }
}

#[async_trait::async_trait]
impl Stage for CookbookWriter {
    fn id(&self) -> StageId {
        StageId::Cookbook
    }

    async fn run(&self, input: StageInput, _reasoner: &dyn Reasoner) -> Result<StageUpdate, StageError> {
        let remediations: Vec<Remediation> = input.remediations.iter().cloned().collect();
        Ok(StageUpdate::new(StageOutput::Cookbook(Self::render(&remediations))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;

    fn remediation(issue: &str, severity: Severity) -> Remediation {
        Remediation {
            issue: issue.to_string(),
            severity,
            steps: vec!["look".to_string(), "fix".to_string()],
            rationale: String::new(),
        }
    }

    #[test]
    fn critical_sections_come_first() {
        let text = CookbookWriter::render(&[
            remediation("slow api", Severity::Medium),
            remediation("db down", Severity::Critical),
            remediation("disk 91%", Severity::High),
        ]);

        let critical = text.find("[CRITICAL] db down").unwrap();
        let high = text.find("[HIGH] disk 91%").unwrap();
        let medium = text.find("[MEDIUM] slow api").unwrap();
        assert!(critical < high && high < medium);
        assert!(text.contains("## 1. [CRITICAL] db down\n\n1. look\n2. fix\n"));
    }

    #[test]
    fn empty_cookbook_says_so() {
        assert!(CookbookWriter::render(&[]).contains("No remediations required."));
    }
}
