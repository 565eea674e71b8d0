use super::Stage;
use crate::config::RemediationConfig;
use crate::error::{SoftError, SoftErrorKind, StageError};
use crate::reasoner::{Reasoner, ReasonerRequest, ReasoningTask, Reply, ReplyShapeError};
use crate::state::{StageInput, StageOutput, StageUpdate};
use crate::types::{Issue, Remediation, StageId};
use futures::future::join_all;
use serde_json::{json, Value};

/// Asks the reasoner for remediation steps, one issue at a time
#[derive(Debug, Clone, Default)]
pub struct Remediator {
    config: RemediationConfig,
}

impl Remediator {
    pub fn new(config: RemediationConfig) -> Self {
        Self { config }
    }
}

fn remediation_from_reply(issue: &Issue, reply: &Value) -> Result<Remediation, ReplyShapeError> {
    let reply = Reply::parse(reply)?;
    let steps = reply.list("steps");
    if steps.is_empty() {
        return Err(ReplyShapeError("`steps` must list at least one step".to_string()));
    }
    Ok(Remediation {
        issue: issue.description.clone(),
        severity: issue.severity,
        steps,
        rationale: reply.label("rationale").unwrap_or_default().trim().to_string(),
    })
}

#[async_trait::async_trait]
impl Stage for Remediator {
    fn id(&self) -> StageId {
        StageId::Remediate
    }

    async fn run(&self, input: StageInput, reasoner: &dyn Reasoner) -> Result<StageUpdate, StageError> {
        let issues: Vec<&Issue> = input.issues.iter().take(self.config.max_issues).collect();
        if input.issues.len() > issues.len() {
            tracing::debug!(
                skipped = input.issues.len() - issues.len(),
                "issues beyond the remediation limit skipped"
            );
        }

        let replies = join_all(issues.iter().map(|issue| {
            reasoner.reason(ReasonerRequest::new(
                ReasoningTask::Remediation,
                json!({ "issue": issue }),
            ))
        }))
        .await;

        let mut remediations = Vec::new();
        let mut soft_errors = Vec::new();
        for (issue, reply) in issues.into_iter().zip(replies) {
            let outcome = reply
                .map_err(|err| (SoftErrorKind::ReasonerFailed, err.to_string()))
                .and_then(|value| {
                    remediation_from_reply(issue, &value)
                        .map_err(|shape| (SoftErrorKind::MalformedReasonerOutput, shape.to_string()))
                });
            match outcome {
                Ok(remediation) => remediations.push(remediation),
                Err((kind, message)) => {
                    tracing::warn!(issue = %issue.description, %kind, %message, "remediation skipped");
                    soft_errors.push(SoftError::new(
                        StageId::Remediate,
                        kind,
                        format!("issue `{}`: {message}", issue.description),
                    ));
                }
            }
        }

        Ok(StageUpdate::new(StageOutput::Remediations(remediations)).with_soft_errors(soft_errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoner::{MockReasoner, RuleReasoner};
    use crate::types::Severity;

    fn input(issues: Vec<Issue>) -> StageInput {
        let mut input = StageInput::empty(StageId::Remediate);
        input.issues = issues.into();
        input
    }

    #[tokio::test]
    async fn one_remediation_per_issue_up_to_the_limit() {
        let issues = (0..4).map(|i| Issue::new(format!("disk full on node {i}"), Severity::High)).collect();
        let stage = Remediator::new(RemediationConfig { max_issues: 3 });

        let update = stage.run(input(issues), &RuleReasoner).await.unwrap();

        let StageOutput::Remediations(remediations) = update.output else {
            panic!("wrong output field");
        };
        assert_eq!(remediations.len(), 3);
        assert_eq!(remediations[0].steps.len(), 3);
        assert!(remediations[0].rationale.contains("HIGH"));
        assert!(update.soft_errors.is_empty());
    }

    #[tokio::test]
    async fn reply_without_steps_is_skipped() {
        let mut reasoner = MockReasoner::new();
        reasoner
            .expect_reason()
            .returning(|_| Ok(json!({"rationale": "no idea"})));

        let update = Remediator::default()
            .run(input(vec![Issue::new("mystery", Severity::Low)]), &reasoner)
            .await
            .unwrap();

        assert_eq!(update.output, StageOutput::Remediations(Vec::new()));
        assert_eq!(update.soft_errors[0].kind, SoftErrorKind::MalformedReasonerOutput);
        assert!(update.soft_errors[0].message.starts_with("issue `mystery`"));
    }
}
