use connectors::{adapter::TargetAdapter, error::DbError};
use plsql_syntax::batch::{contains_standalone_go, split_batches};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Outcome of submitting one script. The raw server error is preserved
/// verbatim for the root-cause analyzer.
#[derive(Debug, Clone)]
pub struct DeployResult {
    pub success: bool,
    pub error_text: Option<String>,
    /// Distinct flag for the programming error of a GO inside a batch.
    pub embedded_go: bool,
    pub batches_run: usize,
}

impl DeployResult {
    fn ok(batches_run: usize) -> Self {
        DeployResult {
            success: true,
            error_text: None,
            embedded_go: false,
            batches_run,
        }
    }
}

/// Executes T-SQL scripts batch by batch. Splits on standalone GO lines,
/// submits each batch independently (auto-commit per batch), and stops at
/// the first failing batch.
pub struct Deployer {
    target: Arc<dyn TargetAdapter>,
}

impl Deployer {
    pub fn new(target: Arc<dyn TargetAdapter>) -> Self {
        Deployer { target }
    }

    pub async fn deploy(&self, script: &str, cancel: &CancellationToken) -> DeployResult {
        let batches = split_batches(script);
        debug!(batches = batches.len(), "deploying script");

        for (idx, batch) in batches.iter().enumerate() {
            if cancel.is_cancelled() {
                return DeployResult {
                    success: false,
                    error_text: Some("deployment cancelled".to_string()),
                    embedded_go: false,
                    batches_run: idx,
                };
            }
            // The splitter removed every separator; one still present here
            // is a bug in batch preparation, reported distinctly.
            if contains_standalone_go(batch) {
                warn!(batch = idx, "batch still contains a GO separator");
                return DeployResult {
                    success: false,
                    error_text: Some(format!(
                        "batch {idx} still contains a standalone GO separator"
                    )),
                    embedded_go: true,
                    batches_run: idx,
                };
            }
            if let Err(err) = self.target.execute(batch).await {
                let embedded_go = matches!(err, DbError::EmbeddedGo(_));
                return DeployResult {
                    success: false,
                    error_text: Some(err.server_text()),
                    embedded_go,
                    batches_run: idx,
                };
            }
        }

        DeployResult::ok(batches.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::mock::MockTarget;

    fn deployer(target: &Arc<MockTarget>) -> Deployer {
        Deployer::new(target.clone() as Arc<dyn TargetAdapter>)
    }

    #[tokio::test]
    async fn splits_and_submits_batches_independently() {
        let target = Arc::new(MockTarget::new());
        let result = deployer(&target)
            .deploy(
                "CREATE TABLE dbo.T1 (A INT);\nGO\nCREATE TABLE dbo.T2 (B INT);",
                &CancellationToken::new(),
            )
            .await;
        assert!(result.success);
        assert_eq!(result.batches_run, 2);
        assert_eq!(target.executed().len(), 2);
    }

    #[tokio::test]
    async fn first_failed_batch_stops_the_script() {
        let target = Arc::new(MockTarget::new());
        target.fail_matching("T2", "Incorrect syntax near 'T2'.", 1);
        let result = deployer(&target)
            .deploy(
                "CREATE TABLE dbo.T1 (A INT);\nGO\nCREATE TABLE dbo.T2 (B INT);\nGO\nCREATE TABLE dbo.T3 (C INT);",
                &CancellationToken::new(),
            )
            .await;
        assert!(!result.success);
        assert_eq!(result.error_text.as_deref(), Some("Incorrect syntax near 'T2'."));
        assert!(!target.executed().iter().any(|s| s.contains("T3")));
    }

    #[tokio::test]
    async fn cancellation_stops_between_batches() {
        let target = Arc::new(MockTarget::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = deployer(&target).deploy("SELECT 1;", &cancel).await;
        assert!(!result.success);
        assert_eq!(result.batches_run, 0);
    }
}
