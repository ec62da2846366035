//! Reconciliation engine.
//!
//! Ties the pipeline together: normalize both documents, validate the
//! desired one, diff, plan, then drive sequential statement execution
//! against the ledger. The core stays synchronous; only the boundary
//! (introspection, execution, ledger I/O) is async.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use strata_schema::ast::SchemaDocument;
use strata_schema::{normalize, validate};

use crate::diff::SchemaComparator;
use crate::error::{ExecutionError, MigrateError, MigrateResult};
use crate::ledger::{LedgerEntry, LedgerStatus, MigrationLedger};
use crate::plan::{MigrationPlan, MigrationPlanner};

/// Introspects a target database into a schema document.
#[async_trait]
pub trait LiveStateProvider: Send + Sync {
    async fn introspect(&self) -> Result<SchemaDocument, ExecutionError>;
}

/// Executes one DDL statement against the target.
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    async fn execute(&self, statement: &str) -> Result<(), ExecutionError>;
}

/// Bounded exponential backoff for connectivity-class failures.
///
/// Semantic rejections are never retried; see [`ExecutionError`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Backoff ceiling.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1` (attempts are 1-based).
    fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << exp);
        delay.min(self.max_delay)
    }
}

/// Outcome of applying a plan.
///
/// A failed statement is reported here rather than as an `Err` so the
/// caller still sees how far execution got; [`ApplyResult::into_result`]
/// converts to `Result` when only success matters.
#[derive(Debug)]
pub struct ApplyResult {
    /// The recorded migration id.
    pub migration_id: String,
    /// Statements confirmed applied.
    pub applied_count: usize,
    /// Index of the failing statement, if any.
    pub failed_at: Option<usize>,
    /// The failure, if any.
    pub error: Option<MigrateError>,
}

impl ApplyResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Collapse into a `Result`, yielding the applied-statement count.
    pub fn into_result(self) -> MigrateResult<usize> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.applied_count),
        }
    }
}

/// Which ledger entry to roll back.
#[derive(Debug, Clone)]
pub enum RollbackTarget {
    /// The most recent applied entry.
    Latest,
    /// A specific migration id.
    Id(String),
}

/// Ledger overview returned by [`ReconcileEngine::status`].
#[derive(Debug)]
pub struct EngineStatus {
    /// The unresolved entry, if any.
    pub pending: Option<LedgerEntry>,
    /// All entries, oldest first.
    pub history: Vec<LedgerEntry>,
}

/// Classified failure of one statement after retries.
enum StatementFailure {
    Connectivity { attempts: u32, reason: String },
    Rejected(String),
}

/// Drives reconciliation against one target database.
pub struct ReconcileEngine<L: MigrationLedger> {
    ledger: L,
    retry: RetryPolicy,
}

impl<L: MigrationLedger> ReconcileEngine<L> {
    pub fn new(ledger: L) -> Self {
        Self {
            ledger,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The underlying ledger.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Compute the plan that takes `live` to `desired`.
    ///
    /// Pure and synchronous: normalize both sides, validate the desired
    /// document, diff, plan. An empty plan means the documents already
    /// agree.
    pub fn reconcile(
        &self,
        desired: &SchemaDocument,
        live: &SchemaDocument,
    ) -> MigrateResult<MigrationPlan> {
        let desired = normalize(desired)?;
        validate(&desired)?;
        let live = normalize(live)?;
        let changes = SchemaComparator::diff(&desired, &live)?;
        debug!(summary = %changes.summary(), "computed change set");
        let plan = MigrationPlanner::plan(&changes)?;
        info!(id = %plan.id, statements = plan.up.len(), "planned migration");
        Ok(plan)
    }

    /// Introspect live state through `provider` (with connectivity
    /// retries) and reconcile against it.
    pub async fn reconcile_live<P: LiveStateProvider>(
        &self,
        desired: &SchemaDocument,
        provider: &P,
    ) -> MigrateResult<MigrationPlan> {
        let live = self.introspect_with_retry(provider).await?;
        self.reconcile(desired, &live)
    }

    /// Apply a plan's up statements sequentially through `executor`.
    ///
    /// Records the plan first; an unresolved pending entry blocks with
    /// [`MigrateError::PendingEntryExists`]. On a statement failure the
    /// entry is finished as `Failed` with the confirmed count, and
    /// recovery is re-running reconciliation, never resuming mid-plan.
    pub async fn apply<E: StatementExecutor>(
        &self,
        plan: &MigrationPlan,
        executor: &E,
    ) -> MigrateResult<ApplyResult> {
        if plan.is_empty() {
            return Ok(ApplyResult {
                migration_id: plan.id.clone(),
                applied_count: 0,
                failed_at: None,
                error: None,
            });
        }

        let entry = self.ledger.record(plan).await?;
        info!(id = %entry.migration_id, statements = plan.up.len(), "applying migration");

        for (index, statement) in plan.up.iter().enumerate() {
            match self.execute_with_retry(executor, statement).await {
                Ok(()) => {
                    self.ledger
                        .mark_statement_applied(&entry.migration_id, index + 1)
                        .await?;
                }
                Err(failure) => {
                    warn!(id = %entry.migration_id, index, "statement failed; stopping");
                    self.ledger
                        .finish(&entry.migration_id, LedgerStatus::Failed)
                        .await?;
                    let error = match failure {
                        StatementFailure::Connectivity { attempts, reason } => {
                            MigrateError::Connectivity { attempts, reason }
                        }
                        StatementFailure::Rejected(reason) => MigrateError::PartialApply {
                            index,
                            statement: statement.clone(),
                            reason,
                        },
                    };
                    return Ok(ApplyResult {
                        migration_id: entry.migration_id,
                        applied_count: index,
                        failed_at: Some(index),
                        error: Some(error),
                    });
                }
            }
        }

        self.ledger
            .finish(&entry.migration_id, LedgerStatus::Applied)
            .await?;
        info!(id = %entry.migration_id, "migration applied");
        Ok(ApplyResult {
            migration_id: entry.migration_id,
            applied_count: plan.up.len(),
            failed_at: None,
            error: None,
        })
    }

    /// Pending entry plus full history.
    pub async fn status(&self) -> MigrateResult<EngineStatus> {
        Ok(EngineStatus {
            pending: self.ledger.pending().await?,
            history: self.ledger.history().await?,
        })
    }

    /// Verify a stored entry's checksum against its recorded statements.
    pub fn verify(&self, entry: &LedgerEntry) -> MigrateResult<()> {
        let actual = MigrationPlan::checksum_of(&entry.up);
        if actual != entry.checksum {
            return Err(MigrateError::ChecksumMismatch {
                id: entry.migration_id.clone(),
                expected: entry.checksum.clone(),
                actual,
            });
        }
        Ok(())
    }

    /// The stored inverse of a recorded entry, as a plan of its own.
    ///
    /// Statement order matches what [`ReconcileEngine::rollback`] runs.
    /// The returned plan's checksum covers the down statements, so it can
    /// be verified or recorded like any forward plan.
    pub fn down_plan(&self, entry: &LedgerEntry) -> MigrationPlan {
        MigrationPlan {
            id: format!("{}_down", entry.migration_id),
            checksum: MigrationPlan::checksum_of(&entry.down),
            up: entry.down.clone(),
            down: entry.up.clone(),
            created_at: Utc::now(),
        }
    }

    /// Run a recorded entry's down statements and mark it rolled back.
    ///
    /// Only applied entries can be rolled back; the checksum is verified
    /// first so tampered statement text is never executed.
    pub async fn rollback<E: StatementExecutor>(
        &self,
        target: RollbackTarget,
        executor: &E,
    ) -> MigrateResult<ApplyResult> {
        let entry = match &target {
            RollbackTarget::Latest => self
                .ledger
                .history()
                .await?
                .into_iter()
                .rev()
                .find(|e| e.status == LedgerStatus::Applied)
                .ok_or_else(|| MigrateError::EntryNotFound("latest applied".to_string()))?,
            RollbackTarget::Id(id) => self
                .ledger
                .get(id)
                .await?
                .ok_or_else(|| MigrateError::EntryNotFound(id.clone()))?,
        };
        self.verify(&entry)?;
        if entry.status != LedgerStatus::Applied {
            return Err(MigrateError::rollback_failed(format!(
                "migration '{}' is not in applied state",
                entry.migration_id
            )));
        }

        info!(id = %entry.migration_id, statements = entry.down.len(), "rolling back");
        for (index, statement) in entry.down.iter().enumerate() {
            if let Err(failure) = self.execute_with_retry(executor, statement).await {
                let reason = match failure {
                    StatementFailure::Connectivity { reason, .. } => reason,
                    StatementFailure::Rejected(reason) => reason,
                };
                return Err(MigrateError::rollback_failed(format!(
                    "down statement {index} of '{}' failed: {reason}",
                    entry.migration_id
                )));
            }
        }
        self.ledger
            .finish(&entry.migration_id, LedgerStatus::RolledBack)
            .await?;
        Ok(ApplyResult {
            migration_id: entry.migration_id,
            applied_count: entry.down.len(),
            failed_at: None,
            error: None,
        })
    }

    async fn execute_with_retry<E: StatementExecutor>(
        &self,
        executor: &E,
        statement: &str,
    ) -> Result<(), StatementFailure> {
        let mut attempt = 1u32;
        loop {
            match executor.execute(statement).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_transient() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay(attempt);
                    warn!(attempt, ?delay, "transient failure; retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(ExecutionError::Connectivity(reason)) => {
                    return Err(StatementFailure::Connectivity {
                        attempts: attempt,
                        reason,
                    });
                }
                Err(ExecutionError::Rejected(reason)) => {
                    return Err(StatementFailure::Rejected(reason));
                }
            }
        }
    }

    async fn introspect_with_retry<P: LiveStateProvider>(
        &self,
        provider: &P,
    ) -> MigrateResult<SchemaDocument> {
        let mut attempt = 1u32;
        loop {
            match provider.introspect().await {
                Ok(doc) => return Ok(doc),
                Err(err) if err.is_transient() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay(attempt);
                    warn!(attempt, ?delay, "introspection failed; retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(ExecutionError::Connectivity(reason)) => {
                    return Err(MigrateError::Connectivity {
                        attempts: attempt,
                        reason,
                    });
                }
                Err(ExecutionError::Rejected(reason)) => {
                    return Err(MigrateError::ledger(format!(
                        "introspection rejected: {reason}"
                    )));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use strata_schema::ast::{FieldDefinition, TableDefinition};

    /// Executor that records statements and fails on request.
    #[derive(Default)]
    struct MockExecutor {
        executed: Mutex<Vec<String>>,
        fail_at: Option<usize>,
        transient_failures: AtomicUsize,
    }

    impl MockExecutor {
        fn failing_at(index: usize) -> Self {
            Self {
                fail_at: Some(index),
                ..Self::default()
            }
        }

        fn flaky(failures: usize) -> Self {
            Self {
                transient_failures: AtomicUsize::new(failures),
                ..Self::default()
            }
        }

        fn executed(&self) -> Vec<String> {
            self.executed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StatementExecutor for MockExecutor {
        async fn execute(&self, statement: &str) -> Result<(), ExecutionError> {
            if self
                .transient_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(ExecutionError::Connectivity("connection reset".into()));
            }
            let mut executed = self.executed.lock().unwrap();
            if self.fail_at == Some(executed.len()) {
                return Err(ExecutionError::Rejected("column type mismatch".into()));
            }
            executed.push(statement.to_string());
            Ok(())
        }
    }

    fn quick_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    fn desired() -> SchemaDocument {
        let mut doc = SchemaDocument::new();
        let mut table = TableDefinition::new("user");
        table.fields = vec![FieldDefinition::new("email", "string")];
        doc.add_table(table);
        doc
    }

    #[tokio::test]
    async fn test_apply_records_and_finishes() {
        let engine = ReconcileEngine::new(MemoryLedger::new());
        let plan = engine.reconcile(&desired(), &SchemaDocument::new()).unwrap();
        let executor = MockExecutor::default();

        let result = engine.apply(&plan, &executor).await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.applied_count, 2);
        assert_eq!(executor.executed(), plan.up);

        let status = engine.status().await.unwrap();
        assert!(status.pending.is_none());
        assert_eq!(status.history.len(), 1);
        assert_eq!(status.history[0].status, LedgerStatus::Applied);
    }

    #[tokio::test]
    async fn test_rejected_statement_stops_and_marks_failed() {
        let engine = ReconcileEngine::new(MemoryLedger::new());
        let plan = engine.reconcile(&desired(), &SchemaDocument::new()).unwrap();
        let executor = MockExecutor::failing_at(1);

        let result = engine.apply(&plan, &executor).await.unwrap();
        assert_eq!(result.applied_count, 1);
        assert_eq!(result.failed_at, Some(1));
        assert!(matches!(
            result.into_result(),
            Err(MigrateError::PartialApply { index: 1, .. })
        ));

        let entry = engine.ledger().history().await.unwrap().pop().unwrap();
        assert_eq!(entry.status, LedgerStatus::Failed);
        assert_eq!(entry.statements_applied, 1);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let engine =
            ReconcileEngine::new(MemoryLedger::new()).with_retry_policy(quick_retry());
        let plan = engine.reconcile(&desired(), &SchemaDocument::new()).unwrap();
        // Two transient failures, three attempts allowed: succeeds.
        let executor = MockExecutor::flaky(2);

        let result = engine.apply(&plan, &executor).await.unwrap();
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_exhausted_retries_escalate_to_connectivity() {
        let engine =
            ReconcileEngine::new(MemoryLedger::new()).with_retry_policy(quick_retry());
        let plan = engine.reconcile(&desired(), &SchemaDocument::new()).unwrap();
        let executor = MockExecutor::flaky(10);

        let result = engine.apply(&plan, &executor).await.unwrap();
        assert!(matches!(
            result.error,
            Some(MigrateError::Connectivity { attempts: 3, .. })
        ));
        let entry = engine.ledger().history().await.unwrap().pop().unwrap();
        assert_eq!(entry.status, LedgerStatus::Failed);
    }

    #[tokio::test]
    async fn test_empty_plan_is_not_recorded() {
        let engine = ReconcileEngine::new(MemoryLedger::new());
        let doc = desired();
        let plan = engine.reconcile(&doc, &doc).unwrap();
        assert!(plan.is_empty());

        let result = engine.apply(&plan, &MockExecutor::default()).await.unwrap();
        assert_eq!(result.applied_count, 0);
        assert!(engine.status().await.unwrap().history.is_empty());
    }

    #[tokio::test]
    async fn test_rollback_runs_down_statements() {
        let engine = ReconcileEngine::new(MemoryLedger::new());
        let plan = engine.reconcile(&desired(), &SchemaDocument::new()).unwrap();
        engine
            .apply(&plan, &MockExecutor::default())
            .await
            .unwrap();

        let executor = MockExecutor::default();
        let result = engine
            .rollback(RollbackTarget::Latest, &executor)
            .await
            .unwrap();
        assert_eq!(result.applied_count, plan.down.len());
        assert_eq!(executor.executed(), plan.down);

        let entry = engine.ledger().history().await.unwrap().pop().unwrap();
        assert_eq!(entry.status, LedgerStatus::RolledBack);
    }

    #[tokio::test]
    async fn test_down_plan_mirrors_recorded_entry() {
        let engine = ReconcileEngine::new(MemoryLedger::new());
        let plan = engine.reconcile(&desired(), &SchemaDocument::new()).unwrap();
        engine
            .apply(&plan, &MockExecutor::default())
            .await
            .unwrap();

        let entry = engine.ledger().get(&plan.id).await.unwrap().unwrap();
        let down = engine.down_plan(&entry);
        assert_eq!(down.id, format!("{}_down", plan.id));
        assert_eq!(down.up, plan.down);
        assert_eq!(down.down, plan.up);
        assert_eq!(down.checksum, MigrationPlan::checksum_of(&plan.down));
    }

    #[tokio::test]
    async fn test_rollback_refuses_tampered_entry() {
        let ledger = MemoryLedger::new();
        let engine = ReconcileEngine::new(ledger);
        let plan = engine.reconcile(&desired(), &SchemaDocument::new()).unwrap();
        engine
            .apply(&plan, &MockExecutor::default())
            .await
            .unwrap();

        let mut entry = engine
            .ledger()
            .get(&plan.id)
            .await
            .unwrap()
            .unwrap();
        entry.up[0] = "REMOVE TABLE user".to_string();
        let err = engine.verify(&entry).unwrap_err();
        assert!(matches!(err, MigrateError::ChecksumMismatch { .. }));
    }

    #[tokio::test]
    async fn test_validation_failure_blocks_planning() {
        let mut doc = SchemaDocument::new();
        doc.add_table(TableDefinition::relation("follows", "user", "user"));
        // `user` is never declared.
        let engine = ReconcileEngine::new(MemoryLedger::new());
        let err = engine.reconcile(&doc, &SchemaDocument::new()).unwrap_err();
        assert!(matches!(err, MigrateError::Schema(_)));
    }
}
