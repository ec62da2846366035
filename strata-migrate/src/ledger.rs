//! Migration ledger.
//!
//! The ledger is the append-only record of every plan ever applied to a
//! target, and the mutual-exclusion point for concurrent reconciliation
//! runs: [`MigrationLedger::record`] must atomically refuse a new entry
//! while an unresolved pending one exists. Entries are never deleted;
//! superseded migrations stay in the history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{MigrateError, MigrateResult};
use crate::plan::MigrationPlan;

/// Lifecycle state of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    /// Recorded but not fully applied; blocks further recording.
    Pending,
    /// Every statement confirmed applied.
    Applied,
    /// Application stopped partway; `statements_applied` says where.
    Failed,
    /// Down statements were applied after the fact.
    RolledBack,
}

impl LedgerStatus {
    /// Whether the entry still blocks new recordings.
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// One recorded migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Identifier of the recorded plan.
    pub migration_id: String,
    /// Checksum the plan carried when recorded.
    pub checksum: String,
    /// Forward statements as recorded.
    pub up: Vec<String>,
    /// Inverse statements as recorded.
    pub down: Vec<String>,
    /// Statements confirmed applied so far.
    pub statements_applied: usize,
    /// Current lifecycle state.
    pub status: LedgerStatus,
    /// When the entry was recorded.
    pub created_at: DateTime<Utc>,
    /// When the entry was resolved, if it has been.
    pub applied_at: Option<DateTime<Utc>>,
}

impl LedgerEntry {
    /// Build a fresh pending entry from a plan.
    pub fn from_plan(plan: &MigrationPlan) -> Self {
        Self {
            migration_id: plan.id.clone(),
            checksum: plan.checksum.clone(),
            up: plan.up.clone(),
            down: plan.down.clone(),
            statements_applied: 0,
            status: LedgerStatus::Pending,
            created_at: Utc::now(),
            applied_at: None,
        }
    }
}

/// Storage abstraction for the migration ledger.
///
/// Implementations are expected to be append-only and to enforce the
/// single-pending-entry rule atomically with respect to their own
/// concurrency model.
#[async_trait]
pub trait MigrationLedger: Send + Sync {
    /// Prepare the backing store (create tables, files, ...).
    async fn initialize(&self) -> MigrateResult<()>;

    /// Record a plan as a new pending entry.
    ///
    /// Fails with [`MigrateError::PendingEntryExists`] if an unresolved
    /// entry already exists.
    async fn record(&self, plan: &MigrationPlan) -> MigrateResult<LedgerEntry>;

    /// Bump the applied-statement count of a pending entry to `count`.
    async fn mark_statement_applied(&self, migration_id: &str, count: usize)
        -> MigrateResult<()>;

    /// Resolve an entry to a terminal status.
    async fn finish(&self, migration_id: &str, status: LedgerStatus) -> MigrateResult<()>;

    /// The unresolved entry, if any.
    async fn pending(&self) -> MigrateResult<Option<LedgerEntry>>;

    /// All entries, oldest first.
    async fn history(&self) -> MigrateResult<Vec<LedgerEntry>>;

    /// Look up one entry by migration id.
    async fn get(&self, migration_id: &str) -> MigrateResult<Option<LedgerEntry>>;
}

/// In-memory ledger.
///
/// The reference implementation used by tests and embedded setups; a
/// durable implementation follows the same shape against its own store.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    entries: RwLock<Vec<LedgerEntry>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MigrationLedger for MemoryLedger {
    async fn initialize(&self) -> MigrateResult<()> {
        Ok(())
    }

    async fn record(&self, plan: &MigrationPlan) -> MigrateResult<LedgerEntry> {
        // Single write lock makes the pending check and the append atomic.
        let mut entries = self.entries.write().await;
        if let Some(pending) = entries.iter().find(|e| e.status.is_unresolved()) {
            return Err(MigrateError::PendingEntryExists(
                pending.migration_id.clone(),
            ));
        }
        let entry = LedgerEntry::from_plan(plan);
        entries.push(entry.clone());
        Ok(entry)
    }

    async fn mark_statement_applied(
        &self,
        migration_id: &str,
        count: usize,
    ) -> MigrateResult<()> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .iter_mut()
            .find(|e| e.migration_id == migration_id)
            .ok_or_else(|| MigrateError::EntryNotFound(migration_id.to_string()))?;
        entry.statements_applied = count;
        Ok(())
    }

    async fn finish(&self, migration_id: &str, status: LedgerStatus) -> MigrateResult<()> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .iter_mut()
            .find(|e| e.migration_id == migration_id)
            .ok_or_else(|| MigrateError::EntryNotFound(migration_id.to_string()))?;
        entry.status = status;
        entry.applied_at = Some(Utc::now());
        Ok(())
    }

    async fn pending(&self) -> MigrateResult<Option<LedgerEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.iter().find(|e| e.status.is_unresolved()).cloned())
    }

    async fn history(&self) -> MigrateResult<Vec<LedgerEntry>> {
        Ok(self.entries.read().await.clone())
    }

    async fn get(&self, migration_id: &str) -> MigrateResult<Option<LedgerEntry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .find(|e| e.migration_id == migration_id)
            .cloned())
    }
}
