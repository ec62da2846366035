//! # strata-migrate
//!
//! Schema reconciliation engine for Strata.
//!
//! This crate provides functionality for:
//! - Structural diffing between a desired and a live schema document
//! - Explicit rename detection driven by declared rename history
//! - Reversible migration planning with dependency-ordered statements
//! - Checksummed, append-only migration ledger with pending-entry locking
//! - Sequential statement application with connectivity retries
//!
//! ## Architecture
//!
//! Reconciliation is one-directional convergence: both documents are
//! normalized, compared into a change set, and the change set is planned
//! into ordered statement text. Execution is delegated to an adapter; the
//! ledger records every run.
//!
//! ```text
//! ┌───────────────┐     ┌──────────────┐     ┌───────────────┐
//! │ Desired model │────▶│  Comparator  │────▶│    Planner    │
//! └───────────────┘     └──────────────┘     └───────────────┘
//!         ▲                     ▲                    │
//! ┌───────────────┐     ┌──────────────┐            ▼
//! │  Normalizer   │◀────│  Live model  │     ┌───────────────┐
//! └───────────────┘     └──────────────┘     │   Executor    │
//!                                            └───────────────┘
//!                                                    │
//!                                                    ▼
//!                                            ┌───────────────┐
//!                                            │    Ledger     │
//!                                            └───────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_migrate::{MemoryLedger, ReconcileEngine};
//!
//! async fn run(desired: strata_schema::SchemaDocument) -> strata_migrate::MigrateResult<()> {
//!     let engine = ReconcileEngine::new(MemoryLedger::new());
//!
//!     // Introspect the target through your LiveStateProvider adapter.
//!     let provider = /* your introspection adapter */;
//!     let plan = engine.reconcile_live(&desired, &provider).await?;
//!     println!("{}", plan.summary());
//!
//!     // Execute through your StatementExecutor adapter.
//!     let executor = /* your execution adapter */;
//!     engine.apply(&plan, &executor).await?.into_result()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Recovery
//!
//! There is no resume-from-checkpoint. A failed or cancelled apply leaves
//! its ledger entry with the confirmed statement count; the next
//! reconciliation re-introspects live state and plans a fresh migration,
//! which naturally omits whatever already converged.

pub mod diff;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod plan;
pub mod render;

pub use diff::{ChangeEntry, ChangeKind, ChangeSet, EntityDef, EntityPath, PropertyDiff,
    SchemaComparator};
pub use engine::{
    ApplyResult, EngineStatus, LiveStateProvider, ReconcileEngine, RetryPolicy, RollbackTarget,
    StatementExecutor,
};
pub use error::{ExecutionError, MigrateError, MigrateResult};
pub use ledger::{LedgerEntry, LedgerStatus, MemoryLedger, MigrationLedger};
pub use plan::{MigrationPlan, MigrationPlanner, REDEFINE_THRESHOLD};
