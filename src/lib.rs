//! # Strata
//!
//! A schema reconciliation engine: declare the schema you want, introspect
//! the schema you have, and Strata plans the ordered, reversible statements
//! that converge one onto the other.
//!
//! Strata provides:
//! - A dialect-agnostic schema model with a canonicalizing normalizer
//! - Structural diffing with explicit, history-driven rename detection
//! - Reversible migration plans with dependency-ordered statements
//! - A checksummed, append-only migration ledger
//!
//! ## Quick Start
//!
//! ```rust
//! use strata::prelude::*;
//!
//! # fn main() -> strata::MigrateResult<()> {
//! let mut desired = SchemaDocument::new();
//! desired.add_table(
//!     TableDefinition::new("user")
//!         .field(FieldDefinition::new("email", "string"))
//!         .field(FieldDefinition::new("age", "int | none")),
//! );
//!
//! // Live state normally comes from an introspection adapter.
//! let live = SchemaDocument::new();
//!
//! let engine = ReconcileEngine::new(MemoryLedger::new());
//! let plan = engine.reconcile(&desired, &live)?;
//! assert_eq!(plan.up.len(), 3);
//! assert!(plan.up[0].starts_with("DEFINE TABLE user"));
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Schema model, normalizer and validator.
pub mod schema {
    pub use strata_schema::*;
}

/// Diffing, planning, the ledger and the reconciliation engine.
pub mod migrate {
    pub use strata_migrate::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::migrate::{
        MemoryLedger, MigrationPlan, ReconcileEngine, SchemaComparator,
    };
    pub use crate::schema::ast::{
        FieldDefinition, IndexDefinition, SchemaDocument, TableDefinition, TriggerDefinition,
    };
    pub use crate::schema::{normalize, validate};
}

// Re-export key types at the crate root
pub use migrate::{MigrateError, MigrateResult};
pub use schema::{SchemaDocument, SchemaError};
