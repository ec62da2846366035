//! The schema intermediate representation.
//!
//! Pure data: definitions carry no behavior beyond accessors and
//! construction-time validation. Both the authoring layer and the
//! introspection layer produce these types; the normalizer and comparator
//! consume them.

mod document;
mod entities;
mod expr;
mod field;
mod index;
mod permissions;
mod table;
mod trigger;

pub use document::{DocumentStats, SchemaDocument};
pub use entities::{
    AccessDefinition, AccessKind, AnalyzerDefinition, FunctionArg, FunctionDefinition,
    ParamDefinition, SequenceDefinition,
};
pub use expr::{Expression, TypeSignature};
pub use field::{FieldDefinition, FieldValue};
pub use index::{
    DistanceMetric, FullTextOptions, IndexDefinition, IndexKind, VectorOptions,
};
pub use permissions::{PermissionRule, Permissions};
pub use table::{SchemaMode, TableDefinition, TableKind};
pub use trigger::{TriggerDefinition, TriggerOperation};
