//! # strata-schema
//!
//! The schema intermediate representation (IR) for the Strata
//! reconciliation engine, together with the normalizer that puts documents
//! into canonical form.
//!
//! Both sides of a reconciliation produce the same IR: the authoring layer
//! builds a [`SchemaDocument`] describing the desired schema, and an
//! introspection adapter builds one describing the live schema. The
//! comparator in `strata-migrate` only ever sees documents that have been
//! through [`normalize`], so every semantically-equivalent spelling — type
//! aliases, nullable wrappers, duration units, boolean expression
//! parenthesization — has already collapsed to one canonical form.
//!
//! ```rust
//! use strata_schema::ast::{FieldDefinition, SchemaDocument, TableDefinition};
//!
//! let mut desired = SchemaDocument::new();
//! desired.add_table(
//!     TableDefinition::new("user")
//!         .field(FieldDefinition::new("email", "string").assert("string::len($value) > 3"))
//!         .field(FieldDefinition::new("name", "option<string>")),
//! );
//!
//! strata_schema::validate(&desired).unwrap();
//! let canonical = strata_schema::normalize(&desired).unwrap();
//! assert!(canonical.get_table("user").unwrap().get_field("name").unwrap().optional);
//! ```

pub mod ast;
pub mod error;
pub mod normalize;
pub mod parser;
pub mod validator;

pub use ast::SchemaDocument;
pub use error::{SchemaError, SchemaResult};
pub use normalize::normalize;
pub use validator::validate;
