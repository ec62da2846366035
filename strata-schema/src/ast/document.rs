//! Top-level schema document.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::{SchemaError, SchemaResult};

use super::{
    AccessDefinition, AnalyzerDefinition, FunctionDefinition, ParamDefinition,
    SequenceDefinition, TableDefinition,
};

/// A complete schema document: the IR both the authoring layer and the
/// introspection layer produce, and the only thing the comparator consumes.
///
/// Entity names are unique within their kind (the keyed maps enforce this).
/// Documents are built once per reconciliation run and treated as
/// immutable afterwards; normalization returns a new document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    /// Tables, including relation tables, in declaration order.
    pub tables: IndexMap<SmolStr, TableDefinition>,
    /// User-defined functions.
    pub functions: IndexMap<SmolStr, FunctionDefinition>,
    /// Full-text analyzers.
    pub analyzers: IndexMap<SmolStr, AnalyzerDefinition>,
    /// Access methods.
    pub accesses: IndexMap<SmolStr, AccessDefinition>,
    /// Named params.
    pub params: IndexMap<SmolStr, ParamDefinition>,
    /// Id sequences.
    pub sequences: IndexMap<SmolStr, SequenceDefinition>,
}

impl SchemaDocument {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table, replacing any previous definition of the same name.
    pub fn add_table(&mut self, table: TableDefinition) {
        self.tables.insert(table.name.clone(), table);
    }

    /// Add a table, failing on a duplicate name.
    pub fn try_add_table(&mut self, table: TableDefinition) -> SchemaResult<()> {
        if self.tables.contains_key(&table.name) {
            return Err(SchemaError::duplicate("table", table.name.as_str()));
        }
        self.add_table(table);
        Ok(())
    }

    /// Add a function.
    pub fn add_function(&mut self, function: FunctionDefinition) {
        self.functions.insert(function.name.clone(), function);
    }

    /// Add an analyzer.
    pub fn add_analyzer(&mut self, analyzer: AnalyzerDefinition) {
        self.analyzers.insert(analyzer.name.clone(), analyzer);
    }

    /// Add an access method.
    pub fn add_access(&mut self, access: AccessDefinition) {
        self.accesses.insert(access.name.clone(), access);
    }

    /// Add a param.
    pub fn add_param(&mut self, param: ParamDefinition) {
        self.params.insert(param.name.clone(), param);
    }

    /// Add a sequence.
    pub fn add_sequence(&mut self, sequence: SequenceDefinition) {
        self.sequences.insert(sequence.name.clone(), sequence);
    }

    /// Get a table by name.
    pub fn get_table(&self, name: &str) -> Option<&TableDefinition> {
        self.tables.get(name)
    }

    /// Get a function by name.
    pub fn get_function(&self, name: &str) -> Option<&FunctionDefinition> {
        self.functions.get(name)
    }

    /// Get an analyzer by name.
    pub fn get_analyzer(&self, name: &str) -> Option<&AnalyzerDefinition> {
        self.analyzers.get(name)
    }

    /// All table names in declaration order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(|s| s.as_str())
    }

    /// Tables that are relation tables.
    pub fn relation_tables(&self) -> impl Iterator<Item = &TableDefinition> {
        self.tables.values().filter(|t| t.is_relation())
    }

    /// Whether the document declares nothing at all.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
            && self.functions.is_empty()
            && self.analyzers.is_empty()
            && self.accesses.is_empty()
            && self.params.is_empty()
            && self.sequences.is_empty()
    }

    /// Counts per entity kind, for summaries and logging.
    pub fn stats(&self) -> DocumentStats {
        DocumentStats {
            tables: self.tables.len(),
            relations: self.tables.values().filter(|t| t.is_relation()).count(),
            functions: self.functions.len(),
            analyzers: self.analyzers.len(),
            accesses: self.accesses.len(),
            params: self.params.len(),
            sequences: self.sequences.len(),
        }
    }
}

/// Entity counts for a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentStats {
    /// Total tables (including relation tables).
    pub tables: usize,
    /// Relation tables only.
    pub relations: usize,
    /// Functions.
    pub functions: usize,
    /// Analyzers.
    pub analyzers: usize,
    /// Access methods.
    pub accesses: usize,
    /// Params.
    pub params: usize,
    /// Sequences.
    pub sequences: usize,
}
