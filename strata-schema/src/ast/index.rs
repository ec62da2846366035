//! Index definitions.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// An index on a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Index name.
    pub name: SmolStr,
    /// Indexed columns, order-significant.
    pub columns: Vec<SmolStr>,
    /// Index kind with kind-specific options.
    pub kind: IndexKind,
    /// Previous names, oldest first.
    pub rename_history: Vec<SmolStr>,
}

impl IndexDefinition {
    /// Create a standard index.
    pub fn new(name: impl Into<SmolStr>, columns: Vec<SmolStr>) -> Self {
        Self {
            name: name.into(),
            columns,
            kind: IndexKind::Standard,
            rename_history: Vec::new(),
        }
    }

    /// Index name as a string.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the index kind.
    pub fn kind(mut self, kind: IndexKind) -> Self {
        self.kind = kind;
        self
    }

    /// Record a previous name.
    pub fn was(mut self, previous: impl Into<SmolStr>) -> Self {
        self.rename_history.push(previous.into());
        self
    }

    /// The analyzer this index references, if it is a full-text index.
    pub fn analyzer(&self) -> Option<&str> {
        match &self.kind {
            IndexKind::FullText(opts) => Some(&opts.analyzer),
            _ => None,
        }
    }
}

/// Index kinds with their options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IndexKind {
    /// Plain btree-style index.
    Standard,
    /// Uniqueness-enforcing index.
    Unique,
    /// Hash index.
    Hash,
    /// Full-text search index.
    FullText(FullTextOptions),
    /// Approximate-nearest-neighbor vector index.
    Vector(VectorOptions),
}

impl IndexKind {
    /// Short label used in diffs and statements.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Unique => "unique",
            Self::Hash => "hash",
            Self::FullText(_) => "fulltext",
            Self::Vector(_) => "vector",
        }
    }
}

/// Options for a full-text index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullTextOptions {
    /// Name of the analyzer definition to tokenize with.
    pub analyzer: SmolStr,
    /// BM25 term-frequency saturation parameter.
    pub bm25_k1: f64,
    /// BM25 length-normalization parameter.
    pub bm25_b: f64,
    /// Whether to store highlight offsets.
    pub highlights: bool,
}

impl FullTextOptions {
    /// Options with the conventional BM25 defaults.
    pub fn new(analyzer: impl Into<SmolStr>) -> Self {
        Self {
            analyzer: analyzer.into(),
            bm25_k1: 1.2,
            bm25_b: 0.75,
            highlights: false,
        }
    }
}

/// Options for a vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorOptions {
    /// Vector dimension; must be non-zero.
    pub dimension: u32,
    /// Distance metric.
    pub metric: DistanceMetric,
    /// HNSW graph connectivity (edges per node).
    pub m: u16,
    /// HNSW construction beam width.
    pub ef_construction: u32,
}

impl VectorOptions {
    /// Options with conventional HNSW build parameters.
    pub fn new(dimension: u32, metric: DistanceMetric) -> Self {
        Self {
            dimension,
            metric,
            m: 12,
            ef_construction: 150,
        }
    }
}

/// Distance metric for vector indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Cosine similarity.
    Cosine,
    /// Euclidean (L2) distance.
    Euclidean,
    /// Manhattan (L1) distance.
    Manhattan,
}

impl DistanceMetric {
    /// Canonical keyword used in statements.
    pub fn as_keyword(&self) -> &'static str {
        match self {
            Self::Cosine => "COSINE",
            Self::Euclidean => "EUCLIDEAN",
            Self::Manhattan => "MANHATTAN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_kind_label() {
        let idx = IndexDefinition::new("user_email", vec!["email".into()]).kind(IndexKind::Unique);
        assert_eq!(idx.kind.label(), "unique");
    }

    #[test]
    fn test_fulltext_analyzer_reference() {
        let idx = IndexDefinition::new("post_title", vec!["title".into()])
            .kind(IndexKind::FullText(FullTextOptions::new("simple")));
        assert_eq!(idx.analyzer(), Some("simple"));
    }

    #[test]
    fn test_vector_defaults() {
        let opts = VectorOptions::new(768, DistanceMetric::Cosine);
        assert_eq!(opts.m, 12);
        assert_eq!(opts.ef_construction, 150);
    }
}
