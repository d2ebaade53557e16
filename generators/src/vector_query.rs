//! File-sampled vector-search generator
//!
//! Entries are translated into [`VectorQuery`] objects once, at load time.
//! Generation then only picks one at random and wraps it in a request.

use std::path::Path;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use stampede_core::{
    MatchCondition, QuantizationParams, Request, RequestGenerator, SearchParams, VectorQuery,
};

use crate::error::SourceError;
use crate::{load_entries, seeded_rng};

/// One entry of a vector query file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryTemplate {
    /// Target collection (required)
    #[serde(default)]
    pub collection: String,

    /// Query vector (required, non-empty)
    #[serde(default)]
    pub query: Vec<f32>,

    /// Search parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<ParamsTemplate>,

    /// Filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterTemplate>,

    /// Result limit; `0` means unset
    #[serde(default, skip_serializing_if = "is_zero")]
    pub limit: u64,

    /// Return payloads
    #[serde(default)]
    pub with_payload: bool,

    /// Return vectors
    #[serde(default)]
    pub with_vectors: bool,

    /// Numeric shard keys
    #[serde(default)]
    pub shard_keys: Vec<u64>,
}

/// Search parameters as written in the file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamsTemplate {
    /// HNSW beam size; `0` means unset
    #[serde(default, skip_serializing_if = "is_zero")]
    pub hnsw_ef: u64,

    /// Quantization behaviour
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantization: Option<QuantizationParams>,

    /// Only search indexed segments
    #[serde(default)]
    pub indexed_only: bool,

    /// Exhaustive search
    #[serde(default)]
    pub exact: bool,
}

/// Filter as written in the file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterTemplate {
    /// Conditions that must all hold
    #[serde(default)]
    pub must: Vec<ConditionTemplate>,
}

/// One filter condition as written in the file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionTemplate {
    /// Payload field
    #[serde(default)]
    pub field: String,
    /// Value to compare with
    #[serde(default)]
    pub value: i64,
    /// Value type; only `integer` is supported
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Condition kind; only `match` is supported
    #[serde(default)]
    pub condition: String,
}

impl ConditionTemplate {
    /// Integer equality condition
    pub fn match_integer(field: impl Into<String>, value: i64) -> Self {
        Self {
            field: field.into(),
            value,
            kind: "integer".to_string(),
            condition: "match".to_string(),
        }
    }

    fn is_supported(&self) -> bool {
        self.condition == "match" && self.kind == "integer" && !self.field.is_empty()
    }
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

impl QueryTemplate {
    /// Translate into a query, or explain why the entry is unusable
    ///
    /// Unsupported filter conditions are skipped with a warning.
    pub fn translate(&self, index: usize) -> Result<VectorQuery, SourceError> {
        if self.collection.is_empty() {
            return Err(SourceError::entry(index, "no collection name"));
        }
        if self.query.is_empty() {
            return Err(SourceError::entry(index, "no query vector"));
        }

        let mut query = VectorQuery::new(self.collection.clone(), self.query.clone());

        if let Some(filter) = &self.filter {
            for condition in &filter.must {
                if !condition.is_supported() {
                    tracing::warn!(
                        index,
                        field = %condition.field,
                        condition = %condition.condition,
                        kind = %condition.kind,
                        "Skipping unsupported filter condition"
                    );
                    continue;
                }
                query.filter.push(MatchCondition {
                    field: condition.field.clone(),
                    value: condition.value,
                });
            }
        }

        query.params = self.params.as_ref().map(|params| SearchParams {
            hnsw_ef: (params.hnsw_ef != 0).then_some(params.hnsw_ef),
            exact: params.exact,
            indexed_only: params.indexed_only,
            quantization: params.quantization,
        });
        query.limit = (self.limit != 0).then_some(self.limit);
        query.with_payload = self.with_payload;
        query.with_vectors = self.with_vectors;
        query.shard_keys = self.shard_keys.clone();

        Ok(query)
    }
}

/// Picks one pre-translated query uniformly at random per emission
#[derive(Debug)]
pub struct VectorQueryGenerator {
    target: String,
    queries: Vec<Arc<VectorQuery>>,
    rng: StdRng,
}

impl VectorQueryGenerator {
    /// Load and translate queries from `path`
    ///
    /// # Errors
    ///
    /// Fails if the file is unreadable, not a JSON array, empty, or if any
    /// entry lacks a collection or query vector (reported by index).
    pub fn from_file(
        path: &Path,
        target: impl Into<String>,
        seed: Option<u64>,
    ) -> Result<Self, SourceError> {
        let templates: Vec<QueryTemplate> = load_entries(path)?;
        let generator = Self::from_templates(&templates, target, seed)?;
        tracing::info!(
            count = generator.len(),
            path = %path.display(),
            "Loaded vector queries"
        );
        Ok(generator)
    }

    /// Translate in-memory templates
    pub fn from_templates(
        templates: &[QueryTemplate],
        target: impl Into<String>,
        seed: Option<u64>,
    ) -> Result<Self, SourceError> {
        if templates.is_empty() {
            return Err(SourceError::InvalidBase("no queries given".to_string()));
        }

        let queries = templates
            .iter()
            .enumerate()
            .map(|(index, template)| template.translate(index).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            target: target.into(),
            queries,
            rng: seeded_rng(seed),
        })
    }

    /// Number of queries
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    /// Always false for a constructed generator
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

impl RequestGenerator for VectorQueryGenerator {
    fn name(&self) -> &str {
        "vector_query"
    }

    fn next_request(&mut self) -> Option<Request> {
        let index = self.rng.gen_range(0..self.queries.len());
        Some(Request::vector_query(
            self.target.clone(),
            Arc::clone(&self.queries[index]),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stampede_core::RequestPayload;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_source(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    #[test]
    fn test_full_entry_translation() {
        let file = write_source(
            r#"[{
                "collection": "my_collection",
                "query": [0.1, 0.2, 0.3],
                "params": {
                    "hnsw_ef": 300,
                    "quantization": {"rescore": true, "oversampling": 2.0},
                    "exact": true
                },
                "filter": {"must": [
                    {"field": "shop_id", "value": 12, "type": "integer", "condition": "match"},
                    {"field": "name", "value": 0, "type": "keyword", "condition": "match"},
                    {"field": "groups", "value": 7, "type": "integer", "condition": "match"}
                ]},
                "limit": 100,
                "with_payload": true,
                "with_vectors": false,
                "shard_keys": [1, 2]
            }]"#,
        );
        let mut generator =
            VectorQueryGenerator::from_file(file.path(), "http://localhost:6333", Some(3))
                .unwrap();
        let request = generator.next_request().unwrap();
        assert_eq!(request.target, "http://localhost:6333");

        let RequestPayload::VectorQuery(query) = &request.payload else {
            panic!("expected a vector query payload");
        };
        assert_eq!(query.collection, "my_collection");
        assert_eq!(query.vector, vec![0.1, 0.2, 0.3]);
        assert_eq!(
            query.filter,
            vec![
                MatchCondition {
                    field: "shop_id".into(),
                    value: 12
                },
                MatchCondition {
                    field: "groups".into(),
                    value: 7
                },
            ]
        );
        let params = query.params.as_ref().unwrap();
        assert_eq!(params.hnsw_ef, Some(300));
        assert!(params.exact);
        assert!(!params.indexed_only);
        assert_eq!(
            params.quantization,
            Some(QuantizationParams {
                rescore: true,
                oversampling: 2.0
            })
        );
        assert_eq!(query.limit, Some(100));
        assert!(query.with_payload);
        assert!(!query.with_vectors);
        assert_eq!(query.shard_keys, vec![1, 2]);
    }

    #[test]
    fn test_zero_values_mean_unset() {
        let template = QueryTemplate {
            collection: "c".into(),
            query: vec![1.0],
            params: Some(ParamsTemplate::default()),
            ..Default::default()
        };
        let query = template.translate(0).unwrap();
        assert_eq!(query.limit, None);
        assert_eq!(query.params.unwrap().hnsw_ef, None);
        assert!(query.filter.is_empty());
    }

    #[test]
    fn test_missing_collection_reports_index() {
        let file = write_source(
            r#"[{"collection": "c", "query": [1.0]}, {"query": [1.0]}]"#,
        );
        let err = VectorQueryGenerator::from_file(file.path(), "http://localhost:6333", None)
            .unwrap_err();
        match err {
            SourceError::InvalidEntry { index, reason } => {
                assert_eq!(index, 1);
                assert!(reason.contains("collection"));
            }
            other => panic!("expected invalid entry, got {:?}", other),
        }
    }

    #[test]
    fn test_condition_without_field_is_skipped() {
        let file = write_source(
            r#"[{
                "collection": "c",
                "query": [1.0],
                "filter": {"must": [
                    {"condition": "range", "type": "float"},
                    {"condition": "match", "type": "integer", "value": 3},
                    {"field": "shop_id", "value": 4, "type": "integer", "condition": "match"}
                ]}
            }]"#,
        );
        let mut generator =
            VectorQueryGenerator::from_file(file.path(), "http://localhost:6333", None).unwrap();
        let request = generator.next_request().unwrap();
        let RequestPayload::VectorQuery(query) = &request.payload else {
            panic!("expected a vector query payload");
        };
        assert_eq!(
            query.filter,
            vec![MatchCondition {
                field: "shop_id".into(),
                value: 4
            }]
        );
    }

    #[test]
    fn test_empty_query_vector_is_rejected() {
        let file = write_source(r#"[{"collection": "c", "query": []}]"#);
        let err = VectorQueryGenerator::from_file(file.path(), "http://localhost:6333", None)
            .unwrap_err();
        assert!(matches!(err, SourceError::InvalidEntry { index: 0, .. }));
    }

    #[test]
    fn test_queries_are_shared_not_copied() {
        let templates = vec![QueryTemplate {
            collection: "c".into(),
            query: vec![1.0; 64],
            ..Default::default()
        }];
        let mut generator =
            VectorQueryGenerator::from_templates(&templates, "http://localhost:6333", None)
                .unwrap();
        let first = generator.next_request().unwrap();
        let second = generator.next_request().unwrap();
        match (&first.payload, &second.payload) {
            (RequestPayload::VectorQuery(a), RequestPayload::VectorQuery(b)) => {
                assert!(Arc::ptr_eq(a, b))
            }
            _ => panic!("expected vector query payloads"),
        }
    }
}
