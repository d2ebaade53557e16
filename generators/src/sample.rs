//! Sample vector query synthesis
//!
//! Produces a query file in the format [`VectorQueryGenerator`] loads, for
//! smoke-testing a vector-search deployment without real query data.
//!
//! [`VectorQueryGenerator`]: crate::VectorQueryGenerator

use std::io::Write;

use rand::Rng;
use stampede_core::QuantizationParams;

use crate::vector_query::{ConditionTemplate, FilterTemplate, ParamsTemplate, QueryTemplate};

/// Upper bound (exclusive) of the synthetic filter values
const FILTER_VALUE_RANGE: i64 = 300_000;

/// Shape of the generated query set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleSpec {
    /// Number of queries
    pub count: usize,
    /// Vector dimension
    pub dim: usize,
    /// Collection every query targets
    pub collection: String,
}

impl Default for SampleSpec {
    fn default() -> Self {
        Self {
            count: 100,
            dim: 64,
            collection: "my_collection".to_string(),
        }
    }
}

/// Generate `spec.count` random queries
pub fn sample_queries<R: Rng>(rng: &mut R, spec: &SampleSpec) -> Vec<QueryTemplate> {
    (0..spec.count)
        .map(|_| QueryTemplate {
            collection: spec.collection.clone(),
            query: (0..spec.dim).map(|_| rng.gen::<f32>()).collect(),
            params: Some(ParamsTemplate {
                hnsw_ef: 300,
                quantization: Some(QuantizationParams {
                    rescore: true,
                    oversampling: 2.0,
                }),
                indexed_only: false,
                exact: false,
            }),
            filter: Some(FilterTemplate {
                must: vec![
                    ConditionTemplate::match_integer(
                        "shop_id",
                        rng.gen_range(0..FILTER_VALUE_RANGE),
                    ),
                    ConditionTemplate::match_integer(
                        "groups",
                        rng.gen_range(0..FILTER_VALUE_RANGE),
                    ),
                ],
            }),
            limit: 100,
            with_payload: true,
            with_vectors: true,
            shard_keys: Vec::new(),
        })
        .collect()
}

/// Write a generated query set as a JSON array
pub fn write_sample_queries<R, W>(
    rng: &mut R,
    spec: &SampleSpec,
    writer: W,
) -> serde_json::Result<()>
where
    R: Rng,
    W: Write,
{
    serde_json::to_writer(writer, &sample_queries(rng, spec))
}
