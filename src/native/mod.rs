//! Native index library boundary
//!
//! The adapter never implements an index itself. It talks to the native
//! library through the narrow surface defined here: typed index constructors
//! keyed by element type ([`IndexFactory`]) and the per-index operations
//! build, load and batch search ([`AnnIndex`]).

pub mod flat;
mod results;

pub use results::{KnnResults, RangeResults};

use crate::distance::Metric;
use crate::params::BBAnnParameters;
use crate::types::{AnyMatrix, DataType, VectorElement};
use crate::{Error, Result};

/// Operations of one typed native index
pub trait AnnIndex<T: VectorElement>: Send + Sync {
    /// Metric the index was constructed with
    fn metric(&self) -> Metric;

    /// Build index files under `params.index_prefix_path` from `params.data_file_path`
    fn build(&mut self, params: &BBAnnParameters) -> Result<()>;

    /// Load a previously built index from its prefix path
    fn load_index(&mut self, index_prefix: &str) -> Result<()>;

    /// k-NN search for `num_queries` row-major queries of dimension `dim`
    fn batch_search(
        &self,
        queries: &[T],
        dim: usize,
        num_queries: usize,
        k: usize,
        params: &BBAnnParameters,
    ) -> Result<KnnResults>;

    /// All points within `radius` of each query
    fn range_search(
        &self,
        queries: &[T],
        dim: usize,
        num_queries: usize,
        radius: f32,
        params: &BBAnnParameters,
    ) -> Result<RangeResults>;
}

/// Typed index constructors of a native library
pub trait IndexFactory {
    /// float32 index
    fn float_index(&self, metric: Metric) -> Box<dyn AnnIndex<f32>>;

    /// int8 index
    fn int8_index(&self, metric: Metric) -> Box<dyn AnnIndex<i8>>;

    /// uint8 index
    fn uint8_index(&self, metric: Metric) -> Box<dyn AnnIndex<u8>>;

    /// Construct the index matching `data_type`
    fn create(&self, data_type: DataType, metric: Metric) -> TypedIndex {
        match data_type {
            DataType::Float32 => TypedIndex::Float32(self.float_index(metric)),
            DataType::Int8 => TypedIndex::Int8(self.int8_index(metric)),
            DataType::UInt8 => TypedIndex::UInt8(self.uint8_index(metric)),
        }
    }
}

/// A native index whose element type is chosen at runtime
pub enum TypedIndex {
    /// float32 index
    Float32(Box<dyn AnnIndex<f32>>),
    /// int8 index
    Int8(Box<dyn AnnIndex<i8>>),
    /// uint8 index
    UInt8(Box<dyn AnnIndex<u8>>),
}

impl std::fmt::Debug for TypedIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedIndex")
            .field("data_type", &self.data_type())
            .field("metric", &self.metric())
            .finish()
    }
}

impl TypedIndex {
    /// Element type of the index
    pub fn data_type(&self) -> DataType {
        match self {
            TypedIndex::Float32(_) => DataType::Float32,
            TypedIndex::Int8(_) => DataType::Int8,
            TypedIndex::UInt8(_) => DataType::UInt8,
        }
    }

    /// Metric of the index
    pub fn metric(&self) -> Metric {
        match self {
            TypedIndex::Float32(index) => index.metric(),
            TypedIndex::Int8(index) => index.metric(),
            TypedIndex::UInt8(index) => index.metric(),
        }
    }

    /// Build index files
    pub fn build(&mut self, params: &BBAnnParameters) -> Result<()> {
        match self {
            TypedIndex::Float32(index) => index.build(params),
            TypedIndex::Int8(index) => index.build(params),
            TypedIndex::UInt8(index) => index.build(params),
        }
    }

    /// Load index files
    pub fn load_index(&mut self, index_prefix: &str) -> Result<()> {
        match self {
            TypedIndex::Float32(index) => index.load_index(index_prefix),
            TypedIndex::Int8(index) => index.load_index(index_prefix),
            TypedIndex::UInt8(index) => index.load_index(index_prefix),
        }
    }

    /// k-NN search; the query element type must match the index
    pub fn batch_search(
        &self,
        queries: &AnyMatrix,
        dim: usize,
        num_queries: usize,
        k: usize,
        params: &BBAnnParameters,
    ) -> Result<KnnResults> {
        match self {
            TypedIndex::Float32(index) => {
                index.batch_search(self.queries(queries)?, dim, num_queries, k, params)
            }
            TypedIndex::Int8(index) => {
                index.batch_search(self.queries(queries)?, dim, num_queries, k, params)
            }
            TypedIndex::UInt8(index) => {
                index.batch_search(self.queries(queries)?, dim, num_queries, k, params)
            }
        }
    }

    /// Range search; the query element type must match the index
    pub fn range_search(
        &self,
        queries: &AnyMatrix,
        dim: usize,
        num_queries: usize,
        radius: f32,
        params: &BBAnnParameters,
    ) -> Result<RangeResults> {
        match self {
            TypedIndex::Float32(index) => {
                index.range_search(self.queries(queries)?, dim, num_queries, radius, params)
            }
            TypedIndex::Int8(index) => {
                index.range_search(self.queries(queries)?, dim, num_queries, radius, params)
            }
            TypedIndex::UInt8(index) => {
                index.range_search(self.queries(queries)?, dim, num_queries, radius, params)
            }
        }
    }

    fn queries<'a, T: VectorElement>(&self, queries: &'a AnyMatrix) -> Result<&'a [T]> {
        T::from_any(queries)
            .map(|m| m.as_slice())
            .ok_or_else(|| {
                Error::DataTypeMismatch {
                    expected: self.data_type(),
                    actual: queries.data_type(),
                }
                .into()
            })
    }
}

/// Check the shape of a flat query buffer against the call arguments
pub(crate) fn check_query_shape<T>(
    queries: &[T],
    dim: usize,
    num_queries: usize,
    index_dim: usize,
) -> Result<()> {
    if dim != index_dim {
        return Err(Error::DimensionMismatch {
            expected: index_dim,
            actual: dim,
        }
        .into());
    }
    if queries.len() != dim * num_queries {
        return Err(Error::DimensionMismatch {
            expected: dim * num_queries,
            actual: queries.len(),
        }
        .into());
    }
    Ok(())
}
