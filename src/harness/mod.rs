//! Benchmark harness boundary
//!
//! The harness owns datasets and drives every algorithm through the same
//! lifecycle: construct, `fit` or `load_index`, then rounds of
//! `set_query_arguments` / `query` / `get_results`. This module defines that
//! contract for Rust algorithms plus a dataset backed by local `.bin` files.

use crate::distance::Metric;
use crate::formats::{read_any_bin_file, read_bin_metadata};
use crate::native::{KnnResults, RangeResults};
use crate::types::{AnyMatrix, DataType};
use crate::{Error, Result};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};

/// Dataset as the harness describes it to algorithms
pub trait Dataset {
    /// Short dataset name
    fn name(&self) -> &str;

    /// Vector dimension
    fn d(&self) -> usize;

    /// Distance name (`"euclidean"`, `"ip"`, ...)
    fn distance(&self) -> &str;

    /// Element type name (`"float32"`, `"int8"`, `"uint8"`, ...)
    fn dtype(&self) -> &str;

    /// Path of the base vector file
    fn get_dataset_fn(&self) -> PathBuf;

    /// Query vectors
    fn get_queries(&self) -> Result<AnyMatrix>;
}

/// Dataset described by local `.bin` files
#[derive(Debug, Clone)]
pub struct LocalDataset {
    name: String,
    data_file: PathBuf,
    query_file: Option<PathBuf>,
    metric: Metric,
    data_type: DataType,
    dim: usize,
}

impl LocalDataset {
    /// Describe a base vector file; the dimension is read from its header
    pub fn open<P: AsRef<Path>>(
        name: &str,
        data_file: P,
        metric: Metric,
        data_type: DataType,
    ) -> Result<Self> {
        let data_file = data_file.as_ref().to_path_buf();
        let meta = read_bin_metadata(&data_file)?;
        Ok(Self {
            name: name.to_string(),
            data_file,
            query_file: None,
            metric,
            data_type,
            dim: meta.dim as usize,
        })
    }

    /// Attach a query vector file
    pub fn with_queries<P: AsRef<Path>>(mut self, query_file: P) -> Self {
        self.query_file = Some(query_file.as_ref().to_path_buf());
        self
    }

    /// Metric of the dataset
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Element type of the dataset
    pub fn data_type(&self) -> DataType {
        self.data_type
    }
}

impl Dataset for LocalDataset {
    fn name(&self) -> &str {
        &self.name
    }

    fn d(&self) -> usize {
        self.dim
    }

    fn distance(&self) -> &str {
        self.metric.harness_name()
    }

    fn dtype(&self) -> &str {
        self.data_type.harness_name()
    }

    fn get_dataset_fn(&self) -> PathBuf {
        self.data_file.clone()
    }

    fn get_queries(&self) -> Result<AnyMatrix> {
        let path = self.query_file.as_ref().ok_or_else(|| {
            Error::InvalidState(format!("dataset {} has no query file", self.name))
        })?;
        let queries = read_any_bin_file(path, self.data_type)?;
        let (_, dim) = queries.shape();
        if dim != self.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                actual: dim,
            }
            .into());
        }
        Ok(queries)
    }
}

/// Algorithm lifecycle expected by the harness
pub trait BaseAnn: fmt::Display {
    /// Build the index for `dataset`; the index is loaded afterwards.
    /// `Ok(false)` means the dataset is not supported.
    fn fit(&mut self, dataset: &dyn Dataset) -> Result<bool>;

    /// Load a previously built index; `Ok(false)` if none is available
    fn load_index(&mut self, dataset: &dyn Dataset) -> Result<bool>;

    /// Apply search-time options
    fn set_query_arguments(&mut self, _query_args: &Map<String, Value>) -> Result<()> {
        Ok(())
    }

    /// k-NN search for every row of `queries`
    fn query(&mut self, queries: &AnyMatrix, k: usize) -> Result<()>;

    /// Range search for every row of `queries`
    fn range_query(&mut self, _queries: &AnyMatrix, _radius: f32) -> Result<()> {
        Err(Error::InvalidState(format!("{} does not support range search", self)).into())
    }

    /// Results of the last `query`, `nq x k`
    fn get_results(&self) -> Result<&KnnResults>;

    /// Results of the last `range_query`
    fn get_range_results(&self) -> Result<&RangeResults> {
        Err(Error::InvalidState(format!("{} does not support range search", self)).into())
    }

    /// File name for the index
    fn index_name(&self) -> String;

    /// Memory usage of this process in kilobytes, if known
    fn get_memory_usage(&self) -> Option<f64> {
        process_memory_kb()
    }

    /// Extra per-run results to record
    fn get_additional(&self) -> Map<String, Value> {
        Map::new()
    }

    /// Release resources before the harness moves on
    fn done(&mut self) {}
}

/// Resident memory of the current process in kilobytes
pub fn process_memory_kb() -> Option<f64> {
    let pid = sysinfo::get_current_pid().ok()?;
    let mut system = sysinfo::System::new();
    system.refresh_process(pid);
    system.process(pid).map(|p| p.memory() as f64 / 1024.0)
}
