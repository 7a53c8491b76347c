//! BBAnn harness adapter
//!
//! [`BbAnn`] is the algorithm object the benchmark harness drives. It owns
//! the parameter bag, lazily constructs the typed native index matching the
//! dataset, and forwards build, load and search calls to it. All indexing
//! work happens in the native library behind [`IndexFactory`].

use crate::distance::Metric;
use crate::harness::{BaseAnn, Dataset};
use crate::native::flat::FlatLibrary;
use crate::native::{IndexFactory, KnnResults, RangeResults, TypedIndex};
use crate::params::{ApplyReport, BBAnnParameters, UnknownKeyPolicy};
use crate::types::{AnyMatrix, DataType};
use crate::utils::Timer;
use crate::{Error, Result};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};

/// Option names the adapter consumes itself instead of passing them to the index
pub const RESERVED_KEYS: &[&str] = &["identifier", "url"];

/// Directory, relative to the index root, that index files are stored in
pub const INDEX_DIR: &str = "bbann_index";

/// BBAnn algorithm as seen by the benchmark harness
pub struct BbAnn<F: IndexFactory = FlatLibrary> {
    factory: F,
    metric: String,
    index_params: Map<String, Value>,
    identifier: Option<String>,
    para: BBAnnParameters,
    policy: UnknownKeyPolicy,
    index_root: PathBuf,
    index: Option<TypedIndex>,
    res: Option<KnnResults>,
    range_res: Option<RangeResults>,
}

impl<F: IndexFactory> BbAnn<F> {
    /// Create the adapter; unknown index options are logged and skipped
    pub fn new(factory: F, metric: &str, index_params: Map<String, Value>) -> Result<Self> {
        Self::with_policy(factory, metric, index_params, UnknownKeyPolicy::Warn)
    }

    /// Create the adapter with an explicit policy for unknown options
    pub fn with_policy(
        factory: F,
        metric: &str,
        index_params: Map<String, Value>,
        policy: UnknownKeyPolicy,
    ) -> Result<Self> {
        let identifier = index_params.get("identifier").map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });

        log::info!("init BbAnn with the following parameters");
        let mut para = BBAnnParameters::default();
        para.apply(&index_params, policy, RESERVED_KEYS)?;

        let index_root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        Ok(Self {
            factory,
            metric: metric.to_string(),
            index_params,
            identifier,
            para,
            policy,
            index_root,
            index: None,
            res: None,
            range_res: None,
        })
    }

    /// Store indices under `root` instead of the current directory
    pub fn with_index_root<P: AsRef<Path>>(mut self, root: P) -> Self {
        self.index_root = root.as_ref().to_path_buf();
        self
    }

    /// Metric name the harness constructed the algorithm with
    pub fn metric(&self) -> &str {
        &self.metric
    }

    /// Current parameters
    pub fn parameters(&self) -> &BBAnnParameters {
        &self.para
    }

    /// The native index, once constructed
    pub fn index(&self) -> Option<&TypedIndex> {
        self.index.as_ref()
    }

    /// Folder in which the index is stored
    pub fn create_index_dir(&self, _dataset: &dyn Dataset) -> PathBuf {
        self.index_root.join(INDEX_DIR)
    }

    /// Select metric and element type from the dataset's names.
    ///
    /// Returns false, without constructing an index, when either is not
    /// supported. An index constructed earlier is kept as is.
    pub fn set_index_type(&mut self, ds_distance: &str, ds_dtype: &str) -> bool {
        let metric = match Metric::from_harness_name(ds_distance) {
            Some(metric) => metric,
            None => {
                log::error!("Unsupported distance function: {}", ds_distance);
                return false;
            }
        };
        self.para.metric = metric;

        if self.index.is_none() {
            let data_type = match DataType::from_harness_name(ds_dtype) {
                Some(data_type) => data_type,
                None => {
                    log::error!("Unsupported data type: {}", ds_dtype);
                    return false;
                }
            };
            log::debug!("constructing {} index with metric {}", data_type, metric);
            self.index = Some(self.factory.create(data_type, metric));
        }
        true
    }

    /// Apply search-time options onto the parameters
    pub fn apply_query_arguments(&mut self, query_args: &Map<String, Value>) -> Result<ApplyReport> {
        log::info!("query BbAnn with the following parameters");
        self.para.apply(query_args, self.policy, RESERVED_KEYS)
    }

    fn loaded_index(&self) -> Result<&TypedIndex> {
        self.index.as_ref().ok_or_else(|| {
            Error::InvalidState("no index; call fit or load_index first".to_string()).into()
        })
    }
}

impl<F: IndexFactory> fmt::Display for BbAnn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BBANN")
    }
}

impl<F: IndexFactory> BaseAnn for BbAnn<F> {
    fn fit(&mut self, dataset: &dyn Dataset) -> Result<bool> {
        let index_dir = self.create_index_dir(dataset);
        if !self.set_index_type(dataset.distance(), dataset.dtype()) {
            return Ok(false);
        }

        self.para.data_file_path = dataset.get_dataset_fn().to_string_lossy().into_owned();
        self.para.index_prefix_path = index_dir
            .join(self.index_name())
            .to_string_lossy()
            .into_owned();

        let index = self
            .index
            .as_mut()
            .ok_or_else(|| Error::InvalidState("index type was not set".to_string()))?;

        let timer = Timer::new();
        index.build(&self.para)?;
        log::info!("bbAnn index built in {:.3} s", timer.elapsed_secs());

        log::info!("Loading index from {}", self.para.index_prefix_path);
        index.load_index(&self.para.index_prefix_path)?;
        Ok(true)
    }

    fn load_index(&mut self, dataset: &dyn Dataset) -> Result<bool> {
        let index_dir = self.create_index_dir(dataset);
        if !index_dir.exists() && !self.index_params.contains_key("url") {
            return Ok(false);
        }
        let index_path = index_dir.join(self.index_name());

        if self.index.is_none() && !self.set_index_type(dataset.distance(), dataset.dtype()) {
            return Ok(false);
        }
        let index = self
            .index
            .as_mut()
            .ok_or_else(|| Error::InvalidState("index type was not set".to_string()))?;

        log::info!("Loading index from {}", index_path.display());
        index.load_index(&index_path.to_string_lossy())?;
        Ok(true)
    }

    fn set_query_arguments(&mut self, query_args: &Map<String, Value>) -> Result<()> {
        self.apply_query_arguments(query_args).map(|_| ())
    }

    fn query(&mut self, queries: &AnyMatrix, k: usize) -> Result<()> {
        let (nq, dim) = queries.shape();
        let res = self
            .loaded_index()?
            .batch_search(queries, dim, nq, k, &self.para)?;
        log::debug!("{:?}", res.to_rows());
        self.res = Some(res);
        Ok(())
    }

    fn range_query(&mut self, queries: &AnyMatrix, radius: f32) -> Result<()> {
        let (nq, dim) = queries.shape();
        let res = self
            .loaded_index()?
            .range_search(queries, dim, nq, radius, &self.para)?;
        log::debug!("range search found {} results for {} queries", res.ids().len(), nq);
        self.range_res = Some(res);
        Ok(())
    }

    fn get_results(&self) -> Result<&KnnResults> {
        self.res
            .as_ref()
            .ok_or_else(|| Error::InvalidState("no query has been run".to_string()).into())
    }

    fn get_range_results(&self) -> Result<&RangeResults> {
        self.range_res
            .as_ref()
            .ok_or_else(|| Error::InvalidState("no range query has been run".to_string()).into())
    }

    fn index_name(&self) -> String {
        format!("bbann_{}", self.identifier.as_deref().unwrap_or("default"))
    }
}
