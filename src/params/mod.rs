//! Index parameters and option-map validation
//!
//! Harness configurations arrive as loosely-typed maps of option names to
//! values. Every name the native library understands is enumerated in
//! [`ParamKey`]; applying a map parses each recognized key into its typed
//! field and reports (or rejects) the rest.

use crate::distance::Metric;
use crate::{Error, Result};
use serde_json::{Map, Value};
use std::fmt;

/// Parameters shared by index build and search
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct BBAnnParameters {
    /// Raw vector file the index is built from
    pub data_file_path: String,
    /// Path prefix that index files are written under
    pub index_prefix_path: String,
    /// Query vector file (command-line search)
    pub query_path: String,
    /// Ground-truth file (command-line search)
    pub ground_truth_file_path: String,
    /// Distance metric
    pub metric: Metric,
    /// Top k
    pub k: u32,
    /// HNSW out-degree over block centroids
    pub hnsw_m: u32,
    /// HNSW construction beam width
    pub hnsw_ef_c: u32,
    /// Number of first-level clusters
    pub k1: u32,
    /// Bytes per disk block
    pub block_size: u64,
    /// Blocks probed per query
    pub n_probe: u32,
    /// HNSW search beam width
    pub ef_search: u32,
    /// Store block vectors scalar-quantized
    pub vector_use_sq: bool,
    /// Store HNSW centroids scalar-quantized
    pub use_hnsw_sq: bool,
    /// Radius multiplier for range search refinement
    pub radius_factor: f32,
    /// Blocks probed per query in range search
    pub range_search_probe_count: u32,
}

impl Default for BBAnnParameters {
    fn default() -> Self {
        Self {
            data_file_path: String::new(),
            index_prefix_path: String::new(),
            query_path: String::new(),
            ground_truth_file_path: String::new(),
            metric: Metric::L2,
            k: 20,
            hnsw_m: 32,
            hnsw_ef_c: 500,
            k1: 20,
            block_size: 1,
            n_probe: 2,
            ef_search: 250,
            vector_use_sq: false,
            use_hnsw_sq: false,
            radius_factor: 1.0,
            range_search_probe_count: 20,
        }
    }
}

/// Every option name the parameter struct recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKey {
    /// `dataFilePath`
    DataFilePath,
    /// `indexPrefixPath`
    IndexPrefixPath,
    /// `queryPath`
    QueryPath,
    /// `groundTruthFilePath`
    GroundTruthFilePath,
    /// `metric`
    Metric,
    /// `K`
    K,
    /// `hnswM`
    HnswM,
    /// `hnswefC`
    HnswEfC,
    /// `K1`
    K1,
    /// `blockSize`
    BlockSize,
    /// `nProbe`
    NProbe,
    /// `efSearch`
    EfSearch,
    /// `vector_use_sq`
    VectorUseSq,
    /// `use_hnsw_sq`
    UseHnswSq,
    /// `radiusFactor`
    RadiusFactor,
    /// `rangeSearchProbeCount`
    RangeSearchProbeCount,
}

impl ParamKey {
    /// All keys, in declaration order
    pub const ALL: [ParamKey; 16] = [
        ParamKey::DataFilePath,
        ParamKey::IndexPrefixPath,
        ParamKey::QueryPath,
        ParamKey::GroundTruthFilePath,
        ParamKey::Metric,
        ParamKey::K,
        ParamKey::HnswM,
        ParamKey::HnswEfC,
        ParamKey::K1,
        ParamKey::BlockSize,
        ParamKey::NProbe,
        ParamKey::EfSearch,
        ParamKey::VectorUseSq,
        ParamKey::UseHnswSq,
        ParamKey::RadiusFactor,
        ParamKey::RangeSearchProbeCount,
    ];

    /// Option name as the native library spells it
    pub fn name(&self) -> &'static str {
        match self {
            ParamKey::DataFilePath => "dataFilePath",
            ParamKey::IndexPrefixPath => "indexPrefixPath",
            ParamKey::QueryPath => "queryPath",
            ParamKey::GroundTruthFilePath => "groundTruthFilePath",
            ParamKey::Metric => "metric",
            ParamKey::K => "K",
            ParamKey::HnswM => "hnswM",
            ParamKey::HnswEfC => "hnswefC",
            ParamKey::K1 => "K1",
            ParamKey::BlockSize => "blockSize",
            ParamKey::NProbe => "nProbe",
            ParamKey::EfSearch => "efSearch",
            ParamKey::VectorUseSq => "vector_use_sq",
            ParamKey::UseHnswSq => "use_hnsw_sq",
            ParamKey::RadiusFactor => "radiusFactor",
            ParamKey::RangeSearchProbeCount => "rangeSearchProbeCount",
        }
    }

    /// Snake-case alias, where it differs from the native name
    fn alias(&self) -> Option<&'static str> {
        match self {
            ParamKey::DataFilePath => Some("data_file_path"),
            ParamKey::IndexPrefixPath => Some("index_prefix_path"),
            ParamKey::QueryPath => Some("query_path"),
            ParamKey::GroundTruthFilePath => Some("ground_truth_file_path"),
            ParamKey::K => Some("k"),
            ParamKey::HnswM => Some("hnsw_m"),
            ParamKey::HnswEfC => Some("hnsw_ef_c"),
            ParamKey::K1 => Some("k1"),
            ParamKey::BlockSize => Some("block_size"),
            ParamKey::NProbe => Some("n_probe"),
            ParamKey::EfSearch => Some("ef_search"),
            ParamKey::RadiusFactor => Some("radius_factor"),
            ParamKey::RangeSearchProbeCount => Some("range_search_probe_count"),
            ParamKey::Metric | ParamKey::VectorUseSq | ParamKey::UseHnswSq => None,
        }
    }

    /// Look up an option name (native spelling or snake-case alias)
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|key| key.name() == name || key.alias() == Some(name))
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What to do with option names that are not in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownKeyPolicy {
    /// Log a warning and carry on
    #[default]
    Warn,
    /// Fail the whole application
    Reject,
}

/// Outcome of applying an option map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    /// Keys that were written into the parameters
    pub applied: Vec<ParamKey>,
    /// Unrecognized option names that were skipped
    pub ignored: Vec<String>,
}

impl BBAnnParameters {
    /// Set a single field from an option value
    pub fn set(&mut self, key: ParamKey, value: &Value) -> Result<()> {
        match key {
            ParamKey::DataFilePath => self.data_file_path = as_string(key, value)?,
            ParamKey::IndexPrefixPath => self.index_prefix_path = as_string(key, value)?,
            ParamKey::QueryPath => self.query_path = as_string(key, value)?,
            ParamKey::GroundTruthFilePath => self.ground_truth_file_path = as_string(key, value)?,
            ParamKey::Metric => {
                let name = as_string(key, value)?;
                self.metric = Metric::from_native_name(&name).ok_or_else(|| {
                    Error::InvalidParameter(format!("{}: unknown metric '{}'", key, name))
                })?;
            }
            ParamKey::K => self.k = as_u32(key, value)?,
            ParamKey::HnswM => self.hnsw_m = as_u32(key, value)?,
            ParamKey::HnswEfC => self.hnsw_ef_c = as_u32(key, value)?,
            ParamKey::K1 => self.k1 = as_u32(key, value)?,
            ParamKey::BlockSize => self.block_size = as_u64(key, value)?,
            ParamKey::NProbe => self.n_probe = as_u32(key, value)?,
            ParamKey::EfSearch => self.ef_search = as_u32(key, value)?,
            ParamKey::VectorUseSq => self.vector_use_sq = as_bool(key, value)?,
            ParamKey::UseHnswSq => self.use_hnsw_sq = as_bool(key, value)?,
            ParamKey::RadiusFactor => self.radius_factor = as_f32(key, value)?,
            ParamKey::RangeSearchProbeCount => self.range_search_probe_count = as_u32(key, value)?,
        }
        Ok(())
    }

    /// Current value of a field
    pub fn get(&self, key: ParamKey) -> Value {
        match key {
            ParamKey::DataFilePath => Value::from(self.data_file_path.clone()),
            ParamKey::IndexPrefixPath => Value::from(self.index_prefix_path.clone()),
            ParamKey::QueryPath => Value::from(self.query_path.clone()),
            ParamKey::GroundTruthFilePath => Value::from(self.ground_truth_file_path.clone()),
            ParamKey::Metric => Value::from(self.metric.native_name()),
            ParamKey::K => Value::from(self.k),
            ParamKey::HnswM => Value::from(self.hnsw_m),
            ParamKey::HnswEfC => Value::from(self.hnsw_ef_c),
            ParamKey::K1 => Value::from(self.k1),
            ParamKey::BlockSize => Value::from(self.block_size),
            ParamKey::NProbe => Value::from(self.n_probe),
            ParamKey::EfSearch => Value::from(self.ef_search),
            ParamKey::VectorUseSq => Value::from(self.vector_use_sq),
            ParamKey::UseHnswSq => Value::from(self.use_hnsw_sq),
            ParamKey::RadiusFactor => Value::from(self.radius_factor),
            ParamKey::RangeSearchProbeCount => Value::from(self.range_search_probe_count),
        }
    }

    /// Apply an option map.
    ///
    /// Names listed in `reserved` belong to the caller and are skipped
    /// without a report. Either every recognized key is applied or, on the
    /// first error, none is.
    pub fn apply(
        &mut self,
        options: &Map<String, Value>,
        policy: UnknownKeyPolicy,
        reserved: &[&str],
    ) -> Result<ApplyReport> {
        let mut next = self.clone();
        let mut report = ApplyReport::default();

        for (name, value) in options {
            log::info!("{} {}", name, value);
            if reserved.contains(&name.as_str()) {
                continue;
            }
            match ParamKey::parse(name) {
                Some(key) => {
                    next.set(key, value)?;
                    report.applied.push(key);
                }
                None => match policy {
                    UnknownKeyPolicy::Warn => {
                        log::warn!("ignoring unknown parameter '{}'", name);
                        report.ignored.push(name.clone());
                    }
                    UnknownKeyPolicy::Reject => {
                        return Err(Error::UnknownParameter(name.clone()).into());
                    }
                },
            }
        }

        *self = next;
        Ok(report)
    }

    /// All fields as an option map keyed by native names
    pub fn to_options(&self) -> Map<String, Value> {
        ParamKey::ALL
            .iter()
            .map(|key| (key.name().to_string(), self.get(*key)))
            .collect()
    }
}

fn as_string(key: ParamKey, value: &Value) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| type_error(key, "a string", value))
}

fn as_u64(key: ParamKey, value: &Value) -> Result<u64> {
    value
        .as_u64()
        .ok_or_else(|| type_error(key, "a non-negative integer", value))
}

fn as_u32(key: ParamKey, value: &Value) -> Result<u32> {
    let wide = as_u64(key, value)?;
    u32::try_from(wide).map_err(|_| type_error(key, "an integer below 2^32", value))
}

fn as_f32(key: ParamKey, value: &Value) -> Result<f32> {
    value
        .as_f64()
        .map(|v| v as f32)
        .ok_or_else(|| type_error(key, "a number", value))
}

// The native command-line tools pass switches as 0 / 1
fn as_bool(key: ParamKey, value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) if n.as_u64() == Some(0) => Ok(false),
        Value::Number(n) if n.as_u64() == Some(1) => Ok(true),
        _ => Err(type_error(key, "a boolean or 0/1", value)),
    }
}

fn type_error(key: ParamKey, expected: &str, value: &Value) -> anyhow::Error {
    Error::InvalidParameter(format!("{} must be {}, got {}", key, expected, value)).into()
}
