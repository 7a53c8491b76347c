//! Harness run command
//!
//! Drives the adapter through the same lifecycle the benchmark harness uses:
//! load the index or fit it, then one timed query batch per set of query
//! arguments. The algorithm is described by a small JSON config:
//!
//! ```json
//! {
//!   "metric": "euclidean",
//!   "index_params": {"identifier": "demo", "K1": 64, "blockSize": 4096},
//!   "query_args": [{"nProbe": 2}, {"nProbe": 8}]
//! }
//! ```

use clap::Args;
use console::style;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::{parse_data_type, parse_metric, spinner};
use crate::adapter::BbAnn;
use crate::formats::read_knn_file;
use crate::harness::{BaseAnn, Dataset, LocalDataset};
use crate::native::flat::FlatLibrary;
use crate::params::UnknownKeyPolicy;
use crate::utils::{knn_recall, Metrics};

/// Arguments of the `run` command
#[derive(Args)]
pub struct RunArgs {
    /// Algorithm config (JSON)
    #[arg(short, long)]
    pub config: PathBuf,

    /// Path to the base .bin vector file
    #[arg(short, long)]
    pub data: PathBuf,

    /// Path to the query .bin file
    #[arg(short, long)]
    pub queries: PathBuf,

    /// Element type of the dataset (float32, int8, uint8)
    #[arg(short = 't', long)]
    pub data_type: String,

    /// Dataset distance (euclidean, ip)
    #[arg(short = 'm', long, default_value = "euclidean")]
    pub distance: String,

    /// Number of nearest neighbors to find
    #[arg(short, long, default_value = "10")]
    pub k: usize,

    /// Ground-truth file to compute recall against
    #[arg(short, long)]
    pub ground_truth: Option<PathBuf>,

    /// Directory that holds `bbann_index` (defaults to the current directory)
    #[arg(long)]
    pub index_root: Option<PathBuf>,

    /// Build even if an index can be loaded
    #[arg(long)]
    pub rebuild: bool,

    /// Fail on unknown option names instead of skipping them
    #[arg(long)]
    pub strict: bool,

    /// Timed repetitions of each query batch
    #[arg(long, default_value = "1")]
    pub runs: usize,
}

/// Algorithm definition consumed by `run`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RunConfig {
    /// Metric name handed to the algorithm constructor
    #[serde(default = "default_metric")]
    pub metric: String,
    /// Build-time options
    #[serde(default)]
    pub index_params: Map<String, Value>,
    /// One entry per query round
    #[serde(default)]
    pub query_args: Vec<Map<String, Value>>,
}

fn default_metric() -> String {
    "euclidean".to_string()
}

impl RunConfig {
    /// Read a config file
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| anyhow::anyhow!("opening config {}: {}", path.display(), e))?;
        let config = serde_json::from_reader(BufReader::new(file))?;
        Ok(config)
    }
}

/// Outcome of one query round
#[derive(Debug, Clone)]
pub struct RoundReport {
    /// Query arguments of the round
    pub query_args: Map<String, Value>,
    /// Best queries per second over the repetitions
    pub qps: f64,
    /// Recall against ground truth, if given
    pub recall: Option<f64>,
}

/// Run the harness lifecycle with an already constructed algorithm
pub fn run_rounds<A: BaseAnn>(
    algo: &mut A,
    dataset: &dyn Dataset,
    config: &RunConfig,
    k: usize,
    runs: usize,
    ground_truth: Option<&Path>,
) -> crate::Result<Vec<RoundReport>> {
    let queries = dataset.get_queries()?;
    let (nq, _) = queries.shape();
    let gt = ground_truth.map(read_knn_file).transpose()?;
    let metric = parse_metric(dataset.distance())?;

    let rounds: Vec<Map<String, Value>> = if config.query_args.is_empty() {
        vec![Map::new()]
    } else {
        config.query_args.clone()
    };

    let mut reports = Vec::with_capacity(rounds.len());
    for query_args in rounds {
        algo.set_query_arguments(&query_args)?;

        let mut metrics = Metrics::new();
        for _ in 0..runs.max(1) {
            metrics.measure(|| algo.query(&queries, k))?;
        }
        let qps = metrics.stats().throughput(nq);

        let recall = match &gt {
            Some(gt) => Some(knn_recall(gt, algo.get_results()?, metric)?),
            None => None,
        };
        log::info!("{} {:?}: qps {:.1}, recall {:?}", algo, query_args, qps, recall);
        reports.push(RoundReport { query_args, qps, recall });
    }
    Ok(reports)
}

/// Build or load the index described by the config, then run every query round
pub fn run(args: RunArgs, cli: &crate::Cli) -> crate::Result<()> {
    let start_time = Instant::now();

    let config = RunConfig::load(&args.config)?;
    let metric = parse_metric(&args.distance)?;
    let data_type = parse_data_type(&args.data_type)?;
    let name = args
        .data
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string());
    let dataset = LocalDataset::open(&name, &args.data, metric, data_type)?.with_queries(&args.queries);

    let policy = if args.strict {
        UnknownKeyPolicy::Reject
    } else {
        UnknownKeyPolicy::Warn
    };
    let mut algo = BbAnn::with_policy(FlatLibrary, &config.metric, config.index_params.clone(), policy)?;
    if let Some(ref root) = args.index_root {
        algo = algo.with_index_root(root);
    }

    if !cli.no_progress {
        println!("{}", style(format!("🏃 Running {}", algo)).bold().green());
        println!("  Dataset: {} ({}, {}, d={})", dataset.name(), dataset.distance(), dataset.dtype(), dataset.d());
        println!("  Index: {}", algo.index_name());
        println!("  Query rounds: {}", config.query_args.len().max(1));
        println!();
    }

    let loaded = !args.rebuild && algo.load_index(&dataset)?;
    if loaded {
        if !cli.no_progress {
            println!("✅ Loaded existing index");
        }
    } else {
        let pb = spinner(cli, "Building index...");
        let build_start = Instant::now();
        let fitted = algo.fit(&dataset);
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        if !fitted? {
            return Err(anyhow::anyhow!(
                "{} does not support {} / {}",
                algo,
                dataset.distance(),
                dataset.dtype()
            ));
        }
        if !cli.no_progress {
            println!(
                "✅ Index built in {}",
                style(humantime::format_duration(build_start.elapsed())).bold()
            );
        }
    }

    let reports = run_rounds(
        &mut algo,
        &dataset,
        &config,
        args.k,
        args.runs,
        args.ground_truth.as_deref(),
    )?;

    if !cli.no_progress {
        println!("\n📊 Results:");
        for report in &reports {
            let recall = report
                .recall
                .map_or_else(|| "-".to_string(), |r| format!("{:.4}", r));
            println!(
                "  {} → {} QPS, recall {}",
                Value::Object(report.query_args.clone()),
                style(format!("{:.0}", report.qps)).bold(),
                style(recall).bold().green()
            );
        }
        if let Some(kb) = algo.get_memory_usage() {
            println!("  Memory: {:.0} kB", kb);
        }
        println!(
            "  Total time: {}",
            style(humantime::format_duration(start_time.elapsed())).bold()
        );
    }

    algo.done();
    Ok(())
}
