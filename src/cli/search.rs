//! Index searching command
//!
//! Loads an index built by `build`, runs one batch of k-NN or range queries,
//! reports throughput and, given ground truth, recall.

use clap::Args;
use console::style;
use std::path::PathBuf;
use std::time::Instant;

use super::build::index_prefix;
use super::{parse_data_type, parse_metric, spinner};
use crate::formats::{read_any_bin_file, read_knn_file, read_range_file, write_knn_file, write_range_file};
use crate::native::flat::FlatLibrary;
use crate::native::IndexFactory;
use crate::params::BBAnnParameters;
use crate::utils::{knn_id_recall, knn_recall, range_recall, Timer};

/// Arguments of the `search` command
#[derive(Args)]
pub struct SearchArgs {
    /// Element type of the index (float, int8, uint8)
    #[arg(short = 't', long)]
    pub data_type: String,

    /// Directory the index was built into
    #[arg(short, long)]
    pub index: PathBuf,

    /// Path to the query .bin file
    #[arg(short, long)]
    pub queries: PathBuf,

    /// Write answers here (knn or range layout)
    #[arg(short, long)]
    pub answer: Option<PathBuf>,

    /// Ground-truth file to compute recall against
    #[arg(short, long)]
    pub ground_truth: Option<PathBuf>,

    /// Distance metric (L2, IP)
    #[arg(short = 'm', long, default_value = "L2")]
    pub metric: String,

    /// Blocks probed per query
    #[arg(long, default_value = "2")]
    pub n_probe: u32,

    /// HNSW search beam width
    #[arg(long, default_value = "250")]
    pub ef_search: u32,

    /// Number of nearest neighbors to find
    #[arg(short, long, default_value = "10")]
    pub k: usize,

    /// Range search: find everything within this distance
    #[arg(long)]
    pub radius: Option<f32>,

    /// Radius multiplier for range search refinement
    #[arg(long, default_value = "1.0")]
    pub radius_factor: f32,

    /// Blocks probed per query in range search
    #[arg(long, default_value = "20")]
    pub range_search_probe_count: u32,

    /// Maximum number of queries to process
    #[arg(long)]
    pub max_queries: Option<usize>,
}

impl SearchArgs {
    /// Search parameters for these arguments
    pub fn parameters(&self) -> crate::Result<BBAnnParameters> {
        Ok(BBAnnParameters {
            index_prefix_path: index_prefix(&self.index),
            query_path: self.queries.to_string_lossy().into_owned(),
            ground_truth_file_path: self
                .ground_truth
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            metric: parse_metric(&self.metric)?,
            k: u32::try_from(self.k).map_err(|_| anyhow::anyhow!("k {} is too large", self.k))?,
            n_probe: self.n_probe,
            ef_search: self.ef_search,
            radius_factor: self.radius_factor,
            range_search_probe_count: self.range_search_probe_count,
            ..BBAnnParameters::default()
        })
    }
}

/// Search an index with one batch of queries
pub fn run(args: SearchArgs, cli: &crate::Cli) -> crate::Result<()> {
    let start_time = Instant::now();

    let data_type = parse_data_type(&args.data_type)?;
    let params = args.parameters()?;

    if !cli.no_progress {
        println!("{}", style("🔍 Searching BBAnn Index").bold().green());
        println!("  Index: {}", params.index_prefix_path);
        println!("  Queries: {}", params.query_path);
        match args.radius {
            Some(radius) => println!("  Radius: {}", radius),
            None => println!("  k: {}", args.k),
        }
        println!("  nProbe: {}", params.n_probe);
        println!();
    }

    let mut index = FlatLibrary.create(data_type, params.metric);
    index.load_index(&params.index_prefix_path)?;

    let mut queries = read_any_bin_file(&args.queries, data_type)?;
    if let Some(max) = args.max_queries {
        queries.truncate(max);
    }
    let (nq, dim) = queries.shape();
    if !cli.no_progress {
        println!(
            "✅ Loaded {} queries of dimension {}",
            style(nq).bold(),
            style(dim).bold()
        );
    }

    let pb = spinner(cli, "Searching...");
    let timer = Timer::new();
    let outcome = match args.radius {
        Some(radius) => index
            .range_search(&queries, dim, nq, radius, &params)
            .map(Answers::Range),
        None => index
            .batch_search(&queries, dim, nq, args.k, &params)
            .map(Answers::Knn),
    };
    let search_secs = timer.elapsed_secs();
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let answers = outcome?;

    let qps = if search_secs > 0.0 { nq as f64 / search_secs } else { f64::INFINITY };
    log::info!("search {} queries in {:.3} s, qps {:.1}", nq, search_secs, qps);

    if !cli.no_progress {
        println!("\n📊 Search Statistics:");
        println!("  Queries processed: {}", style(nq).bold());
        println!("  Search time: {}", style(format!("{:.3} s", search_secs)).bold());
        println!("  Queries per second: {}", style(format!("{:.0} QPS", qps)).bold());
    }

    if let Some(ref gt_path) = args.ground_truth {
        match &answers {
            Answers::Knn(res) => {
                let mut gt = read_knn_file(gt_path)?;
                gt.truncate(nq);
                let recall = knn_recall(&gt, res, params.metric)?;
                let id_recall = knn_id_recall(&gt, res)?;
                log::info!("recall {:.4}, id recall {:.4}", recall, id_recall);
                if !cli.no_progress {
                    println!("  Recall: {}", style(format!("{:.4}", recall)).bold().green());
                    println!("  Id recall: {}", style(format!("{:.4}", id_recall)).bold());
                }
            }
            Answers::Range(res) => {
                let mut gt = read_range_file(gt_path)?;
                gt.truncate(nq);
                let recall = range_recall(&gt, res)?;
                log::info!("range recall {:.4}", recall);
                if !cli.no_progress {
                    println!("  Recall: {}", style(format!("{:.4}", recall)).bold().green());
                }
            }
        }
    }

    if let Some(ref answer_path) = args.answer {
        match &answers {
            Answers::Knn(res) => write_knn_file(answer_path, res)?,
            Answers::Range(res) => write_range_file(answer_path, res)?,
        }
        if !cli.no_progress {
            println!("📁 Answers saved to: {}", answer_path.display());
        }
    }

    if !cli.no_progress {
        println!(
            "  Total time: {}",
            style(humantime::format_duration(start_time.elapsed())).bold()
        );
    }

    Ok(())
}

enum Answers {
    Knn(crate::native::KnnResults),
    Range(crate::native::RangeResults),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::build::{self, BuildArgs};
    use crate::distance::Metric;
    use crate::formats::write_bin_file;
    use crate::native::{KnnResults, RangeResults};
    use crate::types::Matrix;
    use approx::assert_relative_eq;

    #[test]
    fn test_parameters_from_args() {
        let args = SearchArgs {
            data_type: "float".to_string(),
            index: PathBuf::from("idx"),
            queries: PathBuf::from("query.fbin"),
            answer: None,
            ground_truth: Some(PathBuf::from("gt.bin")),
            metric: "ip".to_string(),
            n_probe: 8,
            ef_search: 64,
            k: 5,
            radius: None,
            radius_factor: 1.2,
            range_search_probe_count: 10,
            max_queries: None,
        };
        let params = args.parameters().unwrap();
        assert_eq!(params.index_prefix_path, "idx/");
        assert_eq!(params.ground_truth_file_path, "gt.bin");
        assert_eq!(params.metric, Metric::InnerProduct);
        assert_eq!(params.k, 5);
        assert_eq!(params.n_probe, 8);
        assert_eq!(params.range_search_probe_count, 10);
    }

    struct Workspace {
        dir: tempfile::TempDir,
        cli: crate::Cli,
    }

    impl Workspace {
        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        fn search_args(&self) -> SearchArgs {
            SearchArgs {
                data_type: "float".to_string(),
                index: self.path("idx"),
                queries: self.path("query.fbin"),
                answer: None,
                ground_truth: None,
                metric: "L2".to_string(),
                n_probe: 2,
                ef_search: 250,
                k: 1,
                radius: None,
                radius_factor: 1.0,
                range_search_probe_count: 20,
                max_queries: None,
            }
        }
    }

    /// Builds a four point index through the `build` command
    fn built_workspace() -> Workspace {
        let ws = Workspace {
            dir: tempfile::TempDir::new().unwrap(),
            cli: crate::Cli { verbose: false, no_progress: true },
        };
        let base = vec![vec![0.0f32, 0.0], vec![1.0, 0.0], vec![0.0, 2.0], vec![5.0, 5.0]];
        let queries = vec![vec![0.9f32, 0.1], vec![4.0, 4.0], vec![0.0, 1.9]];
        write_bin_file(ws.path("base.fbin"), &Matrix::from_rows(&base).unwrap()).unwrap();
        write_bin_file(ws.path("query.fbin"), &Matrix::from_rows(&queries).unwrap()).unwrap();

        let build_args = BuildArgs {
            data_type: "float".to_string(),
            data: ws.path("base.fbin"),
            output: ws.path("idx"),
            hnsw_m: 32,
            hnsw_ef_c: 500,
            metric: "L2".to_string(),
            k1: 20,
            pages_per_block: 1,
            vector_use_sq: false,
            use_hnsw_sq: false,
        };
        build::run(build_args, &ws.cli).unwrap();
        ws
    }

    #[test]
    fn test_build_then_knn_search_with_ground_truth() {
        let ws = built_workspace();
        let gt = KnnResults::new(3, 1, vec![1, 3, 2], vec![0.02, 2.0, 0.01]).unwrap();
        write_knn_file(ws.path("gt.bin"), &gt).unwrap();

        let mut args = ws.search_args();
        args.ground_truth = Some(ws.path("gt.bin"));
        args.answer = Some(ws.path("answer.bin"));
        run(args, &ws.cli).unwrap();

        let answers = read_knn_file(ws.path("answer.bin")).unwrap();
        assert_eq!(answers.ids(), gt.ids());
        assert_relative_eq!(knn_id_recall(&gt, &answers).unwrap(), 1.0);
    }

    #[test]
    fn test_build_then_range_search_with_ground_truth() {
        let ws = built_workspace();
        let gt = RangeResults::from_hits(vec![vec![(1, 0.02), (0, 0.82)], vec![], vec![(2, 0.01)]]);
        write_range_file(ws.path("range_gt.bin"), &gt).unwrap();

        let mut args = ws.search_args();
        args.radius = Some(1.0);
        args.max_queries = Some(2);
        args.ground_truth = Some(ws.path("range_gt.bin"));
        args.answer = Some(ws.path("range_answer.bin"));
        run(args, &ws.cli).unwrap();

        let answers = read_range_file(ws.path("range_answer.bin")).unwrap();
        assert_eq!(answers.num_queries(), 2);
        assert_eq!(answers.query_ids(0), &[1, 0]);
        assert!(answers.query_ids(1).is_empty());
    }

    #[test]
    fn test_search_rejects_corrupt_ground_truth() {
        let ws = built_workspace();
        std::fs::write(ws.path("bad_gt.bin"), [0xff; 8]).unwrap();

        let mut args = ws.search_args();
        args.ground_truth = Some(ws.path("bad_gt.bin"));
        assert!(run(args, &ws.cli).is_err());
    }
}
