//! Integration tests for the BBAnn harness adapter

use approx::assert_relative_eq;
use bbann::cli::run::{run_rounds, RunConfig};
use bbann::formats::{write_bin_file, write_knn_file};
use bbann::native::flat::FlatLibrary;
use bbann::utils::knn_recall;
use bbann::{AnyMatrix, BaseAnn, BbAnn, DataType, Dataset, KnnResults, LocalDataset, Matrix, Metric};
use serde_json::{json, Map, Value};
use std::path::Path;
use tempfile::TempDir;

/// Generate synthetic vectors for testing
fn generate_clustered_vectors(
    num_clusters: usize,
    vectors_per_cluster: usize,
    dimension: usize,
    cluster_spread: f32,
) -> Vec<Vec<f32>> {
    use rand::prelude::*;
    let mut rng = StdRng::seed_from_u64(42);
    let mut vectors = Vec::new();

    for _ in 0..num_clusters {
        let center: Vec<f32> = (0..dimension).map(|_| rng.gen_range(-10.0..10.0)).collect();
        for _ in 0..vectors_per_cluster {
            let vector: Vec<f32> = center
                .iter()
                .map(|&c| c + rng.gen_range(-cluster_spread..cluster_spread))
                .collect();
            vectors.push(vector);
        }
    }

    vectors.shuffle(&mut rng);
    vectors
}

/// Exact answers by brute force
fn brute_force(base: &[Vec<f32>], queries: &[Vec<f32>], k: usize, metric: Metric) -> KnnResults {
    let mut ids = Vec::new();
    let mut distances = Vec::new();
    for q in queries {
        let mut scored: Vec<(u32, f32)> = base
            .iter()
            .enumerate()
            .map(|(i, p)| (i as u32, metric.score(q.as_slice(), p.as_slice())))
            .collect();
        scored.sort_by(|a, b| metric.compare(a.1, b.1).then(a.0.cmp(&b.0)));
        for &(id, d) in scored.iter().take(k) {
            ids.push(id);
            distances.push(d);
        }
    }
    KnnResults::new(queries.len(), k, ids, distances).unwrap()
}

fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected a JSON object"),
    }
}

struct Fixture {
    dir: TempDir,
    base: Vec<Vec<f32>>,
    queries: Vec<Vec<f32>>,
    dataset: LocalDataset,
}

fn float_fixture(metric: Metric) -> Fixture {
    let dir = TempDir::new().unwrap();
    let base = generate_clustered_vectors(8, 50, 24, 0.5);
    let queries: Vec<Vec<f32>> = generate_clustered_vectors(4, 5, 24, 2.0);

    let base_file = dir.path().join("base.fbin");
    let query_file = dir.path().join("query.fbin");
    write_bin_file(&base_file, &Matrix::from_rows(&base).unwrap()).unwrap();
    write_bin_file(&query_file, &Matrix::from_rows(&queries).unwrap()).unwrap();

    let dataset = LocalDataset::open("clustered", &base_file, metric, DataType::Float32)
        .unwrap()
        .with_queries(&query_file);
    Fixture {
        dir,
        base,
        queries,
        dataset,
    }
}

fn adapter(root: &Path, index_params: Value) -> BbAnn {
    BbAnn::new(FlatLibrary, "euclidean", params(index_params))
        .unwrap()
        .with_index_root(root)
}

#[test]
fn test_fit_query_lifecycle() {
    let fx = float_fixture(Metric::L2);
    let mut algo = adapter(fx.dir.path(), json!({"identifier": "l2", "K1": 16, "blockSize": 4096}));

    assert!(algo.fit(&fx.dataset).unwrap());
    assert!(fx
        .dir
        .path()
        .join("bbann_index")
        .join("bbann_l2flat-meta.json")
        .exists());

    algo.set_query_arguments(&params(json!({"nProbe": 4}))).unwrap();
    let queries = fx.dataset.get_queries().unwrap();
    algo.query(&queries, 10).unwrap();

    let res = algo.get_results().unwrap();
    assert_eq!(res.num_queries(), fx.queries.len());
    assert_eq!(res.k(), 10);

    let gt = brute_force(&fx.base, &fx.queries, 10, Metric::L2);
    assert_relative_eq!(knn_recall(&gt, res, Metric::L2).unwrap(), 1.0);
    assert_eq!(res.neighbors(0), gt.neighbors(0));

    assert!(algo.get_memory_usage().map_or(true, |kb| kb > 0.0));
    algo.done();
}

#[test]
fn test_inner_product_dataset() {
    let fx = float_fixture(Metric::InnerProduct);
    let mut algo = adapter(fx.dir.path(), json!({"identifier": "ip"}));

    assert!(algo.fit(&fx.dataset).unwrap());
    assert_eq!(algo.parameters().metric, Metric::InnerProduct);

    algo.query(&fx.dataset.get_queries().unwrap(), 5).unwrap();
    let res = algo.get_results().unwrap();
    let gt = brute_force(&fx.base, &fx.queries, 5, Metric::InnerProduct);
    assert_relative_eq!(knn_recall(&gt, res, Metric::InnerProduct).unwrap(), 1.0);
    // larger inner products come first
    assert!(res.query_distances(0).windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn test_load_index_from_second_instance() {
    let fx = float_fixture(Metric::L2);

    let mut first = adapter(fx.dir.path(), json!({"identifier": "shared"}));
    assert!(first.fit(&fx.dataset).unwrap());
    first.query(&fx.dataset.get_queries().unwrap(), 3).unwrap();
    let expected = first.get_results().unwrap().clone();

    let mut second = adapter(fx.dir.path(), json!({"identifier": "shared"}));
    assert!(second.load_index(&fx.dataset).unwrap());
    second.query(&fx.dataset.get_queries().unwrap(), 3).unwrap();
    assert_eq!(second.get_results().unwrap(), &expected);
}

#[test]
fn test_load_index_without_index_dir() {
    let fx = float_fixture(Metric::L2);
    let mut algo = adapter(fx.dir.path(), json!({"identifier": "missing"}));
    assert!(!algo.load_index(&fx.dataset).unwrap());
    assert!(algo.index().is_none());
}

#[test]
fn test_load_index_with_dir_but_no_files() {
    let fx = float_fixture(Metric::L2);
    std::fs::create_dir_all(fx.dir.path().join("bbann_index")).unwrap();
    let mut algo = adapter(fx.dir.path(), json!({"identifier": "absent"}));
    assert!(algo.load_index(&fx.dataset).is_err());
}

#[test]
fn test_uint8_dataset_and_type_mismatch() {
    let dir = TempDir::new().unwrap();
    let base: Vec<Vec<u8>> = (0..64u8).map(|i| vec![i, i.wrapping_mul(3), 255 - i, 7]).collect();
    let base_file = dir.path().join("base.u8bin");
    let query_file = dir.path().join("query.u8bin");
    write_bin_file(&base_file, &Matrix::from_rows(&base).unwrap()).unwrap();
    write_bin_file(&query_file, &Matrix::from_rows(&base[10..14]).unwrap()).unwrap();

    let dataset = LocalDataset::open("bytes", &base_file, Metric::L2, DataType::UInt8)
        .unwrap()
        .with_queries(&query_file);
    let mut algo = adapter(dir.path(), json!({"identifier": "u8"}));
    assert!(algo.fit(&dataset).unwrap());

    algo.query(&dataset.get_queries().unwrap(), 1).unwrap();
    let res = algo.get_results().unwrap();
    assert_eq!(res.ids(), &[10, 11, 12, 13]);

    let floats = AnyMatrix::Float32(Matrix::new(vec![0.0; 4], 1, 4).unwrap());
    let err = algo.query(&floats, 1).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<bbann::Error>(),
        Some(bbann::Error::DataTypeMismatch { .. })
    ));
}

#[test]
fn test_range_query() {
    let fx = float_fixture(Metric::L2);
    let mut algo = adapter(fx.dir.path(), json!({"identifier": "range"}));
    assert!(algo.fit(&fx.dataset).unwrap());

    let queries = fx.dataset.get_queries().unwrap();
    algo.range_query(&queries, 25.0).unwrap();
    let res = algo.get_range_results().unwrap();
    assert_eq!(res.num_queries(), fx.queries.len());

    for (q, query) in fx.queries.iter().enumerate() {
        let expected = fx
            .base
            .iter()
            .filter(|p| Metric::L2.score(query.as_slice(), p.as_slice()) <= 25.0)
            .count();
        assert_eq!(res.query_ids(q).len(), expected);
    }
}

#[test]
fn test_run_rounds_reports_every_query_args() {
    let fx = float_fixture(Metric::L2);
    let gt_file = fx.dir.path().join("gt.bin");
    write_knn_file(&gt_file, &brute_force(&fx.base, &fx.queries, 10, Metric::L2)).unwrap();

    let config: RunConfig = serde_json::from_value(json!({
        "metric": "euclidean",
        "index_params": {"identifier": "rounds", "hnswM": 16},
        "query_args": [{"nProbe": 1}, {"nProbe": 8, "efSearch": 64}]
    }))
    .unwrap();

    let mut algo = BbAnn::new(FlatLibrary, &config.metric, config.index_params.clone())
        .unwrap()
        .with_index_root(fx.dir.path());
    assert!(algo.fit(&fx.dataset).unwrap());

    let reports = run_rounds(&mut algo, &fx.dataset, &config, 10, 2, Some(gt_file.as_path())).unwrap();
    assert_eq!(reports.len(), 2);
    for report in &reports {
        assert!(report.qps > 0.0);
        assert_relative_eq!(report.recall.unwrap(), 1.0);
    }
    assert_eq!(algo.parameters().n_probe, 8);
    assert_eq!(algo.parameters().ef_search, 64);
}

#[test]
fn test_unsupported_datasets_are_declined() {
    struct Angular(LocalDataset);

    impl Dataset for Angular {
        fn name(&self) -> &str {
            self.0.name()
        }
        fn d(&self) -> usize {
            self.0.d()
        }
        fn distance(&self) -> &str {
            "angular"
        }
        fn dtype(&self) -> &str {
            self.0.dtype()
        }
        fn get_dataset_fn(&self) -> std::path::PathBuf {
            self.0.get_dataset_fn()
        }
        fn get_queries(&self) -> bbann::Result<AnyMatrix> {
            self.0.get_queries()
        }
    }

    let fx = float_fixture(Metric::L2);
    let mut algo = adapter(fx.dir.path(), json!({"identifier": "angular"}));
    assert!(!algo.fit(&Angular(fx.dataset.clone())).unwrap());
    assert!(algo.index().is_none());
    assert!(!fx.dir.path().join("bbann_index").exists());
}
