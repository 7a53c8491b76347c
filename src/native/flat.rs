//! Exhaustive-scan reference backend
//!
//! Implements the native library contract without any approximation: `build`
//! copies the raw vectors next to the index prefix, `load_index` memory-maps
//! them, and searches scan every point. It lets the adapter run end to end
//! when the native BBAnn library is not linked, and gives exact answers to
//! compare approximate backends against.

use super::{check_query_shape, AnnIndex, IndexFactory, KnnResults, RangeResults};
use crate::distance::Metric;
use crate::formats::{read_bin_file, write_bin_file, BinMetadata};
use crate::params::BBAnnParameters;
use crate::types::{DataType, Matrix, VectorElement};
use crate::utils::TimeRecorder;
use crate::{Error, Result};
use anyhow::Context;
use memmap2::Mmap;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::Path;

/// Suffix of the vector file written under the index prefix
pub const DATA_SUFFIX: &str = "flat-data.bin";

/// Suffix of the metadata file written under the index prefix
pub const META_SUFFIX: &str = "flat-meta.json";

/// Index constructors for the reference backend
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatLibrary;

impl IndexFactory for FlatLibrary {
    fn float_index(&self, metric: Metric) -> Box<dyn AnnIndex<f32>> {
        Box::new(FlatIndex::<f32>::new(metric))
    }

    fn int8_index(&self, metric: Metric) -> Box<dyn AnnIndex<i8>> {
        Box::new(FlatIndex::<i8>::new(metric))
    }

    fn uint8_index(&self, metric: Metric) -> Box<dyn AnnIndex<u8>> {
        Box::new(FlatIndex::<u8>::new(metric))
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct FlatMeta {
    metric: Metric,
    data_type: DataType,
    num_points: u32,
    dim: u32,
}

struct FlatStorage {
    mmap: Mmap,
    num_points: usize,
    dim: usize,
}

impl FlatStorage {
    fn vectors<T: VectorElement>(&self) -> &[T] {
        // alignment and length were checked when the map was opened
        bytemuck::cast_slice(&self.mmap[BinMetadata::SIZE as usize..])
    }
}

/// Exact index over memory-mapped vectors
pub struct FlatIndex<T: VectorElement> {
    metric: Metric,
    storage: Option<FlatStorage>,
    _marker: PhantomData<T>,
}

/// Scored point, ordered so that the heap top is the worst kept candidate
#[derive(Debug, Clone, Copy)]
struct Candidate {
    // smaller is better regardless of metric
    key: f32,
    id: u32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.total_cmp(&other.key).then(self.id.cmp(&other.id))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: VectorElement> FlatIndex<T> {
    /// Create an unloaded index
    pub fn new(metric: Metric) -> Self {
        Self {
            metric,
            storage: None,
            _marker: PhantomData,
        }
    }

    /// Number of indexed points (0 until loaded)
    pub fn len(&self) -> usize {
        self.storage.as_ref().map_or(0, |s| s.num_points)
    }

    /// True if nothing is loaded or the index holds no points
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vector dimension, once loaded
    pub fn dim(&self) -> Option<usize> {
        self.storage.as_ref().map(|s| s.dim)
    }

    fn loaded(&self) -> Result<&FlatStorage> {
        self.storage
            .as_ref()
            .ok_or_else(|| Error::InvalidState("index is not loaded".to_string()).into())
    }

    fn key(&self, score: f32) -> f32 {
        match self.metric {
            Metric::L2 => score,
            Metric::InnerProduct => -score,
        }
    }

    fn top_k(&self, storage: &FlatStorage, query: &[T], k: usize) -> (Vec<u32>, Vec<f32>) {
        let mut heap = BinaryHeap::with_capacity(k + 1);
        if k > 0 {
            for (id, point) in storage.vectors::<T>().chunks_exact(storage.dim).enumerate() {
                let key = self.key(self.metric.score(query, point));
                if heap.len() < k {
                    heap.push(Candidate { key, id: id as u32 });
                } else if let Some(worst) = heap.peek() {
                    if key < worst.key {
                        heap.pop();
                        heap.push(Candidate { key, id: id as u32 });
                    }
                }
            }
        }

        let found = heap.into_sorted_vec();
        let mut ids = Vec::with_capacity(k);
        let mut distances = Vec::with_capacity(k);
        for c in &found {
            ids.push(c.id);
            distances.push(self.key(c.key));
        }
        ids.resize(k, KnnResults::MISSING_ID);
        distances.resize(k, self.metric.worst_score());
        (ids, distances)
    }

    fn within(&self, storage: &FlatStorage, query: &[T], radius: f32) -> Vec<(u32, f32)> {
        let mut hits: Vec<(u32, f32)> = storage
            .vectors::<T>()
            .chunks_exact(storage.dim)
            .enumerate()
            .filter_map(|(id, point)| {
                let score = self.metric.score(query, point);
                self.metric.within(score, radius).then_some((id as u32, score))
            })
            .collect();
        hits.sort_by(|a, b| self.metric.compare(a.1, b.1).then(a.0.cmp(&b.0)));
        hits
    }
}

fn data_path(prefix: &str) -> String {
    format!("{}{}", prefix, DATA_SUFFIX)
}

fn meta_path(prefix: &str) -> String {
    format!("{}{}", prefix, META_SUFFIX)
}

impl<T: VectorElement> AnnIndex<T> for FlatIndex<T> {
    fn metric(&self) -> Metric {
        self.metric
    }

    fn build(&mut self, params: &BBAnnParameters) -> Result<()> {
        let mut rc = TimeRecorder::new("flat build");
        let prefix = params.index_prefix_path.as_str();
        if prefix.is_empty() {
            return Err(Error::InvalidParameter("indexPrefixPath is empty".to_string()).into());
        }

        let data: Matrix<T> = read_bin_file(&params.data_file_path)?;
        rc.record_section(&format!("read {}", params.data_file_path));

        let data_file = data_path(prefix);
        if let Some(parent) = Path::new(&data_file).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }

        write_bin_file(&data_file, &data)?;
        let (num_points, dim) = data.shape();
        let meta = FlatMeta {
            metric: self.metric,
            data_type: T::DATA_TYPE,
            num_points: num_points as u32,
            dim: dim as u32,
        };
        let mut writer = BufWriter::new(File::create(meta_path(prefix))?);
        serde_json::to_writer_pretty(&mut writer, &meta)?;
        writer.flush()?;
        rc.record_section("write index files");

        rc.elapse_from_begin(&format!(
            "built {} index with {} points of dimension {} at {}",
            T::DATA_TYPE,
            num_points,
            dim,
            prefix
        ));
        Ok(())
    }

    fn load_index(&mut self, index_prefix: &str) -> Result<()> {
        let meta_file = meta_path(index_prefix);
        let reader = BufReader::new(
            File::open(&meta_file).with_context(|| format!("opening {}", meta_file))?,
        );
        let meta: FlatMeta = serde_json::from_reader(reader)?;

        if meta.metric != self.metric {
            return Err(Error::InvalidParameter(format!(
                "index at {} was built for {}, not {}",
                index_prefix, meta.metric, self.metric
            ))
            .into());
        }
        if meta.data_type != T::DATA_TYPE {
            return Err(Error::DataTypeMismatch {
                expected: T::DATA_TYPE,
                actual: meta.data_type,
            }
            .into());
        }
        if meta.dim == 0 {
            return Err(Error::InvalidFormat(format!("{}: zero dimension", meta_file)).into());
        }

        let data_file = data_path(index_prefix);
        let file = File::open(&data_file).with_context(|| format!("opening {}", data_file))?;
        // SAFETY: the file is opened read-only and index files are not modified while loaded
        let mmap = unsafe { Mmap::map(&file)? };

        let header = BinMetadata {
            num_points: meta.num_points,
            dim: meta.dim,
        };
        if mmap.len() as u64 != header.file_size(T::DATA_TYPE) {
            return Err(Error::InvalidFormat(format!(
                "{}: expected {} bytes, found {}",
                data_file,
                header.file_size(T::DATA_TYPE),
                mmap.len()
            ))
            .into());
        }
        bytemuck::try_cast_slice::<u8, T>(&mmap[BinMetadata::SIZE as usize..])
            .map_err(|e| Error::InvalidFormat(format!("{}: {}", data_file, e)))?;

        log::info!(
            "loaded flat index from {} ({} points, dim {})",
            index_prefix,
            meta.num_points,
            meta.dim
        );
        self.storage = Some(FlatStorage {
            mmap,
            num_points: meta.num_points as usize,
            dim: meta.dim as usize,
        });
        Ok(())
    }

    fn batch_search(
        &self,
        queries: &[T],
        dim: usize,
        num_queries: usize,
        k: usize,
        _params: &BBAnnParameters,
    ) -> Result<KnnResults> {
        let storage = self.loaded()?;
        check_query_shape(queries, dim, num_queries, storage.dim)?;

        let rows: Vec<(Vec<u32>, Vec<f32>)> = queries
            .par_chunks(dim)
            .map(|q| self.top_k(storage, q, k))
            .collect();

        let mut ids = Vec::with_capacity(num_queries * k);
        let mut distances = Vec::with_capacity(num_queries * k);
        for (row_ids, row_distances) in rows {
            ids.extend(row_ids);
            distances.extend(row_distances);
        }
        KnnResults::new(num_queries, k, ids, distances)
    }

    fn range_search(
        &self,
        queries: &[T],
        dim: usize,
        num_queries: usize,
        radius: f32,
        _params: &BBAnnParameters,
    ) -> Result<RangeResults> {
        let storage = self.loaded()?;
        check_query_shape(queries, dim, num_queries, storage.dim)?;

        let hits: Vec<Vec<(u32, f32)>> = queries
            .par_chunks(dim)
            .map(|q| self.within(storage, q, radius))
            .collect();
        Ok(RangeResults::from_hits(hits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    fn build_index<T: VectorElement>(
        dir: &TempDir,
        rows: &[Vec<T>],
        metric: Metric,
    ) -> (FlatIndex<T>, String) {
        let data_file = dir.path().join("base.bin");
        write_bin_file(&data_file, &Matrix::from_rows(rows).unwrap()).unwrap();
        let prefix = format!("{}/index/", dir.path().display());

        let params = BBAnnParameters {
            data_file_path: data_file.to_string_lossy().into_owned(),
            index_prefix_path: prefix.clone(),
            metric,
            ..Default::default()
        };
        let mut index = FlatIndex::<T>::new(metric);
        index.build(&params).unwrap();
        index.load_index(&prefix).unwrap();
        (index, prefix)
    }

    #[test]
    fn test_l2_search_is_exact() {
        let dir = TempDir::new().unwrap();
        let rows = vec![
            vec![0.0f32, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 2.0],
            vec![5.0, 5.0],
        ];
        let (index, _) = build_index(&dir, &rows, Metric::L2);
        assert_eq!(index.len(), 4);
        assert_eq!(index.dim(), Some(2));

        let queries = [0.9f32, 0.1, 4.0, 4.0];
        let res = index
            .batch_search(&queries, 2, 2, 2, &BBAnnParameters::default())
            .unwrap();
        assert_eq!(res.neighbors(0), &[1, 0]);
        assert_relative_eq!(res.query_distances(0)[0], 0.02, epsilon = 1e-6);
        assert_eq!(res.neighbors(1)[0], 3);
    }

    #[test]
    fn test_build_writes_complete_meta() {
        let dir = TempDir::new().unwrap();
        let (_, prefix) = build_index(&dir, &[vec![1i8, 2, 3], vec![4, 5, 6]], Metric::InnerProduct);

        let text = std::fs::read_to_string(meta_path(&prefix)).unwrap();
        let meta: FlatMeta = serde_json::from_str(&text).unwrap();
        assert_eq!(
            meta,
            FlatMeta {
                metric: Metric::InnerProduct,
                data_type: DataType::Int8,
                num_points: 2,
                dim: 3,
            }
        );
    }

    #[test]
    fn test_points_find_themselves() {
        let dir = TempDir::new().unwrap();
        let rows = crate::utils::generate_random_vectors(200, 16);
        let (index, _) = build_index(&dir, &rows, Metric::L2);

        let queries: Vec<f32> = rows[..10].concat();
        let res = index
            .batch_search(&queries, 16, 10, 5, &BBAnnParameters::default())
            .unwrap();
        for q in 0..10 {
            assert_eq!(res.neighbors(q)[0], q as u32);
            assert_relative_eq!(res.query_distances(q)[0], 0.0);
            assert!(res.query_distances(q).windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn test_inner_product_prefers_larger_scores() {
        let dir = TempDir::new().unwrap();
        let rows = vec![vec![1u8, 0], vec![3, 3], vec![0, 2]];
        let (index, _) = build_index(&dir, &rows, Metric::InnerProduct);

        let res = index
            .batch_search(&[1u8, 1], 2, 1, 3, &BBAnnParameters::default())
            .unwrap();
        assert_eq!(res.neighbors(0), &[1, 2, 0]);
        assert_eq!(res.query_distances(0), &[6.0, 2.0, 1.0]);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let dir = TempDir::new().unwrap();
        let (index, _) = build_index(&dir, &[vec![1i8, 1]], Metric::L2);

        let res = index
            .batch_search(&[0i8, 0], 2, 1, 3, &BBAnnParameters::default())
            .unwrap();
        assert_eq!(res.neighbors(0), &[0, KnnResults::MISSING_ID, KnnResults::MISSING_ID]);
        assert_eq!(res.query_distances(0)[2], f32::MAX);
    }

    #[test]
    fn test_range_search() {
        let dir = TempDir::new().unwrap();
        let rows = vec![vec![0.0f32], vec![1.0], vec![3.0], vec![-1.5]];
        let (index, _) = build_index(&dir, &rows, Metric::L2);

        let res = index
            .range_search(&[0.0f32, 10.0], 1, 2, 2.25, &BBAnnParameters::default())
            .unwrap();
        assert_eq!(res.query_ids(0), &[0, 1, 3]);
        assert_eq!(res.query_distances(0), &[0.0, 1.0, 2.25]);
        assert!(res.query_ids(1).is_empty());
    }

    #[test]
    fn test_load_rejects_other_metric_or_type() {
        let dir = TempDir::new().unwrap();
        let (_, prefix) = build_index(&dir, &[vec![1.0f32, 2.0]], Metric::L2);

        let mut ip = FlatIndex::<f32>::new(Metric::InnerProduct);
        assert!(ip.load_index(&prefix).is_err());

        let mut wrong_type = FlatIndex::<u8>::new(Metric::L2);
        let err = wrong_type.load_index(&prefix).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::DataTypeMismatch { .. })));
    }

    #[test]
    fn test_search_before_load() {
        let index = FlatIndex::<f32>::new(Metric::L2);
        let err = index
            .batch_search(&[0.0], 1, 1, 1, &BBAnnParameters::default())
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::InvalidState(_))));
    }

    #[test]
    fn test_dimension_mismatch() {
        let dir = TempDir::new().unwrap();
        let (index, _) = build_index(&dir, &[vec![1.0f32, 2.0]], Metric::L2);
        assert!(index
            .batch_search(&[0.0f32; 3], 3, 1, 1, &BBAnnParameters::default())
            .is_err());
    }
}
