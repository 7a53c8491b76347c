//! File format support for big-ann benchmark files
//!
//! Three layouts are supported, all little-endian:
//!
//! * vector files (`.bin`): `u32 num_points`, `u32 dim`, then `num_points * dim`
//!   elements of the file's element type, row-major;
//! * knn answer / ground-truth files: `u32 nq`, `u32 k`, `nq * k` `u32` ids, then
//!   `nq * k` `f32` distances;
//! * range ground-truth files: `i32 nq`, `i32 total`, `nq` `i32` per-query hit
//!   counts, `total` `i32` ids, then `total` `f32` distances.

use crate::native::{KnnResults, RangeResults};
use crate::types::{AnyMatrix, DataType, Matrix, VectorElement};
use crate::{Error, Result};
use anyhow::Context;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Header of a `.bin` vector file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinMetadata {
    /// Number of vectors
    pub num_points: u32,
    /// Vector dimension
    pub dim: u32,
}

impl BinMetadata {
    /// Header size in bytes
    pub const SIZE: u64 = 8;

    /// Expected file size for elements of `data_type`
    pub fn file_size(&self, data_type: DataType) -> u64 {
        Self::SIZE + self.num_points as u64 * self.dim as u64 * data_type.size() as u64
    }

    fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let num_points = reader.read_u32::<LittleEndian>()?;
        let dim = reader.read_u32::<LittleEndian>()?;
        Ok(Self { num_points, dim })
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.num_points)?;
        writer.write_u32::<LittleEndian>(self.dim)?;
        Ok(())
    }
}

/// Read the header of a `.bin` vector file
pub fn read_bin_metadata<P: AsRef<Path>>(path: P) -> Result<BinMetadata> {
    let path = path.as_ref();
    let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let meta = BinMetadata::read_from(&mut file)?;
    log::debug!(
        "get meta from {}, nrows = {}, ncols = {}",
        path.display(),
        meta.num_points,
        meta.dim
    );
    Ok(meta)
}

/// Overwrite the header of an existing `.bin` vector file in place
pub fn write_bin_metadata<P: AsRef<Path>>(path: P, meta: BinMetadata) -> Result<()> {
    let path = path.as_ref();
    let mut file = OpenOptions::new()
        .write(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    file.seek(SeekFrom::Start(0))?;
    meta.write_to(&mut file)?;
    file.flush()?;
    log::debug!(
        "set meta to {}, nrows = {}, ncols = {}",
        path.display(),
        meta.num_points,
        meta.dim
    );
    Ok(())
}

/// Read a whole `.bin` vector file
pub fn read_bin_file<T: VectorElement, P: AsRef<Path>>(path: P) -> Result<Matrix<T>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let meta = BinMetadata::read_from(&mut reader)?;
    let expected = meta.file_size(T::DATA_TYPE);
    if file_len != expected {
        return Err(Error::InvalidFormat(format!(
            "{}: header says {} x {} {} ({} bytes), file has {} bytes",
            path.display(),
            meta.num_points,
            meta.dim,
            T::DATA_TYPE,
            expected,
            file_len
        ))
        .into());
    }

    let num_points = meta.num_points as usize;
    let dim = meta.dim as usize;
    let mut data = vec![T::zeroed(); num_points * dim];
    reader.read_exact(bytemuck::cast_slice_mut(&mut data))?;

    log::debug!(
        "read binary file from {}, n = {}, dim = {}",
        path.display(),
        num_points,
        dim
    );
    Matrix::new(data, num_points, dim)
}

/// Read a `.bin` vector file whose element type is chosen at runtime
pub fn read_any_bin_file<P: AsRef<Path>>(path: P, data_type: DataType) -> Result<AnyMatrix> {
    Ok(match data_type {
        DataType::Float32 => AnyMatrix::Float32(read_bin_file(path)?),
        DataType::Int8 => AnyMatrix::Int8(read_bin_file(path)?),
        DataType::UInt8 => AnyMatrix::UInt8(read_bin_file(path)?),
    })
}

/// Write a `.bin` vector file
pub fn write_bin_file<T: VectorElement, P: AsRef<Path>>(path: P, matrix: &Matrix<T>) -> Result<()> {
    let path = path.as_ref();
    let (num_points, dim) = matrix.shape();
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    BinMetadata {
        num_points: to_u32(num_points, "number of vectors")?,
        dim: to_u32(dim, "dimension")?,
    }
    .write_to(&mut writer)?;
    writer.write_all(matrix.as_bytes())?;
    writer.flush()?;

    log::debug!(
        "write binary file to {} done, n = {}, dim = {}",
        path.display(),
        num_points,
        dim
    );
    Ok(())
}

/// Read a knn answer or ground-truth file
pub fn read_knn_file<P: AsRef<Path>>(path: P) -> Result<KnnResults> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let file_len = reader.get_ref().metadata()?.len();

    let num_queries = reader.read_u32::<LittleEndian>()? as usize;
    let k = reader.read_u32::<LittleEndian>()? as usize;
    let expected = (num_queries as u64)
        .checked_mul(k as u64)
        .and_then(|n| n.checked_mul(8))
        .and_then(|n| n.checked_add(8));
    check_file_size(path, file_len, expected)?;

    let total = num_queries * k;
    let mut ids = vec![0u32; total];
    reader.read_u32_into::<LittleEndian>(&mut ids)?;
    let mut distances = vec![0f32; total];
    reader.read_f32_into::<LittleEndian>(&mut distances)?;

    KnnResults::new(num_queries, k, ids, distances)
}

/// Write a knn answer file
pub fn write_knn_file<P: AsRef<Path>>(path: P, results: &KnnResults) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    writer.write_u32::<LittleEndian>(to_u32(results.num_queries(), "number of queries")?)?;
    writer.write_u32::<LittleEndian>(to_u32(results.k(), "k")?)?;
    for &id in results.ids() {
        writer.write_u32::<LittleEndian>(id)?;
    }
    for &dist in results.distances() {
        writer.write_f32::<LittleEndian>(dist)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a range search ground-truth file
pub fn read_range_file<P: AsRef<Path>>(path: P) -> Result<RangeResults> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let file_len = reader.get_ref().metadata()?.len();

    let num_queries = read_count(&mut reader, "number of queries")?;
    let total = read_count(&mut reader, "total results")?;
    let expected = (num_queries as u64)
        .checked_mul(4)
        .zip((total as u64).checked_mul(8))
        .and_then(|(counts, hits)| counts.checked_add(hits))
        .and_then(|n| n.checked_add(8));
    check_file_size(path, file_len, expected)?;

    let mut lims = Vec::with_capacity(num_queries + 1);
    lims.push(0u64);
    for _ in 0..num_queries {
        let count = read_count(&mut reader, "per-query count")? as u64;
        let last = *lims.last().unwrap_or(&0);
        lims.push(last + count);
    }
    if lims.last().copied() != Some(total as u64) {
        return Err(Error::InvalidFormat(format!(
            "{}: per-query counts sum to {:?}, header says {}",
            path.display(),
            lims.last(),
            total
        ))
        .into());
    }

    let mut ids = Vec::with_capacity(total);
    for _ in 0..total {
        ids.push(reader.read_i32::<LittleEndian>()? as u32);
    }
    let mut distances = vec![0f32; total];
    reader.read_f32_into::<LittleEndian>(&mut distances)?;

    RangeResults::new(lims, ids, distances)
}

/// Write a range search result file in the ground-truth layout
pub fn write_range_file<P: AsRef<Path>>(path: P, results: &RangeResults) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    writer.write_i32::<LittleEndian>(to_i32(results.num_queries(), "number of queries")?)?;
    writer.write_i32::<LittleEndian>(to_i32(results.ids().len(), "total results")?)?;
    for q in 0..results.num_queries() {
        writer.write_i32::<LittleEndian>(to_i32(results.query_ids(q).len(), "per-query count")?)?;
    }
    for &id in results.ids() {
        writer.write_i32::<LittleEndian>(id as i32)?;
    }
    for &dist in results.distances() {
        writer.write_f32::<LittleEndian>(dist)?;
    }
    writer.flush()?;
    Ok(())
}

fn check_file_size(path: &Path, actual: u64, expected: Option<u64>) -> Result<()> {
    match expected {
        Some(expected) if expected == actual => Ok(()),
        Some(expected) => Err(Error::InvalidFormat(format!(
            "{}: header implies {} bytes, file has {}",
            path.display(),
            expected,
            actual
        ))
        .into()),
        None => Err(Error::InvalidFormat(format!(
            "{}: header sizes overflow",
            path.display()
        ))
        .into()),
    }
}

fn read_count<R: Read>(reader: &mut R, what: &str) -> Result<usize> {
    let value = reader.read_i32::<LittleEndian>()?;
    usize::try_from(value)
        .map_err(|_| Error::InvalidFormat(format!("negative {}: {}", what, value)).into())
}

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::InvalidParameter(format!("{} {} does not fit in u32", what, value)).into())
}

fn to_i32(value: usize, what: &str) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| Error::InvalidParameter(format!("{} {} does not fit in i32", what, value)).into())
}
