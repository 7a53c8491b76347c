//! Data type support for index element types
//!
//! The native library keys its index constructors by element type: 32-bit
//! float, signed 8-bit and unsigned 8-bit integers. This module provides the
//! matching Rust types and a row-major matrix used for data and query batches.

use crate::{Error, Result};
use std::fmt;

/// Supported vector element types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DataType {
    /// 32-bit float
    Float32,
    /// Signed 8-bit integer
    Int8,
    /// Unsigned 8-bit integer
    UInt8,
}

impl DataType {
    /// Get the size in bytes of this type
    pub fn size(&self) -> usize {
        match self {
            DataType::Float32 => 4,
            DataType::Int8 | DataType::UInt8 => 1,
        }
    }

    /// Parse the dtype string a harness dataset reports
    pub fn from_harness_name(name: &str) -> Option<Self> {
        match name {
            "float32" => Some(DataType::Float32),
            "int8" => Some(DataType::Int8),
            "uint8" => Some(DataType::UInt8),
            _ => None,
        }
    }

    /// Parse from a command-line spelling
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "float" | "float32" | "f32" => Some(DataType::Float32),
            "int8" | "i8" => Some(DataType::Int8),
            "uint8" | "u8" => Some(DataType::UInt8),
            _ => None,
        }
    }

    /// Name used by harness datasets
    pub fn harness_name(&self) -> &'static str {
        match self {
            DataType::Float32 => "float32",
            DataType::Int8 => "int8",
            DataType::UInt8 => "uint8",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.harness_name())
    }
}

/// Trait for vector element types
pub trait VectorElement:
    bytemuck::Pod + fmt::Debug + PartialEq + Send + Sync + 'static
{
    /// Element type tag
    const DATA_TYPE: DataType;

    /// Convert to f32 for distance calculations
    fn to_f32(self) -> f32;

    /// Wrap a matrix of this element type into the dtype-erased form
    fn into_any(matrix: Matrix<Self>) -> AnyMatrix;

    /// Borrow a matrix of this element type out of the dtype-erased form
    fn from_any(matrix: &AnyMatrix) -> Option<&Matrix<Self>>;
}

impl VectorElement for f32 {
    const DATA_TYPE: DataType = DataType::Float32;

    #[inline]
    fn to_f32(self) -> f32 {
        self
    }

    fn into_any(matrix: Matrix<Self>) -> AnyMatrix {
        AnyMatrix::Float32(matrix)
    }

    fn from_any(matrix: &AnyMatrix) -> Option<&Matrix<Self>> {
        match matrix {
            AnyMatrix::Float32(m) => Some(m),
            _ => None,
        }
    }
}

impl VectorElement for i8 {
    const DATA_TYPE: DataType = DataType::Int8;

    #[inline]
    fn to_f32(self) -> f32 {
        self as f32
    }

    fn into_any(matrix: Matrix<Self>) -> AnyMatrix {
        AnyMatrix::Int8(matrix)
    }

    fn from_any(matrix: &AnyMatrix) -> Option<&Matrix<Self>> {
        match matrix {
            AnyMatrix::Int8(m) => Some(m),
            _ => None,
        }
    }
}

impl VectorElement for u8 {
    const DATA_TYPE: DataType = DataType::UInt8;

    #[inline]
    fn to_f32(self) -> f32 {
        self as f32
    }

    fn into_any(matrix: Matrix<Self>) -> AnyMatrix {
        AnyMatrix::UInt8(matrix)
    }

    fn from_any(matrix: &AnyMatrix) -> Option<&Matrix<Self>> {
        match matrix {
            AnyMatrix::UInt8(m) => Some(m),
            _ => None,
        }
    }
}

/// Row-major matrix of vectors
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<T> {
    data: Vec<T>,
    num_rows: usize,
    dim: usize,
}

impl<T: VectorElement> Matrix<T> {
    /// Create a matrix from flat row-major data
    pub fn new(data: Vec<T>, num_rows: usize, dim: usize) -> Result<Self> {
        if data.len() != num_rows * dim {
            return Err(Error::DimensionMismatch {
                expected: num_rows * dim,
                actual: data.len(),
            }
            .into());
        }
        Ok(Self { data, num_rows, dim })
    }

    /// Create a matrix from individual rows
    pub fn from_rows(rows: &[Vec<T>]) -> Result<Self> {
        let dim = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * dim);
        for row in rows {
            if row.len() != dim {
                return Err(Error::DimensionMismatch {
                    expected: dim,
                    actual: row.len(),
                }
                .into());
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            data,
            num_rows: rows.len(),
            dim,
        })
    }

    /// `(rows, dim)`
    pub fn shape(&self) -> (usize, usize) {
        (self.num_rows, self.dim)
    }

    /// Number of rows
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Vector dimension
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Flat row-major data
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Row `i`
    pub fn row(&self, i: usize) -> &[T] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    /// Keep only the first `n` rows
    pub fn truncate(&mut self, n: usize) {
        if n < self.num_rows {
            self.num_rows = n;
            self.data.truncate(n * self.dim);
        }
    }

    /// Raw bytes for storage
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }
}

/// Matrix whose element type is only known at runtime
#[derive(Debug, Clone, PartialEq)]
pub enum AnyMatrix {
    /// float32 vectors
    Float32(Matrix<f32>),
    /// int8 vectors
    Int8(Matrix<i8>),
    /// uint8 vectors
    UInt8(Matrix<u8>),
}

impl AnyMatrix {
    /// Element type
    pub fn data_type(&self) -> DataType {
        match self {
            AnyMatrix::Float32(_) => DataType::Float32,
            AnyMatrix::Int8(_) => DataType::Int8,
            AnyMatrix::UInt8(_) => DataType::UInt8,
        }
    }

    /// `(rows, dim)`
    pub fn shape(&self) -> (usize, usize) {
        match self {
            AnyMatrix::Float32(m) => m.shape(),
            AnyMatrix::Int8(m) => m.shape(),
            AnyMatrix::UInt8(m) => m.shape(),
        }
    }

    /// Keep only the first `n` rows
    pub fn truncate(&mut self, n: usize) {
        match self {
            AnyMatrix::Float32(m) => m.truncate(n),
            AnyMatrix::Int8(m) => m.truncate(n),
            AnyMatrix::UInt8(m) => m.truncate(n),
        }
    }

    /// Row `i` converted to f32
    pub fn row_f32(&self, i: usize) -> Vec<f32> {
        match self {
            AnyMatrix::Float32(m) => m.row(i).to_vec(),
            AnyMatrix::Int8(m) => m.row(i).iter().map(|&x| x.to_f32()).collect(),
            AnyMatrix::UInt8(m) => m.row(i).iter().map(|&x| x.to_f32()).collect(),
        }
    }
}
