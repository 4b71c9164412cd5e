//! Tensors — typed, shaped numeric arrays.
//!
//! Data is stored as one contiguous row-major blob in little-endian order,
//! which is the layout the tensor module expects on the wire.

use crate::error::{ClientError, ClientResult};

/// Element type of a tensor, named as on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Float,
    Double,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Float => "FLOAT",
            DataType::Double => "DOUBLE",
            DataType::Int8 => "INT8",
            DataType::Int16 => "INT16",
            DataType::Int32 => "INT32",
            DataType::Int64 => "INT64",
            DataType::UInt8 => "UINT8",
            DataType::UInt16 => "UINT16",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name.to_ascii_uppercase().as_str() {
            "FLOAT" => DataType::Float,
            "DOUBLE" => DataType::Double,
            "INT8" => DataType::Int8,
            "INT16" => DataType::Int16,
            "INT32" => DataType::Int32,
            "INT64" => DataType::Int64,
            "UINT8" => DataType::UInt8,
            "UINT16" => DataType::UInt16,
            _ => return None,
        })
    }

    /// Bytes per element.
    pub fn size(&self) -> usize {
        match self {
            DataType::Int8 | DataType::UInt8 => 1,
            DataType::Int16 | DataType::UInt16 => 2,
            DataType::Float | DataType::Int32 => 4,
            DataType::Double | DataType::Int64 => 8,
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A Rust scalar that can be stored in a tensor.
pub trait TensorElement: Copy + 'static {
    const DTYPE: DataType;

    fn write_le(self, out: &mut Vec<u8>);

    /// `bytes` is exactly `DTYPE.size()` long.
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! tensor_element {
    ($ty:ty, $dtype:ident) => {
        impl TensorElement for $ty {
            const DTYPE: DataType = DataType::$dtype;

            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn read_le(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(bytes);
                <$ty>::from_le_bytes(raw)
            }
        }
    };
}

tensor_element!(f32, Float);
tensor_element!(f64, Double);
tensor_element!(i8, Int8);
tensor_element!(i16, Int16);
tensor_element!(i32, Int32);
tensor_element!(i64, Int64);
tensor_element!(u8, UInt8);
tensor_element!(u16, UInt16);

/// A shaped numeric array.
///
/// Invariant: `blob.len() == shape.iter().product() * dtype.size()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    dtype: DataType,
    shape: Vec<usize>,
    blob: Vec<u8>,
}

impl Tensor {
    /// Build a tensor of the given shape from row-major values.
    pub fn new<T: TensorElement>(shape: Vec<usize>, values: &[T]) -> ClientResult<Self> {
        let expected = element_count(&shape)?;
        if expected != values.len() {
            return Err(ClientError::Tensor(format!(
                "shape {shape:?} holds {expected} elements, got {}",
                values.len()
            )));
        }
        let mut blob = Vec::with_capacity(values.len() * T::DTYPE.size());
        for value in values {
            value.write_le(&mut blob);
        }
        Ok(Self {
            dtype: T::DTYPE,
            shape,
            blob,
        })
    }

    /// One-dimensional tensor over `values`.
    pub fn from_slice<T: TensorElement>(values: &[T]) -> Self {
        let mut blob = Vec::with_capacity(values.len() * T::DTYPE.size());
        for value in values {
            value.write_le(&mut blob);
        }
        Self {
            dtype: T::DTYPE,
            shape: vec![values.len()],
            blob,
        }
    }

    /// Rebuild a tensor from its wire parts.
    pub fn from_raw(dtype: DataType, shape: Vec<usize>, blob: Vec<u8>) -> ClientResult<Self> {
        let expected = element_count(&shape)?
            .checked_mul(dtype.size())
            .ok_or_else(|| ClientError::Tensor(format!("shape {shape:?} overflows")))?;
        if expected != blob.len() {
            return Err(ClientError::Tensor(format!(
                "{dtype} tensor of shape {shape:?} needs {expected} bytes, blob has {}",
                blob.len()
            )));
        }
        Ok(Self { dtype, shape, blob })
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn blob(&self) -> &[u8] {
        &self.blob
    }

    pub fn len(&self) -> usize {
        self.blob.len() / self.dtype.size()
    }

    pub fn is_empty(&self) -> bool {
        self.blob.is_empty()
    }

    /// Decode the values as `T`, which must match the tensor's data type.
    pub fn to_vec<T: TensorElement>(&self) -> ClientResult<Vec<T>> {
        if T::DTYPE != self.dtype {
            return Err(ClientError::Tensor(format!(
                "tensor holds {}, requested {}",
                self.dtype,
                T::DTYPE
            )));
        }
        Ok(self
            .blob
            .chunks_exact(self.dtype.size())
            .map(T::read_le)
            .collect())
    }
}

fn element_count(shape: &[usize]) -> ClientResult<usize> {
    if shape.is_empty() {
        return Err(ClientError::Tensor("shape must have at least one dimension".to_string()));
    }
    shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| ClientError::Tensor(format!("shape {shape:?} overflows")))
}
