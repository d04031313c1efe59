//! Element types for kiln graphs and tensors.
//!
//! [`DType`] is the element type carried by every graph node and tensor view.
//! [`ConstValue`] is the untyped payload of a constant node; it is materialized
//! into the native element encoding with [`ConstValue::to_bytes`].


/// Element data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::Display, strum::EnumIter, strum::VariantArray, strum::EnumString)]
pub enum DType {
    #[strum(serialize = "bool")]
    Bool,

    #[strum(serialize = "i8")]
    Int8,
    #[strum(serialize = "i16")]
    Int16,
    #[strum(serialize = "i32")]
    Int32,
    #[strum(serialize = "i64")]
    Int64,

    #[strum(serialize = "u8")]
    UInt8,
    #[strum(serialize = "u16")]
    UInt16,
    #[strum(serialize = "u32")]
    UInt32,
    #[strum(serialize = "u64")]
    UInt64,

    #[strum(serialize = "f32")]
    Float32,
    #[strum(serialize = "f64")]
    Float64,
}

impl DType {
    /// Size of one element in bytes.
    pub const fn bytes(&self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }

    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool)
    }

    pub const fn is_signed(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub const fn is_unsigned(&self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64)
    }

    pub const fn is_int(&self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }
}

/// Untyped constant payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl ConstValue {
    /// Encode this value as a single element of `dtype` in native byte order.
    ///
    /// Integer targets truncate, float targets round to the nearest representable value.
    pub fn to_bytes(&self, dtype: DType) -> Vec<u8> {
        let (int, float) = match *self {
            ConstValue::Bool(b) => (b as i64, b as u8 as f64),
            ConstValue::Int(i) => (i, i as f64),
            ConstValue::Float(f) => (f as i64, f),
        };

        match dtype {
            DType::Bool => vec![(int != 0) as u8],
            DType::Int8 => (int as i8).to_ne_bytes().to_vec(),
            DType::Int16 => (int as i16).to_ne_bytes().to_vec(),
            DType::Int32 => (int as i32).to_ne_bytes().to_vec(),
            DType::Int64 => int.to_ne_bytes().to_vec(),
            DType::UInt8 => (int as u8).to_ne_bytes().to_vec(),
            DType::UInt16 => (int as u16).to_ne_bytes().to_vec(),
            DType::UInt32 => (int as u32).to_ne_bytes().to_vec(),
            DType::UInt64 => (int as u64).to_ne_bytes().to_vec(),
            DType::Float32 => (float as f32).to_ne_bytes().to_vec(),
            DType::Float64 => float.to_ne_bytes().to_vec(),
        }
    }

    /// Whether this value is the additive identity.
    pub fn is_zero(&self) -> bool {
        match *self {
            ConstValue::Bool(b) => !b,
            ConstValue::Int(i) => i == 0,
            ConstValue::Float(f) => f == 0.0,
        }
    }

    /// Whether this value is the multiplicative identity.
    pub fn is_one(&self) -> bool {
        match *self {
            ConstValue::Bool(b) => b,
            ConstValue::Int(i) => i == 1,
            ConstValue::Float(f) => f == 1.0,
        }
    }
}

impl std::fmt::Display for ConstValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstValue::Bool(b) => write!(f, "{b}"),
            ConstValue::Int(i) => write!(f, "{i}"),
            ConstValue::Float(v) => write!(f, "{v}"),
        }
    }
}
