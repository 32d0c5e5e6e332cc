//! Typed node attributes.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::types::{DataType, Shape};

/// Reserved attribute: a node carrying `_side_effect = true` is never pruned.
pub const SIDE_EFFECT: &str = "_side_effect";

/// Position of a `Data` node among the graph inputs.
pub const INPUT_INDEX: &str = "index";

/// Attribute table, ordered by key for deterministic iteration.
pub type Attrs = BTreeMap<String, AttrValue>;

/// Opaque payload with a declared dtype and shape (constant weights and the like).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TensorBlob {
    pub dtype: DataType,
    pub shape: Shape,
    pub data: Arc<[u8]>,
}

impl TensorBlob {
    pub fn new(dtype: DataType, shape: impl IntoIterator<Item = i64>, data: impl Into<Arc<[u8]>>) -> Self {
        Self { dtype, shape: shape.into_iter().collect(), data: data.into() }
    }

    pub fn len_bytes(&self) -> usize {
        self.data.len()
    }
}

#[derive(Debug, Clone, PartialEq, derive_more::From)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    List(Vec<AttrValue>),
    Tensor(TensorBlob),
}

impl AttrValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AttrValue]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_tensor(&self) -> Option<&TensorBlob> {
        match self {
            Self::Tensor(v) => Some(v),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}
