//! Operator-type labels and tensor descriptors.
//!
//! An operator type is an open concrete name (`"Mul"`, `"Conv2D"`) paired with
//! a closed [`OpCategory`]. Patterns filter on the coarse category; passes
//! re-check the concrete name before they mutate anything.

use std::fmt;

use smallvec::SmallVec;

/// Coarse operator category.
#[derive(Debug, Hash, PartialOrd, Ord)]
#[derive(strum::Display, strum::EnumString, strum::EnumIter, strum::IntoStaticStr)]
#[derive(enumset::EnumSetType)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OpCategory {
    ElemWise,
    Convolution,
    MatMul,
    Pool,
    Reduce,
    BnReduce,
    BnUpdate,
    Quant,
    Dequant,
    ReadSelect,
    WriteSelect,
    /// Layout and shape shuffles (transpose, reshape, format conversion).
    Transform,
    /// Nodes that own `cond`/`body` subgraphs.
    ControlFlow,
    /// External graph input.
    Data,
    /// Sink collecting the external graph outputs.
    NetOutput,
    Const,
    /// Anything the engine has no category for.
    Opaque,
}

impl OpCategory {
    /// Best-effort category for a well-known operator name.
    pub fn infer(name: &str) -> Self {
        match name {
            "Add" | "Adds" | "AddN" | "Sub" | "Mul" | "Muls" | "Div" | "RealDiv" | "Maximum" | "Minimum" | "Relu"
            | "Relu6" | "LeakyRelu" | "PRelu" | "Sigmoid" | "Tanh" | "Exp" | "Log" | "Abs" | "Neg" | "Sqrt"
            | "Rsqrt" | "Square" | "Gelu" | "Swish" | "Cast" | "FusedMulAdd" | "ElemWise" => Self::ElemWise,
            "Conv" | "Conv2D" | "Conv3D" | "DepthwiseConv2D" | "Conv2DBackpropInput" | "Conv2DBackpropFilter"
            | "Deconvolution" => Self::Convolution,
            "MatMul" | "MatMulV2" | "BatchMatMul" | "BatchMatMulV2" | "FullyConnection" => Self::MatMul,
            "MaxPool" | "AvgPool" | "Pooling" => Self::Pool,
            "ReduceSum" | "ReduceSumD" | "ReduceMean" | "ReduceMeanD" | "ReduceMax" | "ReduceMin" | "ReduceProd" => {
                Self::Reduce
            }
            "BNTrainingReduce" => Self::BnReduce,
            "BNTrainingUpdate" | "BNTrainingUpdateV2" | "BNTrainingUpdateV3" => Self::BnUpdate,
            "AscendQuant" => Self::Quant,
            "AscendDequant" | "AscendRequant" => Self::Dequant,
            "StridedRead" => Self::ReadSelect,
            "StridedWrite" => Self::WriteSelect,
            "TransData" | "Transpose" | "TransposeD" | "Reshape" => Self::Transform,
            "While" | "If" | "Case" | "For" => Self::ControlFlow,
            "Data" => Self::Data,
            "NetOutput" => Self::NetOutput,
            "Const" | "Constant" => Self::Const,
            _ => Self::Opaque,
        }
    }

    /// Graph boundary categories; boundary nodes are never pruned or fused.
    pub fn is_boundary(self) -> bool {
        matches!(self, Self::Data | Self::NetOutput)
    }
}

/// Concrete operator type plus its coarse category.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OpType {
    name: String,
    category: OpCategory,
}

impl OpType {
    /// Operator type with an inferred category.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let category = OpCategory::infer(&name);
        Self { name, category }
    }

    pub fn with_category(name: impl Into<String>, category: OpCategory) -> Self {
        Self { name: name.into(), category }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> OpCategory {
        self.category
    }

    /// Exact concrete-name comparison.
    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for OpType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for OpType {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Element type tag carried by descriptors and tensor blobs. Never interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::Display, strum::EnumString)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataType {
    #[default]
    Undefined,
    Bool,
    Int8,
    UInt8,
    Int16,
    Int32,
    Int64,
    Float16,
    BFloat16,
    Float32,
    Float64,
}

/// Tensor shape; `-1` marks a dynamic dimension.
pub type Shape = SmallVec<[i64; 4]>;

/// Declared signature of one node input or output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TensorDesc {
    pub dtype: DataType,
    pub shape: Shape,
    /// Optional inputs may stay unconnected when a rewrite commits.
    pub optional: bool,
}

impl TensorDesc {
    pub fn new(dtype: DataType, shape: impl IntoIterator<Item = i64>) -> Self {
        Self { dtype, shape: shape.into_iter().collect(), optional: false }
    }

    pub fn scalar(dtype: DataType) -> Self {
        Self { dtype, shape: Shape::new(), optional: false }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn is_dynamic(&self) -> bool {
        self.shape.iter().any(|&dim| dim < 0)
    }
}

impl From<DataType> for TensorDesc {
    fn from(dtype: DataType) -> Self {
        Self::scalar(dtype)
    }
}
