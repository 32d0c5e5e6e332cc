use test_case::test_case;

use crate::error::{Error, ErrorKind};
use crate::pattern::{BranchArity, ConnectFlags, INPUT_NODE, OUTPUT_NODE, Pattern, REPEAT_UNBOUNDED, SlotTypes};
use crate::types::{OpCategory, OpType};

fn conv_elemwise() -> Pattern {
    Pattern::builder("conv_elemwise")
        .add_op("conv", OpCategory::Convolution)
        .add_slot("elemwise", OpCategory::ElemWise, 0, 1)
        .add_slot("output", OUTPUT_NODE, 0, REPEAT_UNBOUNDED)
        .set_head(&["conv"])
        .connect("conv", &["elemwise", "output"], BranchArity::Multi)
        .build()
        .unwrap()
}

#[test]
fn test_build_resolves_slots() {
    let pattern = conv_elemwise();

    assert_eq!(pattern.name(), "conv_elemwise");
    assert_eq!(pattern.slots().len(), 3);
    assert_eq!(pattern.head(), pattern.slot_id("conv").unwrap());
    assert_eq!(pattern.slot_id("missing"), None);

    let conn = &pattern.connections()[0];
    assert_eq!(conn.producer, pattern.slot_id("conv").unwrap());
    assert_eq!(conn.arity, BranchArity::Multi);
    assert_eq!(conn.flags, ConnectFlags::default());
}

#[test]
fn test_typed_consumers_precede_sentinels() {
    let pattern = Pattern::builder("p")
        .add_op("conv", OpCategory::Convolution)
        .add_slot("output", OUTPUT_NODE, 0, REPEAT_UNBOUNDED)
        .add_slot("elemwise", OpCategory::ElemWise, 0, 1)
        .set_head(&["conv"])
        .connect("conv", &["output", "elemwise", "elemwise"], BranchArity::Multi)
        .build()
        .unwrap();

    let consumers = &pattern.connections()[0].consumers;
    assert_eq!(consumers.as_slice(), &[pattern.slot_id("elemwise").unwrap(), pattern.slot_id("output").unwrap()]);
}

#[test]
fn test_clones_share_descriptor() {
    let pattern = conv_elemwise();
    let clone = pattern.clone();
    assert!(pattern.same(&clone));
    assert!(!pattern.same(&conv_elemwise()));
}

#[test]
fn test_slot_types() {
    let conv = OpType::from("Conv2D");
    let custom = OpType::from("MyConv");

    let by_category = SlotTypes::from(OpCategory::Convolution);
    assert!(by_category.admits(&conv));
    assert!(!by_category.admits(&custom));
    assert!(by_category.clone().or_op("MyConv").admits(&custom));
    assert!(SlotTypes::ops(&["MyConv"]).admits(&custom));
    assert!(OUTPUT_NODE.admits(&custom));
    assert!(INPUT_NODE.is_sentinel());
    assert_eq!(OUTPUT_NODE.to_string(), "OUTPUT_NODE");
}

// =========================================================================
// Construction errors
// =========================================================================

#[test]
fn test_connect_to_undeclared_slot() {
    let err = Pattern::builder("p")
        .add_op("conv", OpCategory::Convolution)
        .set_head(&["conv"])
        .connect("conv", &["missing"], BranchArity::Single)
        .build()
        .unwrap_err();

    assert_eq!(err, Error::UnknownSlot { pattern: "p".into(), slot: "missing".into() });
    assert_eq!(err.kind(), ErrorKind::Construction);
}

#[test]
fn test_head_undeclared_slot() {
    let result = Pattern::builder("p").add_op("conv", OpCategory::Convolution).set_head(&["relu"]).build();
    assert!(matches!(result, Err(Error::UnknownSlot { ref slot, .. }) if slot == "relu"));
}

#[test]
fn test_duplicate_slot() {
    let result = Pattern::builder("p")
        .add_op("conv", OpCategory::Convolution)
        .add_op("conv", OpCategory::ElemWise)
        .set_head(&["conv"])
        .build();
    assert!(matches!(result, Err(Error::DuplicateSlot { .. })));
}

#[test]
fn test_missing_head() {
    let result = Pattern::builder("p").add_op("conv", OpCategory::Convolution).build();
    assert!(matches!(result, Err(Error::MissingHead { .. })));

    let result = Pattern::builder("p").add_op("conv", OpCategory::Convolution).set_head(&[]).build();
    assert!(matches!(result, Err(Error::MissingHead { .. })));
}

#[test]
fn test_multiple_heads() {
    let result = Pattern::builder("p")
        .add_op("conv", OpCategory::Convolution)
        .add_op("relu", OpCategory::ElemWise)
        .set_head(&["conv", "relu"])
        .connect("conv", &["relu"], BranchArity::Single)
        .build();
    assert!(matches!(result, Err(Error::MultipleHeads { ref heads, .. }) if heads.len() == 2));
}

#[test]
fn test_sentinel_head() {
    let result = Pattern::builder("p").add_slot("out", OUTPUT_NODE, 1, 1).set_head(&["out"]).build();
    assert!(matches!(result, Err(Error::SentinelHead { .. })));
}

#[test_case(OUTPUT_NODE, true; "output_as_producer")]
#[test_case(INPUT_NODE, false; "input_as_consumer")]
fn test_misplaced_sentinel(sentinel: SlotTypes, as_producer: bool) {
    let mut builder = Pattern::builder("p");
    builder.add_op("conv", OpCategory::Convolution).add_slot("edge", sentinel, 0, 1).set_head(&["conv"]);
    if as_producer {
        builder.connect("edge", &["conv"], BranchArity::Multi);
    } else {
        builder.connect("conv", &["edge"], BranchArity::Multi);
    }
    let result = builder.build();
    assert!(matches!(result, Err(Error::MisplacedSentinel { ref slot, .. }) if slot == "edge"));
}

#[test_case(0, 0; "zero_max")]
#[test_case(2, 1; "min_above_max")]
fn test_invalid_cardinality(min: usize, max: usize) {
    let result = Pattern::builder("p")
        .add_op("conv", OpCategory::Convolution)
        .add_slot("relu", OpCategory::ElemWise, min, max)
        .set_head(&["conv"])
        .connect("conv", &["relu"], BranchArity::Single)
        .build();
    assert!(matches!(result, Err(Error::InvalidCardinality { .. })));
}

#[test]
fn test_empty_type_set() {
    let result = Pattern::builder("p").add_op("any", SlotTypes::ops(&[])).set_head(&["any"]).build();
    assert!(matches!(result, Err(Error::EmptyTypeSet { .. })));
}

#[test]
fn test_empty_connection() {
    let result =
        Pattern::builder("p").add_op("conv", OpCategory::Convolution).set_head(&["conv"]).connect("conv", &[], BranchArity::Single).build();
    assert!(matches!(result, Err(Error::EmptyConnection { .. })));
}

#[test]
fn test_unreachable_slot() {
    let result = Pattern::builder("p")
        .add_op("conv", OpCategory::Convolution)
        .add_op("relu", OpCategory::ElemWise)
        .add_op("mul", OpCategory::ElemWise)
        .add_op("add", OpCategory::ElemWise)
        .set_head(&["conv"])
        .connect("conv", &["relu"], BranchArity::Single)
        .connect("mul", &["add"], BranchArity::Single)
        .build();
    assert!(matches!(result, Err(Error::UnreachableSlot { ref slot, .. }) if slot == "mul"));
}

#[test]
fn test_first_recorded_error_wins() {
    let result = Pattern::builder("p")
        .add_op("conv", OpCategory::Convolution)
        .connect("conv", &["a"], BranchArity::Single)
        .connect("conv", &["b"], BranchArity::Single)
        .build();
    assert!(matches!(result, Err(Error::UnknownSlot { ref slot, .. }) if slot == "a"));
}
