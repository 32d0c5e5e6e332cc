use kiln_ir::pattern::match_all;
use kiln_ir::prelude::*;
use kiln_ir::test::helpers::*;

use crate::context::PassContext;

#[test]
fn test_fused_names_are_unique() {
    let mut ctx = PassContext::<()>::new("loop");
    assert_eq!(ctx.fused_name("cond"), "loop/cond_0");
    assert_eq!(ctx.fused_name("body"), "loop/body_1");
    assert_eq!(ctx.fused_name("cond"), "loop/cond_2");
}

#[test]
fn test_state_is_fresh_per_context() {
    let mut first = PassContext::<Vec<u32>>::new("p");
    first.state_mut().push(1);
    let second = PassContext::<Vec<u32>>::new("p");

    assert_eq!(first.into_state(), vec![1]);
    assert!(second.state().is_empty());
}

#[test]
fn test_consumed_nodes_conflict() {
    let fixture = conv_relu_fanout();
    let pattern = Pattern::builder("conv_relu")
        .add_op("conv", OpCategory::Convolution)
        .add_op("act", OpCategory::ElemWise)
        .set_head(&["conv"])
        .connect("conv", &["act"], BranchArity::Single)
        .build()
        .unwrap();
    let mapping = match_all(&fixture.graph, &pattern).remove(0);
    let mut ctx = PassContext::<()>::new("p");

    assert!(!ctx.conflicts(&mapping));
    ctx.consume([fixture.mul]);
    assert!(!ctx.conflicts(&mapping), "unmatched nodes do not conflict");
    ctx.consume([fixture.relu]);
    assert!(ctx.conflicts(&mapping));
    assert!(ctx.is_consumed(fixture.relu));
    assert_eq!(ctx.consumed_count(), 2);
}
