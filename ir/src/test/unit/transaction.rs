use crate::attr::Attrs;
use crate::error::Error;
use crate::graph::Graph;
use crate::node::OutputAnchor;
use crate::test::helpers::*;

#[test]
fn test_commit_prunes_and_reports() {
    let mut fixture = conv_relu_fanout();
    let mut tx = fixture.graph.transaction();

    let gelu = tx.add_node().op("Gelu").inputs(vec![f32_desc()]).outputs(vec![f32_desc()]).call().unwrap();
    let conv = OutputAnchor::new(fixture.conv, 0);
    tx.link(conv.node, conv.index, gelu, 0).unwrap();
    tx.replace_consumers(OutputAnchor::new(fixture.relu, 0), OutputAnchor::new(gelu, 0)).unwrap();
    tx.schedule_prune([fixture.relu]);
    assert_eq!(tx.created(), vec![gelu]);

    let summary = tx.commit().unwrap();

    assert_eq!(summary.created, vec![gelu]);
    assert_eq!(summary.pruned, vec![fixture.relu]);
    assert_eq!(summary.removed, vec![fixture.relu]);
    assert!(!fixture.graph.contains(fixture.relu));
    fixture.graph.verify().unwrap();
}

#[test]
fn test_commit_keeps_consumed_candidates() {
    let mut fixture = conv_relu_fanout();
    let mut tx = fixture.graph.transaction();
    tx.schedule_prune([fixture.conv, fixture.relu]);

    let summary = tx.commit().unwrap();

    assert!(summary.pruned.is_empty());
    assert_eq!(fixture.graph.node_count(), 6);
}

#[test]
fn test_commit_fails_on_dangling_required_input() {
    let mut fixture = conv_relu_fanout();
    let mut tx = fixture.graph.transaction();
    tx.unlink_input(crate::node::InputAnchor::new(fixture.mul, 0)).unwrap();

    let result = tx.commit();
    assert!(matches!(result, Err(Error::DanglingRequiredInput { input }) if input.node == fixture.mul));
}

#[test]
fn test_fuse_inside_transaction() {
    let mut fixture = conv_relu_fanout();
    let mut tx = fixture.graph.transaction();
    let fused = tx.fuse_region([fixture.conv, fixture.relu], "FusedConvRelu", Attrs::new()).unwrap();

    let summary = tx.commit().unwrap();

    assert_eq!(summary.created, vec![fused]);
    assert_eq!(summary.removed, vec![fixture.conv, fixture.relu]);
    assert!(summary.pruned.is_empty());
}

#[test]
fn test_dropped_transaction_keeps_edits() {
    let mut graph = Graph::new("g");
    {
        let mut tx = graph.transaction();
        op(&mut tx, "Relu", 0, 1);
    }
    assert_eq!(graph.node_count(), 1);
}
