//! Rewrite primitive tests.

use test_case::test_case;

use crate::attr::{self, AttrValue, Attrs};
use crate::error::{Direction, Error, ErrorKind};
use crate::graph::Graph;
use crate::node::{EdgeRef, InputAnchor, OutputAnchor};
use crate::test::helpers::*;

// =========================================================================
// add_node
// =========================================================================

#[test]
fn test_add_node_defaults() {
    let mut graph = Graph::new("g");
    let id = graph.add_node().op("Relu").call().unwrap();
    let node = graph.node(id).unwrap();

    assert_eq!(node.name(), "Relu_0");
    assert_eq!(node.num_inputs(), 0);
    assert_eq!(node.num_outputs(), 0);
    assert!(node.attrs().is_empty());
}

#[test]
fn test_add_node_with_name_and_attrs() {
    let mut graph = Graph::new("g");
    let mut attrs = Attrs::new();
    attrs.insert("alpha".into(), AttrValue::Float(0.1));
    let id = graph.add_node().op("LeakyRelu").attrs(attrs).name("act").call().unwrap();

    let node = graph.node(id).unwrap();
    assert_eq!(node.name(), "act");
    assert_eq!(node.attr("alpha").and_then(AttrValue::as_float), Some(0.1));
}

#[test_case(""; "empty_op")]
#[test_case("While"; "control_flow")]
#[test_case("Data"; "data_boundary")]
#[test_case("NetOutput"; "output_boundary")]
fn test_add_node_rejects(op: &str) {
    let mut graph = Graph::new("g");
    let result = graph.add_node().op(op).call();
    assert!(matches!(result, Err(Error::InvalidNode { .. })));
    assert_eq!(graph.node_count(), 0);
}

#[test]
fn test_add_node_rejects_empty_attr_key() {
    let mut graph = Graph::new("g");
    let mut attrs = Attrs::new();
    attrs.insert(String::new(), AttrValue::Int(1));
    let result = graph.add_node().op("Relu").attrs(attrs).call();
    assert!(matches!(result, Err(Error::InvalidNode { .. })));
}

// =========================================================================
// link / unlink
// =========================================================================

#[test]
fn test_link_is_symmetric() {
    let mut graph = Graph::new("g");
    let a = op(&mut graph, "Relu", 0, 1);
    let b = op(&mut graph, "Relu", 1, 1);
    let edge = graph.link(a, 0, b, 0).unwrap();

    assert_eq!(edge, EdgeRef::new(OutputAnchor::new(a, 0), InputAnchor::new(b, 0)));
    assert_eq!(graph.node(b).unwrap().input(0), Some(OutputAnchor::new(a, 0)));
    assert_eq!(graph.node(a).unwrap().consumers(0), &[InputAnchor::new(b, 0)]);
    assert!(graph.has_edge(edge));
}

#[test]
fn test_relink_same_edge_is_noop() {
    let mut graph = Graph::new("g");
    let a = op(&mut graph, "Relu", 0, 1);
    let b = op(&mut graph, "Relu", 1, 1);
    graph.link(a, 0, b, 0).unwrap();
    graph.link(a, 0, b, 0).unwrap();
    assert_eq!(graph.edge_count(), 1);
}

#[test]
fn test_link_occupied_input() {
    let mut graph = Graph::new("g");
    let a = op(&mut graph, "Relu", 0, 1);
    let b = op(&mut graph, "Relu", 0, 1);
    let c = op(&mut graph, "Relu", 1, 1);
    graph.link(a, 0, c, 0).unwrap();

    let result = graph.link(b, 0, c, 0);
    assert!(matches!(result, Err(Error::InputOccupied { producer, .. }) if producer.node == a));
    assert_eq!(graph.edge_count(), 1);
}

#[test_case(1, 0, Direction::Output; "output_port")]
#[test_case(0, 1, Direction::Input; "input_port")]
fn test_link_port_out_of_range(output: usize, input: usize, expected: Direction) {
    let mut graph = Graph::new("g");
    let a = op(&mut graph, "Relu", 0, 1);
    let b = op(&mut graph, "Relu", 1, 1);
    let result = graph.link(a, output, b, input);
    assert!(matches!(result, Err(Error::PortOutOfRange { direction, .. }) if direction == expected));
}

#[test]
fn test_link_self_loop() {
    let mut graph = Graph::new("g");
    let a = op(&mut graph, "Relu", 1, 1);
    assert!(matches!(graph.link(a, 0, a, 0), Err(Error::GraphCycle { .. })));
}

#[test]
fn test_unlink_idempotent() {
    let mut fixture = conv_relu_fanout();
    let graph = &mut fixture.graph;
    let edge = EdgeRef::new(OutputAnchor::new(fixture.relu, 0), InputAnchor::new(fixture.mul, 0));
    let before = graph.edge_count();

    assert!(graph.unlink(edge));
    let after_once = graph.edge_count();
    assert!(!graph.unlink(edge));

    assert_eq!(after_once, before - 1);
    assert_eq!(graph.edge_count(), after_once);
    assert_eq!(graph.node(fixture.mul).unwrap().input(0), None);
}

#[test]
fn test_unlink_missing_edge_is_noop() {
    let mut fixture = conv_relu_fanout();
    let before = fixture.graph.edge_count();
    // relu never feeds conv
    let bogus = EdgeRef::new(OutputAnchor::new(fixture.relu, 0), InputAnchor::new(fixture.conv, 0));
    assert!(!fixture.graph.unlink(bogus));
    assert_eq!(fixture.graph.edge_count(), before);
}

#[test]
fn test_unlink_input() {
    let mut fixture = conv_relu_fanout();
    let edge = fixture.graph.unlink_input(InputAnchor::new(fixture.relu, 0)).unwrap();
    assert_eq!(edge.from, OutputAnchor::new(fixture.conv, 0));
    assert_eq!(fixture.graph.unlink_input(InputAnchor::new(fixture.relu, 0)), None);
}

// =========================================================================
// replace_consumers
// =========================================================================

#[test]
fn test_replace_consumers_preserves_input_index() {
    let mut graph = Graph::new("g");
    let old = op(&mut graph, "Relu", 0, 1);
    let new = op(&mut graph, "Sigmoid", 0, 1);
    let other = op(&mut graph, "Tanh", 0, 1);
    let add = op(&mut graph, "Add", 2, 1);
    graph.link(other, 0, add, 0).unwrap();
    graph.link(old, 0, add, 1).unwrap();

    let moved = graph.replace_consumers(OutputAnchor::new(old, 0), OutputAnchor::new(new, 0)).unwrap();

    assert_eq!(moved, 1);
    assert_eq!(graph.node(add).unwrap().input(1), Some(OutputAnchor::new(new, 0)));
    assert_eq!(graph.node(add).unwrap().input(0), Some(OutputAnchor::new(other, 0)));
    assert_eq!(graph.consumer_edge_count(old).unwrap(), 0);
    graph.verify().unwrap();
}

#[test]
fn test_replace_consumers_onto_consumer_fails_untouched() {
    let mut graph = Graph::new("g");
    let a = op(&mut graph, "Relu", 0, 1);
    let b = op(&mut graph, "Relu", 1, 1);
    graph.link(a, 0, b, 0).unwrap();

    let result = graph.replace_consumers(OutputAnchor::new(a, 0), OutputAnchor::new(b, 0));
    assert!(matches!(result, Err(Error::GraphCycle { .. })));
    assert_eq!(graph.consumer_edge_count(a).unwrap(), 1);
}

#[test]
fn test_replace_consumers_onto_descendant_fails_untouched() {
    // x -> a -> b -> c -> out: moving a's readers onto c would close b -> c -> b.
    let mut graph = Graph::new("g");
    let x = input(&mut graph);
    let a = op(&mut graph, "Relu", 1, 1);
    let b = op(&mut graph, "Relu", 1, 1);
    let c = op(&mut graph, "Relu", 1, 1);
    wire(&mut graph, x, a);
    wire(&mut graph, a, b);
    wire(&mut graph, b, c);
    outputs(&mut graph, &[OutputAnchor::new(c, 0)]);

    let result = graph.replace_consumers(OutputAnchor::new(a, 0), OutputAnchor::new(c, 0));

    assert!(matches!(result, Err(Error::GraphCycle { node }) if node == c));
    assert_eq!(graph.node(b).unwrap().input(0), Some(OutputAnchor::new(a, 0)));
    assert_eq!(graph.consumer_edge_count(c).unwrap(), 1);
    assert!(graph.topological_order().is_ok());
    graph.verify().unwrap();
}

#[test]
fn test_replace_consumers_onto_unrelated_branch() {
    // x feeds both a -> b and c; c does not depend on b.
    let mut graph = Graph::new("g");
    let x = input(&mut graph);
    let a = op(&mut graph, "Relu", 1, 1);
    let b = op(&mut graph, "Relu", 1, 1);
    let c = op(&mut graph, "Sigmoid", 1, 1);
    wire(&mut graph, x, a);
    wire(&mut graph, a, b);
    wire(&mut graph, x, c);

    assert_eq!(graph.replace_consumers(OutputAnchor::new(a, 0), OutputAnchor::new(c, 0)).unwrap(), 1);
    assert_eq!(graph.node(b).unwrap().input(0), Some(OutputAnchor::new(c, 0)));
    assert!(graph.topological_order().is_ok());
}

// =========================================================================
// remove_node
// =========================================================================

#[test]
fn test_remove_node_with_live_consumer_leaves_graph_unchanged() {
    let mut fixture = conv_relu_fanout();
    let graph = &mut fixture.graph;
    let edges = graph.edge_count();
    let nodes = graph.node_count();

    let result = graph.remove_node(fixture.relu);

    let err = result.unwrap_err();
    assert!(matches!(err, Error::LiveConsumers { consumers: 2, .. }));
    assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    assert_eq!(graph.edge_count(), edges);
    assert_eq!(graph.node_count(), nodes);
    graph.verify().unwrap();
}

#[test]
fn test_remove_node_after_unlink() {
    let mut graph = Graph::new("g");
    let a = op(&mut graph, "Relu", 0, 1);
    let b = op(&mut graph, "Relu", 1, 1);
    let edge = graph.link(a, 0, b, 0).unwrap();

    graph.unlink(edge);
    let removed = graph.remove_node(a).unwrap();

    assert_eq!(removed.op_name(), "Relu");
    assert!(!graph.contains(a));
    assert!(matches!(graph.remove_node(a), Err(Error::StaleNode { .. })));
}

#[test]
fn test_remove_node_cuts_own_inputs_and_control() {
    let mut graph = Graph::new("g");
    let a = op(&mut graph, "Relu", 0, 1);
    let b = op(&mut graph, "Relu", 1, 1);
    let c = op(&mut graph, "Relu", 0, 0);
    graph.link(a, 0, b, 0).unwrap();
    graph.link_control(c, b).unwrap();

    graph.remove_node(b).unwrap();

    assert_eq!(graph.consumer_edge_count(a).unwrap(), 0);
    assert!(graph.node(c).unwrap().control_successors().is_empty());
    graph.verify().unwrap();
}

#[test]
fn test_remove_boundary_node() {
    let mut graph = Graph::new("g");
    let x = input(&mut graph);
    assert!(matches!(graph.remove_node(x), Err(Error::InvalidNode { .. })));
}

// =========================================================================
// Control edges, attributes, splicing
// =========================================================================

#[test]
fn test_control_edges() {
    let mut graph = Graph::new("g");
    let a = op(&mut graph, "Relu", 0, 0);
    let b = op(&mut graph, "Relu", 0, 0);

    graph.link_control(a, b).unwrap();
    graph.link_control(a, b).unwrap();
    assert_eq!(graph.node(a).unwrap().control_successors(), &[b]);
    assert_eq!(graph.node(b).unwrap().control_predecessors(), &[a]);

    assert!(graph.unlink_control(a, b));
    assert!(!graph.unlink_control(a, b));
    assert!(graph.node(b).unwrap().control_predecessors().is_empty());
}

#[test]
fn test_set_attr() {
    let mut graph = Graph::new("g");
    let a = op(&mut graph, "Relu", 0, 1);
    graph.set_attr(a, "mode", "fast").unwrap();
    assert_eq!(graph.node(a).unwrap().attr("mode").and_then(AttrValue::as_str), Some("fast"));
    assert!(matches!(graph.set_attr(a, "", 1), Err(Error::InvalidNode { .. })));
}

#[test]
fn test_insert_between() {
    let mut fixture = conv_relu_fanout();
    let graph = &mut fixture.graph;
    let cast = op(graph, "Cast", 1, 1);
    let edge = EdgeRef::new(OutputAnchor::new(fixture.conv, 0), InputAnchor::new(fixture.relu, 0));

    graph.insert_between(edge, cast, 0, 0).unwrap();

    assert!(!graph.has_edge(edge));
    assert_eq!(graph.node(cast).unwrap().input(0), Some(OutputAnchor::new(fixture.conv, 0)));
    assert_eq!(graph.node(fixture.relu).unwrap().input(0), Some(OutputAnchor::new(cast, 0)));
    graph.verify().unwrap();
}

#[test]
fn test_insert_between_missing_edge() {
    let mut fixture = conv_relu_fanout();
    let cast = op(&mut fixture.graph, "Cast", 1, 1);
    let bogus = EdgeRef::new(OutputAnchor::new(fixture.mul, 0), InputAnchor::new(fixture.relu, 0));
    let result = fixture.graph.insert_between(bogus, cast, 0, 0);
    assert!(matches!(result, Err(Error::BrokenAnchor { .. })));
}

// =========================================================================
// prune_dangling_outputs
// =========================================================================

#[test]
fn test_prune_to_fixpoint() {
    let mut graph = Graph::new("g");
    let x = input(&mut graph);
    let a = op(&mut graph, "Relu", 1, 1);
    let b = op(&mut graph, "Relu", 1, 1);
    wire(&mut graph, x, a);
    wire(&mut graph, a, b);

    let removed = graph.prune_dangling_outputs([a, b]);

    assert_eq!(removed, vec![b, a]);
    assert_eq!(graph.node_count(), 1);
    graph.verify().unwrap();
}

#[test]
fn test_prune_only_candidates() {
    let mut graph = Graph::new("g");
    let a = op(&mut graph, "Relu", 0, 1);
    let b = op(&mut graph, "Relu", 1, 1);
    wire(&mut graph, a, b);

    assert_eq!(graph.prune_dangling_outputs([b]), vec![b]);
    assert!(graph.contains(a), "producers outside the candidate set are kept");
}

#[test]
fn test_prune_keeps_consumed_and_side_effect_nodes() {
    let mut fixture = conv_relu_fanout();
    let graph = &mut fixture.graph;
    let effect = op(graph, "Print", 0, 1);
    graph.set_attr(effect, attr::SIDE_EFFECT, true).unwrap();
    let inputs = graph.inputs().to_vec();

    let candidates = [fixture.conv, fixture.relu, effect].into_iter().chain(inputs);
    let removed = graph.prune_dangling_outputs(candidates);

    assert!(removed.is_empty());
    assert!(graph.contains(effect));
}
