use kiln_ir::prelude::*;
use kiln_ir::test::helpers::*;

use crate::config::FusionConfig;
use crate::driver::run_pass_with_state;
use crate::test::passes::RepeatLoopPass;

fn repeat(graph: &mut Graph, times: Option<i64>) -> NodeId {
    let mut attrs = Attrs::new();
    if let Some(times) = times {
        attrs.insert("times".into(), AttrValue::Int(times));
    }
    graph.add_node().op("RepeatRelu").inputs(vec![f32_desc()]).outputs(vec![f32_desc()]).attrs(attrs).call().unwrap()
}

#[test]
fn test_repeat_becomes_while_loop() {
    let mut graph = Graph::new("g");
    let x = input(&mut graph);
    let node = repeat(&mut graph, Some(3));
    wire(&mut graph, x, node);
    outputs(&mut graph, &[OutputAnchor::new(node, 0)]);

    let (report, state) = run_pass_with_state(&mut graph, &RepeatLoopPass, &FusionConfig::default()).unwrap();

    assert_eq!(report.fused, 1);
    assert_eq!(state.signatures.len(), 1);
    assert!(!graph.contains(node));

    let looped = graph.find_by_name("repeat_loop/while_2").unwrap();
    assert_eq!(report.created.last(), Some(&looped));
    let while_node = graph.node(looped).unwrap();
    assert_eq!(while_node.category(), OpCategory::ControlFlow);
    assert_eq!(while_node.input(2), Some(OutputAnchor::new(x, 0)));
    assert_eq!(graph.outputs(), vec![Some(OutputAnchor::new(looped, 2))]);

    let flow = while_node.control_flow().unwrap();
    assert_eq!(flow.cond().name(), "repeat_loop/cond_0");
    assert_eq!(flow.body().name(), "repeat_loop/body_1");
    assert_eq!(flow.body().num_inputs(), 3);
    flow.body().graph().verify().unwrap();

    let limit = while_node.input(1).unwrap().node;
    assert_eq!(graph.node(limit).unwrap().attr("value").and_then(AttrValue::as_int), Some(3));
}

#[test]
fn test_each_loop_gets_its_own_names() {
    let mut graph = Graph::new("g");
    let x = input(&mut graph);
    let first = repeat(&mut graph, Some(2));
    let second = repeat(&mut graph, Some(5));
    wire(&mut graph, x, first);
    wire(&mut graph, first, second);
    outputs(&mut graph, &[OutputAnchor::new(second, 0)]);

    let (report, state) = run_pass_with_state(&mut graph, &RepeatLoopPass, &FusionConfig::default()).unwrap();

    assert_eq!(report.fused, 2);
    assert_eq!(state.signatures.len(), 2);
    assert!(graph.find_by_name("repeat_loop/while_2").is_some());
    assert!(graph.find_by_name("repeat_loop/while_5").is_some());
    graph.verify().unwrap();
}

#[test]
fn test_repeat_without_count_is_left_alone() {
    let mut graph = Graph::new("g");
    let x = input(&mut graph);
    let node = repeat(&mut graph, None);
    wire(&mut graph, x, node);

    let (report, state) = run_pass_with_state(&mut graph, &RepeatLoopPass, &FusionConfig::default()).unwrap();

    assert_eq!(report.rejected, 1);
    assert!(state.signatures.is_empty());
    assert!(graph.contains(node));
}
