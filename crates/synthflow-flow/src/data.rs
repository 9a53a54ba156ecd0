//! Built-in sample pipeline: a conductor agent fans out to one state/generate
//! branch per instrument, a reviewer collects the scores, and an
//! evaluate/reflect loop feeds back into the reviewer before output.

use synthflow_core::types::{NodeCategory, NodeStatus};

use crate::graph::{ExecutionRecord, FlowDefinition, FlowEdge, FlowNode, ToolRef};

/// Instruments in the orchestra and the part each one plays.
const INSTRUMENTS: &[(&str, &str)] = &[
    ("Violin", "melody"),
    ("Viola", "harmony"),
    ("Cello", "bass"),
    ("Flute", "melody"),
    ("Clarinet", "harmony"),
    ("Trumpet", "highlight"),
    ("Timpani", "rhythm"),
];

/// The composition pipeline as shipped.
pub fn symphony_pipeline() -> FlowDefinition {
    let mut nodes = vec![
        FlowNode::new("input", "Composition Input", NodeCategory::Input)
            .with_status(NodeStatus::Completed)
            .with_timestamp("2024-03-01T09:00:00")
            .with_typed_param("format", "MIDI", "file")
            .with_param("style", "Classical symphony")
            .with_typed_param("duration", "15 min", "duration")
            .with_tool(ToolRef::new("OpenAI").with_version("4.0"))
            .with_tool(ToolRef::new("Music Theory Library").with_version("2.1"))
            .with_execution(ExecutionRecord {
                attempts: 1,
                last_attempt: "2024-03-01T09:00:05".into(),
                duration: "5s".into(),
            }),
        FlowNode::new("conductor", "Conductor", NodeCategory::Agent)
            .with_param("role", "Conductor")
            .with_tool(ToolRef::new("OpenAI"))
            .with_tool(ToolRef::new("SerpAPI"))
            .with_tool(ToolRef::new("RAG").with_icon("🔍"))
            .with_tool(ToolRef::new("VectorDB").with_icon("📚")),
        FlowNode::new("designFramework", "DESIGN_FRAMEWORK", NodeCategory::Action)
            .with_param("framework", "F1"),
        FlowNode::new("planComposition", "PLAN_COMPOSITION", NodeCategory::Action)
            .with_param("composition", "Symphony"),
    ];

    for (name, role) in INSTRUMENTS {
        nodes.extend(instrument_nodes(name, role));
    }

    nodes.extend([
        FlowNode::new("reviewer", "Reviewer", NodeCategory::Agent)
            .with_param("model", "GPT-4")
            .with_param("role", "Music Reviewer")
            .with_tool(ToolRef::new("OpenAI"))
            .with_tool(ToolRef::new("SerpAPI"))
            .with_tool(ToolRef::new("VectorDB").with_icon("📚")),
        FlowNode::new("evaluate", "EVALUATE_AND_REVISE", NodeCategory::Action)
            .with_param("review", "Check all"),
        FlowNode::new("reflect", "Reflect", NodeCategory::Reflect)
            .with_param("feedback", "Refine next time"),
        FlowNode::new("output", "Output", NodeCategory::Output)
            .with_status(NodeStatus::InProgress)
            .with_param("output", "Final Score"),
    ]);

    let mut edges = vec![
        FlowEdge::new("input", "conductor"),
        FlowEdge::new("conductor", "designFramework"),
        FlowEdge::new("designFramework", "planComposition"),
    ];

    for (name, _) in INSTRUMENTS {
        let state = name.to_lowercase();
        let generate = format!("{}Generate", state);
        edges.push(FlowEdge::new("planComposition", state.as_str()));
        edges.push(FlowEdge::new(state.as_str(), generate.as_str()));
        edges.push(FlowEdge::new(generate.as_str(), "reviewer"));
    }

    edges.extend([
        FlowEdge::new("reviewer", "evaluate"),
        FlowEdge::new("evaluate", "output"),
        FlowEdge::new("evaluate", "reflect"),
        FlowEdge::new("reflect", "reviewer"),
    ]);

    FlowDefinition::new(nodes, edges)
}

/// State node plus score-generation action for one instrument.
fn instrument_nodes(instrument: &str, role: &str) -> [FlowNode; 2] {
    let id = instrument.to_lowercase();
    let state = FlowNode::new(id.as_str(), instrument.to_uppercase(), NodeCategory::State)
        .with_param("instrument", instrument)
        .with_param("role", role)
        .with_tool(ToolRef::new("OpenAI"))
        .with_tool(ToolRef::new("RAG").with_icon("🔍"))
        .with_tool(ToolRef::new("VectorDB").with_icon("📚"));
    let generate = FlowNode::new(
        format!("{}Generate", id),
        "GENERATE_SCORES",
        NodeCategory::Action,
    )
    .with_param("target", format!("{} Score", instrument))
    .with_param("role", role);
    [state, generate]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_shape() {
        let def = symphony_pipeline();
        assert_eq!(def.nodes.len(), 4 + INSTRUMENTS.len() * 2 + 4);
        assert_eq!(def.edges.len(), 3 + INSTRUMENTS.len() * 3 + 4);
        assert_eq!(def.nodes.first().map(|n| n.id.as_str()), Some("input"));
        assert_eq!(def.nodes.last().map(|n| n.id.as_str()), Some("output"));
        def.validate().expect("built-in pipeline is well formed");
    }

    #[test]
    fn test_instrument_branch_order() {
        let def = symphony_pipeline();
        let violin = def.position_of("violin").unwrap();
        assert_eq!(def.nodes[violin + 1].id, "violinGenerate");
        assert_eq!(def.nodes[violin + 1].param("target"), Some("Violin Score"));
        assert_eq!(def.nodes[violin].param("role"), Some("melody"));
        assert_eq!(def.position_of("timpaniGenerate"), def.position_of("reviewer").map(|i| i - 1));
    }

    #[test]
    fn test_positions_left_for_layout() {
        let def = symphony_pipeline();
        assert!(def
            .nodes
            .iter()
            .all(|n| n.position == synthflow_core::types::Position::default()));
    }

    #[test]
    fn test_reflection_loop_present() {
        let def = symphony_pipeline();
        assert!(def
            .edges
            .iter()
            .any(|e| e.source == "reflect" && e.target == "reviewer"));
        assert!(def.edges.iter().any(|e| e.id == "e-evaluate-reflect"));
    }
}
