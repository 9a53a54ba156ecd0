use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use synthflow_core::error::{Result, SynthflowError};

use super::edge::FlowEdge;
use super::node::FlowNode;

/// Immutable initial node and edge definitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowDefinition {
    #[serde(default)]
    pub nodes: Vec<FlowNode>,
    #[serde(default)]
    pub edges: Vec<FlowEdge>,
}

impl FlowDefinition {
    pub fn new(nodes: Vec<FlowNode>, edges: Vec<FlowEdge>) -> Self {
        Self { nodes, edges }
    }

    /// Load and validate a definition from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| SynthflowError::DefinitionNotFound(path.display().to_string()))?;
        let def = Self::from_toml_str(&content)?;
        debug!(
            path = %path.display(),
            nodes = def.nodes.len(),
            edges = def.edges.len(),
            "Loaded flow definition"
        );
        Ok(def)
    }

    /// Parse and validate a definition from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut def: FlowDefinition =
            toml::from_str(content).map_err(|e| SynthflowError::Definition(e.to_string()))?;
        for edge in &mut def.edges {
            edge.ensure_id();
        }
        def.validate()?;
        Ok(def)
    }

    /// Check that node ids are unique and every edge endpoint exists.
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(SynthflowError::EmptyFlow);
        }

        let mut ids = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !ids.insert(node.id.as_str()) {
                return Err(SynthflowError::DuplicateNode(node.id.clone()));
            }
        }

        for edge in &self.edges {
            for endpoint in [&edge.source, &edge.target] {
                if !ids.contains(endpoint.as_str()) {
                    return Err(SynthflowError::UnknownNode {
                        edge: edge.id.clone(),
                        node: endpoint.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Index of a node in list order.
    pub fn position_of(&self, node_id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synthflow_core::types::{NodeCategory, NodeStatus};

    const SAMPLE: &str = r#"
[[nodes]]
id = "a"
label = "A"
category = "input"
status = "completed"

[[nodes.params]]
key = "format"
value = "MIDI"
type = "file"

[[nodes]]
id = "b"
label = "B"
category = "agent"

[[nodes.tools]]
name = "OpenAI"

[[edges]]
source = "a"
target = "b"
"#;

    #[test]
    fn test_parse_toml_definition() {
        let def = FlowDefinition::from_toml_str(SAMPLE).unwrap();
        assert_eq!(def.nodes.len(), 2);
        assert_eq!(def.nodes[0].status, NodeStatus::Completed);
        assert_eq!(def.nodes[0].params[0].kind.as_deref(), Some("file"));
        assert_eq!(def.nodes[1].category, NodeCategory::Agent);
        assert_eq!(def.nodes[1].tools[0].name, "OpenAI");
        assert_eq!(def.edges[0].id, "e-a-b");
        assert_eq!(def.position_of("b"), Some(1));
    }

    #[test]
    fn test_unknown_edge_endpoint_is_config_error() {
        let def = FlowDefinition::new(
            vec![FlowNode::new("a", "A", NodeCategory::Input)],
            vec![FlowEdge::new("a", "ghost")],
        );
        match def.validate() {
            Err(SynthflowError::UnknownNode { edge, node }) => {
                assert_eq!(edge, "e-a-ghost");
                assert_eq!(node, "ghost");
            }
            other => panic!("expected UnknownNode, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let def = FlowDefinition::new(
            vec![
                FlowNode::new("a", "A", NodeCategory::Input),
                FlowNode::new("a", "A again", NodeCategory::Output),
            ],
            vec![],
        );
        assert!(matches!(def.validate(), Err(SynthflowError::DuplicateNode(id)) if id == "a"));
    }

    #[test]
    fn test_empty_definition_rejected() {
        assert!(matches!(
            FlowDefinition::default().validate(),
            Err(SynthflowError::EmptyFlow)
        ));
    }

    #[test]
    fn test_bad_toml_is_definition_error() {
        let err = FlowDefinition::from_toml_str("[[nodes]]\nid = 3\n").unwrap_err();
        assert!(matches!(err, SynthflowError::Definition(_)));
    }
}
