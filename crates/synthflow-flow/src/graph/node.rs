use serde::{Deserialize, Serialize};

use synthflow_core::types::{NodeCategory, NodeStatus, Position};

/// A key/value parameter shown in a node's detail area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeParam {
    pub key: String,
    pub value: String,
    /// Optional value kind hint (e.g. "file", "duration").
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// A named tool available to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ToolRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            icon: None,
            version: None,
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// Record of a previous execution attached to sample input data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub attempts: u32,
    pub last_attempt: String,
    pub duration: String,
}

/// A node in the pipeline graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    /// Unique identifier for this node.
    pub id: String,
    /// Human-readable label.
    pub label: String,
    pub category: NodeCategory,
    #[serde(default)]
    pub status: NodeStatus,
    /// Ordered parameters.
    #[serde(default)]
    pub params: Vec<NodeParam>,
    /// Tools referenced by this node (empty = none).
    #[serde(default)]
    pub tools: Vec<ToolRef>,
    /// Assigned by the layout; definitions leave it at the origin.
    #[serde(default)]
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionRecord>,
}

impl FlowNode {
    /// Create a pending node with no parameters or tools.
    pub fn new(id: impl Into<String>, label: impl Into<String>, category: NodeCategory) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            category,
            status: NodeStatus::Pending,
            params: vec![],
            tools: vec![],
            position: Position::default(),
            timestamp: None,
            execution: None,
        }
    }

    /// Append a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push(NodeParam {
            key: key.into(),
            value: value.into(),
            kind: None,
        });
        self
    }

    /// Append a parameter with a value kind hint.
    pub fn with_typed_param(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        self.params.push(NodeParam {
            key: key.into(),
            value: value.into(),
            kind: Some(kind.into()),
        });
        self
    }

    /// Append a tool reference.
    pub fn with_tool(mut self, tool: ToolRef) -> Self {
        self.tools.push(tool);
        self
    }

    /// Set the initial status.
    pub fn with_status(mut self, status: NodeStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn with_execution(mut self, record: ExecutionRecord) -> Self {
        self.execution = Some(record);
        self
    }

    /// Look up a parameter value by key.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_builder() {
        let node = FlowNode::new("violin", "VIOLIN", NodeCategory::State)
            .with_param("instrument", "Violin")
            .with_param("role", "melody")
            .with_tool(ToolRef::new("RAG").with_icon("🔍"));

        assert_eq!(node.id, "violin");
        assert_eq!(node.label, "VIOLIN");
        assert_eq!(node.category, NodeCategory::State);
        assert_eq!(node.status, NodeStatus::Pending);
        assert_eq!(node.param("role"), Some("melody"));
        assert_eq!(node.param("missing"), None);
        assert_eq!(node.tools[0].icon.as_deref(), Some("🔍"));
        assert_eq!(node.position, Position::default());
    }

    #[test]
    fn test_params_keep_insertion_order() {
        let node = FlowNode::new("n", "N", NodeCategory::Action)
            .with_param("z", "1")
            .with_param("a", "2")
            .with_typed_param("m", "3", "duration");
        let keys: Vec<&str> = node.params.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
        assert_eq!(node.params[2].kind.as_deref(), Some("duration"));
    }

    #[test]
    fn test_deserialize_minimal_node() {
        let node: FlowNode = serde_json::from_str(
            r#"{"id": "a", "label": "A", "category": "aiAgent"}"#,
        )
        .unwrap();
        assert_eq!(node.category, NodeCategory::Agent);
        assert_eq!(node.status, NodeStatus::Pending);
        assert!(node.params.is_empty());
        assert!(node.tools.is_empty());
    }

    #[test]
    fn test_param_kind_serializes_as_type() {
        let node = FlowNode::new("n", "N", NodeCategory::Input).with_typed_param("format", "MIDI", "file");
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["params"][0]["type"], "file");
    }
}
