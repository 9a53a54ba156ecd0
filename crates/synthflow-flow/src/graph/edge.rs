use serde::{Deserialize, Serialize};

/// A directed visual connection between two nodes.
///
/// Edges carry no execution semantics: they drive arrow rendering and
/// layering only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowEdge {
    /// Edge id; definitions may omit it and get `e-{source}-{target}`.
    #[serde(default)]
    pub id: String,
    /// Source node id.
    pub source: String,
    /// Target node id.
    pub target: String,
}

impl FlowEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: edge_id(&source, &target),
            source,
            target,
        }
    }

    /// Fill in the id when a definition left it blank.
    pub(crate) fn ensure_id(&mut self) {
        if self.id.is_empty() {
            self.id = edge_id(&self.source, &self.target);
        }
    }
}

fn edge_id(source: &str, target: &str) -> String {
    format!("e-{}-{}", source, target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_id_format() {
        let e = FlowEdge::new("input", "conductor");
        assert_eq!(e.id, "e-input-conductor");
        assert_eq!(e.source, "input");
        assert_eq!(e.target, "conductor");
    }

    #[test]
    fn test_missing_id_is_filled() {
        let mut e: FlowEdge = serde_json::from_str(r#"{"source": "a", "target": "b"}"#).unwrap();
        assert!(e.id.is_empty());
        e.ensure_id();
        assert_eq!(e.id, "e-a-b");

        let mut named: FlowEdge =
            serde_json::from_str(r#"{"id": "custom", "source": "a", "target": "b"}"#).unwrap();
        named.ensure_id();
        assert_eq!(named.id, "custom");
    }
}
