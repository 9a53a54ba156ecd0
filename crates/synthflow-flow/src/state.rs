use std::sync::{Arc, Mutex, MutexGuard};

use synthflow_core::types::NodeStatus;

use crate::graph::{FlowDefinition, FlowEdge, FlowNode};
use crate::layout::{layout_flow, LayoutOptions, LayoutStats};
use crate::simulator::ExecutionProgress;

/// Live node/edge collections plus run progress.
///
/// Built from an immutable [`FlowDefinition`]; the definition itself is
/// never touched afterwards.
#[derive(Debug, Clone)]
pub struct FlowState {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
    pub progress: ExecutionProgress,
    /// Bumped on every start/stop so a stale tick can tell it lost the race.
    pub(crate) generation: u64,
}

impl FlowState {
    pub fn from_definition(def: &FlowDefinition) -> Self {
        Self {
            nodes: def.nodes.clone(),
            edges: def.edges.clone(),
            progress: ExecutionProgress::default(),
            generation: 0,
        }
    }

    /// Run the layout over the live nodes.
    pub fn relayout(&mut self, options: &LayoutOptions) -> LayoutStats {
        layout_flow(&mut self.nodes, &self.edges, options)
    }

    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn count_status(&self, status: NodeStatus) -> usize {
        self.nodes.iter().filter(|n| n.status == status).count()
    }

    pub fn statuses(&self) -> Vec<NodeStatus> {
        self.nodes.iter().map(|n| n.status).collect()
    }

    pub fn into_shared(self) -> SharedFlow {
        SharedFlow(Arc::new(Mutex::new(self)))
    }
}

/// Flow state shared between the simulator and the view.
///
/// Locks are short and never held across an await.
#[derive(Debug, Clone)]
pub struct SharedFlow(Arc<Mutex<FlowState>>);

impl SharedFlow {
    pub fn lock(&self) -> MutexGuard<'_, FlowState> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Owned copy of the current state.
    pub fn snapshot(&self) -> FlowState {
        self.lock().clone()
    }
}
