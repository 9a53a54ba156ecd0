use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of one simulated run.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// First eight characters, for status lines and logs.
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pipeline stage kind of a node.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeCategory {
    #[serde(alias = "aiAgent", alias = "ai_agent")]
    Agent,
    Action,
    State,
    Input,
    Output,
    Reflect,
}

impl NodeCategory {
    /// Every category, in display order.
    pub const ALL: [NodeCategory; 6] = [
        NodeCategory::Agent,
        NodeCategory::Action,
        NodeCategory::State,
        NodeCategory::Input,
        NodeCategory::Output,
        NodeCategory::Reflect,
    ];

    /// Position of this variant in [`NodeCategory::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeCategory::Agent => "agent",
            NodeCategory::Action => "action",
            NodeCategory::State => "state",
            NodeCategory::Input => "input",
            NodeCategory::Output => "output",
            NodeCategory::Reflect => "reflect",
        }
    }

    /// The category after this one, wrapping around.
    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    /// The category before this one, wrapping around.
    pub fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl std::fmt::Display for NodeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle stage of a node within a run.
#[derive(Debug, Clone, Copy, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Pending,
    #[serde(alias = "inProgress")]
    InProgress,
    Completed,
}

impl NodeStatus {
    pub const ALL: [NodeStatus; 3] = [
        NodeStatus::Pending,
        NodeStatus::InProgress,
        NodeStatus::Completed,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeStatus::Pending => "pending",
            NodeStatus::InProgress => "in_progress",
            NodeStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-left corner of a node's bounding box, in layout units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Events emitted by the execution simulator.
#[derive(Debug, Clone)]
pub enum FlowEvent {
    /// A run began; every node was reset to pending.
    RunStarted { run_id: RunId, total_steps: usize },
    /// The node at `step` entered in-progress.
    StepStarted {
        run_id: RunId,
        step: usize,
        node_id: String,
    },
    /// The node at `step` completed.
    StepCompleted {
        run_id: RunId,
        step: usize,
        node_id: String,
    },
    /// Every node completed.
    RunFinished { run_id: RunId, total_steps: usize },
    /// The run was stopped before completion.
    RunStopped { run_id: RunId, step: usize },
    /// A start request arrived while `run_id` was active and was ignored.
    StartIgnored { run_id: RunId },
}

impl FlowEvent {
    pub fn run_id(&self) -> &RunId {
        match self {
            FlowEvent::RunStarted { run_id, .. }
            | FlowEvent::StepStarted { run_id, .. }
            | FlowEvent::StepCompleted { run_id, .. }
            | FlowEvent::RunFinished { run_id, .. }
            | FlowEvent::RunStopped { run_id, .. }
            | FlowEvent::StartIgnored { run_id } => run_id,
        }
    }

    /// True for events after which no further step events follow.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FlowEvent::RunFinished { .. } | FlowEvent::RunStopped { .. }
        )
    }
}
