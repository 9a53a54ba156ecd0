pub mod data;
pub mod graph;
pub mod layout;
pub mod simulator;
pub mod state;

pub use data::symphony_pipeline;
pub use graph::{ExecutionRecord, FlowDefinition, FlowEdge, FlowNode, NodeParam, ToolRef};
pub use layout::{layout_flow, Bounds, LayoutOptions, LayoutStats, NodePlacement};
pub use simulator::{ExecutionProgress, ExecutionSimulator};
pub use state::{FlowState, SharedFlow};
