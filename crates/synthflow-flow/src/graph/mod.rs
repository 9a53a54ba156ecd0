//! Pipeline graph model.
//!
//! A flow is an ordered list of `FlowNode`s plus a list of `FlowEdge`s.
//! Node order is significant: the simulator walks nodes by index. Edges
//! only describe how the view connects nodes and how the layout layers them.

pub mod definition;
pub mod edge;
pub mod node;

pub use definition::FlowDefinition;
pub use edge::FlowEdge;
pub use node::{ExecutionRecord, FlowNode, NodeParam, ToolRef};
