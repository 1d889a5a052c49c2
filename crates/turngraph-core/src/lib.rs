//! Turngraph core
//!
//! Turns a nested conversation record (system/user/assistant/function-call
//! turns) into renderable graph data:
//! - one flat graph for the main conversation,
//! - one drill-down document per turn that issued tool calls, nested as deep
//!   as the tool calls themselves nest.
//!
//! The transformation is a pure function of the input tree. Loading and
//! rendering live at the edges (`model::load_conversation`, the CLI crate).

pub mod decompose;
pub mod error;
pub mod graph;
pub mod model;
pub mod style;
pub mod tool_usage;

pub use decompose::{build_subgraph, decompose, MAIN_START_ID};
pub use error::{Error, Result};
pub use graph::{ConversationGraph, Edge, GraphDocument, GraphNode, SubgraphDocument, SubgraphMap};
pub use model::{load_conversation, parse_conversation, Role, Turn};
pub use tool_usage::{tool_usage, tool_usage_index, ToolUsageIndex, ToolUsageRow};
