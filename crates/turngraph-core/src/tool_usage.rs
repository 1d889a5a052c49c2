//! Tool-usage tables for drill-down views.
//!
//! Clicking a node with a sub-graph opens a table of the tool calls it made.
//! The rows are computed here so every renderer lists the same calls.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::decompose::DEFAULT_TOOL_CALL_ITERATION;
use crate::graph::{SubgraphDocument, SubgraphMap};
use crate::model::Role;

pub const UNKNOWN_TOOL: &str = "Unknown Tool";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUsageRow {
    pub node_id: String,
    pub tool_name: String,
    pub tool_args: String,
    pub tool_result: String,
    pub iteration: i64,
}

/// Rows per sub-graph key, at every nesting depth.
pub type ToolUsageIndex = BTreeMap<String, Vec<ToolUsageRow>>;

/// Function calls listed directly in `doc` (nested documents excluded), in
/// document order.
pub fn tool_usage(doc: &SubgraphDocument) -> Vec<ToolUsageRow> {
    doc.nodes
        .iter()
        .filter(|n| Role::classify(&n.role) == Role::FunctionCall)
        .map(|n| ToolUsageRow {
            node_id: n.id.clone(),
            tool_name: n
                .tool_name
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| UNKNOWN_TOOL.to_string()),
            tool_args: n.tool_args.clone().unwrap_or_default(),
            tool_result: n.tool_result.clone().unwrap_or_default(),
            iteration: n.tool_call_iteration.unwrap_or(DEFAULT_TOOL_CALL_ITERATION),
        })
        .collect()
}

pub fn tool_usage_index(subgraphs: &SubgraphMap) -> ToolUsageIndex {
    let mut index = ToolUsageIndex::new();
    collect(subgraphs, &mut index);
    index
}

fn collect(subgraphs: &SubgraphMap, index: &mut ToolUsageIndex) {
    for (key, doc) in subgraphs {
        index.insert(key.clone(), tool_usage(doc));
        collect(&doc.subgraphs, index);
    }
}
