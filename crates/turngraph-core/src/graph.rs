//! Output graph data.
//!
//! These types are the data contract handed to a renderer: they serialize
//! directly into the node/edge objects a vis-network client consumes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::style::{Border, Font, Shape};

/// Role string carried by synthesized entry nodes.
pub const ROLE_START: &str = "start";
/// Role string carried by synthesized tool-result nodes.
pub const ROLE_TOOL_RESULT: &str = "tool_result";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub color: String,
    pub shape: Shape,
    pub font: Font,
    pub role: String,
    pub name: String,
    pub full_value: String,
    pub is_truncated: bool,
    pub has_subgraph: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_args: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_iteration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_color: Option<String>,
}

impl GraphNode {
    pub fn font_color(&self) -> &str {
        &self.font.color
    }

    pub fn is_entry(&self) -> bool {
        self.role == ROLE_START
    }

    pub(crate) fn set_border(&mut self, border: Option<Border>) {
        self.border_width = border.map(|b| b.width);
        self.border_color = border.map(|b| b.color.to_string());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arrow {
    #[default]
    To,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub arrows: Arrow,
    #[serde(rename = "dashes", default)]
    pub dashed: bool,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, dashed: bool) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            arrows: Arrow::To,
            dashed,
        }
    }

    pub fn solid(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::new(from, to, false)
    }
}

/// The main conversation graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<Edge>,
}

impl GraphDocument {
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Sub-graphs keyed by the id of the node that owns them in the enclosing
/// document.
pub type SubgraphMap = BTreeMap<String, SubgraphDocument>;

/// One drill-down view: the tool calls made from a single node, plus any
/// tool calls nested inside them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubgraphDocument {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub subgraphs: SubgraphMap,
}

impl SubgraphDocument {
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Append another document's nodes and edges after ours. Nested keys
    /// from `other` replace ours on collision.
    pub fn absorb(&mut self, other: SubgraphDocument) {
        self.nodes.extend(other.nodes);
        self.edges.extend(other.edges);
        self.subgraphs.extend(other.subgraphs);
    }
}

/// Full decomposition result: the main graph plus every drill-down view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationGraph {
    pub graph: GraphDocument,
    pub subgraphs: SubgraphMap,
}

impl ConversationGraph {
    /// Number of sub-graph documents at every nesting level.
    pub fn subgraph_count(&self) -> usize {
        count_documents(&self.subgraphs)
    }

    /// Look up a sub-graph by key at any nesting depth.
    pub fn find_subgraph(&self, key: &str) -> Option<&SubgraphDocument> {
        find_in(&self.subgraphs, key)
    }
}

fn count_documents(map: &SubgraphMap) -> usize {
    map.values()
        .map(|doc| 1 + count_documents(&doc.subgraphs))
        .sum()
}

fn find_in<'a>(map: &'a SubgraphMap, key: &str) -> Option<&'a SubgraphDocument> {
    if let Some(doc) = map.get(key) {
        return Some(doc);
    }
    map.values().find_map(|doc| find_in(&doc.subgraphs, key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_serializes_with_arrow_and_dashes() {
        let edge = Edge::new("a", "b", true);
        let value = serde_json::to_value(&edge).expect("serialize edge");
        assert_eq!(
            value,
            serde_json::json!({"from": "a", "to": "b", "arrows": "to", "dashes": true})
        );
    }

    #[test]
    fn absorb_appends_in_order_and_overwrites_nested_keys() {
        let mut left = SubgraphDocument {
            edges: vec![Edge::solid("x", "y")],
            ..SubgraphDocument::default()
        };
        left.subgraphs.insert("k".into(), SubgraphDocument::default());

        let mut right = SubgraphDocument {
            edges: vec![Edge::solid("y", "z")],
            ..SubgraphDocument::default()
        };
        right.subgraphs.insert(
            "k".into(),
            SubgraphDocument {
                edges: vec![Edge::solid("p", "q")],
                ..SubgraphDocument::default()
            },
        );

        left.absorb(right);
        let targets: Vec<&str> = left.edges.iter().map(|e| e.to.as_str()).collect();
        assert_eq!(targets, vec!["y", "z"]);
        assert_eq!(left.subgraphs["k"].edges.len(), 1);
    }
}
