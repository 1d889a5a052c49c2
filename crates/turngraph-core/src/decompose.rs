//! Conversation tree → graph decomposition.
//!
//! The main conversation becomes one flat graph. Tool invocations do not
//! appear in it directly: every turn that issues function calls is marked
//! `hasSubgraph` and its calls are built into a separate document keyed by
//! the turn's id. Those documents nest the same way for calls made from
//! inside a tool branch.
//!
//! Two traversals share the same child classification:
//! - `MainWalk` appends into one accumulator for the main graph,
//! - [`build_subgraph`] returns a fresh document per call so sibling tool
//!   branches never bleed into each other.

use crate::graph::{
    ConversationGraph, Edge, GraphDocument, GraphNode, SubgraphDocument, SubgraphMap, ROLE_START,
    ROLE_TOOL_RESULT,
};
use crate::model::{Role, Turn};
use crate::style::{exceeds_budget, tool_result_label, Appearance, Border, LabelParts};

/// Id of the single entry node of the main graph.
pub const MAIN_START_ID: &str = "MAIN_START";
/// Iteration reported for function calls that do not carry one.
pub const DEFAULT_TOOL_CALL_ITERATION: i64 = 1;

const SUBGRAPH_START_PREFIX: &str = "START_";
const RESULT_SUFFIX: &str = "_result";

pub fn subgraph_start_id(node_id: &str) -> String {
    format!("{SUBGRAPH_START_PREFIX}{node_id}")
}

pub fn result_node_id(node_id: &str) -> String {
    format!("{node_id}{RESULT_SUFFIX}")
}

/// Which document a turn is being rendered into.
///
/// The main graph shows a function call's arguments on their own label line
/// and its `value` as content; inside a sub-graph the arguments *are* the
/// content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Main,
    Subgraph,
}

/// Decompose a conversation tree into the main graph and its sub-graphs.
pub fn decompose(root: &Turn) -> ConversationGraph {
    let duplicates = root.duplicate_ids();
    if !duplicates.is_empty() {
        tracing::warn!(
            ids = ?duplicates,
            "conversation reuses node ids; graph ids will not be unique"
        );
    }

    let mut walk = MainWalk::default();
    walk.graph.nodes.push(entry_node(
        MAIN_START_ID.to_string(),
        "main_start",
        "Entry point for the main conversation graph".to_string(),
    ));
    walk.visit(root, Some(MAIN_START_ID));

    let out = ConversationGraph {
        graph: walk.graph,
        subgraphs: walk.subgraphs,
    };
    tracing::debug!(
        turns = root.turn_count(),
        nodes = out.graph.nodes.len(),
        edges = out.graph.edges.len(),
        subgraphs = out.subgraph_count(),
        "decomposed conversation"
    );
    out
}

/// Accumulator for the main-graph traversal.
#[derive(Debug, Default)]
struct MainWalk {
    graph: GraphDocument,
    subgraphs: SubgraphMap,
}

impl MainWalk {
    fn visit(&mut self, turn: &Turn, parent: Option<&str>) {
        let children = turn.children();
        let has_subgraph = children.has_function_calls();

        self.graph
            .nodes
            .push(turn_node(turn, View::Main, has_subgraph));
        if let Some(parent) = parent {
            self.graph.edges.push(Edge::solid(parent, &turn.node_id));
        }

        for child in &children.regular {
            self.visit(child, Some(&turn.node_id));
        }

        if has_subgraph {
            let mut doc = SubgraphDocument::default();
            for call in &children.function_calls {
                doc.absorb(build_subgraph(call, None, &turn.name));
            }
            self.subgraphs.insert(turn.node_id.clone(), doc);
        }
    }
}

/// Build the sub-graph rooted at `turn`.
///
/// `parent == None` starts a new drill-down view and adds its entry node.
/// With a parent, the connecting edge is dashed when the turn's `name`
/// differs from `parent_name`.
///
/// A function call with a result gets a result node hanging off the tail
/// of the last regular child's node list (or off the call itself when it
/// has no regular children).
pub fn build_subgraph(turn: &Turn, parent: Option<&str>, parent_name: &str) -> SubgraphDocument {
    let mut out = SubgraphDocument::default();
    let id = turn.node_id.as_str();
    let children = turn.children();

    let start_id = parent.is_none().then(|| subgraph_start_id(id));
    if let Some(start_id) = &start_id {
        out.nodes.push(entry_node(
            start_id.clone(),
            "subgraph_start",
            format!("Entry point for sub-graph starting with {id}"),
        ));
    }

    out.nodes
        .push(turn_node(turn, View::Subgraph, children.has_function_calls()));

    if let Some(start_id) = start_id {
        out.edges.push(Edge::solid(start_id, id));
    }
    if let Some(parent) = parent {
        out.edges
            .push(Edge::new(parent, id, parent_name != turn.name));
    }

    let mut last_node_id = id.to_string();
    for child in &children.regular {
        let branch = build_subgraph(child, Some(id), &turn.name);
        if let Some(tail) = branch.nodes.last() {
            last_node_id = tail.id.clone();
        }
        out.absorb(branch);
    }

    if children.has_function_calls() {
        let mut nested = SubgraphDocument::default();
        for call in &children.function_calls {
            nested.absorb(build_subgraph(call, None, &turn.name));
        }
        out.subgraphs.insert(id.to_string(), nested);
    }

    if turn.is_function_call() && !turn.tool_result.is_empty() {
        let result_id = result_node_id(id);
        out.nodes.push(tool_result_node(result_id.clone(), &turn.tool_result));
        out.edges.push(Edge::solid(last_node_id, result_id));
    }

    out
}

fn turn_node(turn: &Turn, view: View, has_subgraph: bool) -> GraphNode {
    let role = turn.role();
    let is_call = role == Role::FunctionCall;
    let value = match view {
        View::Subgraph if is_call => turn.tool_args.as_str(),
        _ => turn.value.as_str(),
    };

    let label = LabelParts {
        role: &turn.role,
        tool_name: is_call.then_some(turn.tool_name.as_str()),
        tool_args: (is_call && view == View::Main).then_some(turn.tool_args.as_str()),
        tool_use: has_subgraph,
        name: &turn.name,
        value,
    }
    .render();

    let appearance = Appearance::for_turn(role, &turn.name);
    let is_truncated = exceeds_budget(value);
    let mut node = GraphNode {
        id: turn.node_id.clone(),
        label,
        font: appearance.font(),
        color: appearance.color,
        shape: appearance.shape,
        role: turn.role.clone(),
        name: turn.name.clone(),
        full_value: value.to_string(),
        is_truncated,
        has_subgraph,
        tool_name: None,
        tool_args: None,
        tool_result: None,
        tool_call_iteration: None,
        border_width: None,
        border_color: None,
    };
    if is_call {
        node.tool_name = Some(turn.tool_name.clone());
        node.tool_args = Some(turn.tool_args.clone());
        node.tool_result = Some(turn.tool_result.clone());
        node.tool_call_iteration = Some(
            turn.tool_call_iteration
                .unwrap_or(DEFAULT_TOOL_CALL_ITERATION),
        );
    }
    node.set_border(match view {
        View::Main => Border::for_main_node(has_subgraph, is_truncated),
        View::Subgraph => Border::for_node(has_subgraph, is_truncated),
    });
    node
}

fn entry_node(id: String, name: &str, description: String) -> GraphNode {
    let appearance = Appearance::start();
    GraphNode {
        id,
        label: String::new(),
        font: appearance.font(),
        color: appearance.color,
        shape: appearance.shape,
        role: ROLE_START.to_string(),
        name: name.to_string(),
        full_value: description,
        is_truncated: false,
        has_subgraph: false,
        tool_name: None,
        tool_args: None,
        tool_result: None,
        tool_call_iteration: None,
        border_width: None,
        border_color: None,
    }
}

fn tool_result_node(id: String, result: &str) -> GraphNode {
    let appearance = Appearance::tool_result();
    let is_truncated = exceeds_budget(result);
    let mut node = GraphNode {
        id,
        label: tool_result_label(result),
        font: appearance.font(),
        color: appearance.color,
        shape: appearance.shape,
        role: ROLE_TOOL_RESULT.to_string(),
        name: "tool_result".to_string(),
        full_value: result.to_string(),
        is_truncated,
        has_subgraph: false,
        tool_name: None,
        tool_args: None,
        tool_result: None,
        tool_call_iteration: None,
        border_width: None,
        border_color: None,
    };
    node.set_border(Border::for_node(false, is_truncated));
    node
}
