//! Conversation input model.
//!
//! A conversation record is a rooted tree of turns. Each turn owns its
//! children through `pointingToNode`; there is no sharing between branches.
//!
//! Only `nodeId` is required. Everything else is read leniently:
//! - missing or `null` strings read as `""`,
//! - a missing `role` reads as `unknown`,
//! - a missing `pointingToNode` reads as an empty list.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};

/// Role classification used for shape/color selection and child partitioning.
///
/// The raw role string of a turn is kept for display; this enum only decides
/// how the turn is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    System,
    User,
    Assistant,
    FunctionCall,
    Unknown,
}

impl Role {
    pub fn classify(raw: &str) -> Self {
        match raw {
            "system" => Self::System,
            "user" => Self::User,
            "assistant" => Self::Assistant,
            "function_call" => Self::FunctionCall,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::FunctionCall => "function_call",
            Self::Unknown => "unknown",
        }
    }
}

/// One turn of the conversation tree.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    #[serde(deserialize_with = "node_id")]
    pub node_id: String,
    #[serde(default = "unknown_role", deserialize_with = "role_or_unknown")]
    pub role: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub value: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tool_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tool_args: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tool_result: String,
    #[serde(default)]
    pub tool_call_iteration: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pointing_to_node: Vec<Turn>,
}

impl Turn {
    /// A bare turn with no content and no children.
    pub fn new(node_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            role: role.into(),
            value: String::new(),
            name: String::new(),
            tool_name: String::new(),
            tool_args: String::new(),
            tool_result: String::new(),
            tool_call_iteration: None,
            pointing_to_node: Vec::new(),
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_tool(
        mut self,
        tool_name: impl Into<String>,
        tool_args: impl Into<String>,
        tool_result: impl Into<String>,
    ) -> Self {
        self.tool_name = tool_name.into();
        self.tool_args = tool_args.into();
        self.tool_result = tool_result.into();
        self
    }

    pub fn with_iteration(mut self, iteration: i64) -> Self {
        self.tool_call_iteration = Some(iteration);
        self
    }

    pub fn with_child(mut self, child: Turn) -> Self {
        self.pointing_to_node.push(child);
        self
    }

    pub fn role(&self) -> Role {
        Role::classify(&self.role)
    }

    pub fn is_function_call(&self) -> bool {
        self.role() == Role::FunctionCall
    }

    /// Split children into conversational turns and tool invocations.
    ///
    /// Order within each partition follows `pointingToNode`.
    pub fn children(&self) -> Children<'_> {
        let (function_calls, regular): (Vec<&Turn>, Vec<&Turn>) = self
            .pointing_to_node
            .iter()
            .partition(|child| child.is_function_call());
        Children {
            regular,
            function_calls,
        }
    }

    /// Number of turns in this subtree (including `self`).
    pub fn turn_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(turn) = stack.pop() {
            count += 1;
            stack.extend(turn.pointing_to_node.iter());
        }
        count
    }

    /// Node ids that appear more than once in this subtree, sorted.
    pub fn duplicate_ids(&self) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut dupes: BTreeSet<&str> = BTreeSet::new();
        let mut stack = vec![self];
        while let Some(turn) = stack.pop() {
            if !seen.insert(turn.node_id.as_str()) {
                dupes.insert(turn.node_id.as_str());
            }
            stack.extend(turn.pointing_to_node.iter());
        }
        dupes.into_iter().map(str::to_string).collect()
    }
}

/// Partition of a turn's children.
#[derive(Debug, Clone, Default)]
pub struct Children<'a> {
    pub regular: Vec<&'a Turn>,
    pub function_calls: Vec<&'a Turn>,
}

impl Children<'_> {
    pub fn has_function_calls(&self) -> bool {
        !self.function_calls.is_empty()
    }
}

/// Parse a conversation record from JSON text.
///
/// Conversation chains nest one level per turn, so the default
/// `serde_json` nesting limit is lifted.
pub fn parse_conversation(text: &str) -> serde_json::Result<Turn> {
    let mut de = serde_json::Deserializer::from_str(text);
    de.disable_recursion_limit();
    let turn = Turn::deserialize(&mut de)?;
    de.end()?;
    Ok(turn)
}

/// Read and parse a conversation record from disk.
pub fn load_conversation(path: &Path) -> Result<Turn> {
    let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_conversation(&text).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn unknown_role() -> String {
    Role::Unknown.as_str().to_string()
}

fn role_or_unknown<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(unknown_role))
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNodeId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

fn node_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawNodeId::deserialize(deserializer)? {
        RawNodeId::Text(s) => s,
        RawNodeId::Signed(n) => n.to_string(),
        RawNodeId::Unsigned(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_read_as_defaults() {
        let turn = parse_conversation(r#"{"nodeId": "r"}"#).expect("parse");
        assert_eq!(turn.node_id, "r");
        assert_eq!(turn.role, "unknown");
        assert_eq!(turn.role(), Role::Unknown);
        assert!(turn.value.is_empty());
        assert!(turn.name.is_empty());
        assert!(turn.tool_call_iteration.is_none());
        assert!(turn.pointing_to_node.is_empty());
    }

    #[test]
    fn null_fields_read_as_defaults() {
        let turn = parse_conversation(
            r#"{"nodeId": "r", "role": null, "value": null, "name": null,
                "toolResult": null, "pointingToNode": null}"#,
        )
        .expect("parse");
        assert_eq!(turn.role, "unknown");
        assert!(turn.value.is_empty());
        assert!(turn.tool_result.is_empty());
        assert!(turn.pointing_to_node.is_empty());
    }

    #[test]
    fn unrecognized_role_is_kept_verbatim() {
        let turn = parse_conversation(r#"{"nodeId": "r", "role": "tool"}"#).expect("parse");
        assert_eq!(turn.role, "tool");
        assert_eq!(turn.role(), Role::Unknown);
    }

    #[test]
    fn integer_node_ids_are_accepted() {
        let turn = parse_conversation(r#"{"nodeId": 17, "pointingToNode": [{"nodeId": "x"}]}"#)
            .expect("parse");
        assert_eq!(turn.node_id, "17");
        assert_eq!(turn.pointing_to_node[0].node_id, "x");
    }

    #[test]
    fn missing_node_id_is_rejected() {
        assert!(parse_conversation(r#"{"role": "user"}"#).is_err());
        assert!(parse_conversation("not json").is_err());
        assert!(parse_conversation(r#"{"nodeId": "a"} trailing"#).is_err());
    }

    #[test]
    fn deep_chains_parse_past_the_default_nesting_limit() {
        let depth = 150;
        let mut text = String::new();
        for i in 0..depth {
            text.push_str(&format!(r#"{{"nodeId": "n{i}", "role": "user", "pointingToNode": ["#));
        }
        text.push_str(r#"{"nodeId": "leaf"}"#);
        for _ in 0..depth {
            text.push_str("]}");
        }
        let turn = parse_conversation(&text).expect("parse deep chain");
        assert_eq!(turn.turn_count(), depth + 1);
    }

    #[test]
    fn children_partition_preserves_order() {
        let turn = Turn::new("r", "user")
            .with_child(Turn::new("a", "assistant"))
            .with_child(Turn::new("f1", "function_call"))
            .with_child(Turn::new("b", "system"))
            .with_child(Turn::new("f2", "function_call"));
        let children = turn.children();
        let regular: Vec<&str> = children.regular.iter().map(|t| t.node_id.as_str()).collect();
        let calls: Vec<&str> = children
            .function_calls
            .iter()
            .map(|t| t.node_id.as_str())
            .collect();
        assert_eq!(regular, vec!["a", "b"]);
        assert_eq!(calls, vec!["f1", "f2"]);
        assert!(children.has_function_calls());
    }

    #[test]
    fn duplicate_ids_are_reported_once() {
        let turn = Turn::new("r", "user")
            .with_child(Turn::new("x", "assistant").with_child(Turn::new("x", "user")))
            .with_child(Turn::new("x", "user"))
            .with_child(Turn::new("r", "user"));
        assert_eq!(turn.duplicate_ids(), vec!["r".to_string(), "x".to_string()]);
    }
}
