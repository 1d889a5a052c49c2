//! Presentation attributes for graph nodes.
//!
//! Everything here is a pure function of a node's semantic fields (role,
//! name, value). Two runs over the same conversation produce the same
//! colors, shapes and labels; there is no process-random hashing.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::Role;

/// Maximum number of characters of a value shown inline in a label.
pub const LABEL_BUDGET: usize = 40;
pub const ELLIPSIS: char = '…';

pub const UNNAMED_COLOR: &str = "#CCCCCC";
pub const FUNCTION_CALL_COLOR: &str = "#E67E22";
pub const START_COLOR: &str = "#FF1493";
pub const TOOL_RESULT_COLOR: &str = "#28A745";

pub const LIGHT_TEXT: &str = "#FFFFFF";
pub const DARK_TEXT: &str = "#000000";
pub const FONT_SIZE: u32 = 14;

pub const TOOL_USE_MARKER: &str = "<b>🔧 toolUse: yes</b>";
pub const TOOL_RESULT_HEADING: &str = "<b>TOOL RESULT</b>";

const MAIN_SUBGRAPH_BORDER: Border = Border {
    width: 5,
    color: "#FF0000",
};
const SUBGRAPH_BORDER: Border = Border {
    width: 3,
    color: "#FF0000",
};
const TRUNCATED_BORDER: Border = Border {
    width: 2,
    color: "#FFA500",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Box,
    Circle,
    Ellipse,
    Star,
}

impl Shape {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Box => "box",
            Self::Circle => "circle",
            Self::Ellipse => "ellipse",
            Self::Star => "star",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Font {
    pub size: u32,
    pub color: String,
}

impl Font {
    /// Default-size font with a text color that stays legible on `background`.
    pub fn on(background: &str) -> Self {
        Self {
            size: FONT_SIZE,
            color: text_color_for(background).to_string(),
        }
    }
}

/// Fill color and shape of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appearance {
    pub color: String,
    pub shape: Shape,
}

impl Appearance {
    /// Conversational turns are colored by `name`; tool invocations share one
    /// fixed color so they stand apart from the dialogue.
    pub fn for_turn(role: Role, name: &str) -> Self {
        match role {
            Role::FunctionCall => Self {
                color: FUNCTION_CALL_COLOR.to_string(),
                shape: Shape::Box,
            },
            other => Self {
                color: color_for_name(name),
                shape: shape_for(other),
            },
        }
    }

    /// Synthesized entry markers.
    pub fn start() -> Self {
        Self {
            color: START_COLOR.to_string(),
            shape: Shape::Star,
        }
    }

    /// Synthesized tool-result nodes.
    pub fn tool_result() -> Self {
        Self {
            color: TOOL_RESULT_COLOR.to_string(),
            shape: Shape::Box,
        }
    }

    pub fn font(&self) -> Font {
        Font::on(&self.color)
    }
}

/// Emphasis border drawn around nodes with something to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Border {
    pub width: u32,
    pub color: &'static str,
}

impl Border {
    /// Main-graph nodes with a sub-graph get a heavier border than the same
    /// node would inside a drill-down view.
    pub fn for_main_node(has_subgraph: bool, is_truncated: bool) -> Option<Self> {
        if has_subgraph {
            Some(MAIN_SUBGRAPH_BORDER)
        } else {
            Self::for_node(false, is_truncated)
        }
    }

    pub fn for_node(has_subgraph: bool, is_truncated: bool) -> Option<Self> {
        if has_subgraph {
            Some(SUBGRAPH_BORDER)
        } else if is_truncated {
            Some(TRUNCATED_BORDER)
        } else {
            None
        }
    }
}

pub fn shape_for(role: Role) -> Shape {
    match role {
        Role::System => Shape::Box,
        Role::User => Shape::Circle,
        Role::Assistant => Shape::Ellipse,
        Role::FunctionCall => Shape::Box,
        Role::Unknown => Shape::Ellipse,
    }
}

/// Stable `#rrggbb` color derived from a SHA-256 digest of `name`.
pub fn color_for_name(name: &str) -> String {
    if name.is_empty() {
        return UNNAMED_COLOR.to_string();
    }
    let digest = Sha256::digest(name.as_bytes());
    format!("#{:02x}{:02x}{:02x}", digest[0], digest[1], digest[2])
}

/// Relative luminance of a `#rrggbb` color, in `[0, 1]`.
pub fn luminance(hex: &str) -> Option<f64> {
    let hex = hex.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| -> Option<f64> {
        let c = u8::from_str_radix(&hex[range], 16).ok()? as f64 / 255.0;
        Some(if c <= 0.03928 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        })
    };
    let r = channel(0..2)?;
    let g = channel(2..4)?;
    let b = channel(4..6)?;
    Some(0.2126 * r + 0.7152 * g + 0.0722 * b)
}

/// Light text on dark backgrounds, dark text on light ones.
///
/// Unparseable colors are treated as black.
pub fn text_color_for(background: &str) -> &'static str {
    if luminance(background).unwrap_or(0.0) < 0.5 {
        LIGHT_TEXT
    } else {
        DARK_TEXT
    }
}

pub fn exceeds_budget(value: &str) -> bool {
    value.chars().count() > LABEL_BUDGET
}

/// First `LABEL_BUDGET` characters of `value`, with an ellipsis when cut.
pub fn truncate_for_label(value: &str) -> String {
    if !exceeds_budget(value) {
        return value.to_string();
    }
    let mut out: String = value.chars().take(LABEL_BUDGET).collect();
    out.push(ELLIPSIS);
    out
}

/// Re-serialize JSON text without insignificant whitespace.
///
/// Key order is preserved (`serde_json`'s `preserve_order`). Returns `None`
/// when `raw` is not valid JSON.
pub fn compact_json(raw: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .map(|v| v.to_string())
}

/// Tool arguments as shown in a label: compacted when they are JSON,
/// raw otherwise, then truncated.
pub fn format_tool_args(raw: &str) -> String {
    match compact_json(raw) {
        Some(compact) => truncate_for_label(&compact),
        None => truncate_for_label(raw),
    }
}

/// The lines of a node label, in display order.
#[derive(Debug, Clone, Default)]
pub struct LabelParts<'a> {
    pub role: &'a str,
    pub tool_name: Option<&'a str>,
    pub tool_args: Option<&'a str>,
    pub tool_use: bool,
    pub name: &'a str,
    pub value: &'a str,
}

impl LabelParts<'_> {
    pub fn render(&self) -> String {
        let mut lines: Vec<String> = vec![format!("<b>{}</b>", self.role.to_uppercase())];
        if let Some(tool) = self.tool_name.filter(|t| !t.is_empty()) {
            lines.push(format!("<b>Tool: {tool}</b>"));
        }
        if let Some(args) = self.tool_args.filter(|a| !a.is_empty()) {
            lines.push(format!("<b>Args: {}</b>", format_tool_args(args)));
        }
        if self.tool_use {
            lines.push(TOOL_USE_MARKER.to_string());
        }
        if !self.name.is_empty() {
            lines.push(format!("<i>{}</i>", self.name));
        }
        if !self.value.is_empty() {
            lines.push(truncate_for_label(self.value));
        }
        lines.join("\n")
    }
}

pub fn tool_result_label(result: &str) -> String {
    format!("{TOOL_RESULT_HEADING}\n{}", truncate_for_label(result))
}
