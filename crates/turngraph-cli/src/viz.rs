//! Rendering of decomposed conversations.
//!
//! Output formats:
//! - Self-contained HTML explorer (vis-network, click to drill into tool calls)
//! - JSON (the raw data contract, for custom frontends)
//! - Graphviz DOT (main graph plus one cluster per tool-use view)

use std::io;

use anyhow::{anyhow, Result};
use serde::Serialize;
use serde_json::ser::Formatter;

use turngraph_core::{
    tool_usage_index, ConversationGraph, GraphDocument, GraphNode, SubgraphDocument, SubgraphMap,
    ToolUsageIndex,
};

pub const DEFAULT_TITLE: &str = "LLM Graph Visualization";

// Indentation stops growing past this many levels in DOT and JSON output;
// deep call chains would otherwise make the output quadratic in size.
const MAX_DOT_INDENT: usize = 8;
const MAX_JSON_INDENT: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VizFormat {
    Dot,
    Html,
    Json,
}

impl VizFormat {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dot" | "gv" => Ok(Self::Dot),
            "html" | "htm" => Ok(Self::Html),
            "json" => Ok(Self::Json),
            other => Err(anyhow!(
                "unknown viz format `{other}` (expected dot|html|json)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub format: VizFormat,
    pub title: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            format: VizFormat::Html,
            title: DEFAULT_TITLE.to_string(),
        }
    }
}

/// Everything a client needs: the main graph, the drill-down views, and the
/// tool-usage rows for each view.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VizPayload<'a> {
    pub graph: &'a GraphDocument,
    pub subgraphs: &'a SubgraphMap,
    pub tool_usage: ToolUsageIndex,
}

impl<'a> VizPayload<'a> {
    pub fn new(g: &'a ConversationGraph) -> Self {
        Self {
            graph: &g.graph,
            subgraphs: &g.subgraphs,
            tool_usage: tool_usage_index(&g.subgraphs),
        }
    }
}

pub fn render(g: &ConversationGraph, options: &RenderOptions) -> Result<String> {
    match options.format {
        VizFormat::Dot => Ok(render_dot(g)),
        VizFormat::Json => render_json(g),
        VizFormat::Html => render_html(g, &options.title),
    }
}

pub fn render_json(g: &ConversationGraph) -> Result<String> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, BoundedPretty::default());
    VizPayload::new(g).serialize(&mut ser)?;
    Ok(String::from_utf8(buf)?)
}

/// Pretty printer with two-space indentation capped at `MAX_JSON_INDENT`
/// levels. Otherwise identical to `serde_json::ser::PrettyFormatter`.
#[derive(Debug, Default)]
struct BoundedPretty {
    depth: usize,
    has_value: bool,
}

impl BoundedPretty {
    fn indent<W: ?Sized + io::Write>(&self, writer: &mut W) -> io::Result<()> {
        for _ in 0..self.depth.min(MAX_JSON_INDENT) {
            writer.write_all(b"  ")?;
        }
        Ok(())
    }

    fn open<W: ?Sized + io::Write>(&mut self, writer: &mut W, token: &[u8]) -> io::Result<()> {
        self.depth += 1;
        self.has_value = false;
        writer.write_all(token)
    }

    fn close<W: ?Sized + io::Write>(&mut self, writer: &mut W, token: &[u8]) -> io::Result<()> {
        self.depth -= 1;
        if self.has_value {
            writer.write_all(b"\n")?;
            self.indent(writer)?;
        }
        writer.write_all(token)
    }

    fn item<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        writer.write_all(if first { b"\n" } else { b",\n" })?;
        self.indent(writer)
    }
}

impl Formatter for BoundedPretty {
    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.open(writer, b"[")
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.close(writer, b"]")
    }

    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.item(writer, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, _writer: &mut W) -> io::Result<()> {
        self.has_value = true;
        Ok(())
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.open(writer, b"{")
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.close(writer, b"}")
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.item(writer, first)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, _writer: &mut W) -> io::Result<()> {
        self.has_value = true;
        Ok(())
    }
}

pub fn render_html(g: &ConversationGraph, title: &str) -> Result<String> {
    // `</` is escaped in the embedded JSON so node content containing
    // `</script>` cannot close the script tag.
    let payload = VizPayload::new(g);
    let graph_json = serde_json::to_string(payload.graph)?.replace("</", "<\\/");
    let subgraphs_json = serde_json::to_string(payload.subgraphs)?.replace("</", "<\\/");
    let tool_usage_json = serde_json::to_string(&payload.tool_usage)?.replace("</", "<\\/");

    let nodes_count = g.graph.nodes.len().to_string();
    let edges_count = g.graph.edges.len().to_string();
    let subgraphs_count = g.subgraph_count().to_string();
    let title = html_escape(title);

    let template = include_str!("../templates/graph_explorer.html");
    Ok(fill_template(
        template,
        &[
            ("TITLE", &title),
            ("NODES_COUNT", &nodes_count),
            ("EDGES_COUNT", &edges_count),
            ("SUBGRAPHS_COUNT", &subgraphs_count),
            ("GRAPH_JSON", &graph_json),
            ("SUBGRAPHS_JSON", &subgraphs_json),
            ("TOOL_USAGE_JSON", &tool_usage_json),
        ],
    ))
}

/// Replace `{{NAME}}` markers in a single pass over `template`.
///
/// Substituted text is never rescanned, so node content that happens to
/// contain a marker stays literal. Unknown markers are left as-is.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let extra: usize = values.iter().map(|(_, v)| v.len()).sum();
    let mut out = String::with_capacity(template.len() + extra);
    let mut rest = template;
    while let Some(open) = rest.find("{{") {
        let Some(len) = rest[open + 2..].find("}}") else {
            break;
        };
        let name = &rest[open + 2..open + 2 + len];
        let end = open + 4 + len;
        out.push_str(&rest[..open]);
        match values.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[open..end]),
        }
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn dot_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Label text without the vis-network markup, lines joined with DOT's `\n`.
fn plain_label(label: &str) -> String {
    let stripped = label
        .replace("<b>", "")
        .replace("</b>", "")
        .replace("<i>", "")
        .replace("</i>", "");
    dot_escape(&stripped).replace('\n', "\\n")
}

fn dot_node_line(indent: &str, dot_id: &str, n: &GraphNode) -> String {
    let mut attrs: Vec<String> = vec![
        format!("label=\"{}\"", plain_label(&n.label)),
        format!("shape={}", n.shape.as_str()),
        "style=filled".to_string(),
        format!("fillcolor=\"{}\"", dot_escape(&n.color)),
        format!("fontcolor=\"{}\"", dot_escape(n.font_color())),
    ];
    if let (Some(width), Some(color)) = (n.border_width, n.border_color.as_deref()) {
        attrs.push(format!("penwidth={width}"));
        attrs.push(format!("color=\"{}\"", dot_escape(color)));
    }
    format!("{indent}\"{}\" [{}];\n", dot_escape(dot_id), attrs.join(", "))
}

pub fn render_dot(g: &ConversationGraph) -> String {
    let mut out = String::new();
    out.push_str("digraph turngraph {\n");
    out.push_str("  rankdir=TB;\n");
    out.push_str("  node [fontname=\"Helvetica\"];\n");
    out.push_str("  edge [fontname=\"Helvetica\"];\n\n");

    for n in &g.graph.nodes {
        out.push_str(&dot_node_line("  ", &n.id, n));
    }
    out.push('\n');
    for e in &g.graph.edges {
        out.push_str(&format!(
            "  \"{}\" -> \"{}\";\n",
            dot_escape(&e.from),
            dot_escape(&e.to)
        ));
    }

    for (owner, doc) in &g.subgraphs {
        out.push('\n');
        render_cluster(&mut out, owner, owner, doc, 1);
    }

    out.push_str("}\n");
    out
}

/// Emit one drill-down view as `cluster_<key>`.
///
/// Node ids are scoped as `<key>::<id>` since views are independent
/// documents and may reuse ids from the main graph. `owner_dot_id` is the
/// owner's id in the enclosing view.
fn render_cluster(
    out: &mut String,
    owner_dot_id: &str,
    key: &str,
    doc: &SubgraphDocument,
    depth: usize,
) {
    let indent = "  ".repeat(depth.min(MAX_DOT_INDENT));
    let inner = "  ".repeat((depth + 1).min(MAX_DOT_INDENT));
    let scope = format!("{key}::");

    out.push_str(&format!(
        "{indent}subgraph \"cluster_{}\" {{\n",
        dot_escape(key)
    ));
    out.push_str(&format!("{inner}label=\"tool use: {}\";\n", dot_escape(key)));
    out.push_str(&format!("{inner}style=\"rounded,dashed\";\n"));
    out.push_str(&format!("{inner}color=\"#E67E22\";\n"));
    for n in &doc.nodes {
        out.push_str(&dot_node_line(&inner, &format!("{scope}{}", n.id), n));
    }
    for e in &doc.edges {
        let style = if e.dashed { " [style=dashed]" } else { "" };
        out.push_str(&format!(
            "{inner}\"{}\" -> \"{}\"{style};\n",
            dot_escape(&format!("{scope}{}", e.from)),
            dot_escape(&format!("{scope}{}", e.to))
        ));
    }
    for (nested_key, nested) in &doc.subgraphs {
        render_cluster(
            out,
            &format!("{scope}{nested_key}"),
            nested_key,
            nested,
            depth + 1,
        );
    }
    out.push_str(&format!("{indent}}}\n"));

    // Link the owner to every entry point of its view.
    for entry in doc.nodes.iter().filter(|n| n.is_entry()) {
        out.push_str(&format!(
            "{indent}\"{}\" -> \"{}\" [style=dotted, color=gray50];\n",
            dot_escape(owner_dot_id),
            dot_escape(&format!("{scope}{}", entry.id))
        ));
    }
}

// =============================================================================
// Tests
// =============================================================================
