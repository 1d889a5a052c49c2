use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const SAMPLE: &str = r#"{
  "nodeId": "r",
  "role": "user",
  "value": "hello",
  "pointingToNode": [
    {
      "nodeId": "a",
      "role": "function_call",
      "name": "agent",
      "toolName": "search",
      "toolArgs": "{\"q\": \"x\"}",
      "toolResult": "42",
      "pointingToNode": []
    }
  ]
}"#;

fn turngraph_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_turngraph"))
}

fn write_input(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).expect("write input");
    path
}

fn run(args: &[&std::ffi::OsStr]) -> Output {
    Command::new(turngraph_bin())
        .args(args)
        .env_remove("TURNGRAPH_LOG")
        .output()
        .expect("run turngraph")
}

#[test]
fn json_output_matches_the_data_contract() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_input(dir.path(), "conv.json", SAMPLE);
    let out = dir.path().join("graph.json");

    let output = run(&[
        input.as_os_str(),
        "--format".as_ref(),
        "json".as_ref(),
        "-o".as_ref(),
        out.as_os_str(),
    ]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("nodes=2 edges=1 subgraphs=1"), "stdout: {stdout}");

    let text = fs::read_to_string(&out).expect("read output");
    let value: serde_json::Value = serde_json::from_str(&text).expect("parse output");

    let ids: Vec<&str> = value["graph"]["nodes"]
        .as_array()
        .expect("nodes")
        .iter()
        .filter_map(|n| n["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["MAIN_START", "r"]);
    assert_eq!(value["graph"]["nodes"][1]["hasSubgraph"], true);
    assert_eq!(value["graph"]["nodes"][1]["borderColor"], "#FF0000");

    let sub = &value["subgraphs"]["r"];
    let sub_ids: Vec<&str> = sub["nodes"]
        .as_array()
        .expect("subgraph nodes")
        .iter()
        .filter_map(|n| n["id"].as_str())
        .collect();
    assert_eq!(sub_ids, vec!["START_a", "a", "a_result"]);
    assert_eq!(sub["edges"].as_array().map(Vec::len), Some(2));
    assert_eq!(sub["nodes"][1]["toolArgs"], "{\"q\": \"x\"}");
    assert!(sub["nodes"][1]["label"]
        .as_str()
        .expect("label")
        .contains("<b>Args: {\"q\":\"x\"}</b>"));

    assert_eq!(value["toolUsage"]["r"][0]["toolName"], "search");
    assert_eq!(value["toolUsage"]["r"][0]["iteration"], 1);
}

#[test]
fn html_is_the_default_format() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_input(dir.path(), "conv.json", SAMPLE);
    let out = dir.path().join("graph.html");

    let output = run(&[
        input.as_os_str(),
        "--out".as_ref(),
        out.as_os_str(),
        "--title".as_ref(),
        "Agent run".as_ref(),
    ]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let html = fs::read_to_string(&out).expect("read output");
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("<title>Agent run</title>"));
    assert!(html.contains("vis-network"));
    assert!(html.contains("\"START_a\""));
    assert!(html.contains("\"toolName\":\"search\""));
}

#[test]
fn dot_output_has_a_cluster_per_view() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_input(dir.path(), "conv.json", SAMPLE);
    let out = dir.path().join("graph.dot");

    let output = run(&[
        input.as_os_str(),
        "--format".as_ref(),
        "dot".as_ref(),
        "-o".as_ref(),
        out.as_os_str(),
    ]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let dot = fs::read_to_string(&out).expect("read output");
    assert!(dot.contains("subgraph \"cluster_r\""));
    assert!(dot.contains("\"r::a\" -> \"r::a_result\""));
}

#[test]
fn invalid_json_fails_without_writing_output() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_input(dir.path(), "broken.json", "{\"nodeId\": \"r\", ");
    let out = dir.path().join("graph.html");

    let output = run(&[input.as_os_str(), "-o".as_ref(), out.as_os_str()]);
    assert!(!output.status.success());
    assert!(!out.exists());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("broken.json"), "stderr: {stderr}");
}

#[test]
fn missing_input_file_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("nope.json");
    let out = dir.path().join("graph.html");

    let output = run(&[input.as_os_str(), "-o".as_ref(), out.as_os_str()]);
    assert!(!output.status.success());
    assert!(!out.exists());
}

#[test]
fn missing_argument_is_a_usage_error() {
    let output = run(&[]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "stderr: {stderr}");
}

#[test]
fn unknown_format_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_input(dir.path(), "conv.json", SAMPLE);
    let out = dir.path().join("graph.svg");

    let output = run(&[
        input.as_os_str(),
        "--format".as_ref(),
        "svg".as_ref(),
        "-o".as_ref(),
        out.as_os_str(),
    ]);
    assert!(!output.status.success());
    assert!(!out.exists());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown viz format"));
}

/// A user turn whose tool call nests `depth` further calls, one per level.
fn nested_calls(depth: usize) -> String {
    let mut text = String::from(r#"{"nodeId": "r", "role": "user", "pointingToNode": ["#);
    for i in 0..depth {
        text.push_str(&format!(
            r#"{{"nodeId": "c{i}", "role": "function_call", "toolName": "step", "pointingToNode": ["#
        ));
    }
    for _ in 0..=depth {
        text.push_str("]}");
    }
    text
}

#[test]
fn deeply_nested_tool_calls_render_in_every_format() {
    let depth = 12_000;
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_input(dir.path(), "input.json", &nested_calls(depth));
    let expected = format!("nodes=2 edges=1 subgraphs={depth}");

    for format in ["json", "html", "dot"] {
        let out = dir.path().join(format!("deep.{format}"));
        let output = run(&[
            input.as_os_str(),
            "--format".as_ref(),
            format.as_ref(),
            "-o".as_ref(),
            out.as_os_str(),
        ]);
        assert!(
            output.status.success(),
            "{format} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains(&expected), "{format} stdout: {stdout}");
        assert!(out.metadata().expect("output written").len() > 0);
    }
}
