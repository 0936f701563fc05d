use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

const CARS: &str = r#"{"type": "register", "name": "cars", "values": [
    {"a": 1, "b": 2.0}, {"a": 1, "b": 4.0}, {"a": 2, "b": 10.0}
]}"#;

/// Server process driven one line at a time
struct Server {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

impl Server {
    fn spawn(args: &[&str]) -> Self {
        let mut child = Command::cargo_bin("vegaquery-server")
            .expect("Failed to build vegaquery-server")
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .expect("Failed to start vegaquery-server");
        let stdin = child.stdin.take();
        let stdout = BufReader::new(child.stdout.take().unwrap());
        Self {
            child,
            stdin,
            stdout,
        }
    }

    fn send(&mut self, line: &str) {
        let stdin = self.stdin.as_mut().unwrap();
        writeln!(stdin, "{}", line.replace('\n', " ")).unwrap();
        stdin.flush().unwrap();
    }

    fn recv(&mut self) -> Value {
        let mut line = String::new();
        self.stdout.read_line(&mut line).unwrap();
        serde_json::from_str(&line).unwrap_or_else(|err| panic!("{err}: {line:?}"))
    }

    fn close(mut self) {
        drop(self.stdin.take());
        assert!(self.child.wait().unwrap().success());
    }
}

fn sorted_rows(rows: &Value) -> Vec<Value> {
    let mut rows = rows.as_array().unwrap().clone();
    rows.sort_by_key(|r| r["a"].as_i64());
    rows
}

#[test]
fn test_render_then_query() {
    let mut server = Server::spawn(&[]);

    server.send(CARS);
    let registered = server.recv();
    assert_eq!(registered["type"], json!("registered"));
    let handle = registered["handle"].as_str().unwrap().to_string();
    assert!(handle.starts_with("ibis-"));

    server.send(
        &json!({
            "type": "render",
            "table": "cars",
            "spec": {"mark": "bar", "encoding": {"x": {"field": "a"}, "y": {"field": "b"}}}
        })
        .to_string(),
    );
    let display = server.recv();
    assert_eq!(display["type"], json!("display"));
    let compile_request = server.recv();
    assert_eq!(compile_request["type"], json!("compile_request"));
    assert_eq!(compile_request["id"], json!("1"));
    assert_eq!(compile_request["spec"]["data"], json!({"name": handle}));

    server.send(
        &json!({
            "type": "compile_response",
            "id": "1",
            "spec": {
                "$schema": "https://vega.github.io/schema/vega/v5.json",
                "data": [
                    {"name": handle},
                    {"name": "data_0", "source": handle, "transform": [
                        {"type": "aggregate", "groupby": ["a"], "ops": ["mean"], "fields": ["b"], "as": ["avg_b"]}
                    ]}
                ],
                "marks": [{"type": "rect", "from": {"data": "data_0"}}]
            }
        })
        .to_string(),
    );
    let update = server.recv();
    assert_eq!(update["type"], json!("update_display"));
    assert_eq!(update["display_id"], display["display_id"]);
    let descriptor =
        &update["data"]["data"]["application/vnd.vega.ibis.v5+json"]["data"][0]["transform"][0];
    assert_eq!(descriptor["type"], json!("queryibis"));
    assert_eq!(descriptor["handle"], json!(handle));

    server.send(
        &json!({
            "type": "query_request",
            "id": "q1",
            "data": {"handle": handle, "transform": descriptor["transform"]}
        })
        .to_string(),
    );
    let response = server.recv();
    assert_eq!(response["type"], json!("query_response"));
    assert_eq!(response["id"], json!("q1"));
    assert_eq!(
        sorted_rows(&response["rows"]),
        vec![json!({"a": 1, "avg_b": 3.0}), json!({"a": 2, "avg_b": 10.0})]
    );

    server.close();
}

#[test]
fn test_unanswered_render_falls_back_to_placeholder() {
    let input = format!(
        "{}\n{}\n",
        CARS.replace('\n', " "),
        json!({"type": "render", "table": "cars", "spec": {"mark": "bar"}})
    );
    assert_cmd::Command::cargo_bin("vegaquery-server")
        .unwrap()
        .args(["--reply-timeout-ms", "50"])
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""type":"compile_request""#))
        .stdout(predicate::str::contains(r#""type":"update_display""#))
        .stdout(predicate::str::contains("An empty vega v5 spec"));
}

#[test]
fn test_malformed_lines_do_not_stop_the_server() {
    let input = format!(
        "not json\n{}\n{}\n",
        json!({"type": "query_request", "id": "q9", "data": {"handle": "missing"}}),
        CARS.replace('\n', " ")
    );
    assert_cmd::Command::cargo_bin("vegaquery-server")
        .unwrap()
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Input line is not valid JSON"))
        .stdout(predicate::str::contains(r#""type":"error","id":"q9""#))
        .stdout(predicate::str::contains(r#""type":"registered""#));
}

#[test]
fn test_sql_request_for_table_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"[{{"a": 1, "b": 2.0}}, {{"a": 2, "b": 3.0}}]"#).unwrap();
    let table_arg = format!("cars={}", file.path().display());

    let input = format!(
        "{}\n",
        json!({
            "type": "sql_request",
            "id": "s1",
            "data": {"handle": "cars", "transform": [
                {"groupby": ["a"]},
                {"aggregate": [{"op": "mean", "field": "b", "as": "avg_b"}]}
            ]}
        })
    );
    assert_cmd::Command::cargo_bin("vegaquery-server")
        .unwrap()
        .args(["--table", &table_arg])
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""type":"sql_response","id":"s1""#))
        .stdout(predicate::str::contains("GROUP BY"));
}

#[test]
fn test_missing_table_file_fails_start_up() {
    assert_cmd::Command::cargo_bin("vegaquery-server")
        .unwrap()
        .args(["--table", "cars=/nonexistent/cars.json"])
        .write_stdin("")
        .assert()
        .failure();
}
