use async_trait::async_trait;
use clap::Parser;
use env_logger::{Builder, Target};
use log::LevelFilter;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use vegaquery_common::data::table::VegaQueryTable;
use vegaquery_common::error::{Result, ResultWithContext, VegaQueryError};
use vegaquery_core::protocol::CommMessage;
use vegaquery_runtime::comm::CommChannel;
use vegaquery_runtime::session::{ChartSession, SessionConfig};

/// Writes one JSON object per line to stdout
#[derive(Default)]
struct StdoutChannel {
    stdout: Mutex<Option<tokio::io::Stdout>>,
}

impl StdoutChannel {
    async fn write_line(&self, value: &Value) -> Result<()> {
        let mut line = serde_json::to_string(value)?;
        line.push('\n');
        let mut stdout = self.stdout.lock().await;
        let stdout = stdout.get_or_insert_with(tokio::io::stdout);
        stdout.write_all(line.as_bytes()).await?;
        stdout.flush().await?;
        Ok(())
    }

    async fn write_error(&self, id: &str, err: &VegaQueryError) {
        let message = CommMessage::Error {
            id: id.to_string(),
            message: err.to_string(),
        };
        if let Err(err) = self.send(message).await {
            log::error!("Failed to write error message: {err}");
        }
    }
}

#[async_trait]
impl CommChannel for StdoutChannel {
    async fn send(&self, message: CommMessage) -> Result<()> {
        self.write_line(&serde_json::to_value(&message)?).await
    }
}

/// Commands understood by the bridge in addition to comm messages
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Command {
    /// Register rows as a table and issue a handle for it
    Register { name: String, values: Value },

    /// Render a Vega-Lite spec against a table name or handle
    Render { table: String, spec: Value },
}

const COMMAND_TYPES: [&str; 2] = ["register", "render"];

enum Inbound {
    Command(Command),
    Message(CommMessage),
}

fn parse_line(line: &str) -> Result<Inbound> {
    let value: Value = serde_json::from_str(line)
        .with_context(|| format!("Input line is not valid JSON: {line}"))?;
    let is_command = value
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|typ| COMMAND_TYPES.contains(&typ));
    if is_command {
        let command = serde_json::from_value(value)
            .with_context(|| format!("Invalid command: {line}"))?;
        Ok(Inbound::Command(command))
    } else {
        Ok(Inbound::Message(CommMessage::from_json(line)?))
    }
}

/// Parse a `NAME=PATH` table argument
fn parse_table_arg(arg: &str) -> Result<(String, PathBuf)> {
    let pattern = Regex::new(r"^([^=]+)=(.+)$")
        .map_err(|err| VegaQueryError::internal(err.to_string()))?;
    match pattern.captures(arg) {
        Some(captures) => Ok((captures[1].trim().to_string(), PathBuf::from(&captures[2]))),
        None => Err(VegaQueryError::parse(format!(
            "Table argument must have the form NAME=PATH: {arg}"
        ))),
    }
}

struct Bridge {
    session: Arc<ChartSession>,
    channel: Arc<StdoutChannel>,
    tables: HashMap<String, String>,
    tasks: JoinSet<()>,
}

impl Bridge {
    async fn register(&mut self, name: &str, values: &Value) -> Result<String> {
        let table = VegaQueryTable::from_json(values)
            .with_context(|| format!("Failed to read rows of table {name}"))?;
        let handle = self.session.register_table(name, table).await?;
        self.tables.insert(name.to_string(), handle.clone());
        Ok(handle)
    }

    /// Table names stand in for the handle they were registered under
    fn handle_for(&self, name: &str) -> String {
        self.tables
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    async fn handle_line(&mut self, line: &str) -> Result<()> {
        match parse_line(line)? {
            Inbound::Command(Command::Register { name, values }) => {
                let handle = self.register(&name, &values).await?;
                self.channel
                    .write_line(&json!({"type": "registered", "name": name, "handle": handle}))
                    .await
            }
            Inbound::Command(Command::Render { table, spec }) => {
                let handle = self.handle_for(&table);
                // The compile request is on the wire before the next line is read
                let pending = self.session.begin_render(&spec, &handle).await?;
                let session = self.session.clone();
                let channel = self.channel.clone();
                self.tasks.spawn(async move {
                    let display_id = pending.display_id().to_string();
                    if let Err(err) = session.finish_render(pending).await {
                        log::error!("Render of display {display_id} failed: {err}");
                        channel.write_error(&display_id, &err).await;
                    }
                });
                Ok(())
            }
            Inbound::Message(message) if message.is_reply() => {
                self.session.handle_message(message).await
            }
            Inbound::Message(message) => {
                let message = match message {
                    CommMessage::QueryRequest { id, mut data } => {
                        data.handle = self.handle_for(&data.handle);
                        CommMessage::QueryRequest { id, data }
                    }
                    CommMessage::SqlRequest { id, mut data } => {
                        data.handle = self.handle_for(&data.handle);
                        CommMessage::SqlRequest { id, data }
                    }
                    other => other,
                };
                let session = self.session.clone();
                let channel = self.channel.clone();
                self.tasks.spawn(async move {
                    let id = message.correlation_id().unwrap_or_default().to_string();
                    if let Err(err) = session.handle_message(message).await {
                        channel.write_error(&id, &err).await;
                    }
                });
                Ok(())
            }
        }
    }

    async fn serve<R>(mut self, input: R) -> Result<()>
    where
        R: tokio::io::AsyncRead + Unpin,
    {
        let mut lines = BufReader::new(input).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            if let Err(err) = self.handle_line(&line).await {
                log::warn!("Failed to handle input line: {err}");
                let id = serde_json::from_str::<Value>(&line)
                    .ok()
                    .and_then(|v| v.get("id").and_then(Value::as_str).map(str::to_string))
                    .unwrap_or_default();
                self.channel.write_error(&id, &err).await;
            }
        }

        log::debug!("Input closed, waiting for {} tasks", self.tasks.len());
        while let Some(result) = self.tasks.join_next().await {
            if let Err(err) = result {
                log::error!("Task failed: {err}");
            }
        }
        self.session.close()
    }
}

/// VegaQuery Server
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Table to register at start-up, as NAME=PATH to a JSON array of records
    #[clap(long = "table")]
    pub tables: Vec<String>,

    /// Milliseconds to wait for the frontend to answer a compile request
    #[clap(long, default_value = "30000")]
    pub reply_timeout_ms: u64,

    /// Prefix of expression handles
    #[clap(long, default_value = "ibis-")]
    pub name_prefix: String,

    /// Execute queries at compile time and inline the rows into rendered specs
    #[clap(long, num_args = 0)]
    pub inline: bool,

    /// Log at info level when RUST_LOG is not set
    #[clap(long, num_args = 0)]
    pub verbose: bool,
}

fn init_logging(verbose: bool) {
    let mut builder = Builder::new();
    builder.target(Target::Stderr);
    builder.filter_level(if verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    });
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = SessionConfig {
        name_prefix: args.name_prefix.clone(),
        reply_timeout: Duration::from_millis(args.reply_timeout_ms),
        inline_results: args.inline,
    };
    let channel = Arc::new(StdoutChannel::default());
    let session = Arc::new(ChartSession::try_new(config, channel.clone())?);

    let mut bridge = Bridge {
        session,
        channel,
        tables: HashMap::new(),
        tasks: JoinSet::new(),
    };
    for arg in &args.tables {
        let (name, path) = parse_table_arg(arg)?;
        let text = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read table file {}", path.display()))?;
        let values: Value = serde_json::from_str(&text)?;
        let handle = bridge.register(&name, &values).await?;
        log::info!("Loaded {} as {handle}", path.display());
    }

    bridge.serve(tokio::io::stdin()).await
}
