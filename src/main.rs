use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use url::Url;

use switchboard_config::FlowDef;
use switchboard_runtime::{CallHandler, EventData, RuntimeConfig, Snapshot};
use switchboard_store::{SqliteStore, Store};
use switchboard_workflow::{Flow, validate};

/// Switchboard - durable call flows for programmable telephony
#[derive(Parser)]
#[command(name = "switchboard")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.switchboard)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Url the telephony platform posts turns to
  #[arg(long, global = true, default_value = "http://localhost:8080/call")]
  base_url: Url,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Check a flow definition for structural errors
  Validate {
    /// Path to the flow file (JSON)
    flow_file: PathBuf,
  },

  /// Run one turn of a flow and print the response document
  ///
  /// Request fields come from `--param` and, when piped, a JSON object on
  /// stdin. Pass `wf_InstanceId` (and `wf_Bookmark`) to continue an execution.
  Turn {
    /// Path to the flow file (JSON)
    flow_file: PathBuf,

    /// A request field, e.g. `--param Digits=1`
    #[arg(long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,
  },

  /// Print the persisted state of a suspended execution
  Inspect { execution_id: String },

  /// List suspended executions
  List,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".switchboard"),
  };

  match cli.command {
    Some(Commands::Validate { flow_file }) => validate_flow(&flow_file),
    Some(Commands::Turn { flow_file, params }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(run_turn(flow_file, params, data_dir, cli.base_url))
    }
    Some(Commands::Inspect { execution_id }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(inspect(execution_id, data_dir))
    }
    Some(Commands::List) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(list(data_dir))
    }
    None => {
      println!("switchboard - use --help to see available commands");
      Ok(())
    }
  }
}

fn read_flow_def(flow_file: &Path) -> Result<FlowDef> {
  let content = std::fs::read_to_string(flow_file)
    .with_context(|| format!("failed to read flow file: {}", flow_file.display()))?;
  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse flow file: {}", flow_file.display()))
}

fn validate_flow(flow_file: &Path) -> Result<()> {
  let def = read_flow_def(flow_file)?;
  let errors = validate(&def);
  if errors.is_empty() {
    println!("{}: ok", def.flow_id);
    return Ok(());
  }

  for error in &errors {
    println!("{}", error);
  }
  bail!("flow '{}' has {} validation error(s)", def.flow_id, errors.len())
}

async fn open_store(data_dir: &Path) -> Result<SqliteStore> {
  tokio::fs::create_dir_all(data_dir)
    .await
    .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

  let options = SqliteConnectOptions::new()
    .filename(data_dir.join("switchboard.db"))
    .create_if_missing(true);
  let pool = SqlitePoolOptions::new()
    .connect_with(options)
    .await
    .context("failed to open database")?;

  let store = SqliteStore::new(pool);
  store.migrate().await.context("failed to run migrations")?;
  Ok(store)
}

async fn run_turn(
  flow_file: PathBuf,
  params: Vec<String>,
  data_dir: PathBuf,
  base_url: Url,
) -> Result<()> {
  let flow = Flow::from_def(read_flow_def(&flow_file)?).context("failed to lock flow")?;
  eprintln!("Loaded flow: {} ({})", flow.name, flow.flow_id);

  let mut event = read_event_from_stdin()?;
  for param in params {
    let (key, value) = param
      .split_once('=')
      .with_context(|| format!("invalid --param '{}', expected KEY=VALUE", param))?;
    event.insert(key.to_string(), value.to_string());
  }

  let store = open_store(&data_dir).await?;
  let handler = CallHandler::new(flow, store, RuntimeConfig::new(base_url))?;

  let response = handler
    .handle(event, CancellationToken::new())
    .await
    .context("turn failed")?;

  eprintln!(
    "Execution {} is {:?}",
    response.execution_id, response.status
  );
  println!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>{}",
    response.markup
  );

  Ok(())
}

async fn inspect(execution_id: String, data_dir: PathBuf) -> Result<()> {
  let store = open_store(&data_dir).await?;
  let blob = store
    .load_state(&execution_id)
    .await?
    .with_context(|| format!("execution '{}' not found", execution_id))?;

  let snapshot = Snapshot::from_blob(&blob).context("failed to decode execution state")?;
  println!("{}", serde_json::to_string_pretty(&snapshot)?);
  Ok(())
}

async fn list(data_dir: PathBuf) -> Result<()> {
  let store = open_store(&data_dir).await?;
  for record in store.list_executions().await? {
    println!(
      "{}\t{}\tturn {}\t{} bookmark(s)\t{}",
      record.execution_id,
      record.flow_id,
      record.turn,
      record.pending_bookmarks,
      record.updated_at.to_rfc3339()
    );
  }
  Ok(())
}

/// Request fields piped on stdin as a JSON object of strings.
fn read_event_from_stdin() -> Result<EventData> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    return Ok(EventData::new());
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read request fields from stdin")?;

  if input.trim().is_empty() {
    Ok(EventData::new())
  } else {
    serde_json::from_str(&input).context("failed to parse request fields from stdin")
  }
}
