use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::future::join_all;
use linode_query::config::Config;
use linode_query::datasource::{DataSource, QuerySettings};
use linode_query::filter::{cancel_pair, get_all_kind_keys, Diagnostics, FilterClause, FilterError};
use linode_query::linode::LinodeClient;
use linode_query::manifest::{DataSourceQuery, Manifest};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Query Linode list endpoints with typed, pushdown-aware filters
#[derive(Parser, Debug)]
#[command(name = "linode-query", version, about, long_about = None)]
struct Args {
    /// Linode personal access token
    #[arg(long, global = true)]
    token: Option<String>,

    /// API base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Records per page (25-500)
    #[arg(long, global = true)]
    page_size: Option<u32>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read every data source in a manifest
    Read { file: PathBuf },
    /// Plan every data source in a manifest without calling the API
    Plan { file: PathBuf },
    /// List registered kinds, or the fields of one kind
    Kinds { kind: Option<String> },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(err) => {
            eprintln!("Failed to open log file {}: {}", log_path.display(), err);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("linode-query started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("linode-query").join("linode-query.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".linode-query").join("linode-query.log");
    }
    PathBuf::from("linode-query.log")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    let config = Config::load();
    let settings = config.query_settings(args.page_size);

    let output = match &args.command {
        Command::Read { file } => {
            let manifest = Manifest::load(file)?;
            let token = config.effective_token(args.token.as_deref());
            let api_url = config.effective_api_url(args.api_url.as_deref());
            let client = LinodeClient::with_base_url(token, &api_url)
                .with_context(|| format!("failed to create client for {}", api_url))?;
            run_reads(&client, &manifest, &settings).await?
        }
        Command::Plan { file } => {
            let manifest = Manifest::load(file)?;
            plan_all(&manifest, &settings)?
        }
        Command::Kinds { kind } => describe_kinds(kind.as_deref())?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run_reads(client: &LinodeClient, manifest: &Manifest, settings: &QuerySettings) -> Result<Value> {
    let (handle, signal) = cancel_pair();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling in-flight reads");
            handle.cancel();
        }
    });

    let reads = manifest.data_sources.iter().map(|query| {
        let signal = signal.clone();
        async move {
            let result = match DataSource::lookup(&query.kind) {
                Ok(source) => source.read(client, &query.request, settings, &signal).await,
                Err(err) => Err(err),
            };
            (query, result)
        }
    });

    let mut output = Map::new();
    let mut failed = 0usize;

    for (query, result) in join_all(reads).await {
        let value = match result {
            Ok(state) => serde_json::to_value(state)?,
            Err(err) => {
                failed += 1;
                report(query, &err)
            }
        };
        output.insert(query.name.clone(), value);
    }

    if failed > 0 {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Err(anyhow!("{} of {} data source(s) failed", failed, manifest.data_sources.len()));
    }

    Ok(Value::Object(output))
}

fn plan_all(manifest: &Manifest, settings: &QuerySettings) -> Result<Value> {
    let mut output = Map::new();
    let mut failed = 0usize;

    for query in &manifest.data_sources {
        let prepared = DataSource::lookup(&query.kind).and_then(|source| source.prepare(&query.request, settings));

        let value = match prepared {
            Ok(prepared) => json!({
                "id": prepared.id,
                "server_filter": prepared.plan.server_filter,
                "residual": prepared.plan.client_predicate.clauses().map(clause_json).collect::<Vec<_>>(),
                "order": {
                    "key": prepared.plan.order_spec.key,
                    "order": prepared.plan.order_spec.order.as_str(),
                    "tie_break": prepared.plan.order_spec.tie_break,
                    "placement": format!("{:?}", prepared.plan.order_spec.placement).to_lowercase(),
                },
                "latest": prepared.latest,
            }),
            Err(err) => {
                failed += 1;
                report(query, &err)
            }
        };
        output.insert(query.name.clone(), value);
    }

    if failed > 0 {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Err(anyhow!("{} of {} data source(s) failed to plan", failed, manifest.data_sources.len()));
    }

    Ok(Value::Object(output))
}

fn clause_json(clause: &FilterClause) -> Value {
    json!({
        "name": clause.name,
        "comparator": clause.comparator.as_str(),
        "values": clause.values.iter().map(Value::from).collect::<Vec<_>>(),
        "match_by": clause.match_mode.as_str(),
    })
}

fn report(query: &DataSourceQuery, err: &FilterError) -> Value {
    tracing::error!("{} ({}): {}", query.name, query.kind, err);

    let mut diagnostics = Diagnostics::new();
    diagnostics.add_error(err);
    json!({ "diagnostics": diagnostics })
}

fn describe_kinds(kind: Option<&str>) -> Result<Value> {
    let Some(kind) = kind else {
        let kinds = get_all_kind_keys()
            .into_iter()
            .filter_map(|key| DataSource::lookup(key).ok())
            .map(|source| {
                json!({
                    "kind": source.kind(),
                    "display_name": source.def().display_name,
                    "endpoint": source.def().endpoint,
                })
            })
            .collect::<Vec<_>>();
        return Ok(Value::Array(kinds));
    };

    let source = DataSource::lookup(kind).map_err(|err| anyhow!(err))?;
    let def = source.def();
    let fields = def
        .fields
        .iter()
        .map(|(name, field)| {
            (
                name.clone(),
                json!({
                    "type": field.field_type.as_str(),
                    "api_filterable": field.api_filterable,
                    "orderable": field.is_orderable(),
                }),
            )
        })
        .collect::<Map<_, _>>();

    Ok(json!({
        "kind": source.kind(),
        "display_name": def.display_name,
        "endpoint": def.endpoint,
        "default_order_key": def.default_order_key,
        "supports_latest": def.supports_latest,
        "fields": fields,
    }))
}
