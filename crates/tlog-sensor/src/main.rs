//! TLog Sensor - Rekor transparency log tailing host
//!
//! Drives the Rekor plugin through its host lifecycle: tails new log
//! entries, prints extracted signer fields, and re-extracts fields from
//! previously recorded events.

use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::future::Future;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tlog_core::{
    EventReader, EventWriters, ExtractRequest, ExtractorPlugin, Plugin, PluginInfo, SourcePlugin,
    DEFAULT_BATCH_SIZE,
};
use tlog_rekor::memory::{DEMO_EMAIL_CERT_PEM, DEMO_URI_CERT_PEM};
use tlog_rekor::{MemoryLog, RekorPlugin, DEFAULT_REKOR_SERVER};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "tlog-sensor")]
#[command(version)]
#[command(about = "Tail a Rekor transparency log and extract signer fields", long_about = None)]
struct Cli {
    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// One JSON object per event
    Json,
    /// Human-readable sample lines
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Tail a Rekor server from its current tree size
    Tail {
        /// Rekor server address
        #[arg(long, env = "REKOR_SERVER", default_value = DEFAULT_REKOR_SERVER)]
        rekor_server: String,

        /// Raw plugin init configuration (JSON), overrides --rekor-server
        #[arg(long)]
        init_config: Option<String>,

        /// Event slots per batch
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Delay between batches in milliseconds
        #[arg(long, default_value = "1000")]
        interval: u64,

        /// Stop after this many events (0 = run until interrupted)
        #[arg(long, default_value = "0")]
        count: u64,

        /// Also append raw event payloads to this JSONL file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Tail an in-memory log that grows on its own (no network required)
    Demo {
        /// Event slots per batch
        #[arg(long, default_value = "4")]
        batch_size: usize,

        /// Interval between appended entries in milliseconds
        #[arg(long, default_value = "500")]
        interval: u64,

        /// Stop after this many events (0 = run until interrupted)
        #[arg(long, default_value = "12")]
        count: u64,

        /// Also append raw event payloads to this JSONL file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Extract fields from recorded event payloads (one per line)
    Extract {
        /// Input file (JSONL)
        #[arg(short, long)]
        input: PathBuf,

        /// Field to extract (repeatable, default: all)
        #[arg(long = "field")]
        fields: Vec<String>,
    },

    /// List the fields this plugin exports
    Fields,

    /// Print the init configuration JSON Schema
    Schema,

    /// Print plugin information
    Info,
}

/// Settings for a tailing session
struct RunConfig {
    batch_size: usize,
    interval: Duration,
    count: u64,
    output: Option<PathBuf>,
    format: OutputFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Tail {
            rekor_server,
            init_config,
            batch_size,
            interval,
            count,
            output,
        } => {
            let init_config = match init_config {
                Some(raw) => raw,
                None => serde_json::json!({ "rekor_server": rekor_server }).to_string(),
            };
            let mut plugin = RekorPlugin::new();
            plugin.init(&init_config)?;

            run_source(
                &plugin,
                RunConfig {
                    batch_size,
                    interval: Duration::from_millis(interval),
                    count,
                    output,
                    format: cli.format,
                },
                tokio::signal::ctrl_c(),
            )
            .await?;
            Ok(())
        }
        Commands::Demo {
            batch_size,
            interval,
            count,
            output,
        } => demo_command(
            batch_size,
            Duration::from_millis(interval),
            count,
            output,
            cli.format,
        )
        .await,
        Commands::Extract { input, fields } => extract_command(&input, &fields, cli.format),
        Commands::Fields => fields_command(cli.format),
        Commands::Schema => schema_command(),
        Commands::Info => info_command(),
    }
}

/// Open an instance and pump batches until the event budget is spent or
/// `shutdown` resolves. Returns the number of events delivered.
async fn run_source<F: Future>(
    plugin: &RekorPlugin,
    config: RunConfig,
    shutdown: F,
) -> anyhow::Result<u64> {
    let mut instance = plugin.open("").await?;
    let mut events = EventWriters::new(config.batch_size);
    let mut output = match &config.output {
        Some(path) => {
            info!("Writing event payloads to: {:?}", path);
            Some(BufWriter::new(
                std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?,
            ))
        }
        None => None,
    };
    tokio::pin!(shutdown);

    let mut num = 0u64;
    loop {
        // Fetched entries advance the cursor, so never fetch past the budget
        if config.count > 0 {
            let remaining = usize::try_from(config.count - num).unwrap_or(usize::MAX);
            if remaining < events.len() {
                events = EventWriters::new(remaining);
            }
        }
        events.reset();

        // A dropped fetch leaves the cursor where it was
        let produced = tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            produced = instance.next_batch(&mut events) => produced?,
        };

        for slot in events.iter().take(produced) {
            num += 1;
            let reader = slot.reader(num);
            print_event(plugin, &reader, config.format)?;

            if let Some(out) = output.as_mut() {
                out.write_all(reader.data())?;
                out.write_all(b"\n")?;
                out.flush()?;
            }
        }

        if config.count > 0 && num >= config.count {
            break;
        }

        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            _ = tokio::time::sleep(config.interval) => {}
        }
    }

    instance.close();
    Ok(num)
}

fn print_event(
    plugin: &RekorPlugin,
    event: &EventReader<'_>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => {
            println!("{}", plugin.event_to_string(event)?);
            println!("  {}", field_values(plugin, event, &[]));
        }
        OutputFormat::Json => {
            let mut record = field_values(plugin, event, &[]);
            record["num"] = serde_json::json!(event.num());
            record["timestamp"] = serde_json::json!(event.timestamp());
            println!("{}", record);
        }
    }
    Ok(())
}

/// Extract the named fields (all fields when `names` is empty) into a JSON
/// object. Extraction failures are reported inline and never abort.
fn field_values(
    plugin: &RekorPlugin,
    event: &EventReader<'_>,
    names: &[String],
) -> serde_json::Value {
    let catalog = plugin.fields();
    let mut values = serde_json::Map::new();

    let wanted: Vec<String> = if names.is_empty() {
        catalog.iter().map(|f| f.name.clone()).collect()
    } else {
        names.to_vec()
    };

    for name in wanted {
        let id = catalog
            .iter()
            .position(|f| f.name == name)
            .and_then(|pos| u32::try_from(pos).ok())
            .unwrap_or(u32::MAX);
        let mut req = ExtractRequest::new(id, name.clone());
        let value = match plugin.extract(&mut req, event) {
            Ok(()) => serde_json::json!(req.take_value().unwrap_or_default()),
            Err(e) => {
                warn!("failed to extract {} from event {}: {}", name, event.num(), e);
                serde_json::json!({ "error": e.to_string() })
            }
        };
        values.insert(name, value);
    }

    serde_json::Value::Object(values)
}

async fn demo_command(
    batch_size: usize,
    interval: Duration,
    count: u64,
    output: Option<PathBuf>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let log = Arc::new(MemoryLog::with_history(1000));
    let plugin = RekorPlugin::with_client(log.clone());

    let appender = {
        let log = log.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let index = log.tree_size();
                let cert = match index % 3 {
                    0 => Some(DEMO_EMAIL_CERT_PEM),
                    1 => Some(DEMO_URI_CERT_PEM),
                    _ => None,
                };
                log.append_signed(&format!("demo-{index:016x}"), cert);
            }
        })
    };

    let result = run_source(
        &plugin,
        RunConfig {
            batch_size,
            interval,
            count,
            output,
            format,
        },
        tokio::signal::ctrl_c(),
    )
    .await;

    appender.abort();
    result.map(|_| ())
}

fn extract_command(input: &Path, fields: &[String], format: OutputFormat) -> anyhow::Result<()> {
    let plugin = RekorPlugin::new();
    let reader = BufReader::new(File::open(input)?);

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let event = EventReader::new(line_no as u64 + 1, 0, line.as_bytes());
        let mut record = field_values(&plugin, &event, fields);
        match format {
            OutputFormat::Json => {
                record["num"] = serde_json::json!(event.num());
                println!("{}", record);
            }
            OutputFormat::Text => println!("#{} {}", event.num(), record),
        }
    }
    Ok(())
}

fn fields_command(format: OutputFormat) -> anyhow::Result<()> {
    let fields = RekorPlugin::new().fields();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&fields)?),
        OutputFormat::Text => {
            for field in fields {
                println!("{:<12} {:?}  {}", field.name, field.field_type, field.description);
            }
        }
    }
    Ok(())
}

fn schema_command() -> anyhow::Result<()> {
    let plugin = RekorPlugin::new();
    if let Some(schema) = plugin.init_schema() {
        let schema: serde_json::Value = serde_json::from_str(&schema)?;
        println!("{}", serde_json::to_string_pretty(&schema)?);
    }
    Ok(())
}

fn info_command() -> anyhow::Result<()> {
    let plugin = RekorPlugin::new();
    println!("Name:         {}", plugin.name());
    println!("ID:           {}", plugin.id());
    println!("Version:      {}", plugin.version());
    println!("Description:  {}", plugin.description());
    println!("Contact:      {}", plugin.contact());
    println!("Event source: {}", plugin.event_source());
    println!("API version:  {}", plugin.required_api_version());
    Ok(())
}
