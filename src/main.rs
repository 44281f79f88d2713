use awslog::core::config::{Config, FormatConfig, FormatOptions, OutputConfig};
use awslog::core::storage::LocalObjectStore;
use awslog::core::traits::{LogParser, RecordWriter};
use awslog::formats::json::JsonlWriter;
use awslog::formats::parquet::{ParquetRecord, ParquetWriter};
use awslog::sources::alb::{LoadBalancerLogEntry, LoadBalancerLogParser};
use awslog::sources::waf::{FirewallLogEntry, FirewallLogParser};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "awslog")]
#[command(about = "AWS load balancer and WAF log parser", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Parse application load balancer access logs.
    Alb(ParseArgs),
    /// Parse web application firewall logs.
    Waf(ParseArgs),
}

#[derive(Debug, Args)]
struct ParseArgs {
    /// Object identifiers (`bucket/key` or `s3://bucket/key`).
    #[arg(required = true)]
    objects: Vec<String>,
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Local directory that object identifiers resolve against.
    #[arg(long)]
    root: Option<PathBuf>,
    /// Output directory; records go to stdout when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Jsonl,
    Parquet,
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "awslog=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Alb(args) => {
            let Some(loaded) = load_config(&args)? else {
                return Ok(());
            };
            let parser = LoadBalancerLogParser::new(LocalObjectStore::new(&loaded.storage.root));
            let mut writer = open_writer::<LoadBalancerLogEntry>(&loaded.output, "alb")?;
            parse_objects(&parser, &args.objects, writer.as_mut())?;
        }
        Commands::Waf(args) => {
            let Some(loaded) = load_config(&args)? else {
                return Ok(());
            };
            let parser = FirewallLogParser::new(LocalObjectStore::new(&loaded.storage.root));
            let mut writer = open_writer::<FirewallLogEntry>(&loaded.output, "waf")?;
            parse_objects(&parser, &args.objects, writer.as_mut())?;
        }
    }

    Ok(())
}

/// Loads the config file (if any) and applies command-line overrides.
/// Returns `None` for a dry run.
fn load_config(args: &ParseArgs) -> Result<Option<Config>, Box<dyn std::error::Error>> {
    let mut loaded = match &args.config {
        Some(path) => Config::from_path(path)?,
        None => Config::default(),
    };

    if let Some(root) = &args.root {
        loaded.storage.root = root.to_string_lossy().to_string();
    }
    if let Some(dir) = &args.output {
        loaded.output.dir = Some(dir.to_string_lossy().to_string());
    }
    match (args.format, &loaded.output.format) {
        (Some(OutputFormat::Jsonl), FormatConfig::Parquet(_)) => {
            loaded.output.format = FormatConfig::Jsonl(FormatOptions::default());
        }
        (Some(OutputFormat::Parquet), FormatConfig::Jsonl(_)) => {
            loaded.output.format = FormatConfig::Parquet(FormatOptions::default());
        }
        _ => {}
    }

    if args.dry_run {
        println!("config loaded: {loaded:#?}");
        return Ok(None);
    }
    Ok(Some(loaded))
}

fn open_writer<R>(
    output: &OutputConfig,
    stem: &str,
) -> Result<Box<dyn RecordWriter<R>>, Box<dyn std::error::Error>>
where
    R: Serialize + ParquetRecord + 'static,
{
    let writer: Box<dyn RecordWriter<R>> = match (&output.dir, &output.format) {
        (None, FormatConfig::Jsonl(options)) => {
            if options.compression.is_some() {
                warn!("compression is ignored when writing to stdout");
            }
            Box::new(JsonlWriter::stdout())
        }
        (None, FormatConfig::Parquet(_)) => {
            return Err("parquet output requires an output directory".into());
        }
        (Some(dir), FormatConfig::Jsonl(options)) => Box::new(JsonlWriter::new(
            dir,
            stem,
            output.target_size_mb,
            options.compression.as_deref(),
        )?),
        (Some(dir), FormatConfig::Parquet(_)) => {
            Box::new(ParquetWriter::<R>::new(dir, stem, output.target_size_mb)?)
        }
    };
    Ok(writer)
}

fn parse_objects<P: LogParser>(
    parser: &P,
    objects: &[String],
    writer: &mut dyn RecordWriter<P::Record>,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    let written = write_objects(parser, objects, writer);
    // Close on failure too: a parquet file without its footer is unreadable.
    let closed = writer.close();
    let (total_records, total_bytes) = written?;
    closed?;

    info!(
        objects = objects.len(),
        records = total_records,
        bytes = total_bytes,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "done"
    );
    Ok(())
}

fn write_objects<P: LogParser>(
    parser: &P,
    objects: &[String],
    writer: &mut dyn RecordWriter<P::Record>,
) -> Result<(u64, u64), Box<dyn std::error::Error>> {
    let mut total_records = 0_u64;
    let mut total_bytes = 0_u64;

    for object_id in objects {
        let records = parser.parse_object(object_id)?;
        for record in &records {
            total_bytes += writer.write_record(record)?;
        }
        writer.flush()?;
        total_records += records.len() as u64;
        info!(object_id = %object_id, records = records.len(), "parsed object");
    }
    Ok((total_records, total_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use awslog::core::storage::MemoryObjectStore;
    use awslog::Error;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::fs::File;
    use std::io::Write;

    fn gzip_lines(count: usize) -> Vec<u8> {
        let line = (0..28)
            .map(|index| format!("f{index}"))
            .collect::<Vec<_>>()
            .join(" ");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        for _ in 0..count {
            writeln!(encoder, "{line}").expect("write");
        }
        encoder.finish().expect("finish")
    }

    #[test]
    fn failed_object_leaves_readable_parquet() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = MemoryObjectStore::new();
        store.insert("bucket/first.log.gz", gzip_lines(3));
        let parser = LoadBalancerLogParser::new(&store);
        let mut writer =
            ParquetWriter::<LoadBalancerLogEntry>::new(dir.path(), "alb", 64).expect("writer");

        let objects = vec![
            "bucket/first.log.gz".to_string(),
            "bucket/missing.log.gz".to_string(),
        ];
        let err = parse_objects(&parser, &objects, &mut writer).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::NotFound { .. })
        ));

        let file = File::open(dir.path().join("alb-000001.parquet")).expect("open");
        let rows: usize = ParquetRecordBatchReaderBuilder::try_new(file)
            .expect("footer")
            .build()
            .expect("reader")
            .map(|batch| batch.expect("batch").num_rows())
            .sum();
        assert_eq!(rows, 3);
    }
}
