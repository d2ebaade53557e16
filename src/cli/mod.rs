//! CLI argument parsing and command dispatch

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use stampede_backends::factory_for;
use stampede_core::{OrchestratorBuilder, Protocol, RateLimit, RunConfig, RunSummary};
use stampede_generators::{build_generator, write_sample_queries, SampleSpec};

/// stampede - protocol-pluggable load generator
#[derive(Parser, Debug)]
#[command(name = "stampede")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Tokio worker threads (defaults to the number of cores)
    #[arg(long, global = true)]
    pub worker_threads: Option<usize>,

    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub args: RunArgs,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a load test (the default)
    Run(RunArgs),
    /// Check the configuration and load the request source without sending traffic
    Validate(RunArgs),
    /// Write a sample vector query file
    SampleQueries(SampleArgs),
}

/// Load test options; each one overrides the configuration file
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of concurrent workers [default: 1]
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Per-request timeout [default: 10s]
    #[arg(short, long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Test duration [default: 1m]
    #[arg(short, long, value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,

    /// Target URL [default: http://localhost]
    #[arg(short, long)]
    pub url: Option<String>,

    /// Take requests from a JSON file
    #[arg(long, alias = "from_json")]
    pub from_json: Option<PathBuf>,

    /// Backend protocol: http or qdrant [default: http]
    #[arg(long)]
    pub load_type: Option<Protocol>,

    /// Rate limit in requests per second
    #[arg(long)]
    pub rate: Option<f64>,

    /// Token bucket size [default: rate rounded up]
    #[arg(long)]
    pub burst: Option<u32>,

    /// Stop after this many requests
    #[arg(short = 'n', long)]
    pub requests: Option<u64>,

    /// Seed for request sampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Interval between progress lines [default: 500ms]
    #[arg(long, value_parser = humantime::parse_duration)]
    pub report_interval: Option<Duration>,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Sample query file options
#[derive(Args, Debug, Clone)]
pub struct SampleArgs {
    /// Number of queries
    #[arg(long, default_value_t = 100)]
    pub count: usize,

    /// Vector dimension
    #[arg(long, default_value_t = 64)]
    pub dim: usize,

    /// Collection name
    #[arg(long, default_value = "my_collection")]
    pub collection: String,

    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output file (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl Cli {
    /// Dispatch the selected command
    pub async fn run(self) -> Result<()> {
        match self.command {
            None => run_load(&self.args).await,
            Some(Commands::Run(args)) => run_load(&args).await,
            Some(Commands::Validate(args)) => validate(&args),
            Some(Commands::SampleQueries(args)) => sample_queries(&args),
        }
    }
}

impl RunArgs {
    /// Merge the configuration file (if any) with the command-line overrides
    pub fn to_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => RunConfig::default(),
        };

        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(duration) = self.duration {
            config.duration = duration;
        }
        if let Some(url) = &self.url {
            config.target = url.clone();
        }
        if let Some(path) = &self.from_json {
            config.source = Some(path.clone());
        }
        if let Some(protocol) = self.load_type {
            config.protocol = protocol;
        }
        if let Some(requests) = self.requests {
            config.max_requests = Some(requests);
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(interval) = self.report_interval {
            config.snapshot_interval = interval;
        }

        config.rate_limit = match (self.rate, self.burst, config.rate_limit) {
            (Some(rate), Some(burst), _) => Some(RateLimit::per_second(rate).with_burst(burst)),
            (Some(rate), None, _) => Some(RateLimit::per_second(rate)),
            (None, Some(burst), Some(limit)) => Some(limit.with_burst(burst)),
            (None, Some(_), None) => bail!("--burst needs a rate limit (--rate)"),
            (None, None, limit) => limit,
        };

        Ok(config)
    }
}

fn load_config(path: &Path) -> Result<RunConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

async fn run_load(args: &RunArgs) -> Result<()> {
    let config = args.to_config()?;
    config.validate().context("Invalid configuration")?;

    let generator = build_generator(&config).context("Failed to load request source")?;
    let factory = factory_for(&config).context("Failed to set up backend")?;

    let sink = ProgressSink::for_output(args.json);
    write_banner(&mut sink.writer(), &config)?;

    let (orchestrator, mut snapshots) = OrchestratorBuilder::new()
        .config(config)
        .factory(factory)
        .boxed_generator(generator)
        .build()?;

    let printer = tokio::spawn(async move {
        let mut out = sink.writer();
        while let Some(snapshot) = snapshots.recv().await {
            if writeln!(out, "{}", snapshot).is_err() {
                break;
            }
        }
    });

    let summary = orchestrator.run_with_signal_handling().await?;
    // the collector owned the only sender, so this ends promptly
    let _ = printer.await;

    print_summary(&summary, args.json)
}

fn validate(args: &RunArgs) -> Result<()> {
    let config = args.to_config()?;
    config.validate().context("Invalid configuration")?;

    let generator = build_generator(&config).context("Failed to load request source")?;
    factory_for(&config).context("Failed to set up backend")?;

    println!("Configuration is valid");
    println!("  Protocol:     {}", config.protocol);
    println!("  Target:       {}", config.target);
    println!("  Generator:    {}", generator.name());
    Ok(())
}

fn sample_queries(args: &SampleArgs) -> Result<()> {
    if args.count == 0 || args.dim == 0 {
        bail!("--count and --dim must be positive");
    }

    let spec = SampleSpec {
        count: args.count,
        dim: args.dim,
        collection: args.collection.clone(),
    };
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            write_sample_queries(&mut rng, &spec, &mut writer)?;
            writer.flush()?;
            tracing::info!(count = spec.count, path = %path.display(), "Sample queries written");
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            write_sample_queries(&mut rng, &spec, &mut writer)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}

/// Destination of the banner and progress lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProgressSink {
    Stdout,
    Stderr,
}

impl ProgressSink {
    /// With `--json`, stdout carries the report and nothing else
    fn for_output(json: bool) -> Self {
        if json {
            Self::Stderr
        } else {
            Self::Stdout
        }
    }

    fn writer(self) -> Box<dyn Write + Send> {
        match self {
            Self::Stdout => Box::new(io::stdout()),
            Self::Stderr => Box::new(io::stderr()),
        }
    }
}

fn write_banner(out: &mut dyn Write, config: &RunConfig) -> io::Result<()> {
    writeln!(out, "\n{}", "=".repeat(70))?;
    writeln!(out, "   stampede - load test")?;
    writeln!(out, "{}", "=".repeat(70))?;
    writeln!(out, "  Target:       {}", config.target)?;
    writeln!(out, "  Protocol:     {}", config.protocol)?;
    writeln!(out, "  Concurrency:  {}", config.concurrency)?;
    writeln!(out, "  Duration:     {}", humantime::format_duration(config.duration))?;
    writeln!(out, "  Timeout:      {}", humantime::format_duration(config.timeout))?;
    match config.rate_limit {
        Some(limit) => writeln!(
            out,
            "  Rate limit:   {} rps (burst {})",
            limit.rate, limit.burst
        )?,
        None => writeln!(out, "  Rate limit:   none")?,
    }
    if let Some(max) = config.max_requests {
        writeln!(out, "  Requests:     {}", max)?;
    }
    if let Some(source) = &config.source {
        writeln!(out, "  Source:       {}", source.display())?;
    }
    writeln!(out, "{}", "=".repeat(70))?;
    writeln!(out)
}

fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    let workers = &summary.workers;
    tracing::info!(
        workers = workers.total_workers,
        completed = workers.total_completed,
        failures = workers.total_failures,
        errors = workers.total_errors,
        rps = workers.requests_per_second,
        "Worker totals"
    );
    if let Some(limiter) = &summary.limiter {
        tracing::info!(
            admitted = limiter.admitted,
            dropped = limiter.dropped,
            "Rate limiter totals"
        );
    }
    if summary.interrupted {
        tracing::warn!("Run was interrupted before the configured duration");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&summary.report)?);
    } else {
        println!();
        print!("{}", summary.report);
    }
    Ok(())
}
