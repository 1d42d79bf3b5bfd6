//! sce: semantic consensus engine CLI
//!
//! Usage:
//!   sce ingest --source-type <type> <raw.json> [--dir path]
//!   sce index | authority | consensus | analyze | integrate [--dir path]
//!   sce run [--input <type>=<raw.json>]... [--dir path]
//!
//! Exit codes: 0 success, 1 fatal error, 2 atoms rejected at ingestion.

use clap::{Args, Parser, Subcommand};
use semantic_consensus::atom::SourceType;
use semantic_consensus::config::Config;
use semantic_consensus::ingest::JsonFileCollector;
use semantic_consensus::pipeline::{
    AnalysisStage, AuthorityStage, CancellationToken, ConsensusStage, IndexStage, IngestStage,
    IntegrateStage, Pipeline, PipelineContext, PipelineError, Stage, StageReport,
};
use semantic_consensus::store::{DirLock, JsonDirStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;

const EXIT_FATAL: i32 = 1;
const EXIT_REJECTED: i32 = 2;

#[derive(Parser)]
#[command(name = "sce", version, about = "Multi-source semantic consensus engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct CommonArgs {
    /// Store directory (default: <data dir>/panini/stores)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// YAML config file (default: <dir>/sce.yaml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only warnings and errors on stderr
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Detect conflicts with sentence embeddings instead of length ratio
    /// (requires the `embeddings` feature)
    #[arg(long, global = true)]
    embeddings: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a collector's output into its source store
    Ingest {
        /// Source type the records belong to
        #[arg(long)]
        source_type: SourceType,
        /// Collector output file
        input: PathBuf,
    },
    /// Build the concept index and print its statistics
    Index,
    /// Profile collector agents
    Authority,
    /// Resolve consensus for every concept
    Consensus,
    /// Detect convergences and temporal emergence
    Analyze,
    /// Merge stage outputs into a unified architecture store
    Integrate,
    /// Run the whole pipeline
    Run {
        /// Collector output to ingest first, as <source_type>=<path>
        #[arg(long = "input", value_parser = parse_input)]
        inputs: Vec<(SourceType, PathBuf)>,
    },
}

fn parse_input(text: &str) -> Result<(SourceType, PathBuf), String> {
    let (source_type, path) = text
        .split_once('=')
        .ok_or_else(|| format!("expected <source_type>=<path>, got '{}'", text))?;
    Ok((source_type.parse()?, PathBuf::from(path)))
}

/// Default store directory (~/.local/share/panini/stores)
fn default_store_dir() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join("panini").join("stores")
}

fn init_tracing(common: &CommonArgs) {
    let level = match (common.quiet, common.verbose) {
        (true, _) => Level::WARN,
        (false, 0) => Level::INFO,
        (false, 1) => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[cfg(feature = "embeddings")]
fn configure_detector(
    ctx: PipelineContext,
    common: &CommonArgs,
) -> Result<PipelineContext, String> {
    use semantic_consensus::consensus::{EmbeddingConflictDetector, FastEmbedEmbedder};
    if !common.embeddings {
        return Ok(ctx);
    }
    let embedder = FastEmbedEmbedder::default_model().map_err(|e| e.to_string())?;
    let threshold = ctx.config.consensus.embedding_similarity_threshold;
    Ok(ctx.with_detector(Box::new(EmbeddingConflictDetector::new(Box::new(embedder), threshold))))
}

#[cfg(not(feature = "embeddings"))]
fn configure_detector(
    ctx: PipelineContext,
    common: &CommonArgs,
) -> Result<PipelineContext, String> {
    if common.embeddings {
        return Err("--embeddings needs a build with the `embeddings` feature".to_string());
    }
    Ok(ctx)
}

fn print_report(report: &StageReport) {
    println!("[{}] {}", report.stage, report.summary);
    for name in &report.written {
        println!("  wrote {}", name);
    }
    for issue in &report.issues {
        eprintln!("{}: {}", report.stage, issue);
    }
}

async fn load_collectors(
    mut ctx: PipelineContext,
    inputs: &[(SourceType, PathBuf)],
) -> Result<PipelineContext, PipelineError> {
    for (source_type, path) in inputs {
        let collector = JsonFileCollector::load(path, *source_type).await?;
        ctx = ctx.with_collector(Box::new(collector));
    }
    Ok(ctx)
}

async fn run_stage(stage: &dyn Stage, ctx: &PipelineContext) -> Result<i32, PipelineError> {
    let report = stage.run(ctx).await?;
    print_report(&report);
    Ok(if report.rejected > 0 { EXIT_REJECTED } else { 0 })
}

async fn execute(command: Commands, ctx: PipelineContext) -> Result<i32, PipelineError> {
    match command {
        Commands::Ingest { source_type, input } => {
            let ctx = load_collectors(ctx, &[(source_type, input)]).await?;
            run_stage(&IngestStage, &ctx).await
        }
        Commands::Index => run_stage(&IndexStage, &ctx).await,
        Commands::Authority => run_stage(&AuthorityStage, &ctx).await,
        Commands::Consensus => run_stage(&ConsensusStage, &ctx).await,
        Commands::Analyze => run_stage(&AnalysisStage, &ctx).await,
        Commands::Integrate => run_stage(&IntegrateStage, &ctx).await,
        Commands::Run { inputs } => {
            let ctx = load_collectors(ctx, &inputs).await?;
            let run = Pipeline::standard().run(&ctx).await?;
            for report in &run.reports {
                print_report(report);
            }
            for (stage, err) in &run.recovered {
                eprintln!("{}: {}", stage, err);
            }
            Ok(if run.rejected() > 0 { EXIT_REJECTED } else { 0 })
        }
    }
}

fn open_context(dir: &Path, common: &CommonArgs) -> Result<(PipelineContext, DirLock), String> {
    let store = JsonDirStore::open(dir).map_err(|e| format!("cannot open store directory: {}", e))?;
    let lock = DirLock::acquire(dir).map_err(|e| e.to_string())?;
    let config = Config::resolve(common.config.as_deref(), dir).map_err(|e| e.to_string())?;
    let ctx = PipelineContext::new(Arc::new(store), config);
    let ctx = configure_detector(ctx, common)?;
    Ok((ctx, lock))
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.common);

    let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create tokio runtime: {}", e);
            std::process::exit(EXIT_FATAL);
        }
    };

    let dir = cli.common.dir.clone().unwrap_or_else(default_store_dir);
    let (ctx, lock) = match open_context(&dir, &cli.common) {
        Ok(opened) => opened,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(EXIT_FATAL);
        }
    };

    let cancel: CancellationToken = ctx.cancel.clone();
    let code = rt.block_on(async move {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, stopping at the next checkpoint");
                cancel.cancel();
            }
        });
        match execute(cli.command, ctx).await {
            Ok(code) => code,
            Err(e) => {
                eprintln!("error: {}", e);
                EXIT_FATAL
            }
        }
    });

    // exit() skips destructors; release the lock first.
    drop(lock);
    std::process::exit(code);
}
