use anyhow::{anyhow, Context as _};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing::{error, info};

use rollup_contract_bench::client::{ClientConfig, Connection};
use rollup_contract_bench::compare::{CompareConfig, DEFAULT_THRESHOLD};
use rollup_contract_bench::suites::BenchmarkSuite;
use rollup_contract_bench::{discover, profiler, suites, OutputFormat};

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one benchmark suite against the configured node/PXE pair and
    /// write its JSON report.
    ///
    /// Endpoints come from NODE_URL and PXE_URL. On failure an
    /// error-shaped report is still written to the destination.
    Benchmark {
        /// Suite name (token, amm).
        suite: String,

        /// Where to write the report. Defaults to
        /// benchmarks/<suite>.benchmark.json.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Diff baseline/candidate report pairs for every contract discovered
    /// in a workspace manifest.
    Compare {
        /// Workspace manifest whose `workspace.members` lists contract
        /// directories.
        #[arg(long, default_value = "workspace.toml", value_name = "FILE")]
        manifest: PathBuf,

        /// Only compare the named contracts.
        #[arg(long, value_name = "NAME", num_args = 1..)]
        contracts: Vec<String>,

        /// Where to write the combined report.
        #[arg(long, default_value = "bench_diff.md", value_name = "FILE")]
        output: PathBuf,

        /// Fractional change below which a metric move is ignored.
        #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f64,

        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
    },
}

#[derive(Parser, Debug)]
#[command(name = "rollup-contract-bench")]
#[command(about = "Gate-count and gas benchmark runner for private rollup contracts")]
struct Args {
    #[command(subcommand)]
    cmd: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    match args.cmd {
        Command::Benchmark { suite, out } => run_benchmark(&suite, out).await,
        Command::Compare {
            manifest,
            contracts,
            output,
            threshold,
            format,
        } => run_compare(&manifest, &contracts, &output, threshold, format),
    }
}

async fn run_benchmark(suite_name: &str, out: Option<PathBuf>) -> anyhow::Result<()> {
    let dest =
        out.unwrap_or_else(|| PathBuf::from(format!("benchmarks/{suite_name}.benchmark.json")));
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let Some(suite) = suites::lookup(suite_name) else {
        let message = format!(
            "unknown benchmark suite {suite_name:?} (available: {})",
            suites::names().join(", ")
        );
        profiler::save_error_report(&message, &dest);
        return Err(anyhow!(message));
    };

    let outcome = async {
        let conn =
            Connection::connect(ClientConfig::from_env()).context("connecting to node/PXE")?;
        run_suite(suite.as_ref(), &conn, &dest).await
    }
    .await;

    if let Err(err) = outcome {
        error!(suite = suite_name, error = %err, "benchmark run failed");
        profiler::save_error_report(&format!("{err:#}"), &dest);
        return Err(err);
    }
    Ok(())
}

async fn run_suite(
    suite: &dyn BenchmarkSuite,
    conn: &Connection,
    dest: &std::path::Path,
) -> anyhow::Result<()> {
    info!(suite = suite.name(), "setting up");
    let ctx = suite.setup(conn).await.context("suite setup failed")?;

    info!(suite = suite.name(), "collecting methods");
    let calls = suite.methods(conn, &ctx).await.context("collecting methods failed")?;

    let results = profiler::profile(conn, &calls).await;
    profiler::save_results(&results, dest).context("saving report")?;

    info!(suite = suite.name(), "tearing down");
    suite.teardown(conn, ctx).await.context("suite teardown failed")?;
    Ok(())
}

fn run_compare(
    manifest: &std::path::Path,
    contracts: &[String],
    output: &std::path::Path,
    threshold: f64,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let discovered = discover::discover_contracts(manifest)
        .with_context(|| format!("discovering contracts via {}", manifest.display()))?;
    info!(count = discovered.len(), "discovered contract report pairs");

    let filter = (!contracts.is_empty()).then_some(contracts);
    let cfg = CompareConfig {
        threshold,
        ..CompareConfig::default()
    };
    let outcome = discover::compare_all(&discovered, filter, format, &cfg);

    fs::write(output, &outcome.document)
        .with_context(|| format!("writing {}", output.display()))?;
    info!(
        path = %output.display(),
        compared = outcome.compared,
        errored = outcome.errored,
        "comparison written"
    );
    Ok(())
}
