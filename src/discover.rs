//! Finds benchmarkable contracts in a workspace and drives batch comparison.
//!
//! The workspace manifest is read-only input: its `workspace.members` array
//! lists contract directories, and a contract qualifies when a baseline
//! report (`X.benchmark.json`) sits next to a candidate report
//! (`X.benchmark_latest.json`) somewhere under its directory.

use serde::Deserialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::compare::{compare, load_report, CompareConfig};
use crate::OutputFormat;

const BASELINE_SUFFIX: &str = ".benchmark.json";
const CANDIDATE_SUFFIX: &str = ".benchmark_latest.json";

/// How deep below a member directory report pairs may sit.
const SCAN_DEPTH: usize = 3;

#[derive(Debug, Error)]
pub enum DiscoverError {
    #[error("failed to read manifest {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Deserialize)]
struct Manifest {
    workspace: Workspace,
}

#[derive(Deserialize)]
struct Workspace {
    members: Vec<String>,
}

pub fn read_workspace_members(path: &Path) -> Result<Vec<String>, DiscoverError> {
    let text = std::fs::read_to_string(path).map_err(|source| DiscoverError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let manifest: Manifest = toml::from_str(&text).map_err(|source| DiscoverError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    Ok(manifest.workspace.members)
}

/// A contract with a comparable pair of reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredContract {
    pub name: String,
    pub baseline: PathBuf,
    pub candidate: PathBuf,
}

/// Scan every workspace member for a side-by-side report pair. Members
/// without a pair are logged and left out; they are expected while a
/// benchmark has only run on one branch.
pub fn discover_contracts(manifest_path: &Path) -> Result<Vec<DiscoveredContract>, DiscoverError> {
    let members = read_workspace_members(manifest_path)?;
    let root = manifest_path.parent().unwrap_or_else(|| Path::new("."));

    let mut found = Vec::new();
    for member in &members {
        let dir = root.join(member);
        if !dir.is_dir() {
            warn!(member = %member, "workspace member directory not found, skipping");
            continue;
        }
        let before = found.len();
        collect_pairs(&dir, &mut found);
        if found.len() == before {
            warn!(member = %member, "no report pair found, skipping");
        }
    }
    found.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(found)
}

fn collect_pairs(dir: &Path, out: &mut Vec<DiscoveredContract>) {
    for entry in WalkDir::new(dir)
        .max_depth(SCAN_DEPTH)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(file_name) = entry.file_name().to_str() else {
            continue;
        };
        // The candidate suffix also ends in ".json" but not in the baseline
        // suffix, so a plain suffix test distinguishes the two.
        if !file_name.ends_with(BASELINE_SUFFIX) {
            continue;
        }
        let name = file_name.trim_end_matches(BASELINE_SUFFIX).to_string();
        let candidate = entry
            .path()
            .with_file_name(format!("{name}{CANDIDATE_SUFFIX}"));
        if candidate.is_file() {
            out.push(DiscoveredContract {
                name,
                baseline: entry.path().to_path_buf(),
                candidate,
            });
        }
    }
}

/// Combined document from a batch comparison.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub document: String,
    pub compared: usize,
    pub errored: usize,
}

/// Compare every discovered contract (optionally filtered by name) and
/// concatenate the rendered sections. Contracts are processed sequentially
/// so logs stay deterministic. A contract whose reports fail to load
/// degrades to an inline error note instead of aborting the batch.
pub fn compare_all(
    contracts: &[DiscoveredContract],
    filter: Option<&[String]>,
    format: OutputFormat,
    cfg: &CompareConfig,
) -> BatchOutcome {
    let selected: Vec<&DiscoveredContract> = contracts
        .iter()
        .filter(|c| match filter {
            Some(names) => names.iter().any(|n| n == &c.name),
            None => true,
        })
        .collect();

    let mut document = String::new();
    match format {
        OutputFormat::Markdown => {
            let _ = writeln!(document, "# Benchmark diff\n");
        }
        OutputFormat::Html => {
            let _ = writeln!(document, "<h1>Benchmark diff</h1>");
        }
    }

    let mut compared = 0;
    let mut errored = 0;
    for contract in selected {
        match format {
            OutputFormat::Markdown => {
                let _ = writeln!(document, "## {}\n", contract.name);
            }
            OutputFormat::Html => {
                let _ = writeln!(document, "<h2>{}</h2>", contract.name);
            }
        }
        match (load_report(&contract.baseline), load_report(&contract.candidate)) {
            (Ok(baseline), Ok(candidate)) => {
                info!(contract = %contract.name, "comparing");
                let comparison = compare(&baseline, &candidate, cfg);
                document.push_str(&comparison.render(format, cfg));
                document.push('\n');
                compared += 1;
            }
            (Err(err), _) | (_, Err(err)) => {
                warn!(contract = %contract.name, error = %err, "error comparing contract");
                let note = match format {
                    OutputFormat::Markdown => format!("error comparing this contract: {err}\n\n"),
                    OutputFormat::Html => {
                        format!("<p>error comparing this contract: {err}</p>\n")
                    }
                };
                document.push_str(&note);
                errored += 1;
            }
        }
    }

    let footer = format!("{compared} contract(s) compared");
    match format {
        OutputFormat::Markdown => {
            let _ = writeln!(document, "{footer}");
        }
        OutputFormat::Html => {
            let _ = writeln!(document, "<p>{footer}</p>");
        }
    }

    BatchOutcome {
        document,
        compared,
        errored,
    }
}
