//! Diffs two profile reports into a per-function comparison table.
//!
//! Pure data transformation: no shared state, no I/O beyond `load_report`.
//! Baseline values are labelled `main` and candidate values `pr`, matching
//! the CI flow the reports come from.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

use crate::call;
use crate::schema::{ProfileReport, ProfileResult};
use crate::OutputFormat;

#[derive(Debug, Error)]
pub enum CompareError {
    #[error("report not found: {0}")]
    Missing(String),

    #[error("failed to read report {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed report {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct CompareConfig {
    /// Fractional change below which a metric move is not flagged. Gate
    /// counts jitter run to run from nondeterministic circuit compilation,
    /// so too tight a threshold produces noisy false positives.
    pub threshold: f64,
    /// Decimal places for rendered percentages.
    pub precision: usize,
}

pub const DEFAULT_THRESHOLD: f64 = 0.024;

impl Default for CompareConfig {
    fn default() -> Self {
        CompareConfig {
            threshold: DEFAULT_THRESHOLD,
            precision: 2,
        }
    }
}

/// Baseline/candidate values for one metric; absent sides read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricPair {
    pub main: u64,
    pub pr: u64,
}

impl MetricPair {
    pub fn new(main: u64, pr: u64) -> Self {
        MetricPair { main, pr }
    }

    /// Fractional change against the baseline. A zero baseline with a
    /// nonzero candidate is an unconditional regression signal, expressed
    /// as an infinite delta.
    pub fn delta(self) -> f64 {
        if self.main == 0 {
            if self.pr == 0 {
                0.0
            } else {
                f64::INFINITY
            }
        } else {
            (self.pr as f64 - self.main as f64) / self.main as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffStatus {
    New,
    Removed,
    Regression,
    Improvement,
    Unchanged,
}

impl DiffStatus {
    pub fn symbol(self) -> &'static str {
        match self {
            DiffStatus::New => "🆕",
            DiffStatus::Removed => "🗑️",
            DiffStatus::Regression => "⚠️",
            DiffStatus::Improvement => "🎉",
            DiffStatus::Unchanged => "✅",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DiffStatus::New => "new",
            DiffStatus::Removed => "removed",
            DiffStatus::Regression => "regression",
            DiffStatus::Improvement => "improvement",
            DiffStatus::Unchanged => "unchanged",
        }
    }
}

/// Per-function comparison across the three metrics.
#[derive(Debug, Clone)]
pub struct FunctionComparison {
    pub name: String,
    pub gates: MetricPair,
    pub da_gas: MetricPair,
    pub l2_gas: MetricPair,
    pub status: DiffStatus,
}

impl FunctionComparison {
    fn classify(
        gates: MetricPair,
        da_gas: MetricPair,
        l2_gas: MetricPair,
        threshold: f64,
    ) -> DiffStatus {
        let metrics = [gates, da_gas, l2_gas];
        let main_all_zero = metrics.iter().all(|m| m.main == 0);
        let pr_all_zero = metrics.iter().all(|m| m.pr == 0);

        // Additions and removals stay visually distinct from marginal
        // regressions, and never hit the division-by-zero path.
        if !main_all_zero && pr_all_zero {
            return DiffStatus::Removed;
        }
        if main_all_zero && !pr_all_zero {
            return DiffStatus::New;
        }

        let deltas = metrics.map(MetricPair::delta);
        if deltas.iter().any(|d| *d > threshold) {
            DiffStatus::Regression
        } else if deltas.iter().any(|d| *d < -threshold) {
            DiffStatus::Improvement
        } else {
            DiffStatus::Unchanged
        }
    }
}

/// One contract's comparison: rows sorted by function name, plus the
/// sentinel names excluded from the table.
#[derive(Debug, Clone, Default)]
pub struct ContractComparison {
    pub rows: Vec<FunctionComparison>,
    pub skipped: Vec<String>,
}

impl ContractComparison {
    pub fn has_changes(&self) -> bool {
        self.rows.iter().any(|r| r.status != DiffStatus::Unchanged)
    }
}

fn metric_pairs(
    main: Option<&ProfileResult>,
    pr: Option<&ProfileResult>,
) -> (MetricPair, MetricPair, MetricPair) {
    let gates = |r: Option<&ProfileResult>| r.map(|r| r.total_gate_count).unwrap_or(0);
    let da = |r: Option<&ProfileResult>| r.map(|r| r.gas.total().da_gas).unwrap_or(0);
    let l2 = |r: Option<&ProfileResult>| r.map(|r| r.gas.total().l2_gas).unwrap_or(0);
    (
        MetricPair::new(gates(main), gates(pr)),
        MetricPair::new(da(main), da(pr)),
        MetricPair::new(l2(main), l2(pr)),
    )
}

/// A name that must never appear in the rendered table: empty, a failed
/// sentinel, or a synthetic unresolved-selector name.
fn is_sentinel(name: &str) -> bool {
    name.is_empty() || call::is_failed_name(name) || call::is_unresolved_name(name)
}

/// Compare two reports function by function. Pure with respect to its
/// inputs; each invocation is independent.
pub fn compare(
    baseline: &ProfileReport,
    candidate: &ProfileReport,
    cfg: &CompareConfig,
) -> ContractComparison {
    let main_by_name: BTreeMap<&str, &ProfileResult> = baseline
        .results
        .iter()
        .map(|r| (r.name.as_str(), r))
        .collect();
    let pr_by_name: BTreeMap<&str, &ProfileResult> = candidate
        .results
        .iter()
        .map(|r| (r.name.as_str(), r))
        .collect();

    let names: BTreeSet<&str> = main_by_name.keys().chain(pr_by_name.keys()).copied().collect();

    let mut out = ContractComparison::default();
    for name in names {
        if is_sentinel(name) {
            warn!(function = %name, "skipping sentinel entry");
            out.skipped.push(name.to_string());
            continue;
        }
        let (gates, da_gas, l2_gas) = metric_pairs(
            main_by_name.get(name).copied(),
            pr_by_name.get(name).copied(),
        );
        let status = FunctionComparison::classify(gates, da_gas, l2_gas, cfg.threshold);
        out.rows.push(FunctionComparison {
            name: name.to_string(),
            gates,
            da_gas,
            l2_gas,
            status,
        });
    }
    out
}

pub fn load_report(path: &Path) -> Result<ProfileReport, CompareError> {
    if !path.is_file() {
        return Err(CompareError::Missing(path.display().to_string()));
    }
    let text = std::fs::read_to_string(path).map_err(|source| CompareError::Read {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CompareError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Percentage with the configured precision, trailing zeros trimmed so a
/// clean +10 renders as "+10%" rather than "+10.00%".
fn format_pct(pct: f64, precision: usize) -> String {
    let s = format!("{:+.*}", precision, pct);
    if s.contains('.') {
        let trimmed = s.trim_end_matches('0').trim_end_matches('.');
        trimmed.to_string()
    } else {
        s
    }
}

/// One diff cell: "-" for no signal, "+100%"/"-100%" at the new/removed
/// boundary, otherwise signed absolute diff plus signed percent against the
/// baseline.
pub fn format_cell(pair: MetricPair, precision: usize) -> String {
    if pair.main == 0 && pair.pr == 0 {
        return "-".to_string();
    }
    if pair.main == 0 {
        return "+100%".to_string();
    }
    if pair.pr == 0 {
        return "-100%".to_string();
    }

    let pct = (pair.pr as f64 - pair.main as f64) / pair.main as f64 * 100.0;
    if pct.abs() < 0.01 {
        return "-".to_string();
    }
    let diff = pair.pr as i128 - pair.main as i128;
    format!("{:+} ({}%)", diff, format_pct(pct, precision))
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

const COLUMNS: [&str; 7] = [
    "Function",
    "Gates (main)",
    "Gates (PR)",
    "Gates diff",
    "DA gas diff",
    "L2 gas diff",
    "Status",
];

impl ContractComparison {
    fn row_cells(row: &FunctionComparison, precision: usize) -> [String; 7] {
        [
            row.name.clone(),
            row.gates.main.to_string(),
            row.gates.pr.to_string(),
            format_cell(row.gates, precision),
            format_cell(row.da_gas, precision),
            format_cell(row.l2_gas, precision),
            format!("{} {}", row.status.symbol(), row.status.label()),
        ]
    }

    pub fn render_markdown(&self, cfg: &CompareConfig) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "| {} |", COLUMNS.join(" | "));
        let _ = writeln!(out, "|{}", " --- |".repeat(COLUMNS.len()));
        for row in &self.rows {
            let cells = Self::row_cells(row, cfg.precision);
            let _ = writeln!(out, "| {} |", cells.join(" | "));
        }
        out
    }

    pub fn render_html(&self, cfg: &CompareConfig) -> String {
        let mut out = String::new();
        out.push_str("<table>\n<thead><tr>");
        for col in COLUMNS {
            let _ = write!(out, "<th>{col}</th>");
        }
        out.push_str("</tr></thead>\n<tbody>\n");
        for row in &self.rows {
            out.push_str("<tr>");
            for cell in Self::row_cells(row, cfg.precision) {
                let _ = write!(out, "<td>{}</td>", escape_html(&cell));
            }
            out.push_str("</tr>\n");
        }
        out.push_str("</tbody>\n</table>\n");
        out
    }

    pub fn render(&self, format: OutputFormat, cfg: &CompareConfig) -> String {
        match format {
            OutputFormat::Markdown => self.render_markdown(cfg),
            OutputFormat::Html => self.render_html(cfg),
        }
    }
}
