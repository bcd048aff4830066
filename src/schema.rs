//! Report documents persisted by the profiler and consumed by the comparator.
//!
//! Wire keys are camelCase and stable (`summary`, `results`, `gasSummary`);
//! CI tooling on both ends of a comparison parses these files directly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::call;

#[derive(Debug, Error)]
pub enum ReportError {
    /// At most one result per function name per report; a collision means
    /// two interactions resolved to the same name and the report can no
    /// longer be trusted as a per-function map.
    #[error("duplicate function name in report: {0}")]
    DuplicateName(String),

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write report to {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Gas split across the two metered dimensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasPair {
    pub da_gas: u64,
    pub l2_gas: u64,
}

impl GasPair {
    pub fn add(self, other: GasPair) -> GasPair {
        GasPair {
            da_gas: self.da_gas + other.da_gas,
            l2_gas: self.l2_gas + other.l2_gas,
        }
    }

    /// Sum over both dimensions.
    pub fn combined(self) -> u64 {
        self.da_gas + self.l2_gas
    }
}

/// Gas limits as estimated for one call: the main execution phase plus the
/// teardown phase the platform runs after the public portion settles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasSettings {
    pub gas_limits: GasPair,
    pub teardown_gas_limits: GasPair,
}

impl GasSettings {
    /// Element-wise sum of the execution and teardown limits.
    pub fn total(self) -> GasPair {
        self.gas_limits.add(self.teardown_gas_limits)
    }
}

/// Gate count for one circuit invoked during execution. Public execution
/// steps report zero by convention; private circuits report their real size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitGateCount {
    pub circuit_name: String,
    pub gate_count: u64,
}

/// One benchmarked function's outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResult {
    pub name: String,
    pub total_gate_count: u64,
    pub gate_counts: Vec<CircuitGateCount>,
    pub gas: GasSettings,
}

impl ProfileResult {
    /// Build a result from the per-circuit steps, deriving the total so it
    /// always equals the sum of the parts.
    pub fn from_steps(name: String, steps: Vec<CircuitGateCount>, gas: GasSettings) -> Self {
        let total_gate_count = steps.iter().map(|s| s.gate_count).sum();
        ProfileResult {
            name,
            total_gate_count,
            gate_counts: steps,
            gas,
        }
    }

    /// Sentinel recorded when profiling a call failed. Carries the failed
    /// marker in its name and zeroes everywhere else so the batch can keep
    /// going without poisoning the summaries.
    pub fn failed(resolved_name: &str) -> Self {
        ProfileResult {
            name: call::failed_name(resolved_name),
            total_gate_count: 0,
            gate_counts: Vec::new(),
            gas: GasSettings::default(),
        }
    }

    /// Combined gas over both dimensions and both limit groups.
    pub fn combined_gas(&self) -> u64 {
        self.gas.total().combined()
    }
}

/// Persisted output of one benchmark run. Immutable once written; the
/// comparator reads it back wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileReport {
    pub summary: BTreeMap<String, u64>,
    pub results: Vec<ProfileResult>,
    pub gas_summary: BTreeMap<String, u64>,
}

impl ProfileReport {
    /// Build the summary maps from an ordered result sequence. An empty
    /// sequence yields the valid empty shape rather than an error, so
    /// downstream tooling never special-cases a missing file.
    pub fn from_results(results: Vec<ProfileResult>) -> Result<Self, ReportError> {
        let mut summary = BTreeMap::new();
        let mut gas_summary = BTreeMap::new();
        for r in &results {
            if summary.contains_key(&r.name) {
                return Err(ReportError::DuplicateName(r.name.clone()));
            }
            summary.insert(r.name.clone(), r.total_gate_count);
            gas_summary.insert(r.name.clone(), r.combined_gas());
        }
        Ok(ProfileReport {
            summary,
            results,
            gas_summary,
        })
    }

    pub fn to_pretty_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_to(&self, path: &Path) -> Result<(), ReportError> {
        let json = self.to_pretty_json()?;
        fs::write(path, json).map_err(|source| ReportError::Write {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gas(da: u64, l2: u64, tda: u64, tl2: u64) -> GasSettings {
        GasSettings {
            gas_limits: GasPair {
                da_gas: da,
                l2_gas: l2,
            },
            teardown_gas_limits: GasPair {
                da_gas: tda,
                l2_gas: tl2,
            },
        }
    }

    fn steps(counts: &[(&str, u64)]) -> Vec<CircuitGateCount> {
        counts
            .iter()
            .map(|(n, c)| CircuitGateCount {
                circuit_name: n.to_string(),
                gate_count: *c,
            })
            .collect()
    }

    #[test]
    fn test_total_is_sum_of_steps() {
        let r = ProfileResult::from_steps(
            "transfer".to_string(),
            steps(&[("private_kernel_init", 400), ("transfer", 1_200), ("public_dispatch", 0)]),
            gas(10, 20, 0, 0),
        );
        assert_eq!(r.total_gate_count, 1_600);
        assert_eq!(
            r.total_gate_count,
            r.gate_counts.iter().map(|c| c.gate_count).sum::<u64>()
        );
    }

    #[test]
    fn test_report_summaries_match_results() {
        let results = vec![
            ProfileResult::from_steps("mint".to_string(), steps(&[("mint", 500)]), gas(10, 20, 1, 2)),
            ProfileResult::from_steps("transfer".to_string(), steps(&[("transfer", 800)]), gas(3, 4, 0, 0)),
        ];
        let report = ProfileReport::from_results(results.clone()).unwrap();

        for r in &results {
            assert_eq!(report.summary[&r.name], r.total_gate_count);
            assert_eq!(report.gas_summary[&r.name], r.combined_gas());
        }
        assert_eq!(report.gas_summary["mint"], 33);
        assert_eq!(report.results, results);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let results = vec![
            ProfileResult::from_steps("mint".to_string(), steps(&[("mint", 500)]), gas(0, 0, 0, 0)),
            ProfileResult::from_steps("mint".to_string(), steps(&[("mint", 600)]), gas(0, 0, 0, 0)),
        ];
        let err = ProfileReport::from_results(results).unwrap_err();
        assert!(matches!(err, ReportError::DuplicateName(name) if name == "mint"));
    }

    #[test]
    fn test_empty_report_shape() {
        let report = ProfileReport::from_results(Vec::new()).unwrap();
        let json = report.to_pretty_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"summary": {}, "results": [], "gasSummary": {}})
        );
    }

    #[test]
    fn test_wire_keys_are_camel_case() {
        let r = ProfileResult::from_steps(
            "mint".to_string(),
            steps(&[("mint", 500)]),
            gas(10, 20, 0, 0),
        );
        let report = ProfileReport::from_results(vec![r]).unwrap();
        let value = serde_json::to_value(&report).unwrap();

        let entry = &value["results"][0];
        assert_eq!(entry["totalGateCount"], 500);
        assert_eq!(entry["gateCounts"][0]["circuitName"], "mint");
        assert_eq!(entry["gateCounts"][0]["gateCount"], 500);
        assert_eq!(entry["gas"]["gasLimits"]["daGas"], 10);
        assert_eq!(entry["gas"]["teardownGasLimits"]["l2Gas"], 0);
        assert_eq!(value["gasSummary"]["mint"], 30);
    }

    #[test]
    fn test_failed_sentinel_is_zeroed() {
        let r = ProfileResult::failed("transfer");
        assert_eq!(r.name, "transfer (FAILED)");
        assert_eq!(r.total_gate_count, 0);
        assert!(r.gate_counts.is_empty());
        assert_eq!(r.combined_gas(), 0);
    }

    #[test]
    fn test_report_roundtrip() {
        let results = vec![ProfileResult::from_steps(
            "swap_exact_in".to_string(),
            steps(&[("swap_exact_in", 2_400), ("public_dispatch", 0)]),
            gas(128, 4_096, 32, 64),
        )];
        let report = ProfileReport::from_results(results).unwrap();
        let json = report.to_pretty_json().unwrap();
        let back: ProfileReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}
