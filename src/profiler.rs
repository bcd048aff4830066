//! Drives prepared calls through the client and aggregates per-function
//! results.
//!
//! Execution is strictly sequential: every profiled call lands a real
//! state-mutating transaction, and later calls in the batch depend on the
//! balances and nonces the earlier ones consumed. Re-running a batch applies
//! its effects again; callers wanting idempotent reruns must provision a
//! fresh store.

use std::path::Path;
use tracing::{error, info};

use crate::call::PreparedCall;
use crate::client::{ClientError, ProfilerClient};
use crate::schema::{ProfileReport, ProfileResult, ReportError};

/// Profile each call in order: estimate gas, capture the per-circuit gate
/// counts, then submit and wait for the transaction to mine so the figures
/// correspond to a call that actually executes. A failure in any step is
/// recorded as a failed sentinel for that call and the batch continues.
pub async fn profile(
    client: &dyn ProfilerClient,
    calls: &[PreparedCall],
) -> Vec<ProfileResult> {
    let mut results = Vec::with_capacity(calls.len());
    info!("profiling {} method(s)", calls.len());

    for call in calls {
        let name = call.display_name();
        match profile_one(client, call, &name).await {
            Ok(result) => {
                info!(
                    function = %name,
                    gates = result.total_gate_count,
                    gas = result.combined_gas(),
                    "profiled"
                );
                results.push(result);
            }
            Err(err) => {
                error!(function = %name, error = %err, "profiling failed");
                results.push(ProfileResult::failed(&name));
            }
        }
    }

    results
}

async fn profile_one(
    client: &dyn ProfilerClient,
    call: &PreparedCall,
    name: &str,
) -> Result<ProfileResult, ClientError> {
    let gas = client.estimate_gas(call).await?;
    let steps = client.profile(call).await?;
    // Settlement gates a valid result: a call that simulates cleanly but
    // reverts on submission must not pass as profiled.
    client.send_and_wait(call).await?;
    Ok(ProfileResult::from_steps(name.to_string(), steps, gas))
}

/// Build the report from the results and write it as formatted JSON. An
/// empty batch still writes the empty-shaped report.
pub fn save_results(results: &[ProfileResult], dest: &Path) -> Result<(), ReportError> {
    let report = ProfileReport::from_results(results.to_vec())?;
    report.write_to(dest)?;
    info!(path = %dest.display(), functions = results.len(), "report saved");
    Ok(())
}

/// Best-effort error-shaped document written when a run dies before
/// producing results, so CI steps always find a file at the destination.
pub fn save_error_report(message: &str, dest: &Path) {
    let doc = serde_json::json!({ "error": message });
    match serde_json::to_string_pretty(&doc) {
        Ok(json) => {
            if let Err(err) = std::fs::write(dest, json) {
                error!(path = %dest.display(), error = %err, "could not write error report");
            }
        }
        Err(err) => error!(error = %err, "could not serialize error report"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{TxReceipt, TxStatus};
    use crate::schema::{CircuitGateCount, GasPair, GasSettings};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Scripted in-memory client: per-selector gate counts and gas, plus
    /// switches for failing individual steps.
    #[derive(Default)]
    struct MockClient {
        gates: HashMap<String, Vec<(String, u64)>>,
        gas: HashMap<String, GasSettings>,
        fail_profile: Vec<String>,
        revert_on_send: Vec<String>,
        log: Mutex<Vec<String>>,
    }

    impl MockClient {
        fn with_function(mut self, selector: &str, gates: &[(&str, u64)], da: u64, l2: u64) -> Self {
            self.gates.insert(
                selector.to_string(),
                gates.iter().map(|(n, c)| (n.to_string(), *c)).collect(),
            );
            self.gas.insert(
                selector.to_string(),
                GasSettings {
                    gas_limits: GasPair { da_gas: da, l2_gas: l2 },
                    teardown_gas_limits: GasPair::default(),
                },
            );
            self
        }
    }

    #[async_trait]
    impl ProfilerClient for MockClient {
        async fn estimate_gas(&self, call: &PreparedCall) -> Result<GasSettings, ClientError> {
            self.log.lock().unwrap().push(format!("estimate:{}", call.selector));
            Ok(self.gas.get(&call.selector).copied().unwrap_or_default())
        }

        async fn profile(&self, call: &PreparedCall) -> Result<Vec<CircuitGateCount>, ClientError> {
            self.log.lock().unwrap().push(format!("profile:{}", call.selector));
            if self.fail_profile.contains(&call.selector) {
                return Err(ClientError::Rpc {
                    code: -32000,
                    message: "Assertion failed: Balance too low".to_string(),
                });
            }
            Ok(self
                .gates
                .get(&call.selector)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .map(|(circuit_name, gate_count)| CircuitGateCount {
                    circuit_name,
                    gate_count,
                })
                .collect())
        }

        async fn send_and_wait(&self, call: &PreparedCall) -> Result<TxReceipt, ClientError> {
            self.log.lock().unwrap().push(format!("send:{}", call.selector));
            if self.revert_on_send.contains(&call.selector) {
                return Err(ClientError::TxReverted("Assertion failed: nullifier exists".to_string()));
            }
            Ok(TxReceipt {
                tx_hash: format!("0xhash-{}", call.selector),
                status: TxStatus::Mined,
                block_number: Some(1),
                error: None,
            })
        }
    }

    fn call(name: &str, selector: &str) -> PreparedCall {
        PreparedCall::new(name, selector, "0xc0ffee", "0xa11ce", json!([]))
    }

    #[tokio::test]
    async fn test_profile_aggregates_in_order() {
        let client = MockClient::default()
            .with_function("0x01", &[("kernel", 100), ("mint", 400)], 10, 20)
            .with_function("0x02", &[("kernel", 100), ("transfer", 900)], 5, 7);
        let calls = vec![call("mint", "0x01"), call("transfer", "0x02")];

        let results = profile(&client, &calls).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "mint");
        assert_eq!(results[0].total_gate_count, 500);
        assert_eq!(results[0].gas.gas_limits.da_gas, 10);
        assert_eq!(results[1].name, "transfer");
        assert_eq!(results[1].total_gate_count, 1_000);

        // Each call runs estimate -> profile -> send before the next starts.
        let log = client.log.lock().unwrap();
        assert_eq!(
            *log,
            vec![
                "estimate:0x01",
                "profile:0x01",
                "send:0x01",
                "estimate:0x02",
                "profile:0x02",
                "send:0x02"
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_batch() {
        let mut client = MockClient::default()
            .with_function("0x01", &[("a", 100)], 1, 1)
            .with_function("0x02", &[("b", 200)], 1, 1)
            .with_function("0x03", &[("c", 300)], 1, 1);
        client.fail_profile.push("0x02".to_string());
        let calls = vec![call("first", "0x01"), call("second", "0x02"), call("third", "0x03")];

        let results = profile(&client, &calls).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].name, "first");
        assert_eq!(results[0].total_gate_count, 100);
        assert_eq!(results[1].name, "second (FAILED)");
        assert_eq!(results[1].total_gate_count, 0);
        assert_eq!(results[2].name, "third");
        assert_eq!(results[2].total_gate_count, 300);
    }

    #[tokio::test]
    async fn test_revert_on_submission_is_a_failure() {
        let mut client = MockClient::default().with_function("0x01", &[("a", 100)], 1, 1);
        client.revert_on_send.push("0x01".to_string());
        let calls = vec![call("mint", "0x01")];

        let results = profile(&client, &calls).await;
        assert_eq!(results[0].name, "mint (FAILED)");
        assert_eq!(results[0].total_gate_count, 0);
    }

    #[tokio::test]
    async fn test_unresolved_name_fallback() {
        let client = MockClient::default().with_function("0xdead", &[("x", 50)], 0, 0);
        let mut anonymous = call("", "0xdead");
        anonymous.name = None;

        let results = profile(&client, &[anonymous]).await;
        assert_eq!(results[0].name, "unresolved(0xdead)");
    }

    #[tokio::test]
    async fn test_empty_batch_writes_empty_report() {
        let client = MockClient::default();
        let results = profile(&client, &[]).await;
        assert!(results.is_empty());

        let dir = tempdir().unwrap();
        let dest = dir.path().join("empty.benchmark.json");
        save_results(&results, &dest).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&dest).unwrap()).unwrap();
        assert_eq!(value, json!({"summary": {}, "results": [], "gasSummary": {}}));
    }

    #[test]
    fn test_error_report_is_written() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("broken.benchmark.json");
        save_error_report("setup exploded", &dest);

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&dest).unwrap()).unwrap();
        assert_eq!(value, json!({"error": "setup exploded"}));
    }
}
