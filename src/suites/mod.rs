//! Benchmark definition modules.
//!
//! Each suite provisions its contracts against a live connection, hands the
//! profiler an ordered list of prepared calls, and optionally cleans up
//! after itself. Suites are compiled in and found by name through
//! [`lookup`].

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::call::PreparedCall;
use crate::client::Connection;

pub mod amm;
pub mod token;

/// Opaque capability bag a suite threads between its phases. Keys and value
/// shapes are private to the suite that populates them.
#[derive(Debug, Clone, Default)]
pub struct SuiteContext {
    values: BTreeMap<String, Value>,
}

impl SuiteContext {
    pub fn new() -> Self {
        SuiteContext::default()
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// String-valued entry, or an error naming the missing key.
    pub fn get_str(&self, key: &str) -> anyhow::Result<&str> {
        self.values
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("suite context is missing key {key:?}"))
    }
}

/// One benchmark definition: setup, an ordered method list, and teardown.
#[async_trait]
pub trait BenchmarkSuite: Send + Sync {
    fn name(&self) -> &'static str;

    /// Provision contracts and accounts; the returned context carries
    /// whatever the method list needs.
    async fn setup(&self, conn: &Connection) -> anyhow::Result<SuiteContext>;

    /// The ordered, wallet-bound calls to profile.
    async fn methods(
        &self,
        conn: &Connection,
        ctx: &SuiteContext,
    ) -> anyhow::Result<Vec<PreparedCall>>;

    /// Optional cleanup, e.g. releasing the per-run store.
    async fn teardown(&self, _conn: &Connection, _ctx: SuiteContext) -> anyhow::Result<()> {
        Ok(())
    }
}

pub fn lookup(name: &str) -> Option<Box<dyn BenchmarkSuite>> {
    match name {
        token::NAME => Some(Box::new(token::TokenSuite)),
        amm::NAME => Some(Box::new(amm::AmmSuite)),
        _ => None,
    }
}

pub fn names() -> Vec<&'static str> {
    vec![token::NAME, amm::NAME]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_context_accessors() {
        let mut ctx = SuiteContext::new();
        ctx.insert("token_address", "0xc0ffee");
        ctx.insert("pool_fee_bps", 30);

        assert_eq!(ctx.get_str("token_address").unwrap(), "0xc0ffee");
        assert_eq!(ctx.get("pool_fee_bps"), Some(&json!(30)));

        let err = ctx.get_str("missing").unwrap_err();
        assert!(err.to_string().contains("missing"));
        // Present but not a string is also an error for get_str.
        assert!(ctx.get_str("pool_fee_bps").is_err());
    }

    #[test]
    fn test_registry_lookup() {
        for name in names() {
            let suite = lookup(name).unwrap();
            assert_eq!(suite.name(), name);
        }
        assert!(lookup("does-not-exist").is_none());
    }
}
