//! AMM benchmark: liquidity provision and a swap over a freshly seeded pool.
//!
//! Setup lands real mint transactions so the profiled calls run against
//! funded balances; the working amounts below leave room for both methods.

use anyhow::Context as _;
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use super::{BenchmarkSuite, SuiteContext};
use crate::call::PreparedCall;
use crate::client::{Connection, ProfilerClient};

pub const NAME: &str = "amm";

const SEED_AMOUNT: u64 = 1_000_000;
const LIQUIDITY_AMOUNT: u64 = 100_000;
const SWAP_AMOUNT: u64 = 10_000;

// Selectors from the Token and AMM artifacts.
const SEL_MINT_PRIVATELY: &str = "0x219dbca5";
const SEL_ADD_LIQUIDITY: &str = "0x5b0f91aa";
const SEL_SWAP_EXACT_IN: &str = "0x7d64c3e2";

pub struct AmmSuite;

#[async_trait]
impl BenchmarkSuite for AmmSuite {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn setup(&self, conn: &Connection) -> anyhow::Result<SuiteContext> {
        let trader = conn
            .register_account("amm-trader")
            .await
            .context("registering trader account")?;

        info!("deploying token pair and AMM");
        let token0 = conn
            .deploy_contract("Token", &trader, json!(["PoolToken0", "PT0", 18]))
            .await
            .context("deploying token0")?;
        let token1 = conn
            .deploy_contract("Token", &trader, json!(["PoolToken1", "PT1", 18]))
            .await
            .context("deploying token1")?;
        let amm = conn
            .deploy_contract("Amm", &trader, json!([token0, token1]))
            .await
            .context("deploying AMM")?;

        info!("seeding trader balances");
        for token in [&token0, &token1] {
            let mint = PreparedCall::new(
                "mint_privately",
                SEL_MINT_PRIVATELY,
                token.as_str(),
                trader.as_str(),
                json!([trader, SEED_AMOUNT]),
            );
            conn.send_and_wait(&mint)
                .await
                .with_context(|| format!("seeding balance on {token}"))?;
        }

        let mut ctx = SuiteContext::new();
        ctx.insert("amm", amm);
        ctx.insert("token0", token0);
        ctx.insert("token1", token1);
        ctx.insert("trader", trader);
        Ok(ctx)
    }

    async fn methods(
        &self,
        _conn: &Connection,
        ctx: &SuiteContext,
    ) -> anyhow::Result<Vec<PreparedCall>> {
        let amm = ctx.get_str("amm")?;
        let trader = ctx.get_str("trader")?;
        let token0 = ctx.get_str("token0")?;
        let token1 = ctx.get_str("token1")?;

        let add_liquidity = PreparedCall::new(
            "add_liquidity",
            SEL_ADD_LIQUIDITY,
            amm,
            trader,
            json!([token0, token1, LIQUIDITY_AMOUNT, LIQUIDITY_AMOUNT, 0]),
        );

        let swap_exact_in = PreparedCall::new(
            "swap_exact_in",
            SEL_SWAP_EXACT_IN,
            amm,
            trader,
            json!([token0, token1, SWAP_AMOUNT, 0]),
        );

        Ok(vec![add_liquidity, swap_exact_in])
    }

    async fn teardown(&self, conn: &Connection, _ctx: SuiteContext) -> anyhow::Result<()> {
        conn.reset_store().await.context("resetting PXE store")?;
        Ok(())
    }
}
