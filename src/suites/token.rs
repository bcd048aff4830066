//! Private token benchmark: mint into private balance, private transfer on
//! behalf of the owner, and a public transfer for the cross-domain path.

use anyhow::Context as _;
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use super::{BenchmarkSuite, SuiteContext};
use crate::call::PreparedCall;
use crate::client::Connection;

pub const NAME: &str = "token";

const MINT_AMOUNT: u64 = 100_000;
const TRANSFER_AMOUNT: u64 = 1_000;

// Selectors from the Token artifact.
const SEL_MINT_PRIVATELY: &str = "0x219dbca5";
const SEL_TRANSFER_PRIVATE: &str = "0x4f1a8d9c";
const SEL_TRANSFER_PUBLIC: &str = "0x8e2cbe17";

pub struct TokenSuite;

#[async_trait]
impl BenchmarkSuite for TokenSuite {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn setup(&self, conn: &Connection) -> anyhow::Result<SuiteContext> {
        info!("registering accounts");
        let owner = conn
            .register_account("token-owner")
            .await
            .context("registering owner account")?;
        let recipient = conn
            .register_account("token-recipient")
            .await
            .context("registering recipient account")?;

        info!("deploying Token");
        let token = conn
            .deploy_contract("Token", &owner, json!(["PrivateToken", "PT", 18]))
            .await
            .context("deploying Token contract")?;

        let mut ctx = SuiteContext::new();
        ctx.insert("token", token);
        ctx.insert("owner", owner);
        ctx.insert("recipient", recipient);
        Ok(ctx)
    }

    async fn methods(
        &self,
        conn: &Connection,
        ctx: &SuiteContext,
    ) -> anyhow::Result<Vec<PreparedCall>> {
        let token = ctx.get_str("token")?;
        let owner = ctx.get_str("owner")?;
        let recipient = ctx.get_str("recipient")?;

        let mint = PreparedCall::new(
            "mint_privately",
            SEL_MINT_PRIVATELY,
            token,
            owner,
            json!([owner, MINT_AMOUNT]),
        );

        // The recipient moves the owner's private balance, so the owner
        // signs a witness over the exact inner call.
        let transfer_private = PreparedCall::new(
            "transfer_private",
            SEL_TRANSFER_PRIVATE,
            token,
            recipient,
            json!([owner, recipient, TRANSFER_AMOUNT, 0]),
        );
        let witness = conn
            .create_authwit(owner, recipient, &transfer_private)
            .await
            .context("creating transfer authwit")?;
        let transfer_private = transfer_private.with_authwit(witness);

        let transfer_public = PreparedCall::new(
            "transfer_public",
            SEL_TRANSFER_PUBLIC,
            token,
            owner,
            json!([owner, recipient, TRANSFER_AMOUNT, 0]),
        );

        Ok(vec![mint, transfer_private, transfer_public])
    }

    async fn teardown(&self, conn: &Connection, _ctx: SuiteContext) -> anyhow::Result<()> {
        info!("releasing per-run store");
        conn.reset_store().await.context("resetting PXE store")?;
        Ok(())
    }
}
