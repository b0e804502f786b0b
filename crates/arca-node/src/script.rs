//! Scripted market runs.
//!
//! A script seeds an in-memory collateral registry and replays a list of
//! calls through the async coordinator. Accounts are named by label and
//! mapped with [`account`], so scripts stay readable.

use crate::config::NodeConfig;
use anyhow::{bail, Context, Result};
use arca_challenges::{DigestVerifier, PublicInputs};
use arca_economics::{Amount, MarketTotals, MemorySink};
use arca_storage_market::{
    CallContext, Command, Market, MarketCoordinator, MarketEvent, MemoryRegistry, Outcome,
};
use arca_types::AccountId;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// Identity behind a script label.
pub fn account(label: &str) -> AccountId {
    AccountId::derive(label.as_bytes())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub nodes: Vec<NodeSeed>,
    pub steps: Vec<ScriptStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSeed {
    pub name: String,
    pub stake: Amount,
    pub capacity: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptStep {
    /// Caller label. May be omitted for `auto_proof` steps, which run as the
    /// slot's current target.
    #[serde(default)]
    pub caller: Option<String>,
    pub timestamp: u64,
    /// Defaults to `timestamp`
    #[serde(default)]
    pub height: Option<u64>,
    #[serde(default)]
    pub value: Amount,
    #[serde(default, with = "hex::serde")]
    pub entropy: [u8; 32],
    pub command: Command,
    /// Build the proof of a `submit_proof` command from the live slot.
    #[serde(default)]
    pub auto_proof: bool,
    #[serde(default)]
    pub expect_error: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub index: usize,
    pub caller: String,
    pub outcome: Option<Outcome>,
    pub error: Option<String>,
    /// Whether the result matched `expect_error`
    pub as_expected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptReport {
    pub steps: Vec<StepReport>,
    pub totals: MarketTotals,
    pub events: Vec<MarketEvent>,
}

impl ScriptReport {
    pub fn unexpected(&self) -> usize {
        self.steps.iter().filter(|step| !step.as_expected).count()
    }
}

impl Script {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading script {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parsing script {}", path.display()))
    }

    /// Builds the market described by `config` with this script's nodes.
    pub fn build_market(&self, config: &NodeConfig) -> Result<Market> {
        let mut registry = MemoryRegistry::new(config.node.stake_per_byte);
        for node in &self.nodes {
            registry.register(account(&node.name), node.stake, node.capacity);
        }
        let market = Market::new(
            config.market.clone(),
            account(&config.node.owner),
            Box::new(registry),
            Box::new(DigestVerifier),
            Box::new(MemorySink::new()),
        )
        .context("building market")?;
        Ok(market)
    }

    pub async fn run(&self, config: &NodeConfig) -> Result<ScriptReport> {
        let coordinator = MarketCoordinator::new(self.build_market(config)?);
        info!(
            nodes = self.nodes.len(),
            steps = self.steps.len(),
            "📜 Running script"
        );

        let mut steps = Vec::with_capacity(self.steps.len());
        for (index, step) in self.steps.iter().enumerate() {
            let (caller, command) = self
                .prepare(&coordinator, step)
                .await
                .with_context(|| format!("preparing step {index}"))?;
            let height = step.height.unwrap_or(step.timestamp);
            let ctx = CallContext::new(account(&caller), step.timestamp, height)
                .with_value(step.value)
                .with_entropy(step.entropy);

            let result = coordinator.execute(ctx, command).await;
            let as_expected = result.is_err() == step.expect_error;
            if !as_expected {
                warn!(index, caller = %caller, "⚠️ Step did not go as expected");
            } else {
                debug!(index, caller = %caller, ok = result.is_ok(), "Step applied");
            }

            let (outcome, error) = match result {
                Ok(outcome) => (Some(outcome), None),
                Err(err) => (None, Some(err.to_string())),
            };
            steps.push(StepReport {
                index,
                caller,
                outcome,
                error,
                as_expected,
            });
        }

        let report = ScriptReport {
            steps,
            totals: coordinator.totals().await,
            events: coordinator.drain_events().await,
        };
        info!(
            unexpected = report.unexpected(),
            escrow_locked = report.totals.escrow_locked.to_base_units(),
            "✅ Script finished"
        );
        Ok(report)
    }

    /// Resolves the caller label and fills in auto-generated proofs.
    async fn prepare(
        &self,
        coordinator: &MarketCoordinator,
        step: &ScriptStep,
    ) -> Result<(String, Command)> {
        if !step.auto_proof {
            let Some(caller) = step.caller.clone() else {
                bail!("step has no caller");
            };
            return Ok((caller, step.command.clone()));
        }

        let Command::SubmitProof {
            slot, commitment, ..
        } = step.command
        else {
            bail!("auto_proof requires a submit_proof command");
        };
        let proved = coordinator
            .with_market(|market| proof_for(market, slot, commitment))
            .await;
        let Some((target, proof)) = proved else {
            bail!("slot {slot} has no live target to prove");
        };

        // A named caller is kept even when it is not the target, so the
        // market gets to reject it.
        let caller = match &step.caller {
            Some(label) => label.clone(),
            None => self
                .nodes
                .iter()
                .find(|node| account(&node.name) == target)
                .map(|node| node.name.clone())
                .with_context(|| format!("slot {slot} targets an unscripted node {target}"))?,
        };
        Ok((
            caller,
            Command::SubmitProof {
                slot,
                proof,
                commitment,
            },
        ))
    }
}

fn proof_for(market: &Market, slot: usize, commitment: [u8; 32]) -> Option<(AccountId, Vec<u8>)> {
    let challenge = market.slot(slot).ok()?;
    let target = challenge.target?;
    let info = market.node_info(target.node)?;
    let order = market.order(target.order)?;
    let inputs = PublicInputs {
        commitment,
        randomness: challenge.randomness,
        identity_key: info.identity_key,
        identity_aux: info.identity_aux,
        fingerprint: order.file.fingerprint,
    };
    Some((target.node, DigestVerifier::prove(&inputs.to_array())))
}
