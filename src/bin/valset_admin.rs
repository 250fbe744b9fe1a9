// VALIDATOR SET ADMIN TOOL
// Checks deployment configs and replays scripted governance calls against a
// local chain, printing every emitted event as one JSON line on stdout.
//
// Logs go to stderr (RUST_LOG, default "info").

use anyhow::{Context, Result};
use bleep_validator_set::{
    Address, Deployment, EventRecord, LocalChain, ValidatorSetConfig,
};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "valset_admin")]
#[command(about = "BLEEP validator set governance admin tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load, validate and print the effective deployment config
    CheckConfig { path: PathBuf },

    /// Deploy from a config and replay a JSON script of calls
    Simulate {
        #[arg(long)]
        config: PathBuf,

        #[arg(long)]
        script: PathBuf,
    },
}

/// One scripted call. Every call except `mine` is a transaction from `from`
/// mined into its own block.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
enum Step {
    AddValidator {
        from: Address,
        validator: Address,
    },
    RemoveValidator {
        from: Address,
        validator: Address,
    },
    FinalizeChange {
        from: Address,
    },
    /// `block` defaults to the current tip.
    ReportBenign {
        from: Address,
        validator: Address,
        block: Option<u64>,
    },
    ReportMalicious {
        from: Address,
        validator: Address,
        block: Option<u64>,
        #[serde(default, with = "hex::serde")]
        proof: Vec<u8>,
    },
    SetOwner {
        from: Address,
        owner: Address,
    },
    SetRecentBlocks {
        from: Address,
        blocks: u64,
    },
    Mine {
        blocks: u64,
    },
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::AddValidator { .. } => "add_validator",
            Step::RemoveValidator { .. } => "remove_validator",
            Step::FinalizeChange { .. } => "finalize_change",
            Step::ReportBenign { .. } => "report_benign",
            Step::ReportMalicious { .. } => "report_malicious",
            Step::SetOwner { .. } => "set_owner",
            Step::SetRecentBlocks { .. } => "set_recent_blocks",
            Step::Mine { .. } => "mine",
        }
    }
}

#[derive(Serialize)]
struct EmittedEvent<'a> {
    contract: &'static str,
    #[serde(flatten)]
    record: &'a EventRecord,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::CheckConfig { path } => {
            let config = load_config(&path)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Simulate { config, script } => {
            let config = load_config(&config)?;
            let steps = load_script(&script)?;
            simulate(&config, &steps)?;
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<ValidatorSetConfig> {
    let config = ValidatorSetConfig::load(path)
        .with_context(|| format!("invalid deployment config {}", path.display()))?;
    info!(
        validators = config.initial_validators.len(),
        topology = ?config.topology,
        "Loaded deployment config"
    );
    Ok(config)
}

fn load_script(path: &Path) -> Result<Vec<Step>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read script {}", path.display()))?;
    parse_script(&text).with_context(|| format!("invalid script {}", path.display()))
}

fn parse_script(text: &str) -> Result<Vec<Step>> {
    Ok(serde_json::from_str(text)?)
}

fn simulate(config: &ValidatorSetConfig, steps: &[Step]) -> Result<()> {
    let mut chain = LocalChain::new();
    let deployment = Deployment::deploy(config, &mut chain)?;
    let mut cursors = vec![0; deployment.event_logs().len()];
    flush_events(&deployment, &mut cursors)?;

    let mut rejected = 0usize;
    for (index, step) in steps.iter().enumerate() {
        if let Err(e) = apply(&deployment, &mut chain, step) {
            rejected += 1;
            warn!(step = index, call = step.name(), kind = e.kind(), "Call rejected: {}", e);
        }
        flush_events(&deployment, &mut cursors)?;
    }

    info!(
        steps = steps.len(),
        rejected,
        height = chain.height(),
        validators = deployment.view().get_validators().len(),
        "Simulation finished"
    );
    Ok(())
}

fn apply(deployment: &Deployment, chain: &mut LocalChain, step: &Step) -> bleep_validator_set::Result<()> {
    match step {
        Step::AddValidator { from, validator } => deployment
            .governance()
            .add_validator(&chain.transact(*from), *validator),
        Step::RemoveValidator { from, validator } => deployment
            .governance()
            .remove_validator(&chain.transact(*from), *validator),
        Step::FinalizeChange { from } => deployment.view().finalize_change(&chain.transact(*from)),
        Step::ReportBenign { from, validator, block } => {
            let block = block.unwrap_or_else(|| chain.height());
            deployment
                .view()
                .report_benign(&chain.transact(*from), *validator, block)
        }
        Step::ReportMalicious {
            from,
            validator,
            block,
            proof,
        } => {
            let block = block.unwrap_or_else(|| chain.height());
            deployment
                .view()
                .report_malicious(&chain.transact(*from), *validator, block, proof)
        }
        Step::SetOwner { from, owner } => deployment
            .governance()
            .set_owner(&chain.transact(*from), *owner),
        Step::SetRecentBlocks { from, blocks } => deployment
            .governance()
            .set_recent_blocks(&chain.transact(*from), *blocks),
        Step::Mine { blocks } => {
            chain.mine_blocks(*blocks);
            Ok(())
        }
    }
}

/// Print every record appended since `cursors`, then advance them.
fn flush_events(deployment: &Deployment, cursors: &mut [usize]) -> Result<()> {
    for ((contract, log), cursor) in deployment.event_logs().into_iter().zip(cursors.iter_mut()) {
        for record in log.all().iter().skip(*cursor) {
            println!("{}", serde_json::to_string(&EmittedEvent { contract, record })?);
        }
        *cursor = log.len();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bleep_validator_set::Topology;

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    #[test]
    fn test_parse_script() {
        let steps = parse_script(
            r#"[
                {"call": "finalize_change", "from": "0x0000000000000000000000000000000000000009"},
                {"call": "add_validator",
                 "from": "0x0000000000000000000000000000000000000001",
                 "validator": "0x0000000000000000000000000000000000000004"},
                {"call": "mine", "blocks": 3},
                {"call": "report_malicious",
                 "from": "0x0000000000000000000000000000000000000002",
                 "validator": "0x0000000000000000000000000000000000000001",
                 "proof": "c0ffee"}
            ]"#,
        )
        .unwrap();

        assert_eq!(
            steps,
            vec![
                Step::FinalizeChange { from: addr(9) },
                Step::AddValidator {
                    from: addr(1),
                    validator: addr(4),
                },
                Step::Mine { blocks: 3 },
                Step::ReportMalicious {
                    from: addr(2),
                    validator: addr(1),
                    block: None,
                    proof: vec![0xc0, 0xff, 0xee],
                },
            ]
        );
    }

    #[test]
    fn test_unknown_call_rejected() {
        assert!(parse_script(r#"[{"call": "self_destruct"}]"#).is_err());
    }

    #[test]
    fn test_rejected_steps_do_not_abort_replay() {
        let config = ValidatorSetConfig::new(addr(1), addr(9), vec![addr(1), addr(2)]);
        let steps = vec![
            // genesis still pending
            Step::AddValidator {
                from: addr(1),
                validator: addr(3),
            },
            Step::FinalizeChange { from: addr(9) },
            Step::AddValidator {
                from: addr(1),
                validator: addr(3),
            },
        ];
        assert!(simulate(&config, &steps).is_ok());
    }

    #[test]
    fn test_outer_replay_finalizes_on_outer() {
        let mut config = ValidatorSetConfig::new(addr(1), addr(9), vec![addr(1), addr(2)]);
        config.topology = Topology::Outer;
        let mut chain = LocalChain::new();
        let deployment = Deployment::deploy(&config, &mut chain).unwrap();

        apply(&deployment, &mut chain, &Step::FinalizeChange { from: addr(9) }).unwrap();
        let step = Step::AddValidator {
            from: addr(1),
            validator: addr(3),
        };
        apply(&deployment, &mut chain, &step).unwrap();
        assert!(!deployment.finalized());
        apply(&deployment, &mut chain, &Step::FinalizeChange { from: addr(9) }).unwrap();

        assert!(deployment.finalized());
        assert_eq!(deployment.view().get_validators(), vec![addr(1), addr(2), addr(3)]);
    }

    #[test]
    fn test_apply_reports_default_to_tip() {
        let config = ValidatorSetConfig::new(addr(1), addr(9), vec![addr(1), addr(2)]);
        let mut chain = LocalChain::new();
        let deployment = Deployment::deploy(&config, &mut chain).unwrap();
        chain.mine_blocks(30);

        let step = Step::ReportBenign {
            from: addr(2),
            validator: addr(1),
            block: None,
        };
        apply(&deployment, &mut chain, &step).unwrap();

        let records = deployment.view().events().all();
        assert_eq!(records.last().map(|r| r.block_number), Some(31));
    }
}
