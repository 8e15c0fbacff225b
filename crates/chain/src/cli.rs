//! Host harness for the ledger.
//!
//! | Command | Effect |
//! |---------|--------|
//! | `check-genesis` | parse and verify a genesis file (and airdrop) |
//! | `replay` | apply a JSON block file to an LMDB store, committing per block |
//! | `inspect` | print system parameters, staker counts, yield pool, tiers |
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::config::{self, LedgerConfig};
use crate::db::{KvStore, LmdbStore};
use crate::genesis::{self, Genesis};
use crate::state::{Ledger, TxContext};
use crate::tx::{BaseTx, TxEnvelope, TxInput};
use crate::types::{Address, StakerRole, TxId};

#[derive(Parser, Debug)]
#[command(name = "sama-ledger", about = "Sama subnet ledger harness")]
pub struct Cli {
    /// Node config (TOML). Defaults apply when the file is missing.
    #[arg(long, default_value = "./ledger.toml")]
    pub config: PathBuf,

    /// Overrides `data_dir` from the config.
    #[arg(long)]
    pub data_dir: Option<String>,

    /// Overrides `log_level` from the config.
    #[arg(long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse and verify a genesis file
    CheckGenesis {
        #[arg(long)]
        genesis: PathBuf,
        /// Airdrop JSON pinned by `airdropHash`
        #[arg(long)]
        airdrop: Option<PathBuf>,
    },

    /// Apply a JSON block file, committing after every block
    Replay {
        #[arg(long)]
        genesis: PathBuf,
        #[arg(long)]
        airdrop: Option<PathBuf>,
        #[arg(long)]
        blocks: PathBuf,
    },

    /// Print the committed ledger summary
    Inspect {
        #[arg(long)]
        genesis: PathBuf,
        /// Time used to filter expired actions on reload
        #[arg(long, default_value_t = 0)]
        now: u64,
    },
}

// ------------------- REPLAY FORMAT -------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReplayTx {
    pub sender: Address,
    #[serde(rename = "txID")]
    pub tx_id: TxId,
    pub magic: u64,
    pub price: u64,
    pub input: TxInput,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReplayBlock {
    pub block_time: u64,
    pub txs: Vec<ReplayTx>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayFile {
    pub blocks: Vec<ReplayBlock>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub blocks: usize,
    pub applied: usize,
    pub rejected: usize,
}

/// Execute every block in order and commit each one. Rejected transactions
/// are logged and skipped; store failures stop the replay.
pub fn replay_blocks(ledger: &mut Ledger, file: &ReplayFile) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();
    for (height, block) in file.blocks.iter().enumerate() {
        let mut applied = 0usize;
        let mut rejected = 0usize;
        for tx in &block.txs {
            let payload = match tx.input.decode() {
                Ok(p) => p,
                Err(e) => {
                    println!("   ✗ {} {} → {}", tx.tx_id, tx.input.typ, e);
                    rejected += 1;
                    continue;
                }
            };
            let env = TxEnvelope::new(
                BaseTx { magic: tx.magic, price: tx.price, ..BaseTx::default() },
                payload,
            );
            let ctx = TxContext { sender: tx.sender, tx_id: tx.tx_id, block_time: block.block_time };
            match ledger.execute(&env, &ctx) {
                Ok(()) => applied += 1,
                Err(e) if e.is_fatal() => {
                    ledger.abort();
                    return Err(e).with_context(|| format!("block {} tx {}", height, tx.tx_id));
                }
                Err(e) => {
                    println!("   ✗ {} {} → {}", tx.tx_id, tx.input.typ, e);
                    rejected += 1;
                }
            }
        }
        let ops = ledger.commit().with_context(|| format!("commit block {}", height))?;
        println!(
            "📦 block {} @{}: {} applied, {} rejected, {} store ops",
            height, block.block_time, applied, rejected, ops
        );
        summary.blocks += 1;
        summary.applied += applied;
        summary.rejected += rejected;
    }
    Ok(summary)
}

// ------------------- HELPERS -------------------

/// Config from `path`, or defaults when the file does not exist.
pub fn load_config(path: &Path) -> Result<LedgerConfig> {
    if path.exists() {
        config::load_from_file(path)
    } else {
        Ok(LedgerConfig::default())
    }
}

fn read_airdrop(path: Option<&PathBuf>) -> Result<Option<Vec<u8>>> {
    path.map(|p| std::fs::read(p).with_context(|| format!("read airdrop {}", p.display())))
        .transpose()
}

fn open_ledger(cfg: &LedgerConfig, genesis: Genesis) -> Result<Ledger> {
    let store = LmdbStore::open_with_map_size(&cfg.data_dir, cfg.map_size)
        .with_context(|| format!("open store {}", cfg.data_dir))?;
    let store: Arc<dyn KvStore> = Arc::new(store);
    Ok(Ledger::new(genesis, store, cfg.subscriber_cache_capacity))
}

fn print_summary(ledger: &Ledger) {
    let p = ledger.params();
    let (routes, sers, validators) = ledger.stakers().stakers_num();
    println!("═══════════════════════════════════════════════════════════");
    println!("📊 LEDGER SUMMARY");
    println!("═══════════════════════════════════════════════════════════");
    println!("   Root:        {}", p.root_address.to_prefixed_hex());
    println!("   Foundation:  {}", p.foundation_address.to_prefixed_hex());
    println!("   Route/Ser:   {}% / {}%", p.route_perc, p.ser_perc);
    println!("   Burn:        {}%", p.burn_perc);
    println!("   Stakers:     {} {} / {} {} / {} {}",
        routes, StakerRole::Route, sers, StakerRole::Service, validators, StakerRole::Validator);
    println!("   Yields:      {} undistributed / {} total",
        ledger.yields().chain_yields(), ledger.yields().total_yields());
    println!("   Actions:     {}", ledger.actions().actions().len());
    for tier in ledger.user_types().user_types() {
        println!("   Tier {}:      {} ({})", tier.id, tier.fee, tier.name);
    }
    println!("═══════════════════════════════════════════════════════════");
}

// ------------------- ENTRY -------------------

pub fn run_cli(cli: Cli, mut cfg: LedgerConfig) -> Result<()> {
    if let Some(dir) = &cli.data_dir {
        cfg.data_dir = dir.clone();
    }

    match &cli.cmd {
        Commands::CheckGenesis { genesis, airdrop } => {
            let g = genesis::load_from_file(genesis)?;
            g.verify().context("verify genesis")?;
            let airdrop = read_airdrop(airdrop.as_ref())?;
            let allocations = g.allocations(airdrop.as_deref()).context("genesis allocations")?;
            println!("✅ genesis ok: symbol {} magic {} ({} allocations)", g.symbol, g.magic, allocations.len());
            Ok(())
        }

        Commands::Replay { genesis, airdrop, blocks } => {
            let g = genesis::load_from_file(genesis)?;
            let airdrop = read_airdrop(airdrop.as_ref())?;
            let raw = std::fs::read_to_string(blocks)
                .with_context(|| format!("read blocks {}", blocks.display()))?;
            let file: ReplayFile = serde_json::from_str(&raw).context("parse blocks json")?;

            let mut ledger = open_ledger(&cfg, g)?;
            let first = file.blocks.first().map(|b| b.block_time).unwrap_or(0);
            ledger.reload(first)?;
            ledger.load_genesis(airdrop.as_deref())?;
            ledger.commit().context("commit genesis")?;

            let summary = replay_blocks(&mut ledger, &file)?;
            info!(blocks = summary.blocks, applied = summary.applied, rejected = summary.rejected, "replay finished");
            println!(
                "✅ replayed {} blocks: {} applied, {} rejected",
                summary.blocks, summary.applied, summary.rejected
            );
            print_summary(&ledger);
            Ok(())
        }

        Commands::Inspect { genesis, now } => {
            let g = genesis::load_from_file(genesis)?;
            let mut ledger = open_ledger(&cfg, g)?;
            ledger.reload(*now)?;
            print_summary(&ledger);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::genesis::CustomAllocation;

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from([
            "sama-ledger", "--data-dir", "/tmp/x", "replay", "--genesis", "g.toml", "--blocks", "b.json",
        ])
        .expect("parse");
        assert_eq!(cli.data_dir.as_deref(), Some("/tmp/x"));
        assert!(matches!(cli.cmd, Commands::Replay { ref airdrop, .. } if airdrop.is_none()));

        let cli = Cli::try_parse_from(["sama-ledger", "inspect", "--genesis", "g.toml"]).expect("parse");
        assert!(matches!(cli.cmd, Commands::Inspect { now: 0, .. }));
    }

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let cfg = load_config(Path::new("/definitely/not/here.toml")).expect("cfg");
        assert_eq!(cfg.data_dir, LedgerConfig::default().data_dir);
    }

    #[test]
    fn replay_counts_and_commits_blocks() {
        let sender = Address::from_bytes([1; 20]);
        let g = Genesis {
            magic: 5,
            custom_allocation: vec![CustomAllocation { address: sender, balance: 100 }],
            ..Genesis::default()
        };
        let store = Arc::new(MemoryStore::new());
        let mut ledger = Ledger::new(g, store.clone(), 8);
        ledger.load_genesis(None).expect("genesis");
        ledger.commit().expect("commit");

        let json = r#"{"blocks":[{"blockTime":1700000000,"txs":[
            {"sender":"0x0101010101010101010101010101010101010101","txID":"0x0000000000000000000000000000000000000000000000000000000000000001","magic":5,"price":0,
             "input":{"type":"transfer","to":"0x0202020202020202020202020202020202020202","units":40}},
            {"sender":"0x0101010101010101010101010101010101010101","txID":"0x0000000000000000000000000000000000000000000000000000000000000002","magic":5,"price":0,
             "input":{"type":"transfer","to":"0x0202020202020202020202020202020202020202","units":400}},
            {"sender":"0x0101010101010101010101010101010101010101","txID":"0x0000000000000000000000000000000000000000000000000000000000000003","magic":5,"price":0,
             "input":{"type":"mint"}}
        ]}]}"#;
        let file: ReplayFile = serde_json::from_str(json).expect("json");
        let summary = replay_blocks(&mut ledger, &file).expect("replay");
        assert_eq!(summary, ReplaySummary { blocks: 1, applied: 1, rejected: 2 });

        let mut fresh = Ledger::new(Genesis { magic: 5, ..Genesis::default() }, store, 8);
        fresh.reload(0).expect("reload");
        assert_eq!(fresh.balance(&Address::from_bytes([2; 20])).expect("balance"), 40);
        assert_eq!(fresh.balance(&sender).expect("balance"), 60);
    }
}
