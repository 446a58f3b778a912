use anyhow::{Context, Result};
use chainlib::crypto::KeyPair;
use chainlib::store::BlockStore;
use chainlib::types::HashedBlock;
use chainlib::ChainEngine;
use clap::Parser;
use node::store::{load_or_create_miner_key, SledBlockStore, SledMempoolStore, SledUtxoStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

type MinerEngine = ChainEngine<SledBlockStore, SledMempoolStore, SledUtxoStore>;

/// Proof-of-Work miner attaching to a node's on-disk chain as a separate
/// process. Shares the chain db path so it sees the same head the node's
/// HTTP server and sync client are serving.
#[derive(Parser)]
struct Args {
    /// path to the node's chain database directory
    #[arg(long)]
    chain_db_path: String,

    /// mine a single difficulty-0 (or --difficulty) genesis block and exit,
    /// instead of running the continuous search loop
    #[arg(long)]
    genesis: bool,

    /// difficulty to use for --genesis; ignored otherwise
    #[arg(long, default_value_t = 0)]
    difficulty: u8,

    /// number of OS threads searching in parallel, each with its own
    /// ChainEngine handle over the same sled path
    #[arg(long, default_value_t = 1)]
    miner_procs: usize,

    /// fraction (0, 1] of each one-second search slice spent hashing; the
    /// remainder is slept to cap CPU usage
    #[arg(long, default_value_t = 1.0)]
    miner_throttle: f64,

    /// log level passed to the env-filter (DEBUG|INFO|WARN|ERROR)
    #[arg(long, default_value = "INFO")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&args.log_level))
        .init();

    let db = sled::open(&args.chain_db_path).context("opening chain db")?;

    if args.genesis {
        let blocks = SledBlockStore::open(&db)?;
        let genesis = chainlib::miner::mine_genesis(args.difficulty);
        blocks.add_block(genesis.clone())?;
        info!(hash = %genesis.mining_hash().to_hex(), "mined genesis block");
        return Ok(());
    }

    let miner_key = load_or_create_miner_key(&db).context("loading miner key")?;
    info!(address = %miner_key.address().hex(), procs = args.miner_procs, "starting miner");

    let engine: Arc<MinerEngine> = Arc::new(ChainEngine::new(
        SledBlockStore::open(&db)?,
        SledMempoolStore::open(&db)?,
        SledUtxoStore::open(&db)?,
    ));
    if engine.get_genesis()?.is_none() {
        engine.add_block(HashedBlock::genesis())?;
    }

    let mut handles = Vec::new();
    for _ in 0..args.miner_procs.max(1) {
        let engine = engine.clone();
        let seed = miner_key.seed();
        let throttle = args.miner_throttle;
        handles.push(std::thread::spawn(move || -> Result<()> {
            let key = KeyPair::from_seed(seed);
            chainlib::miner::run_loop(&*engine, &key, Duration::from_secs(1), throttle, || false)
                .context("mining loop exited")
        }));
    }

    for handle in handles {
        if let Err(e) = handle.join().expect("miner thread panicked") {
            error!("miner thread failed: {e}");
        }
    }
    Ok(())
}
