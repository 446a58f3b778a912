use anyhow::{Context, Result};
use argh::FromArgs;
use chainlib::config::NodeConfig;
use chainlib::peer::Peer;
use chainlib::store::PeerStore;
use chainlib::types::HashedBlock;
use node::store::load_or_create_miner_key;
use node::sync::HttpTransport;
use node::{server, sync, AppState};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(FromArgs)]
/// radcoin-rs node: durable chain storage, HTTP RPC surface, peer sync
struct Args {
    #[argh(switch)]
    /// write a fresh config and genesis block to --cfg_path and exit
    initialize: bool,
    #[argh(option)]
    /// path to the node's JSON config file
    cfg_path: String,
    #[argh(option)]
    /// override the advertised address from the config file
    advertize_addr: Option<String>,
    #[argh(option)]
    /// override the log level from the config file (DEBUG|INFO|WARN|ERROR)
    log_level: Option<String>,
    #[argh(switch)]
    /// run the embedded miner alongside the server and sync client
    run_miner: bool,
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();

    if args.initialize {
        let config = NodeConfig::initialize(&args.cfg_path).context("writing initial config")?;
        let chain_db = sled::open(&config.chain_db_path).context("opening chain db")?;
        let blocks = node::store::SledBlockStore::open(&chain_db)?;
        if chainlib::store::BlockStore::get_genesis(&blocks)?.is_some() {
            return Err(chainlib::error::ChainError::DuplicateGenesis.into());
        }
        chainlib::store::BlockStore::add_block(&blocks, HashedBlock::genesis())?;
        println!("wrote config to {} and mined genesis into {}", args.cfg_path, config.chain_db_path);
        return Ok(());
    }

    let mut config = NodeConfig::load(&args.cfg_path).context("loading config")?;
    if let Some(addr) = args.advertize_addr {
        config.advertize_addr = addr;
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }

    let _tracing_guard = node::util::init_tracing(&config.log_db_path, &config.log_level);
    info!("starting node, peer_id={}", config.peer_id);

    let state = Arc::new(AppState::open(&config.chain_db_path, &config.peer_db_path, &config)?);
    if state.engine.get_genesis()?.is_none() {
        return Err(chainlib::error::ChainError::MissingGenesis.into());
    }

    let self_peer = if config.advertize_self {
        let peer = Peer::new(config.peer_id.clone(), config.advertize_addr.clone(), config.listen_port, 0);
        state.peers.add_peer(peer.clone())?;
        Some(peer)
    } else {
        None
    };

    if let (Some(addr), Some(port)) = (config.gateway_address.as_ref(), config.gateway_port) {
        state.peers.add_peer(Peer::new(format!("gateway-{addr}-{port}"), addr.clone(), port, 0))?;
    }

    let chain_db_for_miner = sled::open(&config.chain_db_path).context("opening chain db for miner")?;
    let miner_key = load_or_create_miner_key(&chain_db_for_miner)?;

    let sync_state = state.clone();
    let poll_delay = Duration::from_secs(config.poll_delay);
    let sample_size = config.peer_sample_size;
    let sync_peer_id = config.peer_id.clone();
    let sync_self_peer = self_peer.clone();
    std::thread::spawn(move || {
        let transport = HttpTransport::new(Duration::from_secs(5));
        sync::run_loop(
            &sync_state.engine,
            &sync_state.peers,
            &sync_peer_id,
            sync_self_peer.as_ref(),
            &transport,
            sample_size,
            poll_delay,
            || false,
        );
    });

    if args.run_miner {
        for _ in 0..config.miner_procs.max(1) {
            let miner_state = state.clone();
            let key = chainlib::crypto::KeyPair::from_seed(miner_key.seed());
            let throttle = config.miner_throttle;
            std::thread::spawn(move || {
                if let Err(e) = chainlib::miner::run_loop(
                    &miner_state.engine,
                    &key,
                    Duration::from_secs(1),
                    throttle,
                    || false,
                ) {
                    error!("miner thread exited: {e}");
                }
            });
        }
    }

    let listen_port = config.listen_port;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(server::serve(listen_port, state))?;
    Ok(())
}
