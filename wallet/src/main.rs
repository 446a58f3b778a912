use anyhow::Result;
use chainlib::crypto::Address;
use chainlib::Amount;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
mod core;
use core::{Config, Core};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to wallet configuration file
    #[arg(short, long, value_name = "FILE", env = "WALLET_CONFIG", default_value = "wallet_config.toml")]
    config: PathBuf,

    /// Node address to connect to, overriding the config file
    #[arg(short, long, value_name = "HOST:PORT", env = "WALLET_NODE_ADDRESS")]
    node: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a fresh wallet config and generate a key at the path it names
    GenerateConfig {
        #[arg(short, long, value_name = "FILE", default_value_os_t = PathBuf::from("wallet_config.toml"))]
        output: PathBuf,
    },
    /// Print this wallet's address
    Address,
    /// Scan the chain and print the spendable balance
    Balance,
    /// Send units to a named contact or a raw hex address
    Send {
        /// contact name from the config, or a 64-char hex address
        to: String,
        /// amount in whole units
        amount: i64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
        .init();

    let cli = Cli::parse();

    if let Commands::GenerateConfig { output } = &cli.command {
        info!("generating wallet config at {:?}", output);
        let key_path = output.with_file_name("wallet.key");
        let config = Config {
            key_path,
            contacts: vec![],
            default_node: "127.0.0.1:9000".to_string(),
        };
        std::fs::write(output, toml::to_string_pretty(&config)?)?;
        // Touching Core::load forces key generation immediately, so the
        // freshly written config already has a usable key on disk.
        Core::load(output)?;
        return Ok(());
    }

    let mut core = Core::load(&cli.config)?;
    if let Some(node) = cli.node {
        info!("overriding default node with {}", node);
        core.config.default_node = node;
    }

    match cli.command {
        Commands::Address => {
            println!("{}", core.address().hex());
        }
        Commands::Balance => {
            core.sync()?;
            println!("{}", core.get_balance());
        }
        Commands::Send { to, amount } => {
            core.sync()?;
            let recipient = resolve_recipient(&core, &to)?;
            let txn = core.create_transaction(recipient, Amount::units(amount))?;
            core.send(&txn)?;
            println!("sent {} units to {}", amount, recipient.hex());
        }
        Commands::GenerateConfig { .. } => unreachable!("handled above"),
    }
    Ok(())
}

fn resolve_recipient(core: &Core, to: &str) -> Result<Address> {
    if let Some(contact) = core.config.contacts.iter().find(|c| c.name == to) {
        return contact.load();
    }
    Address::from_hex(to).map_err(|_| anyhow::anyhow!("unknown contact or malformed address: {to}"))
}
