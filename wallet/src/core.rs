use anyhow::Result;
use chainlib::crypto::{Address, KeyPair};
use chainlib::hash::Hash;
use chainlib::types::{HashedBlock, SignedTransaction, Transaction, TransactionInput, TransactionOutput};
use chainlib::util::Saveable;
use chainlib::Amount;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A raw ed25519 seed, persisted as the wallet's single key. `chainlib`
/// keeps `KeyPair` itself un-serializable since it carries private key
/// material; the wallet wraps the seed the same way `node`'s miner key does.
#[derive(Serialize, Deserialize)]
struct StoredKey {
    seed: [u8; 32],
}

/// A saved contact: a name and the hex-encoded address it resolves to.
#[derive(Serialize, Deserialize, Clone)]
pub struct Recipient {
    pub name: String,
    pub address: String,
}

impl Recipient {
    pub fn load(&self) -> Result<Address> {
        Address::from_hex(&self.address).map_err(|_| anyhow::anyhow!("malformed address for contact {}", self.name))
    }
}

#[derive(Serialize, Deserialize, Clone)]
pub struct Config {
    pub key_path: PathBuf,
    pub contacts: Vec<Recipient>,
    pub default_node: String,
}

/// An output this wallet can spend, with enough context
/// (`output_block_hash`) to build a `TransactionInput` against it.
#[derive(Clone)]
struct Utxo {
    output_block_hash: Hash,
    output_transaction_hash: Hash,
    output: TransactionOutput,
}

pub struct Core {
    pub config: Config,
    keypair: KeyPair,
    client: reqwest::blocking::Client,
    utxos: Vec<Utxo>,
}

impl Core {
    /// Load the config and wallet key from disk, generating a fresh key at
    /// `config.key_path` on first run.
    pub fn load(config_path: &Path) -> Result<Self> {
        info!("loading wallet config from {:?}", config_path);
        let config: Config = toml::from_str(&fs::read_to_string(config_path)?)?;
        let keypair = if config.key_path.exists() {
            let stored = StoredKey::load_from_file(&config.key_path)?;
            KeyPair::from_seed(stored.seed)
        } else {
            let kp = KeyPair::new();
            StoredKey { seed: kp.seed() }.save_to_file(&config.key_path)?;
            kp
        };
        info!("wallet address: {}", keypair.address().hex());
        Ok(Core {
            config,
            keypair,
            client: reqwest::blocking::Client::new(),
            utxos: Vec::new(),
        })
    }

    pub fn address(&self) -> Address {
        self.keypair.address()
    }

    /// Walks every block from genesis to the node's current head, keeping
    /// outputs paid to this wallet's address that no later block's inputs
    /// have since claimed. The node's RPC surface has no dedicated
    /// UTXO-by-address route, so this scan is the wallet's own bookkeeping.
    pub fn sync(&mut self) -> Result<()> {
        let height = self.chain_height()?;
        let mut mine = Vec::new();
        let mut spent = HashSet::new();
        for block_num in 0..=height {
            let blocks = self.get_blocks_by_num(block_num)?;
            for hb in &blocks {
                let block_hash = hb.mining_hash();
                for txn in &hb.block.transactions {
                    for output in &txn.transaction.outputs {
                        if output.recipient == self.address() {
                            mine.push(Utxo {
                                output_block_hash: block_hash,
                                output_transaction_hash: txn.hash(),
                                output: output.clone(),
                            });
                        }
                    }
                    for input in &txn.transaction.inputs {
                        spent.insert((input.output_transaction_hash, input.output_id));
                    }
                }
            }
        }
        self.utxos = mine
            .into_iter()
            .filter(|u| !spent.contains(&(u.output_transaction_hash, u.output.output_id)))
            .collect();
        info!("synced {} unspent output(s)", self.utxos.len());
        Ok(())
    }

    pub fn get_balance(&self) -> Amount {
        Amount::sum(self.utxos.iter().map(|u| u.output.amount))
    }

    /// Greedy coin selection: accumulate unspent outputs until `amount` is
    /// covered, paying any excess back to this wallet as change. There is
    /// no fee market here, so the recipient receives exactly `amount`.
    pub fn create_transaction(&self, recipient: Address, amount: Amount) -> Result<SignedTransaction> {
        let mut inputs = Vec::new();
        let mut input_nanos = 0i64;
        for utxo in &self.utxos {
            if input_nanos >= amount.nanos() {
                break;
            }
            inputs.push(TransactionInput {
                output_block_hash: utxo.output_block_hash,
                output_transaction_hash: utxo.output_transaction_hash,
                output_id: utxo.output.output_id,
            });
            input_nanos += utxo.output.amount.nanos();
        }
        if input_nanos < amount.nanos() {
            return Err(anyhow::anyhow!("insufficient funds"));
        }

        let mut outputs = vec![TransactionOutput {
            output_id: 0,
            amount,
            recipient,
        }];
        let change = input_nanos - amount.nanos();
        if change > 0 {
            outputs.push(TransactionOutput {
                output_id: 1,
                amount: Amount::from_nanos(change),
                recipient: self.address(),
            });
        }

        let transaction = Transaction::new(inputs, outputs, self.address());
        Ok(SignedTransaction::sign(transaction, &self.keypair))
    }

    pub fn send(&self, transaction: &SignedTransaction) -> Result<()> {
        debug!("posting transaction to {}", self.config.default_node);
        let resp = self
            .client
            .post(format!("http://{}/transaction", self.config.default_node))
            .json(transaction)
            .send()?;
        if !resp.status().is_success() {
            return Err(anyhow::anyhow!("node rejected transaction: {}", resp.text()?));
        }
        info!("transaction sent");
        Ok(())
    }

    fn chain_height(&self) -> Result<u64> {
        #[derive(Deserialize)]
        struct ChainStatus {
            height: u64,
        }
        let status: ChainStatus = self
            .client
            .get(format!("http://{}/chain", self.config.default_node))
            .send()?
            .json()?;
        Ok(status.height)
    }

    fn get_blocks_by_num(&self, block_num: u64) -> Result<Vec<HashedBlock>> {
        #[derive(Deserialize)]
        struct BlocksResponse {
            blocks: Vec<HashedBlock>,
        }
        let resp: BlocksResponse = self
            .client
            .get(format!("http://{}/block", self.config.default_node))
            .query(&[("block_num", block_num.to_string())])
            .send()?
            .json()?;
        Ok(resp.blocks)
    }
}

#[cfg(test)]
impl Core {
    /// Builds a `Core` around a fixed set of outputs, skipping config and
    /// network setup, so coin selection can be tested without a live node.
    pub(crate) fn for_test(keypair: KeyPair, outputs: Vec<(Hash, Hash, TransactionOutput)>) -> Self {
        Core {
            config: Config {
                key_path: PathBuf::new(),
                contacts: vec![],
                default_node: "unused".to_string(),
            },
            keypair,
            client: reqwest::blocking::Client::new(),
            utxos: outputs
                .into_iter()
                .map(|(output_block_hash, output_transaction_hash, output)| Utxo {
                    output_block_hash,
                    output_transaction_hash,
                    output,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
#[path = "core_tests.rs"]
mod core_tests;
