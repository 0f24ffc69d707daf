use clap::{Parser, Subcommand, ValueEnum};
use ledger_core::{CancelToken, ChainTag, CoinType, Node, NodeConfig, Transaction};
use std::fs;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "ledger-node")]
#[command(about = "Dual-chain proof-of-work ledger node")]
#[command(version)]
struct Cli {
    /// Path to a `NodeConfig` JSON file; defaults are used if omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a signed transaction (read as JSON from a file) to the mempool.
    SubmitTx {
        /// Path to a JSON-encoded `Transaction`.
        tx_file: PathBuf,
    },
    /// Mine one candidate block for a chain/coin and append it if valid.
    Mine {
        #[arg(value_enum)]
        chain: ChainArg,
        #[arg(value_enum)]
        coin: CoinArg,
        /// Path to a JSON-encoded coinbase-first `Vec<Transaction>`.
        txs_file: PathBuf,
    },
    /// Print an address' balance for a given coin.
    Balance { address: String, #[arg(value_enum)] coin: CoinArg },
    /// Print the node's global height.
    Height,
    /// Roll both chains back to `height` and rebuild the UTXO set.
    RevertToHeight { height: i64 },
    /// Override a chain's difficulty.
    SetDifficulty {
        #[arg(value_enum)]
        chain: ChainArg,
        difficulty: u32,
    },
    /// Prune both chains down to `min_keep` blocks each.
    Prune { min_keep: usize },
    /// Print node-wide counters.
    Stats,
}

#[derive(Clone, Copy, ValueEnum)]
enum ChainArg {
    Golden,
    Silver,
}

impl From<ChainArg> for ChainTag {
    fn from(value: ChainArg) -> Self {
        match value {
            ChainArg::Golden => ChainTag::Golden,
            ChainArg::Silver => ChainTag::Silver,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CoinArg {
    Leah,
    Shiblum,
    Shiblon,
    Senine,
    Seon,
    Shum,
    Limnah,
    Antion,
    Senum,
    Amnor,
    Ezrom,
    Onti,
    Ephraim,
    Manasseh,
    Joseph,
}

impl From<CoinArg> for CoinType {
    fn from(value: CoinArg) -> Self {
        match value {
            CoinArg::Leah => CoinType::Leah,
            CoinArg::Shiblum => CoinType::Shiblum,
            CoinArg::Shiblon => CoinType::Shiblon,
            CoinArg::Senine => CoinType::Senine,
            CoinArg::Seon => CoinType::Seon,
            CoinArg::Shum => CoinType::Shum,
            CoinArg::Limnah => CoinType::Limnah,
            CoinArg::Antion => CoinType::Antion,
            CoinArg::Senum => CoinType::Senum,
            CoinArg::Amnor => CoinType::Amnor,
            CoinArg::Ezrom => CoinType::Ezrom,
            CoinArg::Onti => CoinType::Onti,
            CoinArg::Ephraim => CoinType::Ephraim,
            CoinArg::Manasseh => CoinType::Manasseh,
            CoinArg::Joseph => CoinType::Joseph,
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> NodeConfig {
    let Some(path) = path else {
        return NodeConfig::default();
    };
    let contents = fs::read_to_string(path).expect("config file must be readable");
    serde_json::from_str(&contents).expect("config file must be valid JSON")
}

fn main() {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());
    let node = Node::with_config(&config);

    // A freshly constructed node never persists state across invocations;
    // this binary exercises the in-process query/admin surface (spec §6).
    // Persistence/networking are out-of-scope collaborators (spec §1).
    match cli.command {
        Commands::SubmitTx { tx_file } => {
            let contents = fs::read_to_string(&tx_file).expect("tx file must be readable");
            let tx: Transaction = serde_json::from_str(&contents).expect("tx file must be valid JSON");
            match node.submit(tx) {
                Ok(()) => info!("transaction accepted into mempool"),
                Err(e) => println!("{}", serde_json::json!({ "rejected": e.to_string() })),
            }
        }
        Commands::Mine { chain, coin, txs_file } => {
            let contents = fs::read_to_string(&txs_file).expect("txs file must be readable");
            let txs: Vec<Transaction> =
                serde_json::from_str(&contents).expect("txs file must be valid JSON");
            let cancel = CancelToken::new();
            match node.mine(txs, chain.into(), coin.into(), &cancel) {
                Ok(block) => {
                    let hash = block.hash;
                    match node.accept_block(block) {
                        Ok(()) => println!("{}", serde_json::json!({ "mined_and_accepted": hash.to_string() })),
                        Err(e) => println!("{}", serde_json::json!({ "mined_but_rejected": e.to_string() })),
                    }
                }
                Err(e) => println!("{}", serde_json::json!({ "mine_failed": e.to_string() })),
            }
        }
        Commands::Balance { address, coin } => {
            println!("{}", node.balance(&address, coin.into()));
        }
        Commands::Height => {
            println!("{}", node.height());
        }
        Commands::RevertToHeight { height } => match node.revert_to_height(height) {
            Ok(()) => info!("reverted to height {height}"),
            Err(e) => println!("{}", serde_json::json!({ "revert_failed": e.to_string() })),
        },
        Commands::SetDifficulty { chain, difficulty } => {
            node.set_difficulty(chain.into(), difficulty);
        }
        Commands::Prune { min_keep } => match node.prune(min_keep) {
            Ok(()) => info!("pruned to {min_keep} blocks per chain"),
            Err(e) => println!("{}", serde_json::json!({ "prune_failed": e.to_string() })),
        },
        Commands::Stats => {
            let stats = node.stats();
            println!("{}", serde_json::to_string_pretty(&stats).expect("NodeStats is always serializable"));
        }
    }
}
